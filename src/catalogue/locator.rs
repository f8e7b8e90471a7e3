/*
Copyright 2021 Jakub Lewandowski

This file is part of Climate Catalogue Access (climcat).

Climate Catalogue Access (climcat) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Climate Catalogue Access (climcat) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Climate Catalogue Access (climcat). If not, see https://www.gnu.org/licenses/.
*/

//! Sub-module finding which component and data stream
//! of a dataset holds the requested variable.

use super::{DatasetDescriptor, Level};
use crate::errors::LocateError;
use log::debug;

/// The (component, stream, kind) triple holding a variable.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Located {
    pub component: String,
    pub stream: String,
    pub kind: String,
}

/// Validates the requested levels and period against dataset
/// bounds and returns the unique triple containing `var`.
///
/// A variable declared in more than one triple is a catalogue
/// authoring defect and is reported instead of picking a match.
pub fn locate(
    descriptor: &DatasetDescriptor,
    var: &str,
    levels: Option<&[Level]>,
    period: Option<(i32, i32)>,
) -> Result<Located, LocateError> {
    if let Some(levels) = levels {
        check_levels(descriptor, levels)?;
    }

    if let Some(period) = period {
        check_period(descriptor, period)?;
    }

    let mut matches = vec![];

    for (comp_name, comp) in &descriptor.components {
        for (stream_name, stream) in &comp.data_stream {
            for (kind, vars) in &stream.kinds {
                if vars.contains_key(var) {
                    matches.push(Located {
                        component: comp_name.clone(),
                        stream: stream_name.clone(),
                        kind: kind.clone(),
                    });
                }
            }
        }
    }

    match matches.len() {
        0 => Err(LocateError::VariableNotFound {
            dataset: descriptor.name.clone(),
            var: var.to_string(),
        }),
        1 => {
            let located = matches.remove(0);
            debug!(
                "Retrieve variable {} from component {} of data stream {} as {} field",
                var, located.component, located.stream, located.kind
            );
            Ok(located)
        }
        _ => Err(LocateError::AmbiguousVariable {
            dataset: descriptor.name.clone(),
            var: var.to_string(),
            matches: matches
                .iter()
                .map(|m| format!("{}/{}/{}", m.component, m.stream, m.kind))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Every numeric level must lie within the inclusive `[min, max]`
/// of the dataset levels. Surface requests pass, numeric requests
/// on surface-only datasets do not.
fn check_levels(descriptor: &DatasetDescriptor, levels: &[Level]) -> Result<(), LocateError> {
    let bounds = descriptor.level_bounds();

    for level in levels.iter().filter_map(Level::value) {
        match bounds {
            // NaN fails both comparisons
            Some((min, max)) if level >= min && level <= max => (),
            Some((min, max)) => return Err(LocateError::LevelOutOfBounds { level, min, max }),
            None => {
                return Err(LocateError::SurfaceOnly {
                    dataset: descriptor.name.clone(),
                    level,
                })
            }
        }
    }

    Ok(())
}

/// Period is checked only when the dataset declares both year bounds.
fn check_period(descriptor: &DatasetDescriptor, period: (i32, i32)) -> Result<(), LocateError> {
    if let Some((min, max)) = descriptor.year_range() {
        if period.0 < min || period.1 > max {
            return Err(LocateError::PeriodOutOfBounds {
                start: period.0,
                end: period.1,
                min,
                max,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalogue::{tests::CATALOGUE, Catalogue},
        Float,
    };

    fn era5() -> DatasetDescriptor {
        Catalogue::from_yaml_str(CATALOGUE)
            .unwrap()
            .resolve("ERA5")
            .unwrap()
    }

    #[test]
    fn unique_match() {
        let located = locate(&era5(), "U", None, None).unwrap();

        assert_eq!(
            located,
            Located {
                component: "atm".to_string(),
                stream: "monthly".to_string(),
                kind: "3D".to_string(),
            }
        );
    }

    #[test]
    fn variable_not_found() {
        let err = locate(&era5(), "SST", None, None).unwrap_err();
        assert!(matches!(err, LocateError::VariableNotFound { .. }));
    }

    #[test]
    fn duplicated_variable_is_ambiguous() {
        let mut descriptor = era5();
        let stream = descriptor.components["atm"].data_stream["monthly"].clone();
        descriptor.components["atm"]
            .data_stream
            .insert("daily".to_string(), stream);

        let err = locate(&descriptor, "U", None, None).unwrap_err();
        match err {
            LocateError::AmbiguousVariable { matches, .. } => {
                assert_eq!(matches, "atm/monthly/3D, atm/daily/3D");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn catalogue_variables_are_unique() {
        let catalogue = Catalogue::from_yaml_str(CATALOGUE).unwrap();

        for (name, _) in catalogue.list() {
            let descriptor = catalogue.resolve(&name).unwrap();
            for comp in descriptor.components.values() {
                for stream in comp.data_stream.values() {
                    for vars in stream.kinds.values() {
                        for var in vars.keys() {
                            assert!(locate(&descriptor, var, None, None).is_ok());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn level_bounds_are_inclusive() {
        let descriptor = era5();

        assert!(locate(&descriptor, "U", Some(&[Level::Value(10.0)]), None).is_ok());
        assert!(locate(&descriptor, "U", Some(&[Level::Value(1000.0)]), None).is_ok());
        assert!(locate(&descriptor, "U", Some(&[Level::Surface]), None).is_ok());

        let err = locate(&descriptor, "U", Some(&[Level::Value(9.0)]), None).unwrap_err();
        assert!(matches!(
            err,
            LocateError::LevelOutOfBounds { level, min, max } if level == 9.0 && min == 10.0 && max == 1000.0
        ));

        let err = locate(
            &descriptor,
            "U",
            Some(&[Level::Value(500.0), Level::Value(1001.0)]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LocateError::LevelOutOfBounds { level, .. } if level == 1001.0));
    }

    #[test]
    fn numeric_level_on_surface_only_dataset() {
        let descriptor = Catalogue::from_yaml_str(CATALOGUE)
            .unwrap()
            .resolve("GPCP")
            .unwrap();

        assert!(locate(&descriptor, "precip", Some(&[Level::Surface]), None).is_ok());

        let err = locate(&descriptor, "precip", Some(&[Level::Value(500.0)]), None).unwrap_err();
        assert!(matches!(
            err,
            LocateError::SurfaceOnly { ref dataset, level } if dataset == "GPCP" && level == 500.0
        ));
    }

    #[test]
    fn nan_level_is_out_of_bounds() {
        let err = locate(&era5(), "U", Some(&[Level::Value(Float::NAN)]), None).unwrap_err();
        assert!(matches!(err, LocateError::LevelOutOfBounds { level, .. } if level.is_nan()));
    }

    #[test]
    fn period_bounds() {
        let descriptor = era5();

        assert!(locate(&descriptor, "U", None, Some((1979, 2018))).is_ok());

        let err = locate(&descriptor, "U", None, Some((1979, 2019))).unwrap_err();
        assert!(matches!(
            err,
            LocateError::PeriodOutOfBounds { start: 1979, end: 2019, min: 1979, max: 2018 }
        ));

        assert!(locate(&descriptor, "U", None, Some((1978, 2000))).is_err());
    }

    #[test]
    fn unbounded_years_skip_period_check() {
        let descriptor = Catalogue::from_yaml_str(CATALOGUE)
            .unwrap()
            .resolve("GPCP")
            .unwrap();

        assert!(locate(&descriptor, "precip", None, Some((1900, 2100))).is_ok());
    }
}
