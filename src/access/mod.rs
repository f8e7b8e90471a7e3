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

//! Module with the request orchestrator.
//!
//! [`DataAccess::read`] runs the whole pipeline for one request:
//! catalogue lookup, variable location, loading, optional temporal
//! reduction, optional region selection and finally level selection.
//! Every step except nearest-level substitution is fatal on failure.
//!
//! ```no_run
//! use climcat::{CatalogueSource, DataAccess, Level, Request};
//!
//! let access = DataAccess::new(CatalogueSource::File("catalogue.yml".into()));
//! let request = Request::new("ERA5", "U")
//!     .with_levels(vec![Level::Value(500.0)])
//!     .with_period(1990, 2000)
//!     .with_season("DJF");
//!
//! let djf_wind = access.read(&request).unwrap();
//! ```

pub mod configuration;

use crate::{
    array::LabeledArray,
    catalogue::{describe, locator::locate, CatalogueSource, DatasetDescriptor, Level},
    constants::{LAT_DIM, LEVEL_DIM, LON_DIM},
    errors::AccessError,
    loader::{load, DefaultOpener, DriverRegistry, MultiFileOpener},
    resample::reduce,
    Float,
};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use log::{debug, info, warn};

/// Parameters of one data request.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Request {
    pub dataset: String,
    pub var: String,
    /// Requested vertical levels, `None` keeps all.
    pub levels: Option<Vec<Level>>,
    /// Inclusive years, `None` uses the dataset bounds.
    pub period: Option<(i32, i32)>,
    /// Aggregation token, `None` returns the data as stored.
    pub season: Option<String>,
    pub region: Option<Region>,
}

impl Request {
    pub fn new(dataset: &str, var: &str) -> Self {
        Request {
            dataset: dataset.to_string(),
            var: var.to_string(),
            ..Default::default()
        }
    }

    pub fn with_levels(mut self, levels: Vec<Level>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn with_period(mut self, start: i32, end: i32) -> Self {
        self.period = Some((start, end));
        self
    }

    pub fn with_season(mut self, season: &str) -> Self {
        self.season = Some(season.to_string());
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// Box selected by inclusive longitude and latitude ranges, given
/// in the ordering and units of the array's coordinates.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Region {
    pub lon: (Float, Float),
    pub lat: (Float, Float),
}

/// Ordered collection of named arrays read from one dataset.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Dataset {
    pub name: String,
    variables: IndexMap<String, LabeledArray>,
}

impl Dataset {
    pub fn new(name: &str) -> Self {
        Dataset {
            name: name.to_string(),
            variables: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, array: LabeledArray) {
        self.variables.insert(array.name.clone(), array);
    }

    pub fn get(&self, var: &str) -> Option<&LabeledArray> {
        self.variables.get(var)
    }

    pub fn variables(&self) -> impl Iterator<Item = &LabeledArray> {
        self.variables.values()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Entry point of the library, owning the catalogue source,
/// the multi-file opener and the driver registry.
pub struct DataAccess {
    catalogue: CatalogueSource,
    opener: Box<dyn MultiFileOpener>,
    drivers: DriverRegistry,
}

impl DataAccess {
    /// Access with the default opener and the built-in drivers.
    pub fn new(catalogue: CatalogueSource) -> Self {
        DataAccess {
            catalogue,
            opener: Box::new(DefaultOpener),
            drivers: DriverRegistry::with_builtin(),
        }
    }

    pub fn with_opener<O: MultiFileOpener + 'static>(mut self, opener: O) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn with_drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn drivers_mut(&mut self) -> &mut DriverRegistry {
        &mut self.drivers
    }

    /// Names and descriptions of all catalogued datasets.
    pub fn list(&self) -> Result<Vec<(String, String)>, AccessError> {
        Ok(self.catalogue.list()?)
    }

    /// Component, stream, kind and variable outline of a dataset.
    pub fn describe(&self, dataset: &str) -> Result<String, AccessError> {
        let descriptor = self.catalogue.resolve(dataset)?;
        Ok(describe(&descriptor))
    }

    /// Reads one variable according to `request`.
    pub fn read(&self, request: &Request) -> Result<LabeledArray, AccessError> {
        info!("Reading {} from {}", request.var, request.dataset);

        let descriptor = self.catalogue.resolve(&request.dataset)?;
        let levels = request.levels.as_deref();

        let located = locate(&descriptor, &request.var, levels, request.period)?;

        let mut array = load(
            &descriptor,
            &located,
            &request.var,
            levels,
            request.period,
            self.opener.as_ref(),
            &self.drivers,
        )?;

        if let Some(season) = &request.season {
            debug!("Reducing {} to {}", request.var, season);
            array = reduce(&array, season)?;
        }

        if let Some(region) = &request.region {
            debug!("Selecting region lon {:?} lat {:?}", region.lon, region.lat);
            array = array
                .select_range(LON_DIM, region.lon.0, region.lon.1)?
                .select_range(LAT_DIM, region.lat.0, region.lat.1)?;
        }

        if let Some(levels) = levels {
            array = select_levels(&descriptor, array, levels)?;
        }

        info!("Read {} with shape {:?}", request.var, array.shape());

        Ok(array)
    }

    /// Same as [`read`](Self::read), wrapped in a [`Dataset`].
    pub fn read_dataset(&self, request: &Request) -> Result<Dataset, AccessError> {
        let array = self.read(request)?;

        let mut dataset = Dataset::new(&request.dataset);
        dataset.insert(array);

        Ok(dataset)
    }
}

/// Catalogue level closest to `requested` and whether it
/// differs from the requested one. Ties go to the level
/// listed first. `None` when the dataset has no numeric levels.
pub fn nearest_level(levels: &[Level], requested: Float) -> Option<(Float, bool)> {
    let mut nearest: Option<Float> = None;

    for level in levels.iter().filter_map(Level::value) {
        if approx_eq!(Float, level, requested, ulps = 2) {
            return Some((level, false));
        }

        match nearest {
            Some(best) if (best - requested).abs() <= (level - requested).abs() => (),
            _ => nearest = Some(level),
        }
    }

    nearest.map(|level| (level, true))
}

/// Selects requested numeric levels on the level dimension. One level
/// drops the dimension, several keep it. Surface requests and arrays
/// without a level dimension are left as they are.
fn select_levels(
    descriptor: &DatasetDescriptor,
    array: LabeledArray,
    levels: &[Level],
) -> Result<LabeledArray, AccessError> {
    if array.axis(LEVEL_DIM).is_none() {
        return Ok(array);
    }

    let mut indices = vec![];

    for requested in levels.iter().filter_map(Level::value) {
        let resolved = match nearest_level(&descriptor.levels, requested) {
            Some((level, true)) => {
                warn!(
                    "Level {} is not available in {}, using nearest level {} instead",
                    requested, descriptor.name, level
                );
                level
            }
            Some((level, false)) => level,
            None => requested,
        };

        indices.push(array.nearest_index(LEVEL_DIM, resolved)?);
    }

    match indices.as_slice() {
        [] => Ok(array),
        [index] => Ok(array.select_index(LEVEL_DIM, *index)?),
        _ => Ok(array.select_indices(LEVEL_DIM, &indices)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalogue::{tests::CATALOGUE, Catalogue},
        constants::{AGGREGATION_ATTR, REALM_ATTR},
        errors::{FileSearchError, LoadError, LocateError, ResampleError},
        loader::tests::{era5_in, StubOpener},
    };
    use log::{LevelFilter, Log, Metadata, Record};
    use std::{
        path::Path,
        sync::{Mutex, Once},
    };

    static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
    static CAPTURE: Once = Once::new();

    /// Logger keeping warning messages for inspection.
    struct WarnCapture;

    impl Log for WarnCapture {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    fn capture_warnings() {
        CAPTURE.call_once(|| {
            log::set_logger(&WarnCapture).unwrap();
            log::set_max_level(LevelFilter::Warn);
        });
    }

    fn access_in(root: &Path) -> DataAccess {
        let mut catalogue = Catalogue::from_yaml_str(CATALOGUE).unwrap();
        catalogue.insert(era5_in(root));

        DataAccess::new(CatalogueSource::Loaded(catalogue)).with_opener(StubOpener::new())
    }

    #[test]
    fn full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let access = access_in(dir.path());

        let request = Request::new("ERA5", "U")
            .with_period(2000, 2001)
            .with_levels(vec![Level::Value(510.0)])
            .with_season("FEB")
            .with_region(Region {
                lon: (90.0, 180.0),
                lat: (45.0, 0.0),
            });

        let array = access.read(&request).unwrap();

        assert_eq!(array.name, "U");
        assert_eq!(array.dims(), &["time", LAT_DIM, LON_DIM]);
        assert_eq!(array.shape(), &[1, 2, 2]);
        assert_eq!(array.attrs[REALM_ATTR], "atm");
        assert_eq!(array.attrs[AGGREGATION_ATTR], "FEB");
        // February, 500 hPa, 45N, 90E in the sample array
        assert_eq!(array.data()[[0, 0, 0]], 36.0 + 24.0 + 1.0);
    }

    #[test]
    fn several_levels_keep_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let access = access_in(dir.path());

        let request = Request::new("ERA5", "U")
            .with_period(2000, 2001)
            .with_levels(vec![Level::Value(1000.0), Level::Value(500.0)]);

        let array = access.read(&request).unwrap();

        assert_eq!(array.coord(LEVEL_DIM).unwrap(), &[1000.0, 500.0]);
        assert_eq!(array.shape(), &[2, 2, 3, 4]);
        assert!(array.attrs.get(AGGREGATION_ATTR).is_none());
    }

    #[test]
    fn nearest_level_substitution() {
        let levels: Vec<Level> = ["SURF", "10", "50", "100", "500", "600", "850", "1000"]
            .iter()
            .map(|l| l.parse().unwrap())
            .collect();

        assert_eq!(nearest_level(&levels, 510.0), Some((500.0, true)));
        assert_eq!(nearest_level(&levels, 500.0), Some((500.0, false)));
        assert_eq!(nearest_level(&levels, 550.0), Some((500.0, true)));
        assert_eq!(nearest_level(&levels, 2.0), Some((10.0, true)));
        assert_eq!(nearest_level(&[Level::Surface], 2.0), None);
    }

    #[test]
    fn substituted_level_is_warned() {
        capture_warnings();

        let dir = tempfile::tempdir().unwrap();
        let access = access_in(dir.path());

        let request = Request::new("ERA5", "U")
            .with_period(2000, 2000)
            .with_levels(vec![Level::Value(520.0), Level::Value(850.0)]);

        let array = access.read(&request).unwrap();
        assert_eq!(array.coord(LEVEL_DIM).unwrap(), &[500.0, 850.0]);

        let warnings = WARNINGS.lock().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w == "Level 520 is not available in ERA5, using nearest level 500 instead"));
        assert!(!warnings.iter().any(|w| w.starts_with("Level 850 ")));
    }

    #[test]
    fn errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let access = access_in(dir.path());

        let err = access.read(&Request::new("MERRA2", "U")).unwrap_err();
        assert!(matches!(err, AccessError::Catalogue(_)));

        let err = access
            .read(&Request::new("ERA5", "U").with_period(1970, 2000))
            .unwrap_err();
        assert!(matches!(err, AccessError::Locate(LocateError::PeriodOutOfBounds { .. })));

        let err = access
            .read(&Request::new("ERA5", "T2M").with_period(2000, 2001))
            .unwrap_err();
        assert!(matches!(
            err,
            AccessError::Load(LoadError::FileSearch(FileSearchError::NoFilesFound { .. }))
        ));

        let err = access
            .read(&Request::new("ERA5", "U").with_period(2000, 2001).with_season("WINTER"))
            .unwrap_err();
        assert!(matches!(
            err,
            AccessError::Resample(ResampleError::UnsupportedAggregation(_))
        ));

        let err = access.read(&Request::new("GPCP", "precip")).unwrap_err();
        assert!(matches!(err, AccessError::Load(LoadError::UnknownDriver(_))));
    }

    #[test]
    fn dataset_wrapper_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let access = access_in(dir.path());

        let dataset = access
            .read_dataset(&Request::new("ERA5", "U").with_period(2000, 2000))
            .unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.get("U").unwrap().shape(), &[2, 3, 3, 4]);

        let names: Vec<String> = access.list().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["ERA5", "GPCP"]);
        assert!(access.describe("ERA5").unwrap().contains("T2M"));
    }
}
