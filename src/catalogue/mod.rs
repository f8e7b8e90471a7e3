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

//! Module responsible for parsing the dataset catalogue and
//! looking up dataset descriptors by name.
//!
//! The catalogue is a [YAML](https://en.wikipedia.org/wiki/YAML) document
//! keyed by dataset name and deserialised with `serde`, so that typos in
//! field names and wrong types are reported when the catalogue is read.
//! The structures in this module directly correspond to the fields
//! of the catalogue, for example:
//!
//! ```yaml
//! ERA5:
//!   description: ERA5 monthly means
//!   path: /data/ERA5
//!   subtree: <comp>/<data_stream>/<year>
//!   year_bounds: [1979, 2018]
//!   levels: [SURF, 10, 50, 100, 500, 850, 1000]
//!   components:
//!     atm:
//!       model: IFS
//!       data_stream:
//!         monthly:
//!           filename: <var>_<year>.nc
//!           coord_map: {lon: longitude, lat: latitude, lev: level}
//!           2D: {T2M: 2m temperature}
//!           3D: {U: zonal wind, V: meridional wind}
//! ```
//!
//! The catalogue is never cached implicitly: [`CatalogueSource::File`]
//! re-reads the document on every lookup. Callers that want to avoid
//! repeated parsing can load it once and hold a [`CatalogueSource::Loaded`].

pub mod files;
pub mod locator;

use crate::{constants::SURFACE_TOKEN, errors::CatalogueError, Float};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::{
    fmt::{self, Display, Write},
    fs,
    path::{Path, PathBuf},
};

/// Vertical level as listed in the catalogue or requested by the user.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
#[serde(try_from = "LevelDeser")]
pub enum Level {
    /// Surface (single level) fields, written as `SURF` in the catalogue.
    Surface,
    Value(Float),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LevelDeser {
    Number(Float),
    Token(String),
}

impl TryFrom<LevelDeser> for Level {
    type Error = CatalogueError;

    fn try_from(value: LevelDeser) -> Result<Self, Self::Error> {
        match value {
            LevelDeser::Number(v) => Level::from_value(v, &v.to_string()),
            LevelDeser::Token(token) => token.parse(),
        }
    }
}

impl std::str::FromStr for Level {
    type Err = CatalogueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.eq_ignore_ascii_case(SURFACE_TOKEN) || s.eq_ignore_ascii_case("surface") {
            return Ok(Level::Surface);
        }

        let value = s
            .parse::<Float>()
            .map_err(|_| CatalogueError::UnknownLevelToken(s.to_string()))?;

        Level::from_value(value, s)
    }
}

impl Level {
    /// Only finite numbers are levels.
    fn from_value(value: Float, token: &str) -> Result<Self, CatalogueError> {
        if value.is_finite() {
            Ok(Level::Value(value))
        } else {
            Err(CatalogueError::UnknownLevelToken(token.to_string()))
        }
    }

    /// Numeric value of the level, `None` for surface.
    pub fn value(&self) -> Option<Float> {
        match self {
            Level::Surface => None,
            Level::Value(v) => Some(*v),
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Surface => write!(f, "{}", SURFACE_TOKEN),
            Level::Value(v) => write!(f, "{}", v),
        }
    }
}

/// One data stream of a component: a set of variables sharing
/// the same file layout.
///
/// Besides the optional `filename` and `coord_map` every key of the
/// stream is a "kind" grouping variables (e.g. by dimensionality),
/// mapping variable names to their descriptions.
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
pub struct DataStream {
    #[serde(default)]
    pub filename: Option<String>,

    /// Canonical coordinate name -> name used in the files.
    #[serde(default)]
    pub coord_map: Option<IndexMap<String, String>>,

    #[serde(flatten)]
    pub kinds: IndexMap<String, IndexMap<String, String>>,
}

/// Sub-model or source of a dataset (e.g. atmosphere or ocean).
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Component {
    pub model: String,

    /// Filename template shared by all streams that do not declare their own.
    #[serde(default)]
    pub filename: Option<String>,

    pub data_stream: IndexMap<String, DataStream>,
}

/// Metadata of one dataset, read fresh from the catalogue for each request.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct DatasetDescriptor {
    /// Filled from the catalogue key when the dataset is resolved.
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Base storage directory.
    pub path: PathBuf,

    /// Directory template below `path`, absent for flat layouts.
    #[serde(default)]
    pub subtree: Option<String>,

    /// Inclusive `[start, end]` years, a single element means unbounded.
    pub year_bounds: Vec<i32>,

    pub levels: Vec<Level>,

    /// Named external driver, the multi-file opener is used when absent.
    #[serde(default)]
    pub driver: Option<String>,

    pub components: IndexMap<String, Component>,
}

impl DatasetDescriptor {
    /// Checks if the descriptor fields follow catalogue conventions.
    pub fn check_bounds(&self) -> Result<(), CatalogueError> {
        if self.year_bounds.is_empty() || self.year_bounds.len() > 2 {
            return Err(CatalogueError::MalformedYearBounds {
                dataset: self.name.clone(),
                bounds: self.year_bounds.clone(),
            });
        }

        Ok(())
    }

    /// Lowest and highest numeric level, `None` when the dataset
    /// has only surface fields.
    pub fn level_bounds(&self) -> Option<(Float, Float)> {
        let values = self.levels.iter().filter_map(Level::value);

        values.fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Year bounds when they are meaningful (two elements).
    pub fn year_range(&self) -> Option<(i32, i32)> {
        match self.year_bounds.as_slice() {
            [start, end] => Some((*start, *end)),
            _ => None,
        }
    }

    pub fn driver_name(&self) -> &str {
        self.driver
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_DRIVER)
    }
}

/// Parsed catalogue, dataset name -> descriptor in authoring order.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Catalogue {
    datasets: IndexMap<String, DatasetDescriptor>,
}

impl Catalogue {
    /// Reads and deserialises the catalogue file.
    pub fn from_file(file_path: &Path) -> Result<Catalogue, CatalogueError> {
        debug!("Reading catalogue from {}", file_path.display());

        let data = fs::read(file_path).map_err(|source| CatalogueError::CantOpenFile {
            path: file_path.to_path_buf(),
            source,
        })?;
        let datasets: IndexMap<String, DatasetDescriptor> =
            serde_yaml::from_slice(data.as_slice())?;

        Ok(Catalogue::from_datasets(datasets))
    }

    pub fn from_yaml_str(text: &str) -> Result<Catalogue, CatalogueError> {
        let datasets: IndexMap<String, DatasetDescriptor> = serde_yaml::from_str(text)?;

        Ok(Catalogue::from_datasets(datasets))
    }

    fn from_datasets(mut datasets: IndexMap<String, DatasetDescriptor>) -> Catalogue {
        for (name, descriptor) in datasets.iter_mut() {
            descriptor.name = name.clone();
        }

        Catalogue { datasets }
    }

    /// Looks up one dataset, failing when it is not declared.
    pub fn resolve(&self, name: &str) -> Result<DatasetDescriptor, CatalogueError> {
        let descriptor = self
            .datasets
            .get(name)
            .ok_or_else(|| CatalogueError::UnknownDataset(name.to_string()))?;

        descriptor.check_bounds()?;
        debug!("Access dataset {}", name);

        Ok(descriptor.clone())
    }

    /// Names and descriptions of all datasets.
    pub fn list(&self) -> Vec<(String, String)> {
        self.datasets
            .iter()
            .map(|(name, d)| (name.clone(), d.description.clone().unwrap_or_default()))
            .collect()
    }

    /// Adds or replaces a dataset, keyed by its name.
    pub fn insert(&mut self, descriptor: DatasetDescriptor) {
        self.datasets.insert(descriptor.name.clone(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Outline of the component -> stream -> kind -> variable tree
/// for human inspection.
pub fn describe(descriptor: &DatasetDescriptor) -> String {
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(
        out,
        "{}: {}",
        descriptor.name,
        descriptor.description.as_deref().unwrap_or("")
    );
    let _ = writeln!(out, "  path: {}", descriptor.path.display());

    for (comp_name, comp) in &descriptor.components {
        let _ = writeln!(out, "  component {} (model {})", comp_name, comp.model);

        for (stream_name, stream) in &comp.data_stream {
            let _ = writeln!(out, "    data stream {}", stream_name);

            for (kind, vars) in &stream.kinds {
                let _ = writeln!(out, "      {}", kind);

                for (var, desc) in vars {
                    let _ = writeln!(out, "        {:<12} {}", var, desc);
                }
            }
        }
    }

    out
}

/// Where the catalogue comes from.
///
/// `File` is re-read on every call, `Loaded` is a catalogue
/// parsed once and owned by the caller.
#[derive(Clone, PartialEq, Debug)]
pub enum CatalogueSource {
    File(PathBuf),
    Loaded(Catalogue),
}

impl CatalogueSource {
    pub fn resolve(&self, name: &str) -> Result<DatasetDescriptor, CatalogueError> {
        match self {
            CatalogueSource::File(path) => Catalogue::from_file(path)?.resolve(name),
            CatalogueSource::Loaded(catalogue) => catalogue.resolve(name),
        }
    }

    pub fn list(&self) -> Result<Vec<(String, String)>, CatalogueError> {
        match self {
            CatalogueSource::File(path) => Ok(Catalogue::from_file(path)?.list()),
            CatalogueSource::Loaded(catalogue) => Ok(catalogue.list()),
        }
    }
}
