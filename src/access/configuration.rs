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

//! Module responsible for parsing and checking the request file
//! used by the `climcat` binary.
//!
//! The request file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing. The structures in this module
//! directly correspond to the fields inside `request.yaml`, for example:
//!
//! ```yaml
//! catalogue: catalogue.yml
//! dataset: ERA5
//! var: U
//! levels: [500]
//! period: [1990, 2000]
//! season: DJF
//! region: [0.0, 90.0, 60.0, 20.0]
//! resources:
//!   memory: 4096
//! ```
//!
//! Omitting `dataset` lists the catalogue instead of reading data.

use super::{Region, Request};
use crate::{catalogue::Level, errors::ConfigError, Float};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Season token meaning "no temporal reduction".
const ALL_SEASONS: &str = "ALL";

/// Region token meaning "no spatial selection".
const GLOBE: &str = "globe";

/// Spatial extent of the request, either `globe` or
/// `[lon_start, lon_end, lat_start, lat_end]`.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(untagged)]
pub enum RegionConfig {
    Named(String),
    Bounds([Float; 4]),
}

impl Default for RegionConfig {
    fn default() -> Self {
        RegionConfig::Named(GLOBE.to_string())
    }
}

impl RegionConfig {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        match self {
            RegionConfig::Named(name) if name.eq_ignore_ascii_case(GLOBE) => Ok(()),
            RegionConfig::Named(_) => Err(ConfigError::OutOfBounds(
                "Region must be globe or a list of four bounds",
            )),
            RegionConfig::Bounds([_, _, lat_start, lat_end]) => {
                if !(-90.0..=90.0).contains(lat_start) || !(-90.0..=90.0).contains(lat_end) {
                    return Err(ConfigError::OutOfBounds(
                        "Region latitudes must be between -90 and 90",
                    ));
                }

                Ok(())
            }
        }
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            RegionConfig::Named(_) => None,
            RegionConfig::Bounds([lon_start, lon_end, lat_start, lat_end]) => Some(Region {
                lon: (*lon_start, *lon_end),
                lat: (*lat_start, *lat_end),
            }),
        }
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the program.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Heap memory limit in MB.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space.
    /// Reading long multi-file series allocates large arrays, with
    /// a capped allocator running out of memory ends with an error
    /// message instead of the system killing the process.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            memory: Resources::default_memory(),
        }
    }
}

/// Main structure representing the fields in the request file.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct RequestConfig {
    /// _(Optional)_ Path to the catalogue. Defaults to `catalogue.yml`.
    #[serde(default = "RequestConfig::default_catalogue")]
    pub catalogue: PathBuf,

    /// _(Optional)_ Dataset to read. When absent the catalogue is listed.
    #[serde(default)]
    pub dataset: Option<String>,

    /// _(Optional)_ Print the dataset outline instead of reading data.
    #[serde(default)]
    pub describe: bool,

    #[serde(default)]
    pub var: Option<String>,

    #[serde(default)]
    pub levels: Option<Vec<Level>>,

    /// _(Optional)_ Inclusive years. Defaults to the dataset bounds.
    #[serde(default)]
    pub period: Option<(i32, i32)>,

    /// _(Optional)_ Aggregation token, `ALL` or absent for none.
    #[serde(default)]
    pub season: Option<String>,

    #[serde(default)]
    pub region: RegionConfig,

    #[serde(default)]
    pub resources: Resources,
}

impl RequestConfig {
    /// Deserializes the request file and checks it.
    pub fn new_from_file(file_path: &Path) -> Result<RequestConfig, ConfigError> {
        let data = fs::read(file_path)?;
        let config: RequestConfig = serde_yaml::from_slice(data.as_slice())?;

        config.check_bounds()?;

        Ok(config)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.dataset.is_some() && !self.describe && self.var.is_none() {
            return Err(ConfigError::OutOfBounds(
                "Variable must be given when reading a dataset",
            ));
        }

        if let Some((start, end)) = self.period {
            if start > end {
                return Err(ConfigError::OutOfBounds(
                    "Period cannot end before it starts",
                ));
            }
        }

        if let Some(levels) = &self.levels {
            if levels.is_empty() {
                return Err(ConfigError::OutOfBounds("Levels list cannot be empty"));
            }
        }

        self.region.check_bounds()?;
        self.resources.check_bounds()?;

        Ok(())
    }

    /// Season token, `None` when no reduction is requested.
    pub fn season(&self) -> Option<&str> {
        self.season
            .as_deref()
            .filter(|s| !s.eq_ignore_ascii_case(ALL_SEASONS))
    }

    /// Data request described by the file, `None` in listing
    /// and describing modes.
    pub fn request(&self) -> Option<Request> {
        if self.describe {
            return None;
        }

        let dataset = self.dataset.as_deref()?;
        let var = self.var.as_deref()?;

        Some(Request {
            dataset: dataset.to_string(),
            var: var.to_string(),
            levels: self.levels.clone(),
            period: self.period,
            season: self.season().map(str::to_string),
            region: self.region.region(),
        })
    }

    fn default_catalogue() -> PathBuf {
        PathBuf::from("catalogue.yml")
    }
}
