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

//! Module responsible for turning a located variable into
//! a [`LabeledArray`].
//!
//! Datasets using the default driver have their files discovered
//! from catalogue templates and read with a [`MultiFileOpener`].
//! Datasets declaring a named driver are handed to the [`Driver`]
//! registered under that name in a [`DriverRegistry`].

#[cfg(feature = "grib")]
pub mod grib;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod time;

use crate::{
    array::LabeledArray,
    catalogue::{files::resolve_files, locator::Located, DatasetDescriptor, Level},
    constants::{DEFAULT_DRIVER, REALM_ATTR},
    errors::LoadError,
};
use indexmap::IndexMap;
use log::debug;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Reads one variable from an ordered list of files and joins
/// them along time into a single array.
///
/// Implementations keep the coordinates of the first file where
/// files disagree and drop non-dimension coordinates.
pub trait MultiFileOpener {
    fn open_mfdataset(&self, files: &[PathBuf], var: &str) -> Result<LabeledArray, LoadError>;
}

/// Loader for datasets that cannot be described by file templates.
pub trait Driver {
    fn load(
        &self,
        descriptor: &DatasetDescriptor,
        var: &str,
        levels: Option<&[Level]>,
        period: Option<(i32, i32)>,
    ) -> Result<LabeledArray, LoadError>;
}

impl<F> Driver for F
where
    F: Fn(
        &DatasetDescriptor,
        &str,
        Option<&[Level]>,
        Option<(i32, i32)>,
    ) -> Result<LabeledArray, LoadError>,
{
    fn load(
        &self,
        descriptor: &DatasetDescriptor,
        var: &str,
        levels: Option<&[Level]>,
        period: Option<(i32, i32)>,
    ) -> Result<LabeledArray, LoadError> {
        self(descriptor, var, levels, period)
    }
}

/// Name to driver lookup table, populated once at startup.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: FxHashMap<String, Box<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the drivers compiled into this build.
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "grib")]
        registry.register("grib", grib::GribDriver);

        registry
    }

    /// Registers `driver` under `name`, replacing any previous one.
    pub fn register<D: Driver + 'static>(&mut self, name: &str, driver: D) {
        debug!("Registering driver {}", name);
        self.drivers.insert(name.to_string(), Box::new(driver));
    }

    pub fn get(&self, name: &str) -> Result<&dyn Driver, LoadError> {
        self.drivers
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| LoadError::UnknownDriver(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Opener used when none is supplied: NetCDF when compiled in.
#[derive(Copy, Clone, Default, Debug)]
pub struct DefaultOpener;

impl MultiFileOpener for DefaultOpener {
    #[cfg(feature = "netcdf")]
    fn open_mfdataset(&self, files: &[PathBuf], var: &str) -> Result<LabeledArray, LoadError> {
        netcdf::NetcdfOpener.open_mfdataset(files, var)
    }

    #[cfg(not(feature = "netcdf"))]
    fn open_mfdataset(&self, _files: &[PathBuf], var: &str) -> Result<LabeledArray, LoadError> {
        Err(LoadError::Open {
            var: var.to_string(),
            reason: "NetCDF support is not compiled in, rebuild with the netcdf feature"
                .to_string(),
        })
    }
}

/// Loads `var` of the dataset, either through the file templates
/// and `opener` or through the dataset's named driver.
///
/// Arrays read with the opener are tagged with the `realm`
/// attribute and have their coordinates renamed to canonical names.
/// Arrays returned by a named driver are passed through unchanged.
pub fn load(
    descriptor: &DatasetDescriptor,
    located: &Located,
    var: &str,
    levels: Option<&[Level]>,
    period: Option<(i32, i32)>,
    opener: &dyn MultiFileOpener,
    registry: &DriverRegistry,
) -> Result<LabeledArray, LoadError> {
    let driver = descriptor.driver_name();

    if driver != DEFAULT_DRIVER {
        debug!("Loading {} from {} with driver {}", var, descriptor.name, driver);
        return registry.get(driver)?.load(descriptor, var, levels, period);
    }

    let file_set = resolve_files(descriptor, located, var, levels, period)?;
    let mut array = opener.open_mfdataset(&file_set.files, var)?;

    array
        .attrs
        .insert(REALM_ATTR.to_string(), file_set.component.clone());

    if let Some(coord_map) = &file_set.coord_map {
        apply_coord_map(&mut array, coord_map);
    }

    Ok(array)
}

/// Renames source coordinate names to canonical ones.
/// Names absent from the array are skipped.
pub fn apply_coord_map(array: &mut LabeledArray, coord_map: &IndexMap<String, String>) {
    for (canonical, source) in coord_map {
        if array.rename(source, canonical) {
            debug!("Renamed coordinate {} to {}", source, canonical);
        }
    }
}

#[cfg(any(feature = "netcdf", feature = "grib"))]
fn progress_bar(len: usize, prefix: &str) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    bar.set_prefix(prefix.to_string());

    bar
}
