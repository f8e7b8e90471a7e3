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

//! Multi-file opener for NetCDF files.
//!
//! Each file is read fully into memory, unpacked with
//! `scale_factor`/`add_offset` and with fill values replaced by NaN.
//! Only coordinate variables of the variable's own dimensions are
//! kept, and the first file's coordinates win when files disagree.

use super::{progress_bar, time, MultiFileOpener};
use crate::{array::LabeledArray, errors::LoadError, Float};
use log::debug;
use ndarray::{ArrayD, IxDyn};
use netcdf::{AttributeValue, Variable};
use std::path::{Path, PathBuf};

const FILL_ATTRS: [&str; 2] = ["_FillValue", "missing_value"];

#[derive(Copy, Clone, Default, Debug)]
pub struct NetcdfOpener;

impl MultiFileOpener for NetcdfOpener {
    fn open_mfdataset(&self, files: &[PathBuf], var: &str) -> Result<LabeledArray, LoadError> {
        let bar = progress_bar(files.len(), "Read files");
        let mut parts = Vec::with_capacity(files.len());

        for file in files {
            parts.push(read_file(file, var)?);
            bar.inc(1);
        }

        bar.finish_and_clear();

        if parts.len() == 1 {
            if let Some(single) = parts.pop() {
                return Ok(single);
            }
        }

        Ok(LabeledArray::concat_time(parts)?)
    }
}

fn read_file(path: &Path, var: &str) -> Result<LabeledArray, LoadError> {
    debug!("Reading {} from {}", var, path.display());

    let file = netcdf::open(path)?;
    let variable = file
        .variable(var)
        .ok_or_else(|| LoadError::MissingVariable {
            var: var.to_string(),
            path: path.to_path_buf(),
        })?;

    let dims: Vec<String> = variable.dimensions().iter().map(|d| d.name()).collect();
    let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();

    let values = unpack(&variable)?;
    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;

    let dim_names: Vec<&str> = dims.iter().map(String::as_str).collect();
    let mut array = LabeledArray::new(var, &dim_names, data)?;

    for dim in &dims {
        let coord = match file.variable(dim) {
            Some(coord) => coord,
            None => continue,
        };

        let values: Vec<Float> = coord.get_values::<Float, _>(..)?;

        match string_attr(&coord, "units") {
            Some(units) if time::is_time_units(&units) => {
                let calendar = string_attr(&coord, "calendar");
                let times = time::decode_cf_time(&values, &units, calendar.as_deref())?;
                array = array.with_time(dim, times)?;
            }
            _ => array = array.with_coord(dim, values)?,
        }
    }

    for attr in variable.attributes() {
        if let Ok(AttributeValue::Str(value)) = attr.value() {
            array = array.with_attr(attr.name(), &value);
        }
    }

    Ok(array)
}

/// Reads variable values as floats with packing and fill values applied.
fn unpack(variable: &Variable) -> Result<Vec<Float>, LoadError> {
    let raw: Vec<Float> = variable.get_values::<Float, _>(..)?;

    let scale = float_attr(variable, "scale_factor").unwrap_or(1.0);
    let offset = float_attr(variable, "add_offset").unwrap_or(0.0);
    let fills: Vec<Float> = FILL_ATTRS
        .iter()
        .filter_map(|name| float_attr(variable, name))
        .collect();

    let values = raw
        .into_iter()
        .map(|v| {
            if v.is_nan() || fills.contains(&v) {
                Float::NAN
            } else {
                v * scale + offset
            }
        })
        .collect();

    Ok(values)
}

fn has_attr(variable: &Variable, name: &str) -> bool {
    variable.attributes().any(|attr| attr.name() == name)
}

fn float_attr(variable: &Variable, name: &str) -> Option<Float> {
    if !has_attr(variable, name) {
        return None;
    }

    let value = variable.attribute_value(name)?.ok()?;
    Float::try_from(value).ok()
}

fn string_attr(variable: &Variable, name: &str) -> Option<String> {
    if !has_attr(variable, name) {
        return None;
    }

    match variable.attribute_value(name)?.ok()? {
        AttributeValue::Str(value) => Some(value),
        _ => None,
    }
}
