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

//! Module writing arrays to CSV files in long format:
//! one row per array element with a column for every dimension.

use crate::{array::LabeledArray, errors::RunError, Float};
use log::debug;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Checks that the output directory is empty or creates it.
pub fn prepare_output_dir(out_path: &Path) -> Result<(), RunError> {
    debug!("Checking and setting output directory");

    if out_path.is_dir() {
        if out_path.read_dir()?.next().is_none() {
            debug!("Output directory exists but is empty so continuing");
        } else {
            return Err(RunError::FaultyOutput(
                "Output directory exists and is not empty",
            ));
        }
    } else {
        debug!("Output directory does not exist so creating a new one");
        fs::create_dir(out_path)?;
    }

    Ok(())
}

/// `<dataset>_<var>[_<season>].csv` inside `out_dir`.
pub fn output_path(out_dir: &Path, dataset: &str, var: &str, season: Option<&str>) -> PathBuf {
    let name = match season {
        Some(season) => format!("{}_{}_{}.csv", dataset, var, season),
        None => format!("{}_{}.csv", dataset, var),
    };

    out_dir.join(name)
}

pub fn save_array(array: &LabeledArray, out_path: &Path) -> Result<(), RunError> {
    debug!("Writing {} to {}", array.name, out_path.display());

    let out_file = csv::Writer::from_path(out_path)?;
    write_array(array, out_file)?;

    Ok(())
}

/// Writes the header and one record per element. Dimensions without
/// a coordinate are written as positional indices.
pub fn write_array<W: io::Write>(
    array: &LabeledArray,
    mut out_file: csv::Writer<W>,
) -> Result<csv::Writer<W>, RunError> {
    let mut header: Vec<&str> = array.dims().iter().map(String::as_str).collect();
    header.push(&array.name);
    out_file.write_record(&header)?;

    let time_axis = array.time_axis();
    let coords: Vec<Option<&[Float]>> = array.dims().iter().map(|d| array.coord(d)).collect();

    for (ix, value) in array.data().indexed_iter() {
        let mut record = Vec::with_capacity(header.len());

        for (ax, coord) in coords.iter().enumerate() {
            let i = ix[ax];

            let field = if Some(ax) == time_axis {
                array.time()[i].format("%Y-%m-%dT%H:%M:%S").to_string()
            } else {
                match coord {
                    Some(values) => values[i].to_string(),
                    None => i.to_string(),
                }
            };

            record.push(field);
        }

        record.push(value.to_string());
        out_file.write_record(&record)?;
    }

    out_file.flush()?;

    Ok(out_file)
}
