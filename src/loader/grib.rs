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

//! Sub-module with the `grib` driver, reading datasets
//! stored as GRIB messages.
//!
//! In GRIB files every time step of every level is a separate
//! message, identified by `shortName`, `level`, `dataDate` and
//! `dataTime` keys. Messages of the requested variable are collected
//! from all files, sorted and stacked into a `[time, lev, lat, lon]` array.

use super::{apply_coord_map, progress_bar, Driver};
use crate::{
    array::LabeledArray,
    catalogue::{files::resolve_files, locator::locate, DatasetDescriptor, Level},
    constants::{LAT_DIM, LEVEL_DIM, LON_DIM, REALM_ATTR, TIME_DIM},
    errors::LoadError,
    Float,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use eccodes::{
    codes_handle::{
        CodesHandle,
        KeyType::{FloatArray, Int, Str},
        ProductKind::GRIB,
    },
    FallibleIterator, KeyedMessage,
};
use log::debug;
use ndarray::{stack, Array2, ArrayD, Axis};
use rustc_hash::FxHashSet;
use std::path::PathBuf;

#[derive(Copy, Clone, Default, Debug)]
pub struct GribDriver;

impl Driver for GribDriver {
    fn load(
        &self,
        descriptor: &DatasetDescriptor,
        var: &str,
        levels: Option<&[Level]>,
        period: Option<(i32, i32)>,
    ) -> Result<LabeledArray, LoadError> {
        let located = locate(descriptor, var, levels, period)?;
        let file_set = resolve_files(descriptor, &located, var, levels, period)?;

        let messages = collect_messages(&file_set.files, var)?;
        let mut array = messages_to_array(var, &messages)?;

        array
            .attrs
            .insert(REALM_ATTR.to_string(), file_set.component.clone());

        if let Some(coord_map) = &file_set.coord_map {
            apply_coord_map(&mut array, coord_map);
        }

        Ok(array)
    }
}

/// Reads all messages with `shortName` equal to `var`.
fn collect_messages(files: &[PathBuf], var: &str) -> Result<Vec<KeyedMessage>, LoadError> {
    let bar = progress_bar(files.len(), "Read files");
    let mut messages: Vec<KeyedMessage> = vec![];

    for file in files {
        let handle = CodesHandle::new_from_file(file, GRIB)?;

        let mut found: Vec<KeyedMessage> = handle
            .filter(|msg| Ok(msg.read_key("shortName")?.value == Str(var.to_string())))
            .collect()?;

        messages.append(&mut found);
        bar.inc(1);
    }

    bar.finish_and_clear();

    if messages.is_empty() {
        return Err(LoadError::MissingVariable {
            var: var.to_string(),
            path: files.first().cloned().unwrap_or_default(),
        });
    }

    debug!("Collected {} GRIB messages of {}", messages.len(), var);

    Ok(messages)
}

/// One decoded message.
struct Field {
    time: NaiveDateTime,
    level: i64,
    values: Array2<Float>,
}

fn messages_to_array(var: &str, messages: &[KeyedMessage]) -> Result<LabeledArray, LoadError> {
    let (lons, lats) = read_distinct_lonlats(&messages[0])?;
    let (ni, nj) = read_shape(&messages[0])?;

    let mut fields = Vec::with_capacity(messages.len());
    for msg in messages {
        fields.push(decode_field(msg, (ni, nj))?);
    }

    // levels from top of the atmosphere downwards, like pressure levels
    let mut levels: Vec<i64> = fields
        .iter()
        .map(|f| f.level)
        .collect::<FxHashSet<i64>>()
        .into_iter()
        .collect();
    levels.sort_unstable();

    let mut times: Vec<NaiveDateTime> = fields
        .iter()
        .map(|f| f.time)
        .collect::<FxHashSet<NaiveDateTime>>()
        .into_iter()
        .collect();
    times.sort_unstable();

    let mut steps = Vec::with_capacity(times.len());

    for time in &times {
        let mut step = Vec::with_capacity(levels.len());

        for level in &levels {
            let field = fields
                .iter()
                .find(|f| f.time == *time && f.level == *level)
                .ok_or_else(|| LoadError::Open {
                    var: var.to_string(),
                    reason: format!("no message for level {} at {}", level, time),
                })?;
            step.push(field.values.view());
        }

        steps.push(stack(Axis(0), &step)?);
    }

    let step_views: Vec<_> = steps.iter().map(|s| s.view()).collect();
    let data: ArrayD<Float> = stack(Axis(0), &step_views)?.into_dyn();

    let array = LabeledArray::new(var, &[TIME_DIM, LEVEL_DIM, LAT_DIM, LON_DIM], data)?
        .with_coord(LEVEL_DIM, levels.iter().map(|&l| l as Float).collect())?
        .with_coord(LAT_DIM, lats)?
        .with_coord(LON_DIM, lons)?
        .with_time(TIME_DIM, times)?;

    Ok(array)
}

fn decode_field(msg: &KeyedMessage, shape: (usize, usize)) -> Result<Field, LoadError> {
    let level = read_int(msg, "level")?;
    let date = read_int(msg, "dataDate")?;
    let hhmm = read_int(msg, "dataTime")?;

    // dataDate is YYYYMMDD and dataTime is HHMM
    let day = NaiveDate::from_ymd_opt(
        (date / 10000) as i32,
        ((date / 100) % 100) as u32,
        (date % 100) as u32,
    );
    let hour = NaiveTime::from_hms_opt((hhmm / 100) as u32, (hhmm % 100) as u32, 0);

    let time = day
        .zip(hour)
        .map(|(d, t)| d.and_time(t))
        .ok_or_else(|| LoadError::InvalidTime(format!("{} {:04}", date, hhmm)))?;

    let values = if let FloatArray(vals) = msg.read_key("values")?.value {
        vals
    } else {
        return Err(LoadError::IncorrectKeyType("values"));
    };

    // values are stored row by row, north to south, west to east
    let values = Array2::from_shape_vec((shape.1, shape.0), values)?;

    Ok(Field {
        time,
        level,
        values,
    })
}

fn read_int(msg: &KeyedMessage, key: &'static str) -> Result<i64, LoadError> {
    if let Int(val) = msg.read_key(key)?.value {
        Ok(val)
    } else {
        Err(LoadError::IncorrectKeyType(key))
    }
}

/// Longitudes ascending and latitudes descending, matching
/// the default scanning mode of GRIB grids.
fn read_distinct_lonlats(msg: &KeyedMessage) -> Result<(Vec<Float>, Vec<Float>), LoadError> {
    let mut lats = if let FloatArray(lats) = msg.read_key("distinctLatitudes")?.value {
        lats
    } else {
        return Err(LoadError::IncorrectKeyType("distinctLatitudes"));
    };

    let mut lons = if let FloatArray(lons) = msg.read_key("distinctLongitudes")?.value {
        lons
    } else {
        return Err(LoadError::IncorrectKeyType("distinctLongitudes"));
    };

    lons.sort_by(|a, b| a.total_cmp(b));
    lats.sort_by(|a, b| b.total_cmp(a));

    Ok((lons, lats))
}

fn read_shape(msg: &KeyedMessage) -> Result<(usize, usize), LoadError> {
    let ni = read_int(msg, "Ni")? as usize;
    let nj = read_int(msg, "Nj")? as usize;

    Ok((ni, nj))
}
