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

//! Decoding of CF-convention time coordinates
//! (`"<unit> since <reference date>"`).

use crate::{errors::LoadError, Float};
use chrono::{Duration, NaiveDate, NaiveDateTime};

const REFERENCE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const CALENDARS: [&str; 3] = ["standard", "gregorian", "proleptic_gregorian"];

/// Whether the `units` attribute describes a time axis.
pub fn is_time_units(units: &str) -> bool {
    units.contains(" since ")
}

/// Converts numeric time values to datetimes.
pub fn decode_cf_time(
    values: &[Float],
    units: &str,
    calendar: Option<&str>,
) -> Result<Vec<NaiveDateTime>, LoadError> {
    if let Some(calendar) = calendar {
        if !CALENDARS.contains(&calendar.to_lowercase().as_str()) {
            return Err(LoadError::InvalidTime(format!(
                "calendar {} is not supported",
                calendar
            )));
        }
    }

    let (unit, reference) = units
        .split_once(" since ")
        .ok_or_else(|| LoadError::InvalidTime(format!("{:?} is not a CF time unit", units)))?;

    let seconds = unit_seconds(unit.trim())?;
    let reference = parse_reference(reference.trim())?;

    values
        .iter()
        .map(|&v| {
            let offset = Duration::milliseconds((v * seconds * 1000.0).round() as i64);

            reference
                .checked_add_signed(offset)
                .ok_or_else(|| LoadError::InvalidTime(format!("{} {} overflows", v, units)))
        })
        .collect()
}

fn unit_seconds(unit: &str) -> Result<Float, LoadError> {
    match unit.to_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => Ok(1.0),
        "minutes" | "minute" | "mins" | "min" => Ok(60.0),
        "hours" | "hour" | "hrs" | "hr" | "h" => Ok(3600.0),
        "days" | "day" | "d" => Ok(86400.0),
        other => Err(LoadError::InvalidTime(format!(
            "time unit {} is not supported",
            other
        ))),
    }
}

fn parse_reference(text: &str) -> Result<NaiveDateTime, LoadError> {
    // timezone suffixes are dropped, all times are treated as UTC
    let text = text
        .trim_end_matches('Z')
        .split(" +")
        .next()
        .unwrap_or(text)
        .trim();

    for format in REFERENCE_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime);
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| LoadError::InvalidTime(format!("cannot parse reference date {}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn hours_since_reanalysis_epoch() {
        let times = decode_cf_time(
            &[0.0, 744.0, 788_652.0],
            "hours since 1900-01-01 00:00:00.0",
            Some("gregorian"),
        )
        .unwrap();

        assert_eq!(times[0], datetime(1900, 1, 1, 0));
        assert_eq!(times[1], datetime(1900, 2, 1, 0));
        assert_eq!(times[2], datetime(1989, 12, 20, 12));
    }

    #[test]
    fn days_and_date_only_reference() {
        let times = decode_cf_time(&[31.0, 59.5], "days since 1979-1-1", None).unwrap();

        assert_eq!(times[0], datetime(1979, 2, 1, 0));
        assert_eq!(times[1], datetime(1979, 3, 1, 12));
    }

    #[test]
    fn unsupported_units_and_calendars() {
        assert!(is_time_units("seconds since 1970-01-01T00:00:00Z"));
        assert!(!is_time_units("degrees_north"));

        assert!(decode_cf_time(&[0.0], "seconds since 1970-01-01T00:00:00Z", None).is_ok());
        assert!(matches!(
            decode_cf_time(&[0.0], "months since 2000-01-01", None),
            Err(LoadError::InvalidTime(_))
        ));
        assert!(matches!(
            decode_cf_time(&[0.0], "days since 2000-01-01", Some("noleap")),
            Err(LoadError::InvalidTime(_))
        ));
        assert!(decode_cf_time(&[0.0], "kelvin", None).is_err());
    }
}
