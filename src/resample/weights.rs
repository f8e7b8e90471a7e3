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

//! Sub-module with anchored calendar bins and the
//! day-count weights used for seasonal and annual means.
//!
//! Months have unequal lengths, so a seasonal mean of monthly
//! means is weighted by the number of days in each month.
//! Weights within one bin always sum to one.

use crate::Float;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rustc_hash::FxHashMap;

/// Calendar rule defining fixed-length aggregation bins.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AnchorFrequency {
    /// Quarters ending in February, May, August and November (DJF, MAM, JJA, SON).
    QuarterEndNov,
    /// Quarters ending in March, June, September and December (JFM, AMJ, JAS, OND).
    QuarterEndDec,
    /// Calendar years.
    Yearly,
}

/// One anchored bin. `position` is the quarter within the anchor
/// year (always 0 for yearly bins).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Bin {
    pub year: i32,
    pub position: u32,
}

impl AnchorFrequency {
    /// Months by which the anchor year runs ahead of the calendar year.
    fn shift(&self) -> u32 {
        match self {
            AnchorFrequency::QuarterEndNov => 1,
            AnchorFrequency::QuarterEndDec | AnchorFrequency::Yearly => 0,
        }
    }

    /// Bin containing the given date.
    pub fn bin(&self, date: NaiveDate) -> Bin {
        match self {
            AnchorFrequency::Yearly => Bin {
                year: date.year(),
                position: 0,
            },
            _ => {
                let shifted = date.month0() + self.shift();

                Bin {
                    year: date.year() + (shifted / 12) as i32,
                    position: (shifted % 12) / 3,
                }
            }
        }
    }

    /// Last day of the bin, used to label the aggregated value.
    pub fn bin_end(&self, bin: Bin) -> NaiveDate {
        let end_month = match self {
            AnchorFrequency::Yearly => 12,
            _ => ((bin.position * 3 + 2 + 12 - self.shift()) % 12) + 1,
        };

        last_day_of_month(bin.year, end_month)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MIN)
}

/// Weight of each timestamp within its anchor bin: days in its
/// month divided by the days of all timestamps sharing the bin.
pub fn subyear_weights(time: &[NaiveDateTime], anchor: AnchorFrequency) -> Vec<Float> {
    let bins: Vec<Bin> = time.iter().map(|t| anchor.bin(t.date())).collect();
    let days: Vec<Float> = time
        .iter()
        .map(|t| Float::from(days_in_month(t.year(), t.month())))
        .collect();

    let mut totals: FxHashMap<Bin, Float> = FxHashMap::default();

    for (bin, &d) in bins.iter().zip(&days) {
        *totals.entry(*bin).or_insert(0.0) += d;
    }

    bins.iter()
        .zip(&days)
        .map(|(bin, &d)| d / totals[bin])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::tests::month_start;
    use float_cmp::approx_eq;

    #[test]
    fn january_february_weights() {
        let time = [month_start(2001, 1), month_start(2001, 2)];
        let weights = subyear_weights(&time, AnchorFrequency::QuarterEndNov);

        assert!(approx_eq!(Float, weights[0], 31.0 / 59.0, ulps = 2));
        assert!(approx_eq!(Float, weights[1], 28.0 / 59.0, ulps = 2));
        assert!(approx_eq!(Float, weights[0] + weights[1], 1.0, ulps = 2));
    }

    #[test]
    fn annual_weights_sum_to_one() {
        for year in [2000, 2001] {
            let time: Vec<NaiveDateTime> = (1..=12).map(|m| month_start(year, m)).collect();
            let weights = subyear_weights(&time, AnchorFrequency::Yearly);
            let days: u32 = (1..=12).map(|m| days_in_month(year, m)).sum();

            assert!(approx_eq!(Float, weights.iter().sum::<Float>(), 1.0, epsilon = 1e-12));
            assert!(approx_eq!(Float, weights[1], Float::from(days_in_month(year, 2)) / Float::from(days), ulps = 2));
        }
    }

    #[test]
    fn december_belongs_to_next_winter() {
        let anchor = AnchorFrequency::QuarterEndNov;
        let dec = anchor.bin(NaiveDate::from_ymd_opt(2000, 12, 1).unwrap());
        let feb = anchor.bin(NaiveDate::from_ymd_opt(2001, 2, 1).unwrap());

        assert_eq!(dec, Bin { year: 2001, position: 0 });
        assert_eq!(dec, feb);
        assert_eq!(anchor.bin_end(dec), NaiveDate::from_ymd_opt(2001, 2, 28).unwrap());

        let son = anchor.bin(NaiveDate::from_ymd_opt(2001, 9, 15).unwrap());
        assert_eq!(son, Bin { year: 2001, position: 3 });
        assert_eq!(anchor.bin_end(son), NaiveDate::from_ymd_opt(2001, 11, 30).unwrap());
    }

    #[test]
    fn december_anchored_quarters() {
        let anchor = AnchorFrequency::QuarterEndDec;
        let jfm = anchor.bin(NaiveDate::from_ymd_opt(2004, 3, 31).unwrap());
        let ond = anchor.bin(NaiveDate::from_ymd_opt(2004, 12, 1).unwrap());

        assert_eq!(jfm, Bin { year: 2004, position: 0 });
        assert_eq!(ond, Bin { year: 2004, position: 3 });
        assert_eq!(anchor.bin_end(jfm), NaiveDate::from_ymd_opt(2004, 3, 31).unwrap());
        assert_eq!(anchor.bin_end(ond), NaiveDate::from_ymd_opt(2004, 12, 31).unwrap());
    }

    #[test]
    fn leap_february() {
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2001, 12), 31);
    }
}
