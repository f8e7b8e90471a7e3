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

//! Module responsible for temporal reduction of loaded arrays
//! to monthly, seasonal and annual values.
//!
//! Every reduction starts by averaging the input to monthly means.
//! Seasons and years are then computed as calendar-day weighted
//! means of those monthly values.

pub mod weights;

use self::weights::{last_day_of_month, subyear_weights, AnchorFrequency, Bin};
use crate::{
    array::LabeledArray,
    constants::{AGGREGATION_ATTR, MONTHS},
    errors::{ArrayError, ResampleError},
    Float,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use log::debug;
use ndarray::{stack, ArrayD, ArrayView1, ArrayViewD, Axis};
use std::str::FromStr;

const QUARTERS_NOV: [&str; 4] = ["DJF", "MAM", "JJA", "SON"];
const QUARTERS_DEC: [&str; 4] = ["JFM", "AMJ", "JAS", "OND"];
const ANNUAL: &str = "ANN";

/// Named aggregation rule, built only from its token so that
/// every value maps back to an entry of the token table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TemporalGroup(Rule);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Rule {
    /// Calendar month filter, January is 1.
    Month(u32),

    /// Weighted mean over an anchored bin, keeping only bins
    /// at `position` within the anchor year.
    Anchored {
        anchor: AnchorFrequency,
        position: u32,
    },
}

impl TemporalGroup {
    pub fn from_token(token: &str) -> Result<Self, ResampleError> {
        if token == ANNUAL {
            return Ok(TemporalGroup(Rule::Anchored {
                anchor: AnchorFrequency::Yearly,
                position: 0,
            }));
        }

        let tables = [
            (AnchorFrequency::QuarterEndNov, &QUARTERS_NOV),
            (AnchorFrequency::QuarterEndDec, &QUARTERS_DEC),
        ];

        for (anchor, table) in tables {
            if let Some(position) = table.iter().position(|&q| q == token) {
                return Ok(TemporalGroup(Rule::Anchored {
                    anchor,
                    position: position as u32,
                }));
            }
        }

        if let Some(month) = MONTHS.iter().position(|&m| m == token) {
            return Ok(TemporalGroup(Rule::Month(month as u32 + 1)));
        }

        Err(ResampleError::UnsupportedAggregation(token.to_string()))
    }

    pub fn token(&self) -> &'static str {
        match self.0 {
            Rule::Month(month) => MONTHS[(month - 1) as usize],
            Rule::Anchored { anchor, position } => match anchor {
                AnchorFrequency::Yearly => ANNUAL,
                AnchorFrequency::QuarterEndNov => QUARTERS_NOV[position as usize],
                AnchorFrequency::QuarterEndDec => QUARTERS_DEC[position as usize],
            },
        }
    }

    /// Month number of a month filter.
    pub fn month(&self) -> Option<u32> {
        match self.0 {
            Rule::Month(month) => Some(month),
            Rule::Anchored { .. } => None,
        }
    }

    /// Anchor and position of a seasonal or annual rule.
    pub fn anchor(&self) -> Option<(AnchorFrequency, u32)> {
        match self.0 {
            Rule::Month(_) => None,
            Rule::Anchored { anchor, position } => Some((anchor, position)),
        }
    }
}

impl FromStr for TemporalGroup {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemporalGroup::from_token(s)
    }
}

/// Reduces `array` along time to the aggregation named by `token`.
///
/// The result carries the token in its `aggregation` attribute.
/// Arrays which already carry that attribute are not monthly anymore
/// and are rejected with [`ResampleError::UnsupportedAggregation`].
pub fn reduce(array: &LabeledArray, token: &str) -> Result<LabeledArray, ResampleError> {
    if let Some(previous) = array.attrs.get(AGGREGATION_ATTR) {
        return Err(ResampleError::UnsupportedAggregation(format!(
            "{} (array {} is already reduced to {})",
            token, array.name, previous
        )));
    }

    let group = TemporalGroup::from_token(token)?;
    let monthly = monthly_means(array)?;

    debug!(
        "Reducing {} monthly values of {} to {}",
        monthly.time().len(),
        array.name,
        group.token()
    );

    let mut reduced = match group.0 {
        Rule::Month(month) => select_month(&monthly, month)?,
        Rule::Anchored { anchor, position } => anchored_mean(&monthly, anchor, position)?,
    };

    reduced
        .attrs
        .insert(AGGREGATION_ATTR.to_string(), group.token().to_string());

    Ok(reduced)
}

/// Averages the time axis to calendar months, labelled with the
/// last day of each month. Monthly input is returned unchanged
/// apart from the labels.
pub fn monthly_means(array: &LabeledArray) -> Result<LabeledArray, ResampleError> {
    let ax = require_time(array)?;

    let mut groups: IndexMap<(i32, u32), Vec<usize>> = IndexMap::new();
    for (i, t) in array.time().iter().enumerate() {
        groups.entry((t.year(), t.month())).or_default().push(i);
    }

    let labels = groups
        .keys()
        .map(|&(year, month)| midnight(last_day_of_month(year, month)))
        .collect();

    let data = combine(array.data(), ax, groups.values(), |lane, _| nan_mean(lane))?;

    Ok(array.replace_time(data, labels)?)
}

fn select_month(monthly: &LabeledArray, month: u32) -> Result<LabeledArray, ResampleError> {
    let indices: Vec<usize> = monthly
        .time()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.month() == month)
        .map(|(i, _)| i)
        .collect();

    let dim = monthly
        .time_dim()
        .ok_or_else(|| ResampleError::MissingTimeAxis {
            name: monthly.name.clone(),
        })?;

    Ok(monthly.select_indices(dim, &indices)?)
}

/// Weighted sum of monthly values within each anchored bin,
/// keeping bins at `position` of their anchor year.
fn anchored_mean(
    monthly: &LabeledArray,
    anchor: AnchorFrequency,
    position: u32,
) -> Result<LabeledArray, ResampleError> {
    let ax = require_time(monthly)?;
    let weights = subyear_weights(monthly.time(), anchor);

    let mut bins: IndexMap<Bin, Vec<usize>> = IndexMap::new();
    for (i, t) in monthly.time().iter().enumerate() {
        let bin = anchor.bin(t.date());
        if bin.position == position {
            bins.entry(bin).or_default().push(i);
        }
    }

    let labels = bins
        .keys()
        .map(|&bin| midnight(anchor.bin_end(bin)))
        .collect();

    let data = combine(monthly.data(), ax, bins.values(), |lane, indices| {
        let group_weights = indices.iter().map(|&i| weights[i]);
        nan_weighted_sum(lane, group_weights)
    })?;

    Ok(monthly.replace_time(data, labels)?)
}

/// Collapses each group of time indices to one value per lane and
/// stacks the results back along the time axis.
fn combine<'a, G, F>(
    data: &ArrayD<Float>,
    ax: usize,
    groups: G,
    reducer: F,
) -> Result<ArrayD<Float>, ArrayError>
where
    G: Iterator<Item = &'a Vec<usize>>,
    F: Fn(ArrayView1<Float>, &[usize]) -> Float,
{
    let reduced: Vec<ArrayD<Float>> = groups
        .map(|indices| {
            data.select(Axis(ax), indices)
                .map_axis(Axis(ax), |lane| reducer(lane, indices))
        })
        .collect();

    if reduced.is_empty() {
        let mut shape = data.shape().to_vec();
        shape[ax] = 0;
        return Ok(ArrayD::zeros(shape));
    }

    let views: Vec<ArrayViewD<Float>> = reduced.iter().map(|r| r.view()).collect();

    Ok(stack(Axis(ax), &views)?)
}

/// Mean of non-NaN values, NaN when there are none.
fn nan_mean(lane: ArrayView1<Float>) -> Float {
    let (sum, count) = lane
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));

    if count == 0 {
        Float::NAN
    } else {
        sum / count as Float
    }
}

/// Weighted sum of non-NaN values, NaN when there are none.
fn nan_weighted_sum(lane: ArrayView1<Float>, weights: impl Iterator<Item = Float>) -> Float {
    let mut valid = false;
    let mut sum = 0.0;

    for (&v, w) in lane.iter().zip(weights) {
        if !v.is_nan() {
            valid = true;
            sum += v * w;
        }
    }

    if valid {
        sum
    } else {
        Float::NAN
    }
}

fn require_time(array: &LabeledArray) -> Result<usize, ResampleError> {
    array
        .time_axis()
        .ok_or_else(|| ResampleError::MissingTimeAxis {
            name: array.name.clone(),
        })
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::tests::{month_start, sample},
        errors::SelectionError,
    };
    use float_cmp::approx_eq;
    use ndarray::{Array1, IxDyn};

    fn series(time: Vec<NaiveDateTime>, values: Vec<Float>) -> LabeledArray {
        let data = Array1::from(values).into_dyn();

        LabeledArray::new("T2M", &["time"], data)
            .unwrap()
            .with_time("time", time)
            .unwrap()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
        midnight(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn token_table() {
        assert_eq!(
            TemporalGroup::from_token("DJF").unwrap().anchor(),
            Some((AnchorFrequency::QuarterEndNov, 0))
        );
        assert_eq!(
            TemporalGroup::from_token("OND").unwrap().anchor(),
            Some((AnchorFrequency::QuarterEndDec, 3))
        );
        assert_eq!(TemporalGroup::from_token("JUL").unwrap().month(), Some(7));
        assert_eq!(TemporalGroup::from_token("ANN").unwrap().month(), None);
        assert_eq!("ANN".parse::<TemporalGroup>().unwrap().token(), "ANN");

        for token in ["DJF", "MAM", "JJA", "SON", "JFM", "AMJ", "JAS", "OND", "ANN", "DEC"] {
            assert_eq!(TemporalGroup::from_token(token).unwrap().token(), token);
        }

        assert!(matches!(
            TemporalGroup::from_token("WINTER"),
            Err(ResampleError::UnsupportedAggregation(t)) if t == "WINTER"
        ));
    }

    #[test]
    fn winter_is_day_weighted() {
        let array = series(
            vec![month_start(2000, 12), month_start(2001, 1), month_start(2001, 2)],
            vec![3.0, 1.0, 2.0],
        );

        let djf = reduce(&array, "DJF").unwrap();

        assert_eq!(djf.time(), &[date(2001, 2, 28)]);
        assert!(approx_eq!(Float, djf.data()[[0]], 2.0, epsilon = 1e-12));
        assert_eq!(djf.attrs[AGGREGATION_ATTR], "DJF");
    }

    #[test]
    fn annual_mean_of_constant_is_constant() {
        let time = (1..=12).map(|m| month_start(2003, m)).collect();
        let array = series(time, vec![5.0; 12]);

        let ann = reduce(&array, "ANN").unwrap();

        assert_eq!(ann.time(), &[date(2003, 12, 31)]);
        assert!(approx_eq!(Float, ann.data()[[0]], 5.0, epsilon = 1e-12));
    }

    #[test]
    fn seasons_pick_their_quarter() {
        let time: Vec<NaiveDateTime> = (1..=12).map(|m| month_start(2001, m)).collect();
        let values: Vec<Float> = (1..=12).map(Float::from).collect();
        let array = series(time, values);

        let son = reduce(&array, "SON").unwrap();
        assert_eq!(son.time(), &[date(2001, 11, 30)]);
        let expected = (9.0 * 30.0 + 10.0 * 31.0 + 11.0 * 30.0) / 91.0;
        assert!(approx_eq!(Float, son.data()[[0]], expected, epsilon = 1e-12));

        // January and February 2001 form the first winter, December the next
        let djf = reduce(&array, "DJF").unwrap();
        assert_eq!(djf.time(), &[date(2001, 2, 28), date(2002, 2, 28)]);
        assert!(approx_eq!(Float, djf.data()[[1]], 12.0, epsilon = 1e-12));

        let jas = reduce(&array, "JAS").unwrap();
        assert_eq!(jas.time(), &[date(2001, 9, 30)]);
    }

    #[test]
    fn daily_values_become_monthly() {
        let mut time: Vec<NaiveDateTime> = (1..=31).map(|d| date(2001, 1, d)).collect();
        time.extend((1..=3).map(|d| date(2001, 2, d)));
        let values: Vec<Float> = (1..=31).chain(1..=3).map(Float::from).collect();

        let monthly = monthly_means(&series(time, values)).unwrap();

        assert_eq!(monthly.time(), &[date(2001, 1, 31), date(2001, 2, 28)]);
        assert!(approx_eq!(Float, monthly.data()[[0]], 16.0, ulps = 2));
        assert!(approx_eq!(Float, monthly.data()[[1]], 2.0, ulps = 2));
    }

    #[test]
    fn missing_values_are_skipped() {
        let array = series(
            vec![date(2001, 1, 1), date(2001, 1, 2), date(2001, 2, 1)],
            vec![Float::NAN, 4.0, Float::NAN],
        );

        let monthly = monthly_means(&array).unwrap();
        assert_eq!(monthly.data()[[0]], 4.0);
        assert!(monthly.data()[[1]].is_nan());

        let ann = reduce(&array, "ANN").unwrap();
        assert!(approx_eq!(Float, ann.data()[[0]], 4.0 * 31.0 / 59.0, epsilon = 1e-12));
    }

    #[test]
    fn month_filter_keeps_dimensions() {
        let array = sample();

        let feb = reduce(&array, "FEB").unwrap();
        assert_eq!(feb.shape(), &[1, 3, 3, 4]);
        assert_eq!(feb.time(), &[date(2000, 2, 29)]);
        assert_eq!(feb.data()[[0, 0, 0, 1]], 37.0);
        assert_eq!(feb.attrs[AGGREGATION_ATTR], "FEB");

        let jul = reduce(&array, "JUL").unwrap();
        assert_eq!(jul.shape(), &[0, 3, 3, 4]);
    }

    #[test]
    fn reduced_arrays_cannot_be_reduced_again() {
        let time = (1..=12).map(|m| month_start(2003, m)).collect();
        let ann = reduce(&series(time, vec![1.0; 12]), "ANN").unwrap();

        assert!(matches!(
            reduce(&ann, "ANN"),
            Err(ResampleError::UnsupportedAggregation(_))
        ));
    }

    #[test]
    fn requires_time_axis() {
        let data = ArrayD::zeros(IxDyn(&[2]));
        let array = LabeledArray::new("orog", &["lat"], data).unwrap();

        assert!(matches!(
            reduce(&array, "ANN"),
            Err(ResampleError::MissingTimeAxis { .. })
        ));
    }

    #[test]
    fn month_filter_reports_selection_errors() {
        let data = ArrayD::zeros(IxDyn(&[2]));
        let array = LabeledArray::new("orog", &["lat"], data).unwrap();

        assert!(matches!(
            select_month(&array, 1),
            Err(ResampleError::MissingTimeAxis { .. })
        ));

        let err: ResampleError = array.select_indices("time", &[0]).unwrap_err().into();
        assert!(matches!(
            err,
            ResampleError::Selection(SelectionError::MissingDimension { ref dim, .. }) if dim == "time"
        ));
    }
}
