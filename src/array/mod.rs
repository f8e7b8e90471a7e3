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

//! Module with the labeled multi-dimensional array returned to
//! the caller: an `ndarray` with named dimensions, numeric
//! coordinates, a datetime time axis and string attributes.

pub mod bisection;

use crate::{
    errors::{ArrayError, SelectionError},
    Float,
};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ndarray::{concatenate, ArrayD, ArrayViewD, Axis, Slice};

/// Multi-dimensional array with named dimensions.
///
/// Every dimension may carry a numeric coordinate, except the
/// time dimension which carries datetimes. Coordinates always have
/// the same length as their dimension.
#[derive(Clone, PartialEq, Debug)]
pub struct LabeledArray {
    pub name: String,
    dims: Vec<String>,
    data: ArrayD<Float>,
    coords: IndexMap<String, Vec<Float>>,
    time_dim: Option<String>,
    time: Vec<NaiveDateTime>,
    pub attrs: IndexMap<String, String>,
}

impl LabeledArray {
    pub fn new(name: &str, dims: &[&str], data: ArrayD<Float>) -> Result<Self, ArrayError> {
        if dims.len() != data.ndim() {
            return Err(ArrayError::RankMismatch {
                data: data.ndim(),
                dims: dims.len(),
            });
        }

        Ok(LabeledArray {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
            coords: IndexMap::new(),
            time_dim: None,
            time: vec![],
            attrs: IndexMap::new(),
        })
    }

    /// Attaches a numeric coordinate to an existing dimension.
    pub fn with_coord(mut self, dim: &str, values: Vec<Float>) -> Result<Self, ArrayError> {
        let len = self.dim_len(dim).ok_or_else(|| ArrayError::CoordinateLength {
            dim: dim.to_string(),
            coord: values.len(),
            len: 0,
        })?;

        if len != values.len() {
            return Err(ArrayError::CoordinateLength {
                dim: dim.to_string(),
                coord: values.len(),
                len,
            });
        }

        self.coords.insert(dim.to_string(), values);
        Ok(self)
    }

    /// Marks `dim` as the time dimension with given timestamps.
    pub fn with_time(mut self, dim: &str, time: Vec<NaiveDateTime>) -> Result<Self, ArrayError> {
        let len = self.dim_len(dim).unwrap_or(0);

        if len != time.len() {
            return Err(ArrayError::TimeLength {
                time: time.len(),
                len,
            });
        }

        self.time_dim = Some(dim.to_string());
        self.time = time;
        Ok(self)
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<Float> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.axis(dim).map(|ax| self.data.shape()[ax])
    }

    pub fn coord(&self, dim: &str) -> Option<&[Float]> {
        self.coords.get(dim).map(Vec::as_slice)
    }

    pub fn time_dim(&self) -> Option<&str> {
        self.time_dim.as_deref()
    }

    /// Axis index of the time dimension.
    pub fn time_axis(&self) -> Option<usize> {
        self.time_dim.as_deref().and_then(|d| self.axis(d))
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    /// Renames a dimension together with its coordinate.
    /// Returns `false` when the array has no such dimension.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let ax = match self.axis(from) {
            Some(ax) => ax,
            None => return false,
        };

        self.dims[ax] = to.to_string();

        if let Some(values) = self.coords.shift_remove(from) {
            self.coords.insert(to.to_string(), values);
        }

        if self.time_dim.as_deref() == Some(from) {
            self.time_dim = Some(to.to_string());
        }

        true
    }

    /// Same layout and metadata with new data and time axis,
    /// used by reductions along time.
    pub fn replace_time(
        &self,
        data: ArrayD<Float>,
        time: Vec<NaiveDateTime>,
    ) -> Result<LabeledArray, ArrayError> {
        if data.ndim() != self.dims.len() {
            return Err(ArrayError::RankMismatch {
                data: data.ndim(),
                dims: self.dims.len(),
            });
        }

        let time_dim = self.time_dim.clone().unwrap_or_default();
        let array = LabeledArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            data,
            coords: self.coords.clone(),
            time_dim: None,
            time: vec![],
            attrs: self.attrs.clone(),
        };

        array.with_time(&time_dim, time)
    }

    /// Inclusive label slice on `dim` between `start` and `end`,
    /// given in the coordinate's own ordering.
    pub fn select_range(
        &self,
        dim: &str,
        start: Float,
        end: Float,
    ) -> Result<LabeledArray, SelectionError> {
        let (ax, values) = self.numeric_axis(dim)?;

        let (first, last) =
            bisection::find_slice(values, start, end).map_err(|_| SelectionError::EmptySelection {
                dim: dim.to_string(),
                start,
                end,
            })?;

        let data = self
            .data
            .slice_axis(Axis(ax), Slice::from(first..last + 1))
            .to_owned();

        let mut out = self.with_data(data);
        out.coords
            .insert(dim.to_string(), values[first..=last].to_vec());

        Ok(out)
    }

    /// Index of the coordinate value of `dim` closest to `value`.
    pub fn nearest_index(&self, dim: &str, value: Float) -> Result<usize, SelectionError> {
        let (_, values) = self.numeric_axis(dim)?;

        bisection::find_nearest(values, value).map_err(|_| SelectionError::EmptySelection {
            dim: dim.to_string(),
            start: value,
            end: value,
        })
    }

    /// Selects one position of `dim` and drops the dimension.
    pub fn select_index(&self, dim: &str, index: usize) -> Result<LabeledArray, SelectionError> {
        let ax = self.require_axis(dim)?;
        let data = self.data.index_axis(Axis(ax), index).to_owned();

        let mut out = self.with_data(data);
        out.dims.remove(ax);
        out.coords.shift_remove(dim);

        if self.time_dim.as_deref() == Some(dim) {
            out.time_dim = None;
            out.time.clear();
        }

        Ok(out)
    }

    /// Selects several positions of `dim`, keeping the dimension.
    pub fn select_indices(
        &self,
        dim: &str,
        indices: &[usize],
    ) -> Result<LabeledArray, SelectionError> {
        let ax = self.require_axis(dim)?;
        let data = self.data.select(Axis(ax), indices);

        let mut out = self.with_data(data);

        if let Some(values) = self.coords.get(dim) {
            out.coords
                .insert(dim.to_string(), indices.iter().map(|&i| values[i]).collect());
        }

        if self.time_dim.as_deref() == Some(dim) {
            out.time = indices.iter().map(|&i| self.time[i]).collect();
        }

        Ok(out)
    }

    /// Concatenates arrays along their time dimension. Non-time
    /// coordinates and attributes are taken from the first array.
    pub fn concat_time(arrays: Vec<LabeledArray>) -> Result<LabeledArray, ArrayError> {
        let first = arrays
            .first()
            .ok_or_else(|| ArrayError::Concatenate("no arrays to concatenate".to_string()))?;

        let ax = first
            .time_axis()
            .ok_or_else(|| ArrayError::Concatenate(format!("{} has no time axis", first.name)))?;

        for array in &arrays[1..] {
            if array.dims != first.dims {
                return Err(ArrayError::Concatenate(format!(
                    "dimensions {:?} differ from {:?}",
                    array.dims, first.dims
                )));
            }
        }

        let views: Vec<ArrayViewD<Float>> = arrays.iter().map(|a| a.data.view()).collect();
        let data = concatenate(Axis(ax), &views)?;
        let time: Vec<NaiveDateTime> = arrays.iter().flat_map(|a| a.time.clone()).collect();

        first.replace_time(data, time)
    }

    fn with_data(&self, data: ArrayD<Float>) -> LabeledArray {
        LabeledArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            data,
            coords: self.coords.clone(),
            time_dim: self.time_dim.clone(),
            time: self.time.clone(),
            attrs: self.attrs.clone(),
        }
    }

    fn require_axis(&self, dim: &str) -> Result<usize, SelectionError> {
        self.axis(dim).ok_or_else(|| SelectionError::MissingDimension {
            name: self.name.clone(),
            dim: dim.to_string(),
        })
    }

    fn numeric_axis(&self, dim: &str) -> Result<(usize, &[Float]), SelectionError> {
        let ax = self.require_axis(dim)?;
        let values = self.coord(dim).ok_or_else(|| SelectionError::MissingDimension {
            name: self.name.clone(),
            dim: dim.to_string(),
        })?;

        Ok((ax, values))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::{Array, IxDyn};

    pub(crate) fn month_start(year: i32, month: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// `[time, lev, lat, lon]` array with values equal to their flat index.
    pub(crate) fn sample() -> LabeledArray {
        let shape = [2, 3, 3, 4];
        let data = Array::from_shape_fn(IxDyn(&shape), |ix| {
            (ix[0] * 36 + ix[1] * 12 + ix[2] * 4 + ix[3]) as Float
        });

        LabeledArray::new("U", &["time", "lev", "lat", "lon"], data)
            .unwrap()
            .with_coord("lev", vec![1000.0, 850.0, 500.0])
            .unwrap()
            .with_coord("lat", vec![45.0, 0.0, -45.0])
            .unwrap()
            .with_coord("lon", vec![0.0, 90.0, 180.0, 270.0])
            .unwrap()
            .with_time("time", vec![month_start(2000, 1), month_start(2000, 2)])
            .unwrap()
    }

    #[test]
    fn construction_checks_shapes() {
        let data = ArrayD::zeros(IxDyn(&[2, 3]));
        assert!(LabeledArray::new("x", &["time"], data.clone()).is_err());

        let array = LabeledArray::new("x", &["time", "lat"], data).unwrap();
        assert!(array.clone().with_coord("lat", vec![1.0, 2.0]).is_err());
        assert!(array.clone().with_time("time", vec![month_start(2000, 1)]).is_err());
    }

    #[test]
    fn rename_moves_coordinates() {
        let mut array = sample();

        assert!(array.rename("lon", "longitude"));
        assert!(!array.rename("depth", "lev"));
        assert_eq!(array.dims()[3], "longitude");
        assert_eq!(array.coord("longitude").unwrap().len(), 4);
        assert!(array.coord("lon").is_none());

        assert!(array.rename("time", "t"));
        assert_eq!(array.time_axis(), Some(0));
    }

    #[test]
    fn range_selection() {
        let array = sample();

        let sub = array.select_range("lon", 90.0, 180.0).unwrap();
        assert_eq!(sub.shape(), &[2, 3, 3, 2]);
        assert_eq!(sub.coord("lon").unwrap(), &[90.0, 180.0]);
        assert_eq!(sub.data()[[0, 0, 0, 0]], 1.0);

        let sub = sub.select_range("lat", 50.0, 0.0).unwrap();
        assert_eq!(sub.shape(), &[2, 3, 2, 2]);
        assert_eq!(sub.time().len(), 2);

        assert!(matches!(
            array.select_range("lon", 300.0, 350.0),
            Err(SelectionError::EmptySelection { .. })
        ));
        assert!(matches!(
            array.select_range("depth", 0.0, 1.0),
            Err(SelectionError::MissingDimension { .. })
        ));
    }

    #[test]
    fn index_selection() {
        let array = sample();

        let one = array.select_index("lev", 2).unwrap();
        assert_eq!(one.dims(), &["time", "lat", "lon"]);
        assert_eq!(one.data()[[1, 0, 0]], 36.0 + 24.0);
        assert_eq!(one.time_axis(), Some(0));

        let two = array.select_indices("lev", &[0, 2]).unwrap();
        assert_eq!(two.coord("lev").unwrap(), &[1000.0, 500.0]);
        assert_eq!(two.shape(), &[2, 2, 3, 4]);

        assert_eq!(array.nearest_index("lev", 510.0).unwrap(), 2);
    }

    #[test]
    fn time_concatenation() {
        let array = sample();
        let later = array
            .replace_time(
                array.data().clone(),
                vec![month_start(2000, 3), month_start(2000, 4)],
            )
            .unwrap();

        let joined = LabeledArray::concat_time(vec![array, later]).unwrap();
        assert_eq!(joined.shape(), &[4, 3, 3, 4]);
        assert_eq!(joined.time()[3], month_start(2000, 4));
        assert_eq!(joined.data()[[2, 0, 0, 1]], 1.0);
    }
}
