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

//! Module containg methods for conducting
//! binary search (bisection) on monotonic coordinates.
//!
//! Coordinates can be sorted ascendingly (longitudes) or
//! descendingly (latitudes north to south, pressure levels
//! top to bottom), so every search handles both directions.

use crate::errors::SearchError;
use crate::Float;

/// Core bisection function, returns the index of the first
/// item that is not "before" `x` in the direction of the array.
fn binary_search(array: &[Float], x: Float) -> Result<usize, SearchError> {
    if array.is_empty() {
        return Err(SearchError::EmptyArray);
    }

    let ascending = array[0] <= array[array.len() - 1];

    let found = if ascending {
        array.partition_point(|&v| v < x)
    } else {
        array.partition_point(|&v| v > x)
    };

    Ok(found)
}

/// Index of the item closest to `x` by absolute distance.
/// Ties resolve to the lower index.
pub fn find_nearest(array: &[Float], x: Float) -> Result<usize, SearchError> {
    let found = binary_search(array, x)?;

    if found == 0 {
        return Ok(0);
    }

    if found == array.len() {
        return Ok(array.len() - 1);
    }

    let before = (array[found - 1] - x).abs();
    let after = (array[found] - x).abs();

    if after < before {
        Ok(found)
    } else {
        Ok(found - 1)
    }
}

/// Inclusive index range of items lying between `start` and `end`,
/// given in the array's own ordering (so for descending arrays
/// `start >= end` is expected). Bounds outside the array are clamped.
pub fn find_slice(array: &[Float], start: Float, end: Float) -> Result<(usize, usize), SearchError> {
    let first = binary_search(array, start)?;
    let ascending = array[0] <= array[array.len() - 1];

    let past_last = if ascending {
        array.partition_point(|&v| v <= end)
    } else {
        array.partition_point(|&v| v >= end)
    };

    if first >= past_last {
        return Err(SearchError::OutOfBounds);
    }

    Ok((first, past_last - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_ascending() {
        let levels = [10.0, 50.0, 100.0, 500.0, 600.0, 850.0];

        assert_eq!(find_nearest(&levels, 510.0).unwrap(), 3);
        assert_eq!(find_nearest(&levels, 590.0).unwrap(), 4);
        assert_eq!(find_nearest(&levels, 550.0).unwrap(), 3);
        assert_eq!(find_nearest(&levels, 1.0).unwrap(), 0);
        assert_eq!(find_nearest(&levels, 1000.0).unwrap(), 5);
        assert_eq!(find_nearest(&levels, 100.0).unwrap(), 2);
    }

    #[test]
    fn nearest_descending() {
        let levels = [1000.0, 850.0, 500.0, 200.0];

        assert_eq!(find_nearest(&levels, 510.0).unwrap(), 2);
        assert_eq!(find_nearest(&levels, 900.0).unwrap(), 1);
        assert_eq!(find_nearest(&levels, 100.0).unwrap(), 3);
    }

    #[test]
    fn slice_both_directions() {
        let lons = [0.0, 2.5, 5.0, 7.5, 10.0];
        assert_eq!(find_slice(&lons, 2.0, 7.5).unwrap(), (1, 3));
        assert_eq!(find_slice(&lons, -10.0, 100.0).unwrap(), (0, 4));

        let lats = [90.0, 45.0, 0.0, -45.0, -90.0];
        assert_eq!(find_slice(&lats, 60.0, -45.0).unwrap(), (1, 3));
    }

    #[test]
    fn empty_selection() {
        let lons = [0.0, 2.5, 5.0];

        assert!(matches!(find_slice(&lons, 6.0, 9.0), Err(SearchError::OutOfBounds)));
        assert!(matches!(find_slice(&lons, 5.0, 0.0), Err(SearchError::OutOfBounds)));
        assert!(matches!(find_nearest(&[], 0.0), Err(SearchError::EmptyArray)));
    }
}
