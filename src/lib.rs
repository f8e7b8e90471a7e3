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

//! Climate Catalogue Access (climcat) is a data-access and resampling
//! layer for gridded climate and reanalysis datasets.
//!
//! Datasets are declared in a YAML catalogue describing where their
//! files live and which variables each component and data stream holds.
//! A request names a dataset, a variable, levels, a period and optionally
//! a season, and gets back a [`LabeledArray`](array::LabeledArray) with
//! canonical coordinate names and the requested temporal aggregation.
//!
//! The pipeline is: catalogue lookup, variable location with level and
//! period checks, file discovery from wildcard templates, multi-file
//! loading (or a named driver), calendar-weighted temporal reduction,
//! and finally region and level selection.

pub mod access;
pub mod array;
pub mod catalogue;
pub mod constants;
pub mod errors;
pub mod loader;
pub mod output;
pub mod resample;

pub type Float = f64;

pub use access::{DataAccess, Dataset, Region, Request};
pub use array::LabeledArray;
pub use catalogue::{Catalogue, CatalogueSource, DatasetDescriptor, Level};
pub use resample::TemporalGroup;
