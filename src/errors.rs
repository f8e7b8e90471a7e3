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

use crate::Float;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Error while reading request.yaml: {0}")]
    Config(#[from] ConfigError),

    #[error("Data access failed: {0}")]
    Access(#[from] AccessError),

    #[error("Cannot set memory limit of {0} MB")]
    MemoryLimit(usize),

    #[error("Faulty output directory: {0}")]
    FaultyOutput(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot write output file: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open request.yaml: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize request.yaml: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    FileSearch(#[from] FileSearchError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("Cannot open catalogue {path}: {source}")]
    CantOpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot deserialize catalogue: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Requested dataset {0} is not available in catalogue")]
    UnknownDataset(String),

    #[error("Level token {0:?} is not recognised, only numbers and SURF are allowed")]
    UnknownLevelToken(String),

    #[error("Dataset {dataset} has malformed year_bounds {bounds:?}, expected one or two years")]
    MalformedYearBounds { dataset: String, bounds: Vec<i32> },
}

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Requested variable {var} is not available in dataset {dataset}")]
    VariableNotFound { dataset: String, var: String },

    #[error("Requested variable {var} is available from multiple data streams of dataset {dataset}: {matches}")]
    AmbiguousVariable {
        dataset: String,
        var: String,
        matches: String,
    },

    #[error("Requested level {level} is not within dataset bounds [{min}, {max}]")]
    LevelOutOfBounds { level: Float, min: Float, max: Float },

    #[error("Requested level {level} is out of bounds, dataset {dataset} has only surface fields")]
    SurfaceOnly { dataset: String, level: Float },

    #[error("Requested period [{start}, {end}] is not within dataset bounds [{min}, {max}]")]
    PeriodOutOfBounds {
        start: i32,
        end: i32,
        min: i32,
        max: i32,
    },
}

#[derive(Error, Debug)]
pub enum FileSearchError {
    #[error("Dataset {dataset} stores levels in separate files, request one level at a time (requested {requested})")]
    MultiLevelFileList { dataset: String, requested: String },

    #[error("Cannot handle dataset {dataset} with subtree {subtree}: month partitioned subtrees are not supported")]
    UnsupportedLayout { dataset: String, subtree: String },

    #[error("Data stream {stream} of component {component} declares no filename template")]
    MissingFilename { component: String, stream: String },

    #[error("Input files not found for {dataset} located in {path}")]
    NoFilesFound { dataset: String, path: PathBuf },

    #[error("Invalid file pattern {pattern}: {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Cannot read matched path: {0}")]
    Glob(#[from] glob::GlobError),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Driver {0} is not registered")]
    UnknownDriver(String),

    #[error("Cannot open files for variable {var}: {reason}")]
    Open { var: String, reason: String },

    #[error("Array shape mismatch: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Array(#[from] ArrayError),

    #[error(transparent)]
    FileSearch(#[from] FileSearchError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[cfg(feature = "grib")]
    #[error("GRIB error: {0}")]
    Codes(#[from] eccodes::errors::CodesError),

    #[error("Variable {var} is missing in {path}")]
    MissingVariable { var: String, path: PathBuf },

    #[error("Cannot decode time axis: {0}")]
    InvalidTime(String),

    #[error("GRIB key {0} has incorrect type")]
    IncorrectKeyType(&'static str),
}

#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("Aggregation {0} is not supported")]
    UnsupportedAggregation(String),

    #[error("Array {name} has no time dimension")]
    MissingTimeAxis { name: String },

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Array(#[from] ArrayError),
}

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Array {name} has no {dim} dimension")]
    MissingDimension { name: String, dim: String },

    #[error("Selection on {dim} between {start} and {end} is empty")]
    EmptySelection { dim: String, start: Float, end: Float },

    #[error(transparent)]
    Array(#[from] ArrayError),
}

#[derive(Error, Debug)]
pub enum ArrayError {
    #[error("Data has {data} dimensions but {dims} names were given")]
    RankMismatch { data: usize, dims: usize },

    #[error("Coordinate {dim} has {coord} values but dimension length is {len}")]
    CoordinateLength { dim: String, coord: usize, len: usize },

    #[error("Time axis has {time} values but dimension length is {len}")]
    TimeLength { time: usize, len: usize },

    #[error("Cannot concatenate arrays: {0}")]
    Concatenate(String),

    #[error("Array shape mismatch: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Searched array is empty")]
    EmptyArray,

    #[error("Searched value is out of array bounds")]
    OutOfBounds,
}
