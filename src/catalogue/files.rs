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

//! Sub-module translating the wildcard templates of a dataset
//! into the list of files holding the requested variable.
//!
//! Templates are plain strings with a small closed set of
//! placeholders (see [`Token`]) replaced textually. `<mon>` always
//! becomes a glob wildcard as files are never split by month at this
//! layer, and `<year>` is substituted once per year of the period.

use super::{locator::Located, DataStream, DatasetDescriptor, Level};
use crate::{constants::WILDCARD, errors::FileSearchError};
use indexmap::IndexMap;
use log::debug;
use std::path::{Path, PathBuf};

/// Placeholders recognised in `subtree` and `filename` templates.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Token {
    Var,
    Lev,
    Mon,
    Comp,
    DataStream,
    Year,
}

impl Token {
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Token::Var => "<var>",
            Token::Lev => "<lev>",
            Token::Mon => "<mon>",
            Token::Comp => "<comp>",
            Token::DataStream => "<data_stream>",
            Token::Year => "<year>",
        }
    }
}

/// Output of file discovery for one variable.
#[derive(Clone, PartialEq, Debug)]
pub struct ResolvedFileSet {
    /// Matched files, sorted within each year, years in order.
    pub files: Vec<PathBuf>,
    pub var: String,
    pub period: (i32, i32),
    pub component: String,
    /// Whether levels are stored as separate file groups.
    pub level_partitioned: bool,
    /// Canonical coordinate name -> name used in the files.
    pub coord_map: Option<IndexMap<String, String>>,
}

/// Templates with every token but `<year>` substituted.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FilePattern {
    directory: String,
    filename: String,
    year_in_subtree: bool,
    year_in_filename: bool,
    level_partitioned: bool,
}

impl FilePattern {
    /// Builds the pattern for a located variable.
    pub fn new(
        descriptor: &DatasetDescriptor,
        located: &Located,
        var: &str,
        levels: Option<&[Level]>,
    ) -> Result<FilePattern, FileSearchError> {
        let stream = find_stream(descriptor, located);
        let subtree = descriptor.subtree.clone().unwrap_or_default();
        let filename = stream
            .and_then(|s| s.filename.clone())
            .or_else(|| {
                descriptor
                    .components
                    .get(&located.component)
                    .and_then(|c| c.filename.clone())
            })
            .ok_or_else(|| FileSearchError::MissingFilename {
                component: located.component.clone(),
                stream: located.stream.clone(),
            })?;

        if subtree.contains(Token::Mon.placeholder()) {
            return Err(FileSearchError::UnsupportedLayout {
                dataset: descriptor.name.clone(),
                subtree,
            });
        }

        let level_partitioned = is_level_partitioned(&subtree, &filename);
        let level_token = if level_partitioned {
            match levels {
                Some([level]) => level.to_string(),
                Some(levels) => {
                    return Err(FileSearchError::MultiLevelFileList {
                        dataset: descriptor.name.clone(),
                        requested: levels
                            .iter()
                            .map(Level::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
                }
                None => {
                    return Err(FileSearchError::MultiLevelFileList {
                        dataset: descriptor.name.clone(),
                        requested: "all levels".to_string(),
                    })
                }
            }
        } else {
            String::new()
        };

        let year_in_subtree = subtree.contains("year");
        let year_in_filename = filename.contains("year");

        let substitutions = [
            (Token::Var, var),
            (Token::Lev, level_token.as_str()),
            (Token::Mon, WILDCARD),
            (Token::Comp, located.component.as_str()),
            (Token::DataStream, located.stream.as_str()),
        ];

        let mut subtree = subtree;
        let mut filename = filename;

        for (token, value) in substitutions {
            subtree = subtree.replace(token.placeholder(), value);
            filename = filename.replace(token.placeholder(), value);
        }

        let directory = if subtree.is_empty() {
            descriptor.path.to_string_lossy().into_owned()
        } else {
            descriptor.path.join(subtree).to_string_lossy().into_owned()
        };

        Ok(FilePattern {
            directory,
            filename,
            year_in_subtree,
            year_in_filename,
            level_partitioned,
        })
    }

    /// Directory and filename pattern for one year.
    pub fn for_year(&self, year: i32) -> (PathBuf, String) {
        let year = year.to_string();

        let directory = if self.year_in_subtree {
            self.directory.replace(Token::Year.placeholder(), &year)
        } else {
            self.directory.clone()
        };

        let filename = if self.year_in_filename {
            self.filename.replace(Token::Year.placeholder(), &year)
        } else {
            self.filename.clone()
        };

        (PathBuf::from(directory), filename)
    }

    /// Layouts without any year token are scanned once.
    pub fn is_year_partitioned(&self) -> bool {
        self.year_in_subtree || self.year_in_filename
    }
}

/// Resolves the files holding `var` over the requested (or the
/// dataset's own) period. Zero matches is an error, never an
/// empty file list.
///
/// Year-partitioned layouts are globbed once per year of the period.
/// Layouts with no `<year>` token in the subtree or the filename are
/// globbed a single time, since every year would match the same files.
pub fn resolve_files(
    descriptor: &DatasetDescriptor,
    located: &Located,
    var: &str,
    levels: Option<&[Level]>,
    period: Option<(i32, i32)>,
) -> Result<ResolvedFileSet, FileSearchError> {
    let pattern = FilePattern::new(descriptor, located, var, levels)?;
    let period = period.unwrap_or_else(|| default_period(descriptor));

    let years: Vec<i32> = if pattern.is_year_partitioned() {
        (period.0..=period.1).collect()
    } else {
        vec![period.0]
    };

    let mut files = vec![];

    for year in years {
        let (directory, filename) = pattern.for_year(year);
        debug!("Searching {} in {}", filename, directory.display());

        let mut found = glob_sorted(&directory, &filename)?;
        files.append(&mut found);
    }

    if files.is_empty() {
        return Err(FileSearchError::NoFilesFound {
            dataset: descriptor.name.clone(),
            path: descriptor.path.clone(),
        });
    }

    debug!("Found {} files for variable {}", files.len(), var);

    let coord_map = find_stream(descriptor, located).and_then(|s| s.coord_map.clone());

    Ok(ResolvedFileSet {
        files,
        var: var.to_string(),
        period,
        component: located.component.clone(),
        level_partitioned: pattern.level_partitioned,
        coord_map,
    })
}

fn default_period(descriptor: &DatasetDescriptor) -> (i32, i32) {
    match descriptor.year_bounds.as_slice() {
        [start, end, ..] => (*start, *end),
        [year] => (*year, *year),
        [] => (0, 0),
    }
}

fn find_stream<'a>(descriptor: &'a DatasetDescriptor, located: &Located) -> Option<&'a DataStream> {
    descriptor
        .components
        .get(&located.component)
        .and_then(|c| c.data_stream.get(&located.stream))
}

fn is_level_partitioned(subtree: &str, filename: &str) -> bool {
    subtree.contains(Token::Lev.placeholder()) || filename.contains(Token::Lev.placeholder())
}

fn glob_sorted(directory: &Path, filename: &str) -> Result<Vec<PathBuf>, FileSearchError> {
    let pattern = directory.join(filename).to_string_lossy().into_owned();

    let paths = glob::glob(&pattern).map_err(|source| FileSearchError::BadPattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut found = paths.collect::<Result<Vec<PathBuf>, glob::GlobError>>()?;
    found.sort();

    Ok(found)
}
