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

//! Command-line front end of Climate Catalogue Access (climcat).
//!
//! Reads `request.yaml` from the working directory and, depending
//! on its content, lists the catalogue, prints the outline of one
//! dataset or reads the requested variable and saves it as CSV
//! in the `./output/` directory.

use cap::Cap;
use climcat::{
    access::configuration::RequestConfig,
    errors::{ConfigError, RunError},
    output::{output_path, prepare_output_dir, save_array},
    CatalogueSource, DataAccess,
};
use env_logger::Env;
use log::{debug, error, info};
use std::{alloc, path::Path};

/// Global allocator used by the program.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in request file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
///
/// The `env_logger` needs to be initiated before any log
/// messages are possible to occur, so that errors from reading
/// the request are reported as well.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("CLIMCAT_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("CLIMCAT_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match run() {
        Ok(_) => info!("Finished. Check the output directory and log."),
        Err(err) => error!("Execution failed with error: {}", err),
    }
}

fn run() -> Result<(), RunError> {
    debug!("Reading request from request.yaml");
    let config = RequestConfig::new_from_file(Path::new("request.yaml"))?;

    debug!("Setting memory limit");
    let memory = config.resources.memory;
    ALLOCATOR
        .set_limit(memory.saturating_mul(1024 * 1024))
        .map_err(|_| RunError::MemoryLimit(memory))?;

    let access = DataAccess::new(CatalogueSource::File(config.catalogue.clone()));

    let dataset = match &config.dataset {
        Some(dataset) => dataset,
        None => {
            for (name, description) in access.list()? {
                println!("{:<16} {}", name, description);
            }
            return Ok(());
        }
    };

    if config.describe {
        print!("{}", access.describe(dataset)?);
        return Ok(());
    }

    let request = config
        .request()
        .ok_or(ConfigError::OutOfBounds(
            "Variable must be given when reading a dataset",
        ))?;

    let out_dir = Path::new("./output/");
    prepare_output_dir(out_dir)?;

    let array = access.read(&request)?;

    let out_path = output_path(out_dir, dataset, &request.var, config.season());
    save_array(&array, &out_path)?;

    info!("Saved {} to {}", request.var, out_path.display());

    Ok(())
}
