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

//! Module containing constants used across the crate.

/// Canonical name of the time dimension.
pub const TIME_DIM: &str = "time";

/// Canonical name of the vertical dimension.
pub const LEVEL_DIM: &str = "lev";

/// Canonical name of the latitude dimension.
pub const LAT_DIM: &str = "lat";

/// Canonical name of the longitude dimension.
pub const LON_DIM: &str = "lon";

/// Token used in the catalogue `levels` list for surface fields.
pub const SURFACE_TOKEN: &str = "SURF";

/// Name of the driver that goes through the multi-file opener.
pub const DEFAULT_DRIVER: &str = "default";

/// Attribute tagging the array with the component it was read from.
pub const REALM_ATTR: &str = "realm";

/// Attribute tagging the array with the temporal aggregation applied to it.
pub const AGGREGATION_ATTR: &str = "aggregation";

/// Glob token substituted for `<mon>`.
pub const WILDCARD: &str = "*";

/// Three-letter month labels, January first.
pub const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
