// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading and writing hit files.

use thiserror::Error;

use crate::data::ScanError;
use crate::sexagesimal::SexagesimalError;

#[derive(Error, Debug)]
pub enum HitsFileError {
    #[error("Malformed hit table line {line_number}: '{line}'")]
    MalformedLine { line_number: usize, line: String },

    #[error("Hit file '{0}' contains no channels")]
    Empty(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Sexagesimal(#[from] SexagesimalError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
