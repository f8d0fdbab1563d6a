// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with drift integration.

use thiserror::Error;

use crate::data::ScanError;

#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Data shape {data:?} does not match mask shape {mask:?}")]
    InconsistentShape { data: Vec<usize>, mask: Vec<usize> },

    #[error("Cannot integrate drifts over {ntsteps} time steps; at least 2 are required")]
    InvalidTimeSpan { ntsteps: i64 },

    #[error(transparent)]
    Scan(#[from] ScanError),
}
