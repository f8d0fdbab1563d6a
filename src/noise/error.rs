// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with noise estimation.

use thiserror::Error;

use crate::data::ScanError;

#[derive(Error, Debug)]
pub enum NoiseEstimateError {
    #[error("Cannot estimate noise from {remaining} unflagged samples; at least 2 are required")]
    DataInsufficient { remaining: usize },

    #[error(transparent)]
    Scan(#[from] ScanError),
}
