// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with the scan data hierarchy.

use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Coarse channel index {index} is outside [0, {num_coarse_channels})")]
    OutOfRange {
        index: i64,
        num_coarse_channels: i64,
    },

    #[error("Requested {0}, but no value has been computed and no producer is registered")]
    NotComputed(&'static str),

    #[error("Device '{0}' is unavailable (no GPU backend was compiled into this build)")]
    UnsupportedDevice(String),

    #[error("Inconsistent metadata: {0}")]
    InconsistentMetadata(String),

    #[error("Cannot build a scan from an empty channel map")]
    NoChannels,

    #[error("This scan has no data source; channels cannot be loaded or sliced")]
    NoDataSource,

    #[error("Pipeline stage '{description}' failed: {message}")]
    Stage {
        description: String,
        message: String,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}
