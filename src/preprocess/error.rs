// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with preprocessing.

use thiserror::Error;

use crate::data::ScanError;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Cannot excise the DC bin of a channel with only {nchans} frequency bins")]
    ChannelTooNarrow { nchans: i64 },

    #[error("Passband response has {response} points, but the channel has {nchans} fine channels")]
    ResponseShapeMismatch { response: usize, nchans: i64 },

    #[error("Passband response failed validation: {0}")]
    InvalidResponse(String),

    #[error("Unknown window function '{0}'; expected one of 'hamming', 'hann', 'boxcar'")]
    UnknownWindow(String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}
