// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all driftnet-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriftnetError {
    #[error("{0}")]
    Scan(#[from] crate::data::ScanError),

    #[error("{0}")]
    Source(#[from] crate::source::SourceError),

    #[error("{0}")]
    Noise(#[from] crate::noise::NoiseEstimateError),

    #[error("{0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),

    #[error("{0}")]
    Drift(#[from] crate::drift::DriftError),

    #[error("{0}")]
    HitSearch(#[from] crate::search::HitSearchError),

    #[error("{0}")]
    HitsFile(#[from] crate::io::HitsFileError),

    #[error("{0}")]
    Sexagesimal(#[from] crate::sexagesimal::SexagesimalError),
}
