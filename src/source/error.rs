// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with waterfall data sources.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Hyperslab selection (offset {offset:?}, count {count:?}) exceeds the source shape {shape:?}")]
    OutOfBounds {
        offset: Vec<i64>,
        count: Vec<i64>,
        shape: Vec<i64>,
    },

    #[error("Hyperslab selection must have one offset and one count per dimension (got offset {offset:?}, count {count:?})")]
    BadSelection { offset: Vec<i64>, count: Vec<i64> },

    #[error("Mask shape {mask:?} does not match data shape {data:?}")]
    MaskShapeMismatch { data: Vec<usize>, mask: Vec<usize> },

    #[error("IO error from the underlying source: {0}")]
    Io(#[from] std::io::Error),
}
