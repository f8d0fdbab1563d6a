// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with the hit search.

use thiserror::Error;

use crate::data::ScanError;

#[derive(Error, Debug)]
pub enum HitSearchError {
    #[error("Coarse channel has no hits to filter; run a hit search first")]
    NoHits,

    #[error(transparent)]
    Scan(#[from] ScanError),
}
