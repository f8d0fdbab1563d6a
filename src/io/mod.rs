// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing hit files in the formats downstream tooling
//! consumes: the TurboSETI `.dat` text table and the structured envelope.

mod dat;
mod error;
mod hits;

pub use dat::{read_hits_from_dat_file, write_scan_hits_to_dat_file, DatContents};
pub use error::HitsFileError;
pub use hits::{
    read_scan_hits_from_file, write_scan_hits_to_file, ChannelHits, ScanHitsEnvelope,
};

use std::path::Path;

use crate::data::Scan;

/// The hit file formats this crate writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitsFileFormat {
    /// TurboSETI-compatible text table.
    Dat,

    /// Structured JSON envelope.
    Envelope,
}

impl HitsFileFormat {
    /// Choose a format from a file path's extension, defaulting to the
    /// envelope.
    pub fn from_path(path: impl AsRef<Path>) -> HitsFileFormat {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("dat") => HitsFileFormat::Dat,
            _ => HitsFileFormat::Envelope,
        }
    }
}

/// Write a scan's hits in the format implied by the path's extension.
pub fn write_scan_hits(
    scan: &mut Scan,
    file_path: impl AsRef<Path>,
    max_drift_rate: f64,
) -> Result<(), HitsFileError> {
    match HitsFileFormat::from_path(&file_path) {
        HitsFileFormat::Dat => write_scan_hits_to_dat_file(scan, file_path, max_drift_rate),
        HitsFileFormat::Envelope => write_scan_hits_to_file(scan, file_path),
    }
}
