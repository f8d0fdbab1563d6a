// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Grouping scans by pointing: an [`ObservationTarget`] is every scan of one
//! source, a [`Cadence`] is the ordered ON/OFF sequence of targets recorded
//! in one session.

use log::{debug, warn};

use super::{Scan, ScanError};

/// Tolerance when comparing the frequency structure of two scans \[MHz\].
/// 1e-6 MHz is 1 Hz, far below any channel width this search handles.
const FREQ_MATCH_TOL_MHZ: f64 = 1e-6;

/// Derive a single source name from a collection of scans. Scans that
/// disagree get their names joined with "::" and a warning.
fn extract_source_name_from_scans(scans: &[Scan]) -> String {
    let mut source_name = String::new();
    for scan in scans {
        if scan.source_name().is_empty() {
            continue;
        }
        debug!("Got source name {}", scan.source_name());
        if source_name.is_empty() {
            source_name = scan.source_name().to_string();
        } else if source_name != scan.source_name() {
            warn!(
                "Scans with different source names used to build an observation target, which \
                 expects a single source"
            );
            source_name = format!("{source_name}::{}", scan.source_name());
        }
    }
    if source_name.is_empty() {
        source_name = "unknown".to_string();
    }
    source_name
}

/// Check one scan's frequency structure against reference values.
fn check_scan_consistency(
    scan: &Scan,
    fch1: f64,
    foff: f64,
    nchans: i64,
) -> Result<(), ScanError> {
    if (scan.fch1() - fch1).abs() > FREQ_MATCH_TOL_MHZ
        || (scan.foff() - foff).abs() > FREQ_MATCH_TOL_MHZ
        || scan.nchans() != nchans
    {
        return Err(ScanError::InconsistentMetadata(format!(
            "scan of '{}' has (fch1, foff, nchans) = ({}, {}, {}), but ({fch1}, {foff}, {nchans}) \
             was expected",
            scan.source_name(),
            scan.fch1(),
            scan.foff(),
            scan.nchans()
        )));
    }
    Ok(())
}

/// Every scan of one pointing.
#[derive(Debug, Default)]
pub struct ObservationTarget {
    pub scans: Vec<Scan>,
    pub target_name: String,
}

impl ObservationTarget {
    /// Group scans of a single source, deriving the target name from them.
    pub fn new(scans: Vec<Scan>) -> ObservationTarget {
        let target_name = extract_source_name_from_scans(&scans);
        ObservationTarget { scans, target_name }
    }

    /// Check that every scan in this target shares the same `fch1`, `foff`
    /// and `nchans`.
    pub fn validate_scan_consistency(&self) -> Result<(), ScanError> {
        let first = match self.scans.first() {
            Some(first) => first,
            None => return Ok(()),
        };
        let (fch1, foff, nchans) = (first.fch1(), first.foff(), first.nchans());
        for scan in &self.scans {
            check_scan_consistency(scan, fch1, foff, nchans)?;
        }
        Ok(())
    }

    /// Which coarse channel contains `frequency` \[MHz\]? Requires a
    /// consistent target.
    pub fn get_coarse_channel_with_frequency(&self, frequency: f64) -> Result<i64, ScanError> {
        self.validate_scan_consistency()?;
        let first = self.scans.first().ok_or(ScanError::NoChannels)?;
        Ok(first.get_coarse_channel_with_frequency(frequency))
    }

    /// The number of coarse channels per scan. Requires a consistent target.
    pub fn get_number_coarse_channels(&self) -> Result<i64, ScanError> {
        self.validate_scan_consistency()?;
        let first = self.scans.first().ok_or(ScanError::NoChannels)?;
        Ok(first.num_coarse_channels())
    }

    /// Slice every scan of this target to a coarse-channel range.
    pub fn slice_observation_channels(
        &self,
        start_channel: i64,
        count: i64,
    ) -> Result<ObservationTarget, ScanError> {
        let scans = self
            .scans
            .iter()
            .map(|scan| scan.slice_scan_channels(start_channel, count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ObservationTarget {
            scans,
            target_name: self.target_name.clone(),
        })
    }
}

/// An ordered observing sequence. By convention the target at index 0 is the
/// primary (ON) pointing and all others are OFF references, e.g. the
/// single-dish "ABACAD" pattern.
#[derive(Debug, Default)]
pub struct Cadence {
    pub targets: Vec<ObservationTarget>,
}

impl Cadence {
    pub fn new(targets: Vec<ObservationTarget>) -> Cadence {
        Cadence { targets }
    }

    /// Check that every scan of every target shares the frequency structure
    /// of the first non-empty target.
    pub fn validate_scan_consistency(&self) -> Result<(), ScanError> {
        let first = match self
            .targets
            .iter()
            .find_map(|target| target.scans.first())
        {
            Some(first) => first,
            None => return Ok(()),
        };
        let (fch1, foff, nchans) = (first.fch1(), first.foff(), first.nchans());
        for target in &self.targets {
            for scan in &target.scans {
                check_scan_consistency(scan, fch1, foff, nchans)?;
            }
        }
        Ok(())
    }

    /// Which coarse channel contains `frequency` \[MHz\]? Requires a
    /// consistent cadence.
    pub fn get_coarse_channel_with_frequency(&self, frequency: f64) -> Result<i64, ScanError> {
        self.validate_scan_consistency()?;
        let first = self
            .targets
            .iter()
            .find_map(|target| target.scans.first())
            .ok_or(ScanError::NoChannels)?;
        Ok(first.get_coarse_channel_with_frequency(frequency))
    }

    /// The number of coarse channels per scan. Requires a consistent
    /// cadence.
    pub fn get_number_coarse_channels(&self) -> Result<i64, ScanError> {
        self.validate_scan_consistency()?;
        let first = self
            .targets
            .iter()
            .find_map(|target| target.scans.first())
            .ok_or(ScanError::NoChannels)?;
        Ok(first.num_coarse_channels())
    }

    /// Slice every scan of every target to a coarse-channel range.
    pub fn slice_cadence_channels(
        &self,
        start_channel: i64,
        count: i64,
    ) -> Result<Cadence, ScanError> {
        let targets = self
            .targets
            .iter()
            .map(|target| target.slice_observation_channels(start_channel, count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Cadence { targets })
    }
}
