// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Post-detection filters: cut hits whose drift or flag statistics mark
//! them as terrestrial interference.

use super::HitSearchError;
use crate::data::{Cadence, CoarseChannel, Hit, ObservationTarget, Scan, ScanError};

/// Hits with |drift| under this are treated as zero-drift \[Hz/s\].
const ZERO_DRIFT_EPS: f64 = 1e-6;

/// Which filters to apply and their thresholds. Percent thresholds are
/// fractions of the hit's integrated channel count.
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    /// Drop hits with ~0 drift; a stationary tone is co-rotating with the
    /// receiver.
    pub filter_zero_drift: bool,

    /// Drop hits whose path saw too few sigma-clip flags (impulsive RFI
    /// leaves a mostly-unflagged path through a flagged neighbourhood).
    pub filter_sigmaclip: bool,
    pub minimum_percent_sigmaclip: f64,

    /// Drop hits whose path saw too few high-SK flags.
    pub filter_high_sk: bool,
    pub minimum_percent_high_sk: f64,

    /// Drop hits whose path saw too many low-SK flags.
    pub filter_low_sk: bool,
    pub maximum_percent_low_sk: f64,
}

impl Default for FilterOptions {
    fn default() -> FilterOptions {
        FilterOptions {
            filter_zero_drift: true,
            filter_sigmaclip: true,
            minimum_percent_sigmaclip: 0.1,
            filter_high_sk: false,
            minimum_percent_high_sk: 0.1,
            filter_low_sk: false,
            maximum_percent_low_sk: 0.1,
        }
    }
}

/// Apply the configured filters, keeping only surviving hits.
pub fn filter_hits(mut hits: Vec<Hit>, options: &FilterOptions) -> Vec<Hit> {
    hits.retain(|hit| {
        if options.filter_zero_drift && hit.drift_rate_hz_per_sec.abs() < ZERO_DRIFT_EPS {
            return false;
        }

        let integrated = hit.integrated_channels.unsigned_abs() as f64;
        if options.filter_sigmaclip
            && (hit.rfi_counts.sigma_clip as f64) < integrated * options.minimum_percent_sigmaclip
        {
            return false;
        }
        if options.filter_high_sk
            && (hit.rfi_counts.high_spectral_kurtosis as f64)
                < integrated * options.minimum_percent_high_sk
        {
            return false;
        }
        if options.filter_low_sk
            && (hit.rfi_counts.low_spectral_kurtosis as f64)
                > integrated * options.maximum_percent_low_sk
        {
            return false;
        }
        true
    });
    hits
}

/// Filter the hits already attached to a coarse channel, in place.
pub fn filter_hits_channel(
    cc: &mut CoarseChannel,
    options: &FilterOptions,
) -> Result<(), HitSearchError> {
    if !cc.has_hits() {
        return Err(HitSearchError::NoHits);
    }
    let filtered = filter_hits(cc.hits()?, options);
    cc.set_hits(filtered);
    Ok(())
}

/// Register hit filtering on a scan's channel pipeline.
pub fn filter_hits_scan(mut scan: Scan, options: FilterOptions) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| {
            filter_hits_channel(cc, &options).map_err(|e| match e {
                HitSearchError::Scan(e) => e,
                other => ScanError::Stage {
                    description: "filter hits".to_string(),
                    message: other.to_string(),
                },
            })
        },
        "filter hits",
    );
    scan
}

pub fn filter_hits_target(
    mut target: ObservationTarget,
    options: FilterOptions,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| filter_hits_scan(scan, options))
        .collect();
    target
}

pub fn filter_hits_cadence(mut cadence: Cadence, options: FilterOptions) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| filter_hits_target(target, options))
        .collect();
    cadence
}
