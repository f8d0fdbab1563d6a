// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! RFI flaggers. Every flagger ORs its own bit into the channel mask and
//! never clears anything, so flaggers compose in any order.

#[cfg(test)]
mod tests;

use ndarray::azip;
use ndarray::prelude::*;

use crate::data::{Cadence, CoarseChannel, ObservationTarget, Scan, ScanError};
use crate::noise::{
    estimate_noise_stats, estimate_spectral_kurtosis_channel, NoiseEstimateError,
    NoiseEstimateOptions, NoisePowerEstimator,
};

/// The mask bit each flagging algorithm owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlagValue {
    /// The sample sits on the rolloff of the upstream polyphase filterbank.
    FilterRolloff = 1 << 0,

    /// Spectral kurtosis below the lower threshold (over-averaged or
    /// engineered signals).
    LowSpectralKurtosis = 1 << 1,

    /// Spectral kurtosis above the upper threshold (impulsive RFI).
    HighSpectralKurtosis = 1 << 2,

    /// Simple magnitude threshold (too loud).
    Magnitude = 1 << 4,

    /// Statistical outlier under iterative sigma clipping.
    SigmaClip = 1 << 5,
}

impl FlagValue {
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// Flag the band edges of a coarse channel, where the polyphase filterbank
/// response rolls off.
///
/// `rolloff_width` is the fraction of the band flagged at *each* edge.
pub fn flag_filter_rolloff_channel(
    cc: &mut CoarseChannel,
    rolloff_width: f64,
) -> Result<(), ScanError> {
    let mut mask = cc.mask()?;
    let nchans = mask.shape()[1] as i64;
    let one_sided_channels = (nchans as f64 * rolloff_width).round() as i64;

    if one_sided_channels > 0 {
        let end = (one_sided_channels as usize).min(mask.shape()[1]);
        mask.slice_mut(s![.., ..end])
            .mapv_inplace(|m| m | FlagValue::FilterRolloff.bit());
        let start = mask.shape()[1].saturating_sub(end);
        mask.slice_mut(s![.., start..])
            .mapv_inplace(|m| m | FlagValue::FilterRolloff.bit());
    }

    cc.set_mask(mask);
    Ok(())
}

/// Register rolloff flagging on a scan's channel pipeline.
pub fn flag_filter_rolloff(mut scan: Scan, rolloff_width: f64) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| flag_filter_rolloff_channel(cc, rolloff_width),
        "flag filter rolloff",
    );
    scan
}

pub fn flag_filter_rolloff_target(
    mut target: ObservationTarget,
    rolloff_width: f64,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| flag_filter_rolloff(scan, rolloff_width))
        .collect();
    target
}

pub fn flag_filter_rolloff_cadence(mut cadence: Cadence, rolloff_width: f64) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| flag_filter_rolloff_target(target, rolloff_width))
        .collect();
    cadence
}

/// Flag samples louder than `threshold`; with `None`, the threshold is
/// `mean + 10 σ` of the channel.
pub fn flag_magnitude_channel(
    cc: &mut CoarseChannel,
    threshold: Option<f64>,
) -> Result<(), ScanError> {
    let data = cc.data()?;
    let threshold = match threshold {
        Some(threshold) => threshold,
        None => {
            let options = NoiseEstimateOptions {
                estimator_method: NoisePowerEstimator::Stddev,
                masked_estimate: false,
            };
            let stats = estimate_noise_stats(data.view(), None, options).map_err(|e| {
                ScanError::Stage {
                    description: "flag magnitude".to_string(),
                    message: e.to_string(),
                }
            })?;
            stats.noise_floor() + 10.0 * stats.noise_amplitude()
        }
    };

    let mut mask = cc.mask()?;
    azip!((m in &mut mask, &x in &data) {
        if (x as f64) > threshold {
            *m |= FlagValue::Magnitude.bit();
        }
    });
    cc.set_mask(mask);
    Ok(())
}

/// Register magnitude flagging on a scan's channel pipeline.
pub fn flag_magnitude(mut scan: Scan, threshold: Option<f64>) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| flag_magnitude_channel(cc, threshold),
        "flag magnitude",
    );
    scan
}

pub fn flag_magnitude_target(
    mut target: ObservationTarget,
    threshold: Option<f64>,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| flag_magnitude(scan, threshold))
        .collect();
    target
}

pub fn flag_magnitude_cadence(mut cadence: Cadence, threshold: Option<f64>) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| flag_magnitude_target(target, threshold))
        .collect();
    cadence
}

/// Configuration for iterative sigma clipping.
#[derive(Debug, Clone, Copy)]
pub struct SigmaClipOptions {
    pub max_iter: usize,

    /// Lower cut in sigmas below the mean.
    pub lower_threshold: f64,

    /// Upper cut in sigmas above the mean.
    pub upper_threshold: f64,
}

impl Default for SigmaClipOptions {
    fn default() -> SigmaClipOptions {
        SigmaClipOptions {
            max_iter: 5,
            lower_threshold: 3.0,
            upper_threshold: 4.0,
        }
    }
}

/// Flag statistical outliers by iterative sigma clipping: flag, recompute
/// the moments over the surviving samples, flag again, until the flagged set
/// stops changing or `max_iter` is reached.
pub fn flag_sigmaclip_channel(
    cc: &mut CoarseChannel,
    options: SigmaClipOptions,
) -> Result<(), ScanError> {
    let data = cc.data()?;
    let mut mask = cc.mask()?;

    for _ in 0..options.max_iter {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut sum_squares = 0.0f64;
        azip!((&m in &mask, &x in &data) {
            if m == 0 {
                count += 1;
                sum += x as f64;
                sum_squares += (x as f64) * (x as f64);
            }
        });
        if count < 2 {
            break;
        }
        let mean = sum / count as f64;
        let stddev = (sum_squares / count as f64 - mean * mean).max(0.0).sqrt();
        let low_cut = mean - options.lower_threshold * stddev;
        let high_cut = mean + options.upper_threshold * stddev;

        let mut newly_flagged = 0usize;
        azip!((m in &mut mask, &x in &data) {
            let x = x as f64;
            if *m & FlagValue::SigmaClip.bit() == 0 && (x < low_cut || x > high_cut) {
                *m |= FlagValue::SigmaClip.bit();
                newly_flagged += 1;
            }
        });
        if newly_flagged == 0 {
            break;
        }
    }

    cc.set_mask(mask);
    Ok(())
}

/// Register sigma clipping on a scan's channel pipeline.
pub fn flag_sigmaclip(mut scan: Scan, options: SigmaClipOptions) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| flag_sigmaclip_channel(cc, options),
        "flag sigma clip",
    );
    scan
}

pub fn flag_sigmaclip_target(
    mut target: ObservationTarget,
    options: SigmaClipOptions,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| flag_sigmaclip(scan, options))
        .collect();
    target
}

pub fn flag_sigmaclip_cadence(mut cadence: Cadence, options: SigmaClipOptions) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| flag_sigmaclip_target(target, options))
        .collect();
    cadence
}

/// Configuration for spectral-kurtosis flagging.
#[derive(Debug, Clone, Copy)]
pub struct SpectralKurtosisOptions {
    /// Channels with SK below this are flagged low.
    pub lower_threshold: f64,

    /// Channels with SK above this are flagged high.
    pub upper_threshold: f64,

    /// Gamma-distribution shape parameter; 2.0 for power spectra.
    pub d: f64,
}

impl Default for SpectralKurtosisOptions {
    fn default() -> SpectralKurtosisOptions {
        SpectralKurtosisOptions {
            lower_threshold: 0.05,
            upper_threshold: 25.0,
            d: 2.0,
        }
    }
}

/// Flag whole frequency channels whose spectral kurtosis falls outside the
/// Gaussian expectation.
pub fn flag_spectral_kurtosis_channel(
    cc: &mut CoarseChannel,
    options: SpectralKurtosisOptions,
) -> Result<(), ScanError> {
    let sk = estimate_spectral_kurtosis_channel(cc, options.d).map_err(|e| match e {
        NoiseEstimateError::Scan(e) => e,
        other => ScanError::Stage {
            description: "flag spectral kurtosis".to_string(),
            message: other.to_string(),
        },
    })?;

    let mut mask = cc.mask()?;
    for (channel, &sk_value) in sk.iter().enumerate() {
        let bit = if sk_value < options.lower_threshold {
            FlagValue::LowSpectralKurtosis.bit()
        } else if sk_value > options.upper_threshold {
            FlagValue::HighSpectralKurtosis.bit()
        } else {
            continue;
        };
        mask.slice_mut(s![.., channel]).mapv_inplace(|m| m | bit);
    }
    cc.set_mask(mask);
    Ok(())
}

/// Register spectral-kurtosis flagging on a scan's channel pipeline.
pub fn flag_spectral_kurtosis(mut scan: Scan, options: SpectralKurtosisOptions) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| flag_spectral_kurtosis_channel(cc, options),
        "flag spectral kurtosis",
    );
    scan
}

pub fn flag_spectral_kurtosis_target(
    mut target: ObservationTarget,
    options: SpectralKurtosisOptions,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| flag_spectral_kurtosis(scan, options))
        .collect();
    target
}

pub fn flag_spectral_kurtosis_cadence(
    mut cadence: Cadence,
    options: SpectralKurtosisOptions,
) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| flag_spectral_kurtosis_target(target, options))
        .collect();
    cadence
}
