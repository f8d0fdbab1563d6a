// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-channel noise statistics: the floor and power that the hit search
//! normalises against.

mod error;

pub use error::NoiseEstimateError;

use ndarray::prelude::*;

use crate::data::{Cadence, CoarseChannel, ObservationTarget, Scan, ScanError};

/// The conversion between a Gaussian deviate's median absolute deviation and
/// its standard deviation.
const MAD_TO_STDDEV: f64 = 1.4826;

/// Noise floor (mean) and noise power (variance) of a coarse channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseStats {
    noise_floor: f64,
    noise_power: f64,
}

impl NoiseStats {
    pub fn new(noise_floor: f64, noise_power: f64) -> NoiseStats {
        NoiseStats {
            noise_floor,
            noise_power,
        }
    }

    /// The expected baseline of the noise.
    pub fn noise_floor(&self) -> f64 {
        self.noise_floor
    }

    /// The expected variability of the noise power.
    pub fn noise_power(&self) -> f64 {
        self.noise_power
    }

    /// The noise standard deviation (square root of the power).
    pub fn noise_amplitude(&self) -> f64 {
        self.noise_power.sqrt()
    }
}

/// How to estimate the noise statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoisePowerEstimator {
    /// Plain mean and variance. Sensitive to outliers.
    Stddev,

    /// Median and scaled median absolute deviation. Robust against strong
    /// RFI skewing the statistics.
    MeanAbsoluteDeviation,
}

/// Configuration for a noise estimate.
#[derive(Debug, Clone, Copy)]
pub struct NoiseEstimateOptions {
    pub estimator_method: NoisePowerEstimator,

    /// Exclude samples whose RFI mask is non-zero from the estimate.
    pub masked_estimate: bool,
}

impl Default for NoiseEstimateOptions {
    fn default() -> NoiseEstimateOptions {
        NoiseEstimateOptions {
            estimator_method: NoisePowerEstimator::Stddev,
            masked_estimate: true,
        }
    }
}

/// Estimate noise statistics from samples and an optional mask of the same
/// shape.
pub fn estimate_noise_stats(
    data: ArrayView2<f32>,
    mask: Option<ArrayView2<u8>>,
    options: NoiseEstimateOptions,
) -> Result<NoiseStats, NoiseEstimateError> {
    let samples: Vec<f64> = match mask {
        Some(mask) => data
            .iter()
            .zip(mask.iter())
            .filter(|(_, &flag)| flag == 0)
            .map(|(&x, _)| x as f64)
            .collect(),
        None => data.iter().map(|&x| x as f64).collect(),
    };

    if samples.len() < 2 {
        return Err(NoiseEstimateError::DataInsufficient {
            remaining: samples.len(),
        });
    }

    match options.estimator_method {
        NoisePowerEstimator::Stddev => {
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            Ok(NoiseStats::new(mean, variance))
        }
        NoisePowerEstimator::MeanAbsoluteDeviation => {
            let mut sorted = samples;
            sorted.sort_unstable_by(|a, b| a.total_cmp(b));
            let median = sorted[sorted.len() / 2];

            let mut abs_devs: Vec<f64> = sorted.iter().map(|x| (x - median).abs()).collect();
            abs_devs.sort_unstable_by(|a, b| a.total_cmp(b));
            let mad = abs_devs[abs_devs.len() / 2];

            Ok(NoiseStats::new(median, (MAD_TO_STDDEV * mad).powi(2)))
        }
    }
}

/// The generalised spectral-kurtosis estimator (Nita & Gary 2010) for every
/// frequency channel of a time × frequency grid.
///
/// `n` is the number of raw samples averaged per spectral bin, `m` the
/// number of spectra in the grid, and `d` the gamma-distribution shape
/// parameter (2.0 for power spectra). Gaussian noise gives SK ≈ 1; man-made
/// signals deviate.
pub fn estimate_spectral_kurtosis(
    spectrum_grid: ArrayView2<f32>,
    n: i64,
    m: i64,
    d: f64,
) -> Array1<f64> {
    let grid = spectrum_grid.mapv(|x| x as f64);
    let s1_squared = grid.sum_axis(Axis(0)).mapv(|s| s * s);
    let s2 = grid.mapv(|x| x * x).sum_axis(Axis(0));

    let m = m as f64;
    let scale = (m * n as f64 * d + 1.0) / (m - 1.0);
    let mut sk = s2 / s1_squared;
    sk.mapv_inplace(|ratio| scale * (m * ratio - 1.0));
    sk
}

/// Spectral kurtosis of a coarse channel, deriving `n` and `m` from its
/// metadata.
pub fn estimate_spectral_kurtosis_channel(
    cc: &mut CoarseChannel,
    d: f64,
) -> Result<Array1<f64>, NoiseEstimateError> {
    let data = cc.data()?;
    let m = data.shape()[0] as i64;
    // Raw samples accumulated per spectral bin.
    let n = (cc.tsamp() * (cc.foff() * 1e6).abs()).round() as i64;
    Ok(estimate_spectral_kurtosis(data.view(), n, m, d))
}

/// Estimate and attach noise statistics for a coarse channel.
pub fn estimate_noise_power_channel(
    cc: &mut CoarseChannel,
    options: NoiseEstimateOptions,
) -> Result<(), NoiseEstimateError> {
    let data = cc.data()?;
    let stats = if options.masked_estimate {
        let mask = cc.mask()?;
        estimate_noise_stats(data.view(), Some(mask.view()), options)?
    } else {
        estimate_noise_stats(data.view(), None, options)?
    };
    cc.set_noise_estimate(stats);
    Ok(())
}

/// Register noise estimation on a scan's channel pipeline.
pub fn estimate_noise_power(mut scan: Scan, options: NoiseEstimateOptions) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| {
            estimate_noise_power_channel(cc, options).map_err(|e| match e {
                NoiseEstimateError::Scan(e) => e,
                other => ScanError::Stage {
                    description: "estimate noise power".to_string(),
                    message: other.to_string(),
                },
            })
        },
        "estimate noise power",
    );
    scan
}

/// Register noise estimation on every scan of a target.
pub fn estimate_noise_power_target(
    mut target: ObservationTarget,
    options: NoiseEstimateOptions,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| estimate_noise_power(scan, options))
        .collect();
    target
}

/// Register noise estimation on every scan of a cadence.
pub fn estimate_noise_power_cadence(
    mut cadence: Cadence,
    options: NoiseEstimateOptions,
) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| estimate_noise_power_target(target, options))
        .collect();
    cadence
}
