// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Signal conditioning applied before the search: DC-spike excision,
//! passband equalisation and normalisation.

mod error;
#[cfg(test)]
mod tests;

pub use error::PreprocessError;

use ndarray::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::data::{Cadence, CoarseChannel, ObservationTarget, Scan, ScanError};

/// Replace the central (DC) bin of the channel with the mean of its two
/// neighbours. The channeliser leaks local-oscillator power into this bin,
/// which otherwise triggers false zero-drift detections.
pub fn excise_dc_channel(cc: &mut CoarseChannel) -> Result<(), PreprocessError> {
    let nchans = cc.nchans();
    if nchans <= 2 {
        return Err(PreprocessError::ChannelTooNarrow { nchans });
    }

    let mut data = cc.data()?;
    let dc_bin = (data.shape()[1] / 2) as usize;
    let replacement = (&data.slice(s![.., dc_bin - 1]) + &data.slice(s![.., dc_bin + 1])) / 2.0;
    data.slice_mut(s![.., dc_bin]).assign(&replacement);
    cc.set_data(data);
    Ok(())
}

/// Register DC excision on a scan's channel pipeline.
pub fn excise_dc(mut scan: Scan) -> Scan {
    scan.add_coarse_channel_transform(
        |cc| {
            excise_dc_channel(cc).map_err(|e| match e {
                PreprocessError::Scan(e) => e,
                other => ScanError::Stage {
                    description: "excise dc".to_string(),
                    message: other.to_string(),
                },
            })
        },
        "excise dc",
    );
    scan
}

pub fn excise_dc_target(mut target: ObservationTarget) -> ObservationTarget {
    target.scans = target.scans.into_iter().map(excise_dc).collect();
    target
}

pub fn excise_dc_cadence(mut cadence: Cadence) -> Cadence {
    cadence.targets = cadence.targets.into_iter().map(excise_dc_target).collect();
    cadence
}

/// Rescale the channel so its maximum sample is 1.0.
pub fn normalize_channel(cc: &mut CoarseChannel) -> Result<(), PreprocessError> {
    let mut data = cc.data()?;
    let max = data.iter().copied().fold(f32::MIN, f32::max);
    if max.is_finite() && max != 0.0 {
        data.mapv_inplace(|x| x / max);
        cc.set_data(data);
    }
    Ok(())
}

/// Register normalisation on a scan's channel pipeline.
pub fn normalize(mut scan: Scan) -> Scan {
    scan.add_coarse_channel_transform(
        |cc| {
            normalize_channel(cc).map_err(|e| match e {
                PreprocessError::Scan(e) => e,
                other => ScanError::Stage {
                    description: "normalize".to_string(),
                    message: other.to_string(),
                },
            })
        },
        "normalize",
    );
    scan
}

pub fn normalize_target(mut target: ObservationTarget) -> ObservationTarget {
    target.scans = target.scans.into_iter().map(normalize).collect();
    target
}

pub fn normalize_cadence(mut cadence: Cadence) -> Cadence {
    cadence.targets = cadence.targets.into_iter().map(normalize_target).collect();
    cadence
}

/// Window functions available to [`firdes`].
fn window_coefficient(window: &str, n: usize, num_taps: usize) -> Result<f64, PreprocessError> {
    let x = 2.0 * std::f64::consts::PI * n as f64 / (num_taps - 1) as f64;
    match window {
        "hamming" => Ok(0.54 - 0.46 * x.cos()),
        "hann" => Ok(0.5 - 0.5 * x.cos()),
        "boxcar" => Ok(1.0),
        other => Err(PreprocessError::UnknownWindow(other.to_string())),
    }
}

/// Design a lowpass FIR filter by the window method.
///
/// `fc` is the cutoff in cycles per sample (0 to 0.5). The taps are
/// normalised to unit DC gain.
pub fn firdes(num_taps: usize, fc: f64, window: &str) -> Result<Array1<f64>, PreprocessError> {
    let centre = (num_taps - 1) as f64 / 2.0;
    let mut taps = Array1::zeros(num_taps);
    for n in 0..num_taps {
        let x = n as f64 - centre;
        let sinc = if x == 0.0 {
            2.0 * fc
        } else {
            (2.0 * std::f64::consts::PI * fc * x).sin() / (std::f64::consts::PI * x)
        };
        taps[n] = sinc * window_coefficient(window, n, num_taps)?;
    }
    let gain: f64 = taps.sum();
    taps.mapv_inplace(|t| t / gain);
    Ok(taps)
}

/// The magnitude-squared frequency response of one polyphase-filterbank
/// coarse channel, sampled at its `fine_per_coarse` fine channels and
/// normalised to a peak of 1.
///
/// This is the canonical correction array for
/// [`equalize_passband_filter_channel`] when no measured response is
/// available.
pub fn gen_coarse_channel_response(
    fine_per_coarse: usize,
    num_coarse_channels: usize,
    taps_per_channel: usize,
    window: &str,
) -> Result<Array1<f32>, PreprocessError> {
    let prototype = firdes(
        num_coarse_channels * taps_per_channel,
        1.0 / (2.0 * num_coarse_channels as f64),
        window,
    )?;

    // Evaluate the prototype's response on the full fine-channel grid, then
    // keep the one channel centred on DC.
    let fft_len = fine_per_coarse * num_coarse_channels;
    let mut buffer: Vec<Complex<f64>> = prototype
        .iter()
        .map(|&t| Complex::new(t, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();
    FftPlanner::new().plan_fft_forward(fft_len).process(&mut buffer);

    let half = fine_per_coarse / 2;
    let mut response = Array1::zeros(fine_per_coarse);
    for (k, value) in response.iter_mut().enumerate() {
        // Bins [-half, half) of the FFT, in fftshift order.
        let bin = (fft_len + k - half) % fft_len;
        *value = buffer[bin].norm_sqr() as f32;
    }

    let peak = response.iter().copied().fold(f32::MIN, f32::max);
    if peak > 0.0 {
        response.mapv_inplace(|r| r / peak);
    }
    Ok(response)
}

/// Heuristic sanity checks on an equalisation response.
fn validate_response(response: ArrayView1<f32>) -> Result<(), PreprocessError> {
    if let Some(bad) = response.iter().find(|r| !r.is_finite()) {
        return Err(PreprocessError::InvalidResponse(format!(
            "response contains a non-finite value ({bad})"
        )));
    }
    if response.iter().any(|&r| r <= 0.0) {
        return Err(PreprocessError::InvalidResponse(
            "response must be strictly positive everywhere".to_string(),
        ));
    }
    Ok(())
}

/// Flatten the channel by dividing out the static passband response of the
/// upstream channeliser.
pub fn equalize_passband_filter_channel(
    cc: &mut CoarseChannel,
    response: &Array1<f32>,
    validate: bool,
) -> Result<(), PreprocessError> {
    if response.len() as i64 != cc.nchans() {
        return Err(PreprocessError::ResponseShapeMismatch {
            response: response.len(),
            nchans: cc.nchans(),
        });
    }
    if validate {
        validate_response(response.view())?;
    }

    let mut data = cc.data()?;
    for mut spectrum in data.axis_iter_mut(Axis(0)) {
        spectrum /= &response.view();
    }
    cc.set_data(data);
    Ok(())
}

/// Register passband equalisation on a scan's channel pipeline.
pub fn equalize_passband_filter(mut scan: Scan, response: Array1<f32>, validate: bool) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| {
            equalize_passband_filter_channel(cc, &response, validate).map_err(|e| match e {
                PreprocessError::Scan(e) => e,
                other => ScanError::Stage {
                    description: "equalize passband filter".to_string(),
                    message: other.to_string(),
                },
            })
        },
        "equalize passband filter",
    );
    scan
}

pub fn equalize_passband_filter_target(
    mut target: ObservationTarget,
    response: Array1<f32>,
    validate: bool,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| equalize_passband_filter(scan, response.clone(), validate))
        .collect();
    target
}

pub fn equalize_passband_filter_cadence(
    mut cadence: Cadence,
    response: Array1<f32>,
    validate: bool,
) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| equalize_passband_filter_target(target, response.clone(), validate))
        .collect();
    cadence
}
