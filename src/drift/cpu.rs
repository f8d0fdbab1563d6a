// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Scalar drift-integration kernel, parallelised over drift rows.

use ndarray::prelude::*;
use ndarray::Zip;

use super::{trajectory_geometry, DriftError};
use crate::data::{DriftRate, FrequencyDriftPlane, IntegratedFlags};
use crate::flag::FlagValue;

/// Sum power (and count flagged samples) along every linear-rounded
/// trajectory. Each output row is independent, so rows run in parallel.
pub(super) fn integrate_linear_rounded_bins(
    data: ArrayView2<f32>,
    mask: ArrayView2<u8>,
    drifts: Vec<DriftRate>,
) -> Result<FrequencyDriftPlane, DriftError> {
    let (time_steps, num_channels) = data.dim();
    let number_drifts = drifts.len();

    let mut plane = Array2::<f32>::zeros((number_drifts, num_channels));
    let mut low_sk = Array2::<u32>::zeros((number_drifts, num_channels));
    let mut high_sk = Array2::<u32>::zeros((number_drifts, num_channels));
    let mut sigma_clip = Array2::<u32>::zeros((number_drifts, num_channels));

    Zip::indexed(plane.axis_iter_mut(Axis(0)))
        .and(low_sk.axis_iter_mut(Axis(0)))
        .and(high_sk.axis_iter_mut(Axis(0)))
        .and(sigma_clip.axis_iter_mut(Axis(0)))
        .par_for_each(|row_index, mut power, mut low, mut high, mut clip| {
            let rate = &drifts[row_index];
            let geometry = trajectory_geometry(rate, time_steps, num_channels);
            let desmear = rate.desmear_bins as i64;

            for f in geometry.f_lo..geometry.f_hi {
                let mut accumulated = 0.0f32;
                let (mut low_count, mut high_count, mut clip_count) = (0u32, 0u32, 0u32);
                for (t, &offset) in geometry.offsets.iter().enumerate() {
                    for j in 0..desmear {
                        let bin = (f + offset + j * geometry.direction) as usize;
                        accumulated += data[[t, bin]];
                        let flags = mask[[t, bin]];
                        if flags & FlagValue::LowSpectralKurtosis.bit() != 0 {
                            low_count += 1;
                        }
                        if flags & FlagValue::HighSpectralKurtosis.bit() != 0 {
                            high_count += 1;
                        }
                        if flags & FlagValue::SigmaClip.bit() != 0 {
                            clip_count += 1;
                        }
                    }
                }
                let f = f as usize;
                // Dividing by the desmear width keeps a desmeared path's
                // power on the same scale as a single-bin path.
                power[f] = accumulated / desmear as f32;
                low[f] = low_count;
                high[f] = high_count;
                clip[f] = clip_count;
            }
        });

    Ok(FrequencyDriftPlane::new(
        plane.into_shared(),
        IntegratedFlags {
            low_spectral_kurtosis: low_sk.into_shared(),
            high_spectral_kurtosis: high_sk.into_shared(),
            sigma_clip: sigma_clip.into_shared(),
        },
        time_steps as i64,
        drifts,
    ))
}
