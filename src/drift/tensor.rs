// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tensor drift-integration kernel: the same sums as the scalar kernel,
//! expressed as whole-row slice arithmetic. This is the shape a device
//! array library runs, and it cross-checks the scalar kernel in tests.

use ndarray::prelude::*;
use ndarray::Zip;

use super::{trajectory_geometry, DriftError};
use crate::data::{DriftRate, FrequencyDriftPlane, IntegratedFlags};
use crate::flag::FlagValue;

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

    for rate in &drifts {
        let geometry = trajectory_geometry(rate, time_steps, num_channels);
        if geometry.f_lo >= geometry.f_hi {
            continue;
        }
        let row = rate.index_in_plane;
        let desmear = rate.desmear_bins as i64;
        let (f_lo, f_hi) = (geometry.f_lo as usize, geometry.f_hi as usize);

        for (t, &offset) in geometry.offsets.iter().enumerate() {
            for j in 0..desmear {
                let shift = offset + j * geometry.direction;
                let src_lo = (geometry.f_lo + shift) as usize;
                let src_hi = (geometry.f_hi + shift) as usize;

                let spectrum = data.slice(s![t, src_lo..src_hi]);
                let mut power = plane.slice_mut(s![row, f_lo..f_hi]);
                power += &spectrum;

                let flags = mask.slice(s![t, src_lo..src_hi]);
                for (counts, bit) in [
                    (&mut low_sk, FlagValue::LowSpectralKurtosis.bit()),
                    (&mut high_sk, FlagValue::HighSpectralKurtosis.bit()),
                    (&mut sigma_clip, FlagValue::SigmaClip.bit()),
                ] {
                    Zip::from(counts.slice_mut(s![row, f_lo..f_hi]))
                        .and(flags)
                        .for_each(|count, &m| {
                            if m & bit != 0 {
                                *count += 1;
                            }
                        });
                }
            }
        }

        let mut power = plane.slice_mut(s![row, f_lo..f_hi]);
        power /= desmear as f32;
    }

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
