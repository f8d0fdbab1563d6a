// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hit detection by local maxima: a cell is a detection when it clears the
//! SNR threshold and dominates its L1 neighbourhood.

use rayon::prelude::*;

use super::neighbourhood_offsets;
use super::protohit::{FreqDriftCoord, Protohit};
use crate::data::{FrequencyDriftPlane, RfiCounts};

/// Scan the plane for cells that exceed `snr_threshold` and are maximal
/// within an L1 ball of radius `neighbor_l1_dist`. Rows are independent and
/// scanned in parallel.
///
/// Ties go to the lexicographically lower `(drift, frequency)` cell, so two
/// equal neighbours produce one detection, not zero or two.
pub(super) fn find_local_maxima_above_threshold(
    drift_plane: &FrequencyDriftPlane,
    noise_floor: f64,
    noise_per_drift: &[f64],
    snr_threshold: f64,
    neighbor_l1_dist: i64,
) -> Vec<Protohit> {
    let plane = drift_plane.plane();
    let (num_drifts, num_channels) = plane.dim();
    let offsets = neighbourhood_offsets(neighbor_l1_dist);
    let rfi = drift_plane.integrated_rfi();

    (0..num_drifts)
        .into_par_iter()
        .flat_map_iter(|drift_index| {
            let sigma = noise_per_drift[drift_index];
            let offsets = &offsets;
            (0..num_channels).filter_map(move |frequency_channel| {
                let power = plane[[drift_index, frequency_channel]] as f64;
                let snr = (power - noise_floor) / sigma;
                if snr < snr_threshold {
                    return None;
                }

                for &(dk, df) in offsets {
                    let k = drift_index as i64 + dk;
                    let f = frequency_channel as i64 + df;
                    if k < 0 || k >= num_drifts as i64 || f < 0 || f >= num_channels as i64 {
                        continue;
                    }
                    let neighbour = plane[[k as usize, f as usize]] as f64;
                    let lex_lower = (k, f) < (drift_index as i64, frequency_channel as i64);
                    if neighbour > power || (neighbour == power && lex_lower) {
                        return None;
                    }
                }

                let coord = FreqDriftCoord {
                    drift_index: drift_index as i64,
                    frequency_channel: frequency_channel as i64,
                };
                Some(Protohit {
                    index_max: coord,
                    index_center: coord,
                    snr,
                    max_integration: power,
                    desmeared_noise: sigma,
                    binwidth: 1,
                    locations: vec![coord],
                    rfi_counts: RfiCounts {
                        low_spectral_kurtosis: rfi.low_spectral_kurtosis
                            [[drift_index, frequency_channel]],
                        high_spectral_kurtosis: rfi.high_spectral_kurtosis
                            [[drift_index, frequency_channel]],
                        sigma_clip: rfi.sigma_clip[[drift_index, frequency_channel]],
                    },
                })
            })
        })
        .collect()
}
