// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hit detection by connected components: group every cell above the SNR
//! threshold with its neighbours and emit one detection per group. More
//! robust than local maxima for signals spread over several cells.

use ndarray::Array2;

use super::neighbourhood_offsets;
use super::protohit::{FreqDriftCoord, Protohit};
use crate::data::{FrequencyDriftPlane, RfiCounts};

/// Threshold the plane and group connected cells, where connectivity is an
/// L1 ball of radius `neighbor_l1_dist`.
///
/// Each component's peak is its highest-power cell (ties to the
/// lexicographically lower coordinate), its centre the power-weighted
/// centroid, and its RFI totals the sum of the flag counters over all of
/// its cells. With `detach_graph` set, the component's cell list is
/// dropped after characterisation and each protohit carries only that
/// summary.
pub(super) fn find_components_above_threshold(
    drift_plane: &FrequencyDriftPlane,
    noise_floor: f64,
    noise_per_drift: &[f64],
    snr_threshold: f64,
    neighbor_l1_dist: i64,
    detach_graph: bool,
) -> Vec<Protohit> {
    let plane = drift_plane.plane();
    let (num_drifts, num_channels) = plane.dim();
    let offsets = neighbourhood_offsets(neighbor_l1_dist);
    let rfi = drift_plane.integrated_rfi();

    let above = |k: usize, f: usize| {
        (plane[[k, f]] as f64 - noise_floor) / noise_per_drift[k] >= snr_threshold
    };

    let mut visited = Array2::<bool>::default((num_drifts, num_channels));
    let mut protohits = vec![];

    for drift_index in 0..num_drifts {
        for frequency_channel in 0..num_channels {
            if visited[[drift_index, frequency_channel]] || !above(drift_index, frequency_channel)
            {
                continue;
            }

            // Flood-fill the component from this seed.
            let mut locations = vec![];
            let mut stack = vec![(drift_index, frequency_channel)];
            visited[[drift_index, frequency_channel]] = true;
            while let Some((k, f)) = stack.pop() {
                locations.push(FreqDriftCoord {
                    drift_index: k as i64,
                    frequency_channel: f as i64,
                });
                for &(dk, df) in &offsets {
                    let (nk, nf) = (k as i64 + dk, f as i64 + df);
                    if nk < 0 || nk >= num_drifts as i64 || nf < 0 || nf >= num_channels as i64 {
                        continue;
                    }
                    let (nk, nf) = (nk as usize, nf as usize);
                    if !visited[[nk, nf]] && above(nk, nf) {
                        visited[[nk, nf]] = true;
                        stack.push((nk, nf));
                    }
                }
            }

            protohits.push(characterise_component(
                drift_plane,
                noise_floor,
                noise_per_drift,
                locations,
                rfi,
                detach_graph,
            ));
        }
    }
    protohits
}

fn characterise_component(
    drift_plane: &FrequencyDriftPlane,
    noise_floor: f64,
    noise_per_drift: &[f64],
    mut locations: Vec<FreqDriftCoord>,
    rfi: &crate::data::IntegratedFlags,
    detach_graph: bool,
) -> Protohit {
    let plane = drift_plane.plane();

    // A deterministic scan order makes the lexicographic tie-break
    // reproducible regardless of fill order.
    locations.sort_unstable();

    let mut index_max = locations[0];
    let mut max_integration = f64::MIN;
    let mut weighted_drift = 0.0;
    let mut weighted_freq = 0.0;
    let mut total_weight = 0.0;
    let (mut min_freq, mut max_freq) = (i64::MAX, i64::MIN);
    let mut rfi_counts = RfiCounts::default();

    for &coord in &locations {
        let cell = [coord.drift_index as usize, coord.frequency_channel as usize];
        let power = plane[cell] as f64;
        if power > max_integration {
            max_integration = power;
            index_max = coord;
        }

        let weight = power - noise_floor;
        weighted_drift += weight * coord.drift_index as f64;
        weighted_freq += weight * coord.frequency_channel as f64;
        total_weight += weight;

        min_freq = min_freq.min(coord.frequency_channel);
        max_freq = max_freq.max(coord.frequency_channel);

        rfi_counts.low_spectral_kurtosis = rfi_counts
            .low_spectral_kurtosis
            .saturating_add(rfi.low_spectral_kurtosis[cell]);
        rfi_counts.high_spectral_kurtosis = rfi_counts
            .high_spectral_kurtosis
            .saturating_add(rfi.high_spectral_kurtosis[cell]);
        rfi_counts.sigma_clip = rfi_counts.sigma_clip.saturating_add(rfi.sigma_clip[cell]);
    }

    let index_center = if total_weight > 0.0 {
        FreqDriftCoord {
            drift_index: (weighted_drift / total_weight).round() as i64,
            frequency_channel: (weighted_freq / total_weight).round() as i64,
        }
    } else {
        index_max
    };

    if detach_graph {
        locations.clear();
    }

    let desmeared_noise = noise_per_drift[index_max.drift_index as usize];
    Protohit {
        index_max,
        index_center,
        snr: (max_integration - noise_floor) / desmeared_noise,
        max_integration,
        desmeared_noise,
        binwidth: max_freq - min_freq + 1,
        locations,
        rfi_counts,
    }
}
