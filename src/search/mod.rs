// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hit detection: find peaks in the integrated drift plane and characterise
//! them in physical units.

mod connected_components;
mod error;
mod filter;
mod local_maxima;
mod protohit;

pub use error::HitSearchError;
pub use filter::{
    filter_hits, filter_hits_cadence, filter_hits_channel, filter_hits_scan, filter_hits_target,
    FilterOptions,
};
pub use protohit::{FreqDriftCoord, Protohit};

use itertools::Itertools;

use crate::constants::SECONDS_PER_DAY;
use crate::data::{
    Cadence, CoarseChannel, FrequencyDriftPlane, Hit, ObservationTarget, Scan, ScanMetadata,
};
use crate::noise::NoiseStats;

/// The detection algorithm to run over the drift plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HitSearchMethod {
    /// Group adjacent above-threshold cells into one hit each. Better for
    /// signals spread over several cells.
    #[default]
    ConnectedComponents,

    /// Report isolated peaks. Cheaper, good for sharp signals.
    LocalMaxima,
}

/// Configuration for the hit search.
#[derive(Debug, Clone, Copy)]
pub struct HitSearchOptions {
    pub method: HitSearchMethod,

    /// A cell must have `(power - noise_floor) / sigma` at least this large
    /// to be a detection.
    pub snr_threshold: f64,

    /// The L1 radius defining a cell's neighbourhood, for both maxima
    /// domination and component connectivity.
    pub neighbor_l1_dist: i64,

    /// Drop each connected component's cell list once the component has
    /// been characterised, keeping only the summarised detection. Set
    /// false to retain the cells for inspection.
    pub detach_graph: bool,
}

impl Default for HitSearchOptions {
    fn default() -> HitSearchOptions {
        HitSearchOptions {
            method: HitSearchMethod::default(),
            snr_threshold: 10.0,
            neighbor_l1_dist: 7,
            detach_graph: true,
        }
    }
}

/// Every `(dk, df)` offset with `0 < |dk| + |df| <= radius`.
pub(crate) fn neighbourhood_offsets(radius: i64) -> Vec<(i64, i64)> {
    (-radius..=radius)
        .cartesian_product(-radius..=radius)
        .filter(|&(dk, df)| (dk != 0 || df != 0) && dk.abs() + df.abs() <= radius)
        .collect()
}

/// The noise standard deviation for each drift row: integrating
/// `desmear · ntsteps` independent samples scales the deviation by the
/// square root of the count.
fn noise_per_drift(plane: &FrequencyDriftPlane, noise_estimate: NoiseStats) -> Vec<f64> {
    let integration_steps = plane.integration_steps() as f64;
    plane
        .drift_rate_info()
        .iter()
        .map(|rate| {
            noise_estimate.noise_amplitude() * (rate.desmear_bins as f64 * integration_steps).sqrt()
        })
        .collect()
}

/// Run the configured detection algorithm over a drift plane, yielding raw
/// grid-space detections.
pub fn protohit_search(
    drift_plane: &FrequencyDriftPlane,
    noise_estimate: NoiseStats,
    options: &HitSearchOptions,
) -> Vec<Protohit> {
    let noise_per_drift = noise_per_drift(drift_plane, noise_estimate);
    match options.method {
        HitSearchMethod::LocalMaxima => local_maxima::find_local_maxima_above_threshold(
            drift_plane,
            noise_estimate.noise_floor(),
            &noise_per_drift,
            options.snr_threshold,
            options.neighbor_l1_dist,
        ),
        HitSearchMethod::ConnectedComponents => {
            connected_components::find_components_above_threshold(
                drift_plane,
                noise_estimate.noise_floor(),
                &noise_per_drift,
                options.snr_threshold,
                options.neighbor_l1_dist,
                options.detach_graph,
            )
        }
    }
}

/// Convert grid-space detections to physically characterised hits.
fn hits_from_protohits(
    protohits: Vec<Protohit>,
    drift_plane: &FrequencyDriftPlane,
    noise_estimate: NoiseStats,
    meta: &ScanMetadata,
    coarse_channel_number: i64,
) -> Vec<Hit> {
    let integration_steps = drift_plane.integration_steps();
    let drift_rate_info = drift_plane.drift_rate_info();
    let channel_bandwidth_hz = (meta.foff * 1e6).abs();
    let start_time_sec = meta.tstart * SECONDS_PER_DAY;
    let duration_sec = meta.tsamp * integration_steps as f64;

    protohits
        .into_iter()
        .map(|p| {
            let rate = &drift_rate_info[p.index_max.drift_index as usize];
            let signal_power = p.max_integration - noise_estimate.noise_floor();
            Hit {
                start_freq_index: p.index_max.frequency_channel,
                // The centroid gives a finer frequency estimate than the
                // peak cell.
                start_freq_mhz: meta.fch1 + meta.foff * p.index_center.frequency_channel as f64,
                start_time_sec,
                duration_sec,
                rate_index: p.index_max.drift_index,
                drift_rate_hz_per_sec: rate.rate_hz_per_sec,
                power: signal_power,
                time_span_steps: integration_steps,
                integrated_channels: rate.desmear_bins as i64 * integration_steps,
                snr: signal_power / p.desmeared_noise,
                bandwidth_hz: p.binwidth as f64 * channel_bandwidth_hz,
                binwidth: p.binwidth,
                rfi_counts: p.rfi_counts,
                coarse_channel_number,
            }
        })
        .collect()
}

/// Search one dedrifted coarse channel for hits, returning them in physical
/// units. Requires a noise estimate and a drift plane (or its producer) on
/// the channel.
pub fn hit_search_channel(
    cc: &mut CoarseChannel,
    options: &HitSearchOptions,
) -> Result<Vec<Hit>, HitSearchError> {
    let noise_estimate = cc.noise_estimate()?;
    let drift_plane = cc.integrated_drift_plane()?;
    let protohits = protohit_search(&drift_plane, noise_estimate, options);
    Ok(hits_from_protohits(
        protohits,
        &drift_plane,
        noise_estimate,
        cc.metadata(),
        cc.coarse_channel_number,
    ))
}

/// Register the hit search on a scan's channel pipeline. The protohit scan
/// itself is deferred until the channel's hits are first read.
pub fn hit_search(mut scan: Scan, options: HitSearchOptions) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| {
            let noise_estimate = cc.noise_estimate()?;
            let drift_plane = cc.integrated_drift_plane()?;
            let meta = cc.metadata().clone();
            let coarse_channel_number = cc.coarse_channel_number;
            cc.set_hits_producer(Box::new(move || {
                let protohits = protohit_search(&drift_plane, noise_estimate, &options);
                Ok(hits_from_protohits(
                    protohits,
                    &drift_plane,
                    noise_estimate,
                    &meta,
                    coarse_channel_number,
                ))
            }));
            Ok(())
        },
        "hit search",
    );
    scan
}

pub fn hit_search_target(
    mut target: ObservationTarget,
    options: HitSearchOptions,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| hit_search(scan, options))
        .collect();
    target
}

pub fn hit_search_cadence(mut cadence: Cadence, options: HitSearchOptions) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| hit_search_target(target, options))
        .collect();
    cadence
}
