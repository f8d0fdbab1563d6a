// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-scan event detection: track a hit's trajectory through the ON
//! scans of a cadence and reject it if it also shows up when the telescope
//! was pointed away.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use log::{info, warn};

use crate::constants::SECONDS_PER_DAY;
use crate::data::{Cadence, Event, Hit, ScanError};

// Tuning of the hit-to-hit distance metric.
const FREQ_LOCALIZATION_WEIGHT: f64 = 0.01;
const DRIFT_ERROR_WEIGHT: f64 = 10.0;
const SNR_DIFFERENCE_WEIGHT: f64 = 0.0;
const EPS: f64 = 1e-8;

/// Two hits closer than this are considered the same signal.
const EVENT_DISTANCE_THRESHOLD: f64 = 50.0;

/// How dissimilar two hits are (0 = a perfect match).
///
/// Both hits are projected along their drift to the midpoint of the
/// combined time interval; the metric mixes the frequency mismatch there
/// with a normalised drift-rate mismatch.
fn distance_func(a: &Hit, b: &Hit) -> f64 {
    let snr_difference = (a.snr - b.snr).abs();

    let drift_difference = (a.drift_rate_hz_per_sec - b.drift_rate_hz_per_sec).powi(2)
        / (EPS + a.drift_rate_hz_per_sec.powi(2) + b.drift_rate_hz_per_sec.powi(2));
    let drift_error = drift_difference * drift_difference;

    let first_sample_time = a.start_time_sec.min(b.start_time_sec);
    let last_sample_time = (a.start_time_sec + a.duration_sec).max(b.start_time_sec + b.duration_sec);
    let rendezvous_time = (first_sample_time + last_sample_time) / 2.0;

    // f(t) = f0 + drift * (t - t0), in Hz.
    let a_rendezvous_frequency = a.start_freq_mhz * 1e6
        + a.drift_rate_hz_per_sec * (rendezvous_time - a.start_time_sec);
    let b_rendezvous_frequency = b.start_freq_mhz * 1e6
        + b.drift_rate_hz_per_sec * (rendezvous_time - b.start_time_sec);
    let rendezvous_frequency_difference = (a_rendezvous_frequency - b_rendezvous_frequency).abs();

    FREQ_LOCALIZATION_WEIGHT * rendezvous_frequency_difference
        + DRIFT_ERROR_WEIGHT * drift_error
        + SNR_DIFFERENCE_WEIGHT * snr_difference
}

/// A hit with its identity within one event-search invocation; identities
/// key the distance cache.
type TaggedHit = (usize, Hit);

/// Memoises [`distance_func`] by unordered pair of hit identities. One
/// cache lives for exactly one `event_search` call.
#[derive(Default)]
struct HitDistance {
    cache: HashMap<(usize, usize), f64>,
}

impl HitDistance {
    fn distance(&mut self, a: &TaggedHit, b: &TaggedHit) -> f64 {
        let key = (a.0.min(b.0), a.0.max(b.0));
        *self
            .cache
            .entry(key)
            .or_insert_with(|| distance_func(&a.1, &b.1))
    }
}

/// The smallest distance from `candidate` to any hit already in the event.
fn distance_to_event(
    candidate: &TaggedHit,
    event_hits: &[TaggedHit],
    distances: &mut HitDistance,
) -> f64 {
    event_hits
        .iter()
        .map(|hit| distances.distance(hit, candidate))
        .fold(f64::MAX, f64::min)
}

/// How many OFF-scan hits match this event. A genuine emitter vanishes when
/// the telescope points away, so any match marks the event as local RFI.
fn count_event_in_off_scans(
    event_hits: &[TaggedHit],
    off_hits: &[TaggedHit],
    distances: &mut HitDistance,
) -> usize {
    let mut times_in_off = 0;
    for off_hit in off_hits {
        let total: f64 = event_hits
            .iter()
            .map(|hit| distances.distance(hit, off_hit))
            .sum();
        if total / (event_hits.len() as f64) < EVENT_DISTANCE_THRESHOLD {
            times_in_off += 1;
            info!("Event was found in an off scan");
        }
    }
    times_in_off
}

/// Fill in the event's aggregate properties from its members.
fn finalize_event_averages(event: &mut Event) {
    let num_hits = event.hits.len() as f64;
    event.average_drift_rate_hz_per_sec = event
        .hits
        .iter()
        .map(|h| h.drift_rate_hz_per_sec)
        .sum::<f64>()
        / num_hits;
    event.average_power = event.hits.iter().map(|h| h.power).sum::<f64>() / num_hits;
    event.average_snr = event.hits.iter().map(|h| h.snr).sum::<f64>() / num_hits;
    event.average_bandwidth_hz = event.hits.iter().map(|h| h.bandwidth_hz).sum::<f64>() / num_hits;
    info!(
        "Average SNR of this candidate event is {} and drift is {}",
        event.average_snr, event.average_drift_rate_hz_per_sec
    );
}

/// Search a cadence for signals that persist across its ON scans and vanish
/// in its OFF scans.
///
/// The target at index 0 is the ON pointing. Every hit of every ON scan
/// seeds a candidate trajectory; later ON scans contribute their closest
/// hit (each hit joins at most one event), and the candidate survives only
/// if it matched at least one more scan and no OFF-scan hit.
///
/// An empty cadence yields no events; ON scans without hits are skipped;
/// OFF scans whose hits cannot be collected are treated as having none.
pub fn event_search(cadence: &mut Cadence) -> Result<Vec<Event>, ScanError> {
    if cadence.targets.is_empty() {
        return Ok(vec![]);
    }

    let mut next_id = 0usize;
    let mut tag = |hits: Vec<Hit>| -> Vec<TaggedHit> {
        hits.into_iter()
            .map(|hit| {
                next_id += 1;
                (next_id - 1, hit)
            })
            .collect()
    };

    // Pre-collect the ON pools (hits get removed as they join events) and
    // the per-scan time bounds.
    let mut on_pools: Vec<Vec<TaggedHit>> = vec![];
    let mut on_scan_times: Vec<(f64, f64)> = vec![];
    for scan in &mut cadence.targets[0].scans {
        let start_seconds = scan.tstart() * SECONDS_PER_DAY;
        on_scan_times.push((start_seconds, start_seconds + scan.tduration_secs()));
        on_pools.push(tag(scan.hits()?));
    }

    let mut off_hits: Vec<TaggedHit> = vec![];
    for target in cadence.targets[1..].iter_mut() {
        for scan in &mut target.scans {
            match scan.hits() {
                Ok(hits) => off_hits.extend(tag(hits)),
                Err(e) => {
                    warn!("Could not collect hits from an off scan ({e}); treating it as empty")
                }
            }
        }
    }

    let mut distances = HitDistance::default();
    let mut detected_events = vec![];

    for on_scan_index in 0..on_pools.len() {
        let seeds = on_pools[on_scan_index].clone();
        for seed in seeds {
            let mut event_hits = vec![seed];
            let (mut event_start, mut event_end) = on_scan_times[on_scan_index];

            // Extend the trajectory through the later ON scans.
            for matching_scan_index in on_scan_index + 1..on_pools.len() {
                let pool = &on_pools[matching_scan_index];
                let best = pool
                    .iter()
                    .enumerate()
                    .map(|(position, hit)| {
                        (position, distance_to_event(hit, &event_hits, &mut distances))
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1));

                if let Some((position, best_distance)) = best {
                    if best_distance < EVENT_DISTANCE_THRESHOLD {
                        let matched = on_pools[matching_scan_index].remove(position);
                        event_hits.push(matched);
                        event_start = event_start.min(on_scan_times[matching_scan_index].0);
                        event_end = event_end.max(on_scan_times[matching_scan_index].1);
                    }
                }
            }

            let times_in_off = count_event_in_off_scans(&event_hits, &off_hits, &mut distances);
            if event_hits.len() >= 2 && times_in_off == 0 {
                let mut event = Event {
                    starting_frequency_hz: event_hits[0].1.start_freq_mhz * 1e6,
                    event_start_seconds: event_start,
                    event_end_seconds: event_end,
                    hits: event_hits.into_iter().map(|(_, hit)| hit).collect(),
                    ..Event::default()
                };
                finalize_event_averages(&mut event);
                detected_events.push(event);
            }
        }
    }

    Ok(detected_events)
}
