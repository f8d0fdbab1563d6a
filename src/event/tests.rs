// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;

use super::*;
use crate::data::{Cadence, CoarseChannel, Hit, ObservationTarget, RfiCounts, Scan, ScanMetadata};

const SCAN_SPACING_SEC: f64 = 300.0;
const BASE_MJD: f64 = 60000.0;

fn scan_with_hits(source_name: &str, scan_index: usize, hits: Vec<Hit>) -> Scan {
    let tstart = BASE_MJD + scan_index as f64 * SCAN_SPACING_SEC / 86400.0;
    let meta = ScanMetadata {
        fch1: 1000.0,
        foff: -1e-6,
        tsamp: 16.0,
        tstart,
        source_name: source_name.to_string(),
        nchans: 64,
        nifs: 1,
        ntsteps: 16,
        ..ScanMetadata::default()
    };
    let mut cc = CoarseChannel::from_metadata(meta, 0);
    cc.set_hits(hits);
    Scan::from_channels(BTreeMap::from([(0, cc)])).unwrap()
}

/// A hit on the trajectory `f(t) = f0 + drift (t - t_base)`, observed in
/// the scan at `scan_index`.
fn tone_hit(f0_mhz: f64, drift_hz_per_sec: f64, scan_index: usize) -> Hit {
    let start_time_sec = BASE_MJD * 86400.0 + scan_index as f64 * SCAN_SPACING_SEC;
    let elapsed = scan_index as f64 * SCAN_SPACING_SEC;
    Hit {
        start_freq_index: 500,
        start_freq_mhz: f0_mhz + drift_hz_per_sec * elapsed / 1e6,
        start_time_sec,
        duration_sec: 256.0,
        rate_index: 20,
        drift_rate_hz_per_sec: drift_hz_per_sec,
        power: 100.0,
        time_span_steps: 16,
        integrated_channels: 16,
        snr: 20.0,
        bandwidth_hz: 1.0,
        binwidth: 1,
        rfi_counts: RfiCounts::default(),
        coarse_channel_number: 0,
    }
}

/// An ABACAD cadence; `off_tone_in` optionally plants the same tone in one
/// of the OFF targets ("B", "C" or "D").
fn abacad(tone_scans: &[usize], off_tone_in: Option<&str>) -> Cadence {
    let on = ObservationTarget::new(
        [0, 2, 4]
            .iter()
            .enumerate()
            .map(|(nth, &scan_index)| {
                let hits = if tone_scans.contains(&nth) {
                    vec![tone_hit(1000.0002, 0.1, scan_index)]
                } else {
                    vec![]
                };
                scan_with_hits("A", scan_index, hits)
            })
            .collect(),
    );

    let offs = ["B", "C", "D"].iter().zip([1usize, 3, 5]).map(|(name, scan_index)| {
        let hits = if off_tone_in == Some(*name) {
            vec![tone_hit(1000.0002, 0.1, scan_index)]
        } else {
            vec![]
        };
        ObservationTarget::new(vec![scan_with_hits(name, scan_index, hits)])
    });

    let mut targets = vec![on];
    targets.extend(offs);
    Cadence::new(targets)
}

#[test]
fn distance_between_a_hit_and_itself_is_zero() {
    let hit = tone_hit(1000.0002, 0.1, 0);
    assert_abs_diff_eq!(distance_func(&hit, &hit), 0.0);
}

#[test]
fn distance_follows_the_drift_trajectory_across_scans() {
    // The same emitter seen two scans apart projects to the same
    // rendezvous frequency, so only the (zero) drift mismatch contributes.
    let first = tone_hit(1000.0002, 0.1, 0);
    let second = tone_hit(1000.0002, 0.1, 2);
    assert!(distance_func(&first, &second) < 1.0);

    // A tone 10 kHz away is nowhere near the trajectory.
    let elsewhere = tone_hit(1000.0102, 0.1, 2);
    assert!(distance_func(&first, &elsewhere) > EVENT_DISTANCE_THRESHOLD);
}

#[test]
fn cadence_with_tone_in_all_on_scans_yields_one_event() {
    let mut cadence = abacad(&[0, 1, 2], None);
    let events = event_search(&mut cadence).unwrap();

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.hits.len(), 3);
    assert_abs_diff_eq!(event.average_drift_rate_hz_per_sec, 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(event.average_snr, 20.0);
    assert_abs_diff_eq!(event.starting_frequency_hz, 1000.0002 * 1e6, epsilon = 1e-3);
    // Bounds cover the first through last contributing scan.
    assert_abs_diff_eq!(event.event_start_seconds, BASE_MJD * 86400.0);
    assert_abs_diff_eq!(
        event.event_end_seconds,
        BASE_MJD * 86400.0 + 4.0 * SCAN_SPACING_SEC + 256.0
    );
}

#[test]
fn tone_also_present_in_an_off_scan_is_rejected() {
    for off in ["B", "C", "D"] {
        let mut cadence = abacad(&[0, 1, 2], Some(off));
        let events = event_search(&mut cadence).unwrap();
        assert!(events.is_empty(), "tone in {off} should kill the event");
    }
}

#[test]
fn single_scan_detections_do_not_form_events() {
    let mut cadence = abacad(&[1], None);
    assert!(event_search(&mut cadence).unwrap().is_empty());
}

#[test]
fn empty_cadence_yields_no_events() {
    let mut cadence = Cadence::default();
    assert!(event_search(&mut cadence).unwrap().is_empty());
}

#[test]
fn removing_off_scans_never_decreases_the_event_count() {
    let mut with_off_tone = abacad(&[0, 1, 2], Some("C"));
    let baseline = event_search(&mut with_off_tone).unwrap().len();

    let mut without_offs = abacad(&[0, 1, 2], Some("C"));
    without_offs.targets.truncate(1);
    let no_offs = event_search(&mut without_offs).unwrap().len();

    assert!(no_offs >= baseline);
    assert_eq!(no_offs, 1);
}

#[test]
fn removing_an_on_scan_never_increases_the_event_count() {
    let mut full = abacad(&[0, 1, 2], None);
    let baseline = event_search(&mut full).unwrap().len();

    let mut truncated = abacad(&[0, 1, 2], None);
    truncated.targets[0].scans.remove(2);
    let fewer_on = event_search(&mut truncated).unwrap().len();

    assert!(fewer_on <= baseline);
    // The two remaining matching scans still form the event.
    assert_eq!(fewer_on, 1);
}
