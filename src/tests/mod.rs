// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Full-pipeline tests: synthetic waterfalls through preprocessing, noise
//! estimation, drift integration, hit search and event search.

use std::sync::Arc;

use ndarray::prelude::*;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::{Cadence, ObservationTarget, Scan, ScanMetadata};
use crate::drift::{integrate_drifts, IntegrateDriftsOptions};
use crate::event::event_search;
use crate::noise::{estimate_noise_power, NoiseEstimateOptions};
use crate::search::{hit_search, HitSearchOptions};
use crate::source::MemorySource;

const NCHANS: usize = 1024;
const NTSTEPS: usize = 16;

fn metadata(tstart: f64) -> ScanMetadata {
    ScanMetadata {
        fch1: 1420.0,
        foff: -1e-6,
        tsamp: 1.0,
        tstart,
        source_name: "GJ-1002".to_string(),
        nifs: 1,
        ..ScanMetadata::default()
    }
}

/// Gaussian noise with an optional tone of the given amplitude injected at
/// `bin`, drifting `span` bins over the scan.
fn waterfall(seed: u64, tone: Option<(usize, i64, f32)>) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Array3::<f32>::zeros((NTSTEPS, 1, NCHANS));
    data.slice_mut(s![.., 0, ..]).assign(&Array2::random_using(
        (NTSTEPS, NCHANS),
        Normal::new(0.0, 1.0).unwrap(),
        &mut rng,
    ));
    if let Some((bin, span, amplitude)) = tone {
        for t in 0..NTSTEPS {
            let drifted = bin as i64
                + (span as f64 * t as f64 / (NTSTEPS - 1) as f64).round_ties_even() as i64;
            data[[t, 0, drifted as usize]] += amplitude;
        }
    }
    data
}

/// Wire the standard search pipeline onto a scan: noise estimate, drift
/// integration over ±1 Hz/s, hit search at SNR 6.
fn searchable_scan(data: Array3<f32>, tstart: f64) -> Scan {
    let source = Arc::new(MemorySource::new(data, metadata(tstart), "mem://synthetic"));
    let scan = Scan::new(source, NCHANS as i64).unwrap();
    let scan = estimate_noise_power(scan, NoiseEstimateOptions::default());
    let scan = integrate_drifts(
        scan,
        IntegrateDriftsOptions {
            low_rate_hz_per_sec: -1.0,
            high_rate_hz_per_sec: 1.0,
            ..IntegrateDriftsOptions::default()
        },
    );
    hit_search(
        scan,
        HitSearchOptions {
            snr_threshold: 6.0,
            ..HitSearchOptions::default()
        },
    )
}

#[test]
fn static_tone_is_recovered_at_its_bin_with_zero_drift() {
    let mut scan = searchable_scan(waterfall(0x0001, Some((500, 0, 10.0))), 60000.0);
    let hits = scan.hits().unwrap();

    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert_eq!(hit.start_freq_index, 500);
    // Less than one bin per step; for a static tone, effectively zero.
    assert!(hit.drift_rate_hz_per_sec.abs() < 0.07);
    assert!(hit.snr > 6.0);
    assert_eq!(hit.time_span_steps, NTSTEPS as i64);
}

#[test]
fn drifting_tone_is_recovered_at_its_span() {
    // The tone crosses exactly 3 bins over the 16 steps.
    let mut scan = searchable_scan(waterfall(0x0002, Some((500, 3, 10.0))), 60000.0);
    let hits = scan.hits().unwrap();
    assert_eq!(hits.len(), 1);
    let hit = hits[0].clone();

    let cc = scan.read_coarse_channel(0).unwrap();
    let plane = cc.integrated_drift_plane().unwrap();
    let matched_rate = &plane.drift_rate_info()[hit.rate_index as usize];
    assert_eq!(matched_rate.channel_span, 3);
    assert_eq!(hit.start_freq_index, 500);
}

#[test]
fn abacad_cadence_keeps_the_on_tone_and_rejects_off_contamination() {
    let day_step = 300.0 / 86400.0;
    let tone = Some((100, 0, 10.0));

    let build = |contaminate_b: bool| {
        let on = ObservationTarget::new(vec![
            searchable_scan(waterfall(0xa1, tone), 60000.0),
            searchable_scan(waterfall(0xa2, tone), 60000.0 + 2.0 * day_step),
            searchable_scan(waterfall(0xa3, tone), 60000.0 + 4.0 * day_step),
        ]);
        let b_tone = if contaminate_b { tone } else { None };
        let off_b = ObservationTarget::new(vec![searchable_scan(
            waterfall(0xb1, b_tone),
            60000.0 + day_step,
        )]);
        let off_c = ObservationTarget::new(vec![searchable_scan(
            waterfall(0xc1, None),
            60000.0 + 3.0 * day_step,
        )]);
        let off_d = ObservationTarget::new(vec![searchable_scan(
            waterfall(0xd1, None),
            60000.0 + 5.0 * day_step,
        )]);
        Cadence::new(vec![on, off_b, off_c, off_d])
    };

    let mut clean = build(false);
    let events = event_search(&mut clean).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].hits.len(), 3);
    for hit in &events[0].hits {
        assert_eq!(hit.start_freq_index, 100);
    }

    let mut contaminated = build(true);
    assert!(event_search(&mut contaminated).unwrap().is_empty());
}
