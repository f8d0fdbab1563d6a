// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::*;
use crate::source::MemorySource;

fn source_metadata(fch1: f64, foff: f64) -> ScanMetadata {
    ScanMetadata {
        fch1,
        foff,
        tsamp: 1.0,
        tstart: 60000.0,
        source_name: "TIC-1234".to_string(),
        nifs: 1,
        ..ScanMetadata::default()
    }
}

/// A (4, 1, 32) cube where every sample holds its own fine-channel index.
fn indexed_source() -> Arc<MemorySource> {
    let mut data = Array3::<f32>::zeros((4, 1, 32));
    for t in 0..4 {
        for f in 0..32 {
            data[[t, 0, f]] = f as f32;
        }
    }
    Arc::new(MemorySource::new(
        data,
        source_metadata(1000.0, -1e-6),
        "mem://indexed",
    ))
}

#[test]
fn lazy_cells_run_their_producer_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_producer = Arc::clone(&calls);
    let mut cc = CoarseChannel::with_producers(
        Box::new(move || {
            calls_in_producer.fetch_add(1, Ordering::SeqCst);
            Ok(Array2::<f32>::ones((2, 4)).into_shared())
        }),
        Box::new(|| Ok(Array2::<u8>::zeros((2, 4)).into_shared())),
        ScanMetadata::default(),
        0,
    );

    assert_abs_diff_eq!(cc.data().unwrap()[[0, 0]], 1.0);
    assert_abs_diff_eq!(cc.data().unwrap()[[1, 3]], 1.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unset_cells_report_not_computed() {
    let mut cc = CoarseChannel::from_metadata(ScanMetadata::default(), 0);
    assert!(matches!(cc.data(), Err(ScanError::NotComputed(_))));
    assert!(matches!(cc.hits(), Err(ScanError::NotComputed(_))));
    assert!(matches!(
        cc.integrated_drift_plane(),
        Err(ScanError::NotComputed(_))
    ));
    assert!(matches!(
        cc.noise_estimate(),
        Err(ScanError::NotComputed(_))
    ));
    assert!(!cc.has_hits());
}

#[test]
fn hit_cells_transition_from_producer_to_ready() {
    let mut cc = CoarseChannel::from_metadata(ScanMetadata::default(), 0);
    cc.set_hits_producer(Box::new(|| Ok(vec![])));
    assert!(cc.has_hits());
    assert!(cc.hits().unwrap().is_empty());
    // Still ready on the second read.
    assert!(cc.hits().unwrap().is_empty());
}

#[test]
fn device_strings_parse_and_cuda_is_rejected() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::Cuda(1));
    assert!("tpu".parse::<Device>().is_err());

    let mut cc = CoarseChannel::from_metadata(ScanMetadata::default(), 0);
    assert!(matches!(
        cc.set_device(Device::Cuda(0)),
        Err(ScanError::UnsupportedDevice(_))
    ));
    cc.set_device(Device::Cpu).unwrap();
    cc.push_device().unwrap();
}

#[test]
fn scan_reads_the_right_hyperslab_for_each_coarse_channel() {
    let mut scan = Scan::new(indexed_source(), 8).unwrap();
    assert_eq!(scan.num_coarse_channels(), 4);

    let cc = scan.read_coarse_channel(2).unwrap();
    assert_eq!(cc.coarse_channel_number, 2);
    assert_eq!(cc.nchans(), 8);
    assert_eq!(cc.ntsteps(), 4);
    let data = cc.data().unwrap();
    assert_eq!(data.shape(), &[4, 8]);
    // Channel 2 covers fine channels 16..24.
    assert_abs_diff_eq!(data[[0, 0]], 16.0);
    assert_abs_diff_eq!(data[[3, 7]], 23.0);

    // The channel metadata is rewritten to its sub-band.
    assert_abs_diff_eq!(cc.fch1(), 1000.0 - 1e-6 * 16.0, epsilon = 1e-12);
}

#[test]
fn out_of_range_channel_indices_are_rejected() {
    let mut scan = Scan::new(indexed_source(), 8).unwrap();
    assert!(matches!(
        scan.read_coarse_channel(4),
        Err(ScanError::OutOfRange { index: 4, .. })
    ));
    assert!(matches!(
        scan.read_coarse_channel(-1),
        Err(ScanError::OutOfRange { .. })
    ));
}

#[test]
fn peek_returns_only_cached_channels() {
    let mut scan = Scan::new(indexed_source(), 8).unwrap();
    assert!(scan.peek_coarse_channel(1).is_none());
    scan.read_coarse_channel(1).unwrap();
    assert!(scan.peek_coarse_channel(1).is_some());
    assert!(scan.peek_coarse_channel(0).is_none());
}

#[test]
fn pipeline_stages_run_in_registration_order_exactly_once() {
    let order = Arc::new(Mutex::new(vec![]));

    let mut scan = Scan::new(indexed_source(), 8).unwrap();
    let order_a = Arc::clone(&order);
    scan.add_coarse_channel_transform(
        move |_| {
            order_a.lock().unwrap().push("first");
            Ok(())
        },
        "first",
    );
    let order_b = Arc::clone(&order);
    scan.add_coarse_channel_transform(
        move |_| {
            order_b.lock().unwrap().push("second");
            Ok(())
        },
        "second",
    );

    scan.read_coarse_channel(0).unwrap();
    scan.read_coarse_channel(0).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);

    // A stage appended later is applied to cached channels on their next
    // read, exactly once.
    let order_c = Arc::clone(&order);
    scan.add_coarse_channel_transform(
        move |_| {
            order_c.lock().unwrap().push("third");
            Ok(())
        },
        "third",
    );
    scan.read_coarse_channel(0).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn known_channelization_is_inferred_from_resolutions() {
    // 4 x 1024 fine channels at 2860 Hz / 1.06 s is the MR product.
    let data = Array3::<f32>::zeros((4, 1, 4096));
    let meta = ScanMetadata {
        foff: 2860.0 / 1e6,
        tsamp: 1.06,
        ..source_metadata(1000.0, 0.0)
    };
    let scan = Scan::new(Arc::new(MemorySource::new(data, meta, "mem://mr")), 0).unwrap();
    assert_eq!(scan.num_coarse_channels(), 4);
    assert_eq!(scan.fine_channels_per_coarse(), 1024);
}

#[test]
fn every_known_channelization_is_recognised_from_its_resolutions() {
    for &(fine, foff_hz, tsamp, revision) in crate::constants::KNOWN_CHANNELIZATIONS.iter() {
        let data = Array3::<f32>::zeros((2, 1, fine as usize));
        let meta = ScanMetadata {
            foff: -foff_hz / 1e6,
            tsamp,
            ..source_metadata(1000.0, 0.0)
        };
        let scan = Scan::new(Arc::new(MemorySource::new(data, meta, "mem://known")), 0).unwrap();
        assert_eq!(scan.fine_channels_per_coarse(), fine, "{revision}");
        assert_eq!(scan.num_coarse_channels(), 1, "{revision}");
    }
}

#[test]
fn unknown_channelization_falls_back_to_pow2_then_single_coarse() {
    // 2**19 channels at an unknown resolution: the 2**18 fallback tiles it.
    let data = Array3::<f32>::zeros((2, 1, 1 << 19));
    let scan = Scan::new(
        Arc::new(MemorySource::new(
            data,
            source_metadata(1000.0, -1e-6),
            "mem://pow2",
        )),
        0,
    )
    .unwrap();
    assert_eq!(scan.num_coarse_channels(), 2);
    assert_eq!(scan.fine_channels_per_coarse(), 1 << 18);

    // A band nothing tiles becomes one coarse channel.
    let data = Array3::<f32>::zeros((2, 1, 777));
    let scan = Scan::new(
        Arc::new(MemorySource::new(
            data,
            source_metadata(1000.0, -1e-6),
            "mem://odd",
        )),
        0,
    )
    .unwrap();
    assert_eq!(scan.num_coarse_channels(), 1);
    assert_eq!(scan.fine_channels_per_coarse(), 777);
}

#[test]
fn slicing_rewrites_the_metadata_and_channel_indices() {
    // 8 coarse channels of 4 fine each.
    let data = Array3::<f32>::zeros((4, 1, 32));
    let source = Arc::new(MemorySource::new(
        data,
        source_metadata(1000.0, -1e-6),
        "mem://slice",
    ));
    let scan = Scan::new(source, 4).unwrap();
    assert_eq!(scan.num_coarse_channels(), 8);

    let mut sliced = scan.slice_scan_channels(2, 4).unwrap();
    assert_eq!(sliced.num_coarse_channels(), 4);
    assert_eq!(sliced.nchans(), 16);
    assert_abs_diff_eq!(sliced.fch1(), 1000.0 - 1e-6 * 8.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sliced.foff(), scan.foff());
    assert_abs_diff_eq!(sliced.tsamp(), scan.tsamp());
    assert_eq!(sliced.source_name(), scan.source_name());

    // A frequency inside original coarse 3 maps to new coarse 1, and the
    // loaded channel keeps its global number.
    let in_coarse_3 = 1000.0 - 1e-6 * 13.0;
    assert_eq!(scan.get_coarse_channel_with_frequency(in_coarse_3), 3);
    assert_eq!(sliced.get_coarse_channel_with_frequency(in_coarse_3), 1);
    let cc = sliced.read_coarse_channel(1).unwrap();
    assert_eq!(cc.coarse_channel_number, 3);

    // count = -1 extends through the end.
    let rest = scan.slice_scan_channels(5, -1).unwrap();
    assert_eq!(rest.num_coarse_channels(), 3);
}

#[test]
fn frequency_to_channel_boundaries() {
    let data = Array3::<f32>::zeros((4, 1, 32));
    let source = Arc::new(MemorySource::new(
        data,
        source_metadata(1000.0, -1e-6),
        "mem://bounds",
    ));
    let scan = Scan::new(source, 4).unwrap();

    assert_eq!(scan.get_coarse_channel_with_frequency(1000.0), 0);
    let last = 1000.0 - 1e-6 * 31.0;
    assert_eq!(
        scan.get_coarse_channel_with_frequency(last),
        scan.num_coarse_channels() - 1
    );
}

#[test]
fn scan_hits_skips_channels_without_a_hit_product() {
    let meta = source_metadata(1000.0, -1e-6);
    let mut with_hits = CoarseChannel::from_metadata(
        ScanMetadata {
            nchans: 4,
            ntsteps: 4,
            ..meta.clone()
        },
        0,
    );
    with_hits.set_hits(vec![Hit {
        start_freq_index: 2,
        start_freq_mhz: 1000.0,
        start_time_sec: 0.0,
        duration_sec: 4.0,
        rate_index: 0,
        drift_rate_hz_per_sec: 0.5,
        power: 10.0,
        time_span_steps: 4,
        integrated_channels: 4,
        snr: 12.0,
        bandwidth_hz: 1.0,
        binwidth: 1,
        rfi_counts: RfiCounts::default(),
        coarse_channel_number: 0,
    }]);
    let without_hits = CoarseChannel::from_metadata(
        ScanMetadata {
            nchans: 4,
            ntsteps: 4,
            ..meta
        },
        1,
    );

    let mut scan = Scan::from_channels(BTreeMap::from([(0, with_hits), (1, without_hits)]))
        .unwrap();
    let hits = scan.hits().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].start_freq_index, 2);
}

#[test]
fn from_channels_inherits_the_first_channels_metadata() {
    let meta = ScanMetadata {
        nchans: 16,
        ntsteps: 4,
        ..source_metadata(1000.0, -1e-6)
    };
    let channels = BTreeMap::from([
        (0, CoarseChannel::from_metadata(meta.clone(), 0)),
        (1, CoarseChannel::from_metadata(meta, 1)),
    ]);
    let scan = Scan::from_channels(channels).unwrap();
    assert_eq!(scan.num_coarse_channels(), 2);
    assert_eq!(scan.nchans(), 32);
    assert_eq!(scan.source_name(), "TIC-1234");

    assert!(matches!(
        Scan::from_channels(BTreeMap::new()),
        Err(ScanError::NoChannels)
    ));
}

fn metadata_scan(fch1: f64) -> Scan {
    let meta = ScanMetadata {
        nchans: 16,
        ntsteps: 4,
        ..source_metadata(fch1, -1e-6)
    };
    Scan::from_channels(BTreeMap::from([(
        0,
        CoarseChannel::from_metadata(meta, 0),
    )]))
    .unwrap()
}

#[test]
fn matching_scans_validate_as_consistent() {
    let target = ObservationTarget::new(vec![metadata_scan(1000.0), metadata_scan(1000.0)]);
    assert!(target.validate_scan_consistency().is_ok());
    assert_eq!(target.target_name, "TIC-1234");

    let cadence = Cadence::new(vec![
        ObservationTarget::new(vec![metadata_scan(1000.0)]),
        ObservationTarget::new(vec![metadata_scan(1000.0)]),
    ]);
    assert!(cadence.validate_scan_consistency().is_ok());
}

#[test]
fn mismatched_scans_fail_consistency() {
    let target = ObservationTarget::new(vec![metadata_scan(1000.0), metadata_scan(1400.0)]);
    assert!(matches!(
        target.validate_scan_consistency(),
        Err(ScanError::InconsistentMetadata(_))
    ));

    let cadence = Cadence::new(vec![
        ObservationTarget::new(vec![metadata_scan(1000.0)]),
        ObservationTarget::new(vec![metadata_scan(1400.0)]),
    ]);
    assert!(matches!(
        cadence.get_number_coarse_channels(),
        Err(ScanError::InconsistentMetadata(_))
    ));
}
