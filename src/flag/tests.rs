// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

use super::*;
use crate::data::{CoarseChannel, ScanMetadata};

fn channel_from(data: Array2<f32>) -> CoarseChannel {
    let mask = Array2::<u8>::zeros(data.raw_dim());
    let meta = ScanMetadata {
        fch1: 1000.0,
        foff: -1e-6,
        tsamp: 1.0,
        tstart: 60000.0,
        source_name: "test".to_string(),
        ntsteps: data.shape()[0] as i64,
        nchans: data.shape()[1] as i64,
        nifs: 1,
        ..ScanMetadata::default()
    };
    CoarseChannel::new(data, mask, meta, 0)
}

#[test]
fn rolloff_flags_exactly_the_band_edges() {
    // rolloff_width = 0.1 over 100 channels: columns [0, 10) and [90, 100).
    let mut cc = channel_from(Array2::zeros((4, 100)));
    flag_filter_rolloff_channel(&mut cc, 0.1).unwrap();

    let mask = cc.mask().unwrap();
    for t in 0..4 {
        for f in 0..100 {
            let expected = if f < 10 || f >= 90 {
                FlagValue::FilterRolloff.bit()
            } else {
                0
            };
            assert_eq!(mask[[t, f]], expected, "mask[[{t}, {f}]]");
        }
    }
}

#[test]
fn magnitude_flagger_uses_the_given_threshold() {
    let mut data = Array2::<f32>::ones((4, 16));
    data[[2, 7]] = 50.0;
    let mut cc = channel_from(data);
    flag_magnitude_channel(&mut cc, Some(10.0)).unwrap();

    let mask = cc.mask().unwrap();
    assert_eq!(mask[[2, 7]], FlagValue::Magnitude.bit());
    assert_eq!(mask.iter().filter(|&&m| m != 0).count(), 1);
}

#[test]
fn magnitude_flagger_auto_threshold_catches_a_strong_outlier() {
    let mut data = Array2::<f32>::ones((8, 64));
    data[[1, 3]] = 1e6;
    let mut cc = channel_from(data);
    flag_magnitude_channel(&mut cc, None).unwrap();

    let mask = cc.mask().unwrap();
    assert_eq!(mask[[1, 3]], FlagValue::Magnitude.bit());
}

#[test]
fn sigmaclip_flags_outliers_and_converges() {
    // Constant background with two progressively smaller outliers; the
    // second only stands out once the first has been clipped from the
    // statistics.
    let mut data = Array2::<f32>::ones((10, 10));
    data[[0, 0]] = 1000.0;
    data[[5, 5]] = 40.0;
    let mut cc = channel_from(data);
    flag_sigmaclip_channel(&mut cc, SigmaClipOptions::default()).unwrap();

    let mask = cc.mask().unwrap();
    assert_eq!(mask[[0, 0]], FlagValue::SigmaClip.bit());
    assert_eq!(mask[[5, 5]], FlagValue::SigmaClip.bit());
    assert_eq!(mask.iter().filter(|&&m| m != 0).count(), 2);
}

#[test]
fn spectral_kurtosis_flags_the_impulsive_column_only() {
    let mut data = Array2::<f32>::ones((16, 4));
    data[[3, 2]] = 1000.0;
    let mut cc = channel_from(data);
    // A constant column has SK = 0, so disable the lower cut to isolate the
    // impulsive one.
    let options = SpectralKurtosisOptions {
        lower_threshold: -1.0,
        upper_threshold: 25.0,
        d: 2.0,
    };
    flag_spectral_kurtosis_channel(&mut cc, options).unwrap();

    let mask = cc.mask().unwrap();
    for t in 0..16 {
        assert_eq!(mask[[t, 2]], FlagValue::HighSpectralKurtosis.bit());
        assert_eq!(mask[[t, 0]], 0);
    }
}

#[test]
fn spectral_kurtosis_flags_constant_columns_low() {
    // A constant column has SK = 0, well under any sensible lower cut.
    let mut cc = channel_from(Array2::ones((16, 3)));
    flag_spectral_kurtosis_channel(&mut cc, SpectralKurtosisOptions::default()).unwrap();

    let mask = cc.mask().unwrap();
    assert!(mask
        .iter()
        .all(|&m| m == FlagValue::LowSpectralKurtosis.bit()));
}

#[test]
fn flaggers_or_compose_without_clobbering_each_other() {
    let mut data = Array2::<f32>::ones((4, 100));
    data[[2, 5]] = 1000.0;
    let mut cc = channel_from(data);

    flag_filter_rolloff_channel(&mut cc, 0.1).unwrap();
    flag_magnitude_channel(&mut cc, Some(10.0)).unwrap();

    let mask = cc.mask().unwrap();
    // Bin 5 is inside the rolloff and over the magnitude threshold; both
    // bits must survive.
    assert_eq!(
        mask[[2, 5]],
        FlagValue::FilterRolloff.bit() | FlagValue::Magnitude.bit()
    );

    // Order must not matter.
    let mut data = Array2::<f32>::ones((4, 100));
    data[[2, 5]] = 1000.0;
    let mut cc2 = channel_from(data);
    flag_magnitude_channel(&mut cc2, Some(10.0)).unwrap();
    flag_filter_rolloff_channel(&mut cc2, 0.1).unwrap();
    assert_eq!(cc2.mask().unwrap(), mask);
}
