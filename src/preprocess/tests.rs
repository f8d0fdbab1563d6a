// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
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
fn dc_excision_replaces_the_spike_with_the_neighbour_mean() {
    let nchans = 64;
    let mut data = Array2::<f32>::ones((8, nchans));
    data.slice_mut(s![.., nchans / 2]).fill(1e6);
    data[[3, nchans / 2 - 1]] = 3.0;
    data[[3, nchans / 2 + 1]] = 5.0;

    let mut cc = channel_from(data);
    excise_dc_channel(&mut cc).unwrap();

    let data = cc.data().unwrap();
    assert_abs_diff_eq!(data[[3, nchans / 2]], 4.0);
    assert_abs_diff_eq!(data[[0, nchans / 2]], 1.0);
}

#[test]
fn dc_excision_needs_at_least_three_bins() {
    let mut cc = channel_from(Array2::ones((4, 2)));
    assert!(matches!(
        excise_dc_channel(&mut cc),
        Err(PreprocessError::ChannelTooNarrow { nchans: 2 })
    ));
}

#[test]
fn normalisation_scales_the_maximum_to_one() {
    let mut data = Array2::<f32>::ones((4, 16));
    data[[1, 2]] = 250.0;
    let mut cc = channel_from(data);
    normalize_channel(&mut cc).unwrap();

    let data = cc.data().unwrap();
    assert_abs_diff_eq!(data[[1, 2]], 1.0);
    assert_abs_diff_eq!(data[[0, 0]], 1.0 / 250.0);
}

#[test]
fn firdes_taps_have_unit_dc_gain_and_symmetry() {
    let taps = firdes(32, 0.125, "hamming").unwrap();
    assert_abs_diff_eq!(taps.sum(), 1.0, epsilon = 1e-12);
    for n in 0..16 {
        assert_abs_diff_eq!(taps[n], taps[31 - n], epsilon = 1e-12);
    }
}

#[test]
fn firdes_rejects_unknown_windows() {
    assert!(matches!(
        firdes(8, 0.25, "kaiser-bessel-derived"),
        Err(PreprocessError::UnknownWindow(_))
    ));
}

#[test]
fn pfb_response_peaks_at_band_centre_and_rolls_off_at_the_edges() {
    let fine_per_coarse = 64;
    let response = gen_coarse_channel_response(fine_per_coarse, 8, 4, "hamming").unwrap();
    assert_eq!(response.len(), fine_per_coarse);

    let centre = response[fine_per_coarse / 2];
    assert_abs_diff_eq!(centre, 1.0, epsilon = 1e-3);
    assert!(response[0] < centre);
    assert!(response[fine_per_coarse - 1] < centre);
    assert!(response.iter().all(|&r| r > 0.0));
}

#[test]
fn equalisation_flattens_a_shaped_passband() {
    let fine_per_coarse = 64;
    let response = gen_coarse_channel_response(fine_per_coarse, 8, 4, "hamming").unwrap();

    // Synthesize data shaped exactly like the response; equalising must
    // return it to a flat spectrum.
    let mut data = Array2::<f32>::zeros((4, fine_per_coarse));
    for mut spectrum in data.axis_iter_mut(Axis(0)) {
        spectrum.assign(&response);
    }
    let mut cc = channel_from(data);
    equalize_passband_filter_channel(&mut cc, &response, true).unwrap();

    let data = cc.data().unwrap();
    for &x in data.iter() {
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn equalisation_validation_rejects_a_non_positive_response() {
    let mut cc = channel_from(Array2::ones((4, 8)));
    let mut response = Array1::<f32>::ones(8);
    response[3] = 0.0;
    assert!(matches!(
        equalize_passband_filter_channel(&mut cc, &response, true),
        Err(PreprocessError::InvalidResponse(_))
    ));
    // Without validation the shape check still applies.
    let short = Array1::<f32>::ones(4);
    assert!(matches!(
        equalize_passband_filter_channel(&mut cc, &short, false),
        Err(PreprocessError::ResponseShapeMismatch { .. })
    ));
}
