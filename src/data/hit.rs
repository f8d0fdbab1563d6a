// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Detected signals: a [`Hit`] is one peak in a single scan's drift plane,
//! an [`Event`] is a set of hits tracked across the scans of a cadence.

use serde::{Deserialize, Serialize};

/// Counts of flagged samples inside a hit's integration footprint, split by
/// the flag family that produced them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfiCounts {
    pub low_spectral_kurtosis: u32,
    pub high_spectral_kurtosis: u32,
    pub sigma_clip: u32,
}

/// The physical characterisation of one candidate signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Index of the frequency bin the signal occupies at the first time
    /// step.
    pub start_freq_index: i64,

    /// Frequency at the first time step \[MHz\], refined to the detection
    /// centroid.
    pub start_freq_mhz: f64,

    /// Start of the signal \[s since the MJD epoch\].
    pub start_time_sec: f64,

    /// Duration of the integration \[s\].
    pub duration_sec: f64,

    /// Row index of the detection within the drift plane.
    pub rate_index: i64,

    /// Measured drift rate \[Hz/s\].
    pub drift_rate_hz_per_sec: f64,

    /// Integrated power above the noise floor.
    pub power: f64,

    /// Time steps spanned by the integration.
    pub time_span_steps: i64,

    /// Frequency channels integrated to form this hit
    /// (`desmear_bins × time_span_steps`).
    pub integrated_channels: i64,

    /// Signal-to-noise ratio against the desmeared noise for this drift
    /// row.
    pub snr: f64,

    /// Signal bandwidth \[Hz\].
    pub bandwidth_hz: f64,

    /// Signal width in frequency bins.
    pub binwidth: i64,

    /// Flagged-sample counts accumulated over the detection's cells.
    pub rfi_counts: RfiCounts,

    /// The coarse channel this hit was detected in.
    pub coarse_channel_number: i64,
}

impl Hit {
    /// The frequency the signal has drifted to by its last time step
    /// \[MHz\].
    pub fn end_freq_mhz(&self) -> f64 {
        self.start_freq_mhz + self.duration_sec * self.drift_rate_hz_per_sec / 1e6
    }
}

/// An ordered set of hits believed to originate from one emitter, with
/// aggregate properties averaged over the members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub hits: Vec<Hit>,

    /// Frequency of the first hit at the event's start \[Hz\].
    pub starting_frequency_hz: f64,

    pub average_power: f64,
    pub average_bandwidth_hz: f64,
    pub average_snr: f64,
    pub average_drift_rate_hz_per_sec: f64,

    /// Start time of the earliest contributing scan \[s\].
    pub event_start_seconds: f64,

    /// End time of the latest contributing scan \[s\].
    pub event_end_seconds: f64,
}
