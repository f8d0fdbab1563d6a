// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Raw detections in grid coordinates, before physical characterisation.

use crate::data::RfiCounts;

/// A cell of the drift plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreqDriftCoord {
    /// Row index (drift rate).
    pub drift_index: i64,

    /// Column index (frequency bin).
    pub frequency_channel: i64,
}

/// A candidate signal in the drift plane: the peak location, its strength,
/// and the cells that make it up. Physical units come later, in
/// [`crate::search::hit_search_channel`].
#[derive(Debug, Clone)]
pub struct Protohit {
    /// The highest-power cell.
    pub index_max: FreqDriftCoord,

    /// The power-weighted centroid of the detection.
    pub index_center: FreqDriftCoord,

    /// SNR of the peak against the desmeared noise of its drift row.
    pub snr: f64,

    /// The raw integrated power at the peak.
    pub max_integration: f64,

    /// The noise standard deviation used to normalise this detection,
    /// adjusted for the row's integration footprint.
    pub desmeared_noise: f64,

    /// Spectral width of the detection in bins.
    pub binwidth: i64,

    /// Every cell belonging to this detection. Empty when the component
    /// search ran with `detach_graph` set.
    pub locations: Vec<FreqDriftCoord>,

    /// Flagged-sample totals accumulated over the detection's cells.
    pub rfi_counts: RfiCounts,
}
