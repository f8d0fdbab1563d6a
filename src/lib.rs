// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Narrowband drift-rate search for radio SETI.

Given a time × frequency waterfall from a telescope, `driftnet` detects
narrowband tones whose frequency drifts linearly (the signature of an
accelerating emitter), and correlates detections across the ON/OFF pointings
of a cadence to reject terrestrial interference.

The pipeline is built from composable per-channel transforms: preprocessing
([`preprocess`]) and RFI flagging ([`flag`]) condition the waterfall, a noise
estimate ([`noise`]) anchors SNR, the de-Doppler transform ([`drift`]) builds
the drift-rate search volume, the hit search ([`search`]) extracts candidate
signals, and the event search ([`event`]) tracks them across a cadence.
 */

pub mod data;
pub mod drift;
pub mod event;
pub mod flag;
pub mod io;
pub mod noise;
pub mod preprocess;
pub mod search;
pub mod sexagesimal;
pub mod source;

pub(crate) mod constants;
mod error;

#[cfg(test)]
mod tests;

// Re-exports.
pub use data::{
    Cadence, CoarseChannel, Device, DriftRate, Event, FrequencyDriftPlane, Hit,
    IntegratedFlags, Lazy, ObservationTarget, RfiCounts, Scan, ScanError, ScanMetadata,
};
pub use error::DriftnetError;
pub use source::{MemorySource, WaterfallRead};
