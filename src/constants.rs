// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Constants used throughout `driftnet`.

/// Seconds in a day; used to convert MJD start times to seconds.
pub(crate) const SECONDS_PER_DAY: f64 = 86400.0;

/// Known telescope channelisation products. Each entry is the number of fine
/// channels per coarse channel, the canonical frequency resolution \[Hz\],
/// the canonical time resolution \[s\] and the data-product revision name.
///
/// A scan whose `(nchans, foff, tsamp)` matches one of these (within 0.1 Hz
/// and 0.1 s) is assumed to use that channelisation.
pub(crate) const KNOWN_CHANNELIZATIONS: [(i64, f64, f64, &str); 9] = [
    (1033216, 2.84, 17.98, "HSR-Rev1A"),
    (8, 366210.0, 0.00034953, "HTR-Rev1A"),
    (1024, 2860.0, 1.06, "MR-Rev1A"),
    (999424, 2.93, 17.4, "HSR-Rev1B"),
    (8, 366210.0, 0.00034953, "HTR-Rev1B"),
    (1024, 2860.0, 1.02, "MR-Rev1B"),
    (1048576, 2.79, 18.25, "HSR-Rev2A"),
    (8, 366210.0, 0.00034953, "HTR-Rev2A"),
    (1024, 2860.0, 1.07, "MR-Rev2A"),
];

/// First channelisation fallback when nothing in [`KNOWN_CHANNELIZATIONS`]
/// matches (2**18 fine channels per coarse; the ATA convention).
pub(crate) const FALLBACK_FINE_PER_COARSE_POW2: i64 = 1 << 18;

/// Second channelisation fallback (10**6 fine channels per coarse; the
/// Parkes UWL convention).
pub(crate) const FALLBACK_FINE_PER_COARSE_1M: i64 = 1_000_000;

/// Matching tolerance against the canonical frequency resolution \[Hz\].
pub(crate) const CHANNELIZATION_FREQ_TOL_HZ: f64 = 0.1;

/// Matching tolerance against the canonical time resolution \[s\].
pub(crate) const CHANNELIZATION_TIME_TOL_S: f64 = 0.1;
