// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The structured hit envelope: scan metadata plus per-channel hit lists,
//! serialised with serde. A deserialised envelope reconstitutes a [`Scan`]
//! whose channels carry ready hit cells, so the event search can run on
//! cadences read back from disk.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use super::HitsFileError;
use crate::data::{CoarseChannel, Hit, Scan, ScanError, ScanMetadata};

/// One coarse channel's hits and its sub-band metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelHits {
    pub coarse_channel_number: i64,
    pub metadata: ScanMetadata,
    pub hits: Vec<Hit>,
}

/// A scan's worth of serialised hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHitsEnvelope {
    pub file_path: String,
    pub metadata: ScanMetadata,
    pub channels: Vec<ChannelHits>,
}

impl ScanHitsEnvelope {
    /// Collect a scan's hits into an envelope. Channels without a hit
    /// product are recorded with an empty list and a warning, matching the
    /// best-effort contract of [`Scan::hits`].
    pub fn from_scan(scan: &mut Scan) -> Result<ScanHitsEnvelope, HitsFileError> {
        let mut channels = vec![];
        for cc_index in 0..scan.num_coarse_channels() {
            let cc = scan.read_coarse_channel(cc_index)?;
            let hits = match cc.hits() {
                Ok(hits) => hits,
                Err(ScanError::NotComputed(what)) => {
                    warn!("No {what} on coarse channel {cc_index}; serialising it as empty");
                    vec![]
                }
                Err(e) => return Err(e.into()),
            };
            channels.push(ChannelHits {
                coarse_channel_number: cc.coarse_channel_number,
                metadata: cc.metadata().clone(),
                hits,
            });
        }
        Ok(ScanHitsEnvelope {
            file_path: scan.file_path(),
            metadata: scan.metadata().clone(),
            channels,
        })
    }

    /// Rebuild a scan whose channels carry the envelope's hits as ready
    /// values. The waterfall itself is not restored.
    pub fn into_scan(self) -> Result<Scan, HitsFileError> {
        if self.channels.is_empty() {
            return Err(HitsFileError::Empty(self.file_path));
        }
        let mut channel_map = BTreeMap::new();
        for channel in self.channels {
            let mut cc =
                CoarseChannel::from_metadata(channel.metadata, channel.coarse_channel_number);
            cc.set_hits(channel.hits);
            channel_map.insert(channel.coarse_channel_number, cc);
        }
        Ok(Scan::from_channels(channel_map)?)
    }
}

/// Serialise a scan's hits to a JSON envelope on disk.
pub fn write_scan_hits_to_file(
    scan: &mut Scan,
    file_path: impl AsRef<Path>,
) -> Result<(), HitsFileError> {
    let envelope = ScanHitsEnvelope::from_scan(scan)?;
    let writer = BufWriter::new(File::create(file_path)?);
    serde_json::to_writer_pretty(writer, &envelope)?;
    Ok(())
}

/// Read a hit envelope back as a metadata-plus-hits scan.
pub fn read_scan_hits_from_file(file_path: impl AsRef<Path>) -> Result<Scan, HitsFileError> {
    let reader = BufReader::new(File::open(file_path)?);
    let envelope: ScanHitsEnvelope = serde_json::from_reader(reader)?;
    envelope.into_scan()
}
