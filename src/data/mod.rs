// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The scan data hierarchy: metadata, scans, their coarse channels, and the
//! lazy channel-loading engine.

mod cadence;
mod coarse_channel;
mod device;
mod drift_plane;
mod error;
mod hit;
#[cfg(test)]
mod tests;

pub use cadence::{Cadence, ObservationTarget};
pub use coarse_channel::{CoarseChannel, Lazy};
pub use device::Device;
pub use drift_plane::{DriftRate, FrequencyDriftPlane, IntegratedFlags};
pub use error::ScanError;
pub use hit::{Event, Hit, RfiCounts};

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use ndarray::{ArcArray2, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CHANNELIZATION_FREQ_TOL_HZ, CHANNELIZATION_TIME_TOL_S, FALLBACK_FINE_PER_COARSE_1M,
    FALLBACK_FINE_PER_COARSE_POW2, KNOWN_CHANNELIZATIONS,
};
use crate::source::WaterfallRead;

/// Observational parameters of a scan or a coarse channel. This is the
/// single source of truth for metadata in both [`Scan`] and
/// [`CoarseChannel`]; a channel carries a copy with `fch1` and `nchans`
/// rewritten to its sub-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Centre frequency of the first channel \[MHz\].
    pub fch1: f64,

    /// Channel bandwidth \[MHz\]. Negative when channels run from high to
    /// low frequency (the common sigproc convention).
    pub foff: f64,

    /// Time between successive spectra \[s\].
    pub tsamp: f64,

    /// Start of the observation \[MJD days\].
    pub tstart: f64,

    /// Name of the observed source.
    pub source_name: String,

    /// ID of the backend instrument.
    pub machine_id: Option<i64>,

    /// ID of the telescope facility.
    pub telescope_id: Option<i64>,

    /// Source right ascension \[arc-hours, J2000\].
    pub src_raj: Option<f64>,

    /// Source declination \[degrees, J2000\].
    pub src_dej: Option<f64>,

    /// Telescope azimuth at the start of the scan \[degrees\].
    pub az_start: Option<f64>,

    /// Telescope zenith angle at the start of the scan \[degrees\].
    pub za_start: Option<f64>,

    /// Bits per sample in the raw data.
    pub nbits: Option<i64>,

    /// sigproc data-type tag (1 = filterbank).
    pub data_type: i64,

    /// Total number of frequency channels.
    pub nchans: i64,

    /// Number of IF streams (polarisations).
    pub nifs: i64,

    /// Number of time integration steps available.
    pub ntsteps: i64,
}

impl Default for ScanMetadata {
    fn default() -> ScanMetadata {
        ScanMetadata {
            fch1: 0.0,
            foff: 0.0,
            tsamp: 0.0,
            tstart: 0.0,
            source_name: String::new(),
            machine_id: None,
            telescope_id: None,
            src_raj: None,
            src_dej: None,
            az_start: None,
            za_start: None,
            nbits: None,
            data_type: 1,
            nchans: 0,
            nifs: 0,
            ntsteps: 0,
        }
    }
}

/// Deduce the coarse-channel structure of a file from its channel count and
/// resolutions, returning `(number of coarse channels, fine channels per
/// coarse)`.
///
/// Known telescope channelisations are tried first; on a miss the 2**18 and
/// 10**6 conventions are tried, and failing those the whole band is treated
/// as one coarse channel. Every fallback is reported with a warning naming
/// it.
fn infer_channelization(number_fine_channels: i64, foff_hz: f64, tsamp: f64) -> (i64, i64) {
    for &(fine_per_coarse, freq_res, time_res, _revision) in KNOWN_CHANNELIZATIONS.iter() {
        let num_coarse = number_fine_channels / fine_per_coarse;
        if num_coarse * fine_per_coarse == number_fine_channels
            && (foff_hz.abs() - freq_res).abs() < CHANNELIZATION_FREQ_TOL_HZ
            && (tsamp.abs() - time_res).abs() < CHANNELIZATION_TIME_TOL_S
        {
            return (num_coarse, fine_per_coarse);
        }
    }

    for (fallback, name) in [
        (FALLBACK_FINE_PER_COARSE_POW2, "2**18"),
        (FALLBACK_FINE_PER_COARSE_1M, "1M"),
    ] {
        let num_coarse = number_fine_channels / fallback;
        if num_coarse > 0 {
            // Spread any remainder evenly so the coarse channels tile the
            // band exactly.
            let fine_per_coarse = fallback + (number_fine_channels % fallback) / num_coarse;
            if fine_per_coarse * num_coarse == number_fine_channels {
                warn!(
                    "Scan with {number_fine_channels} fine channels could not be matched with a \
                     known channelization scheme. Rounding from {name} fine channels per coarse \
                     to give {num_coarse} coarse channels with {fine_per_coarse} fine channels each"
                );
                return (num_coarse, fine_per_coarse);
            }
        }
    }

    warn!(
        "Scan with {number_fine_channels} fine channels could not be matched with a known \
         channelization scheme. Rounding to standard known channelizations didn't work, so \
         working from 1 coarse channel"
    );
    (1, number_fine_channels)
}

/// A processing step applied to every coarse channel as it is loaded.
#[derive(Clone)]
pub struct TransformStage {
    pub description: String,
    transform: Arc<dyn Fn(&mut CoarseChannel) -> Result<(), ScanError> + Send + Sync>,
}

/// A single observation: the connection to a data source, the scan-level
/// metadata, the cache of loaded coarse channels, and the pipeline of
/// transforms applied to each channel on load.
///
/// The channel cache is not internally synchronised; concurrent workers must
/// partition the scan by coarse-channel index, for which
/// [`Scan::slice_scan_channels`] is the sanctioned shard.
pub struct Scan {
    coarse_channels: BTreeMap<i64, CoarseChannel>,
    data_source: Option<Arc<dyn WaterfallRead>>,
    pipeline: Vec<TransformStage>,
    meta: ScanMetadata,
    fine_channels_per_coarse: i64,
    num_coarse_channels: i64,
    coarse_channel_offset: i64,
    device: Device,
}

impl Scan {
    /// Connect a scan to a data source.
    ///
    /// `num_fine_channels_per_coarse = 0` infers the channelisation from the
    /// metadata (see [`infer_channelization`]'s fallbacks).
    pub fn new(
        data_source: Arc<dyn WaterfallRead>,
        num_fine_channels_per_coarse: i64,
    ) -> Result<Scan, ScanError> {
        let mut meta = data_source.metadata().clone();

        let data_shape = data_source.data_shape();
        if data_shape.len() != 3 {
            return Err(ScanError::InconsistentMetadata(format!(
                "data shape has {} dimensions, but [time, feed, freq] was expected",
                data_shape.len()
            )));
        }
        meta.ntsteps = data_shape[0];
        if meta.nifs == 0 {
            meta.nifs = data_shape[1];
        }
        if meta.nchans == 0 {
            meta.nchans = data_shape[2];
        }

        let (num_coarse_channels, fine_channels_per_coarse) = if num_fine_channels_per_coarse == 0
        {
            infer_channelization(meta.nchans, meta.foff * 1e6, meta.tsamp)
        } else {
            (
                meta.nchans / num_fine_channels_per_coarse,
                num_fine_channels_per_coarse,
            )
        };

        if num_coarse_channels * fine_channels_per_coarse != meta.nchans {
            warn!(
                "The number of fine channels per coarse ({fine_channels_per_coarse}) does not \
                 divide the total number of channels ({})",
                meta.nchans
            );
        }

        Ok(Scan {
            coarse_channels: BTreeMap::new(),
            data_source: Some(data_source),
            pipeline: vec![],
            meta,
            fine_channels_per_coarse,
            num_coarse_channels,
            coarse_channel_offset: 0,
            device: Device::default(),
        })
    }

    /// Build a scan from already-materialised coarse channels, inheriting
    /// the metadata of the first.
    pub fn from_channels(coarse_channels: BTreeMap<i64, CoarseChannel>) -> Result<Scan, ScanError> {
        let (&first_index, first) = coarse_channels.iter().next().ok_or(ScanError::NoChannels)?;

        let num_coarse_channels = coarse_channels.len() as i64;
        let fine_channels_per_coarse = first.nchans();
        let mut meta = first.metadata().clone();
        meta.nchans = fine_channels_per_coarse * num_coarse_channels;

        Ok(Scan {
            data_source: None,
            pipeline: vec![],
            meta,
            fine_channels_per_coarse,
            num_coarse_channels,
            // Channel maps are keyed globally; an envelope sliced out of a
            // wider scan keeps its original numbering.
            coarse_channel_offset: first_index,
            device: Device::default(),
            coarse_channels,
        })
    }

    /// Load (or fetch from cache) the coarse channel at `coarse_channel_index`,
    /// returning it with every pipeline stage applied in registration order.
    pub fn read_coarse_channel(
        &mut self,
        coarse_channel_index: i64,
    ) -> Result<&mut CoarseChannel, ScanError> {
        if coarse_channel_index < 0 || coarse_channel_index >= self.num_coarse_channels {
            return Err(ScanError::OutOfRange {
                index: coarse_channel_index,
                num_coarse_channels: self.num_coarse_channels,
            });
        }

        let global_index = coarse_channel_index + self.coarse_channel_offset;
        if !self.coarse_channels.contains_key(&global_index) {
            let data_source = self.data_source.as_ref().ok_or(ScanError::NoDataSource)?;

            let mut count = data_source.data_shape();
            if count.len() != 3 {
                return Err(ScanError::InconsistentMetadata(format!(
                    "data shape has {} dimensions, but [time, feed, freq] was expected",
                    count.len()
                )));
            }
            count[2] = self.fine_channels_per_coarse;
            let offset = vec![0, 0, self.fine_channels_per_coarse * global_index];

            let reader = Arc::clone(data_source);
            let (data_offset, data_count) = (offset.clone(), count.clone());
            let data_producer: Box<
                dyn FnOnce() -> Result<ArcArray2<f32>, ScanError> + Send,
            > = Box::new(move || {
                let cube = reader.read_data(&data_offset, &data_count)?;
                // Select the single feed this search operates on.
                Ok(cube.index_axis_move(Axis(1), 0).into_shared())
            });

            let reader = Arc::clone(data_source);
            let (mask_offset, mask_count) = (offset, count.clone());
            let mask_producer: Box<
                dyn FnOnce() -> Result<ArcArray2<u8>, ScanError> + Send,
            > = Box::new(move || {
                let cube = reader.read_mask(&mask_offset, &mask_count)?;
                Ok(cube.index_axis_move(Axis(1), 0).into_shared())
            });

            let mut channel_meta = self.meta.clone();
            channel_meta.fch1 = self.meta.fch1
                + self.meta.foff * (self.fine_channels_per_coarse * coarse_channel_index) as f64;
            channel_meta.nchans = self.fine_channels_per_coarse;
            channel_meta.ntsteps = count[0];

            let mut cc = CoarseChannel::with_producers(
                data_producer,
                mask_producer,
                channel_meta,
                global_index,
            );
            cc.set_device(self.device)?;
            self.coarse_channels.insert(global_index, cc);
        }

        // Clone the stage list (cheap; stages are shared handles) so the
        // channel can be borrowed mutably while stages run.
        let stages = self.pipeline.clone();
        let device = self.device;
        let cc = self
            .coarse_channels
            .get_mut(&global_index)
            .expect("inserted above");
        cc.set_device(device)?;
        while cc.stages_applied < stages.len() {
            (stages[cc.stages_applied].transform)(cc)?;
            cc.stages_applied += 1;
        }
        Ok(cc)
    }

    /// The coarse channel at `coarse_channel_index` if it is already cached.
    pub fn peek_coarse_channel(&self, coarse_channel_index: i64) -> Option<&CoarseChannel> {
        self.coarse_channels
            .get(&(coarse_channel_index + self.coarse_channel_offset))
    }

    /// Append a stage to the channel pipeline. The stage runs on every
    /// channel loaded from now on (and on cached channels at their next
    /// read).
    pub fn add_coarse_channel_transform(
        &mut self,
        transform: impl Fn(&mut CoarseChannel) -> Result<(), ScanError> + Send + Sync + 'static,
        description: impl Into<String>,
    ) {
        self.pipeline.push(TransformStage {
            description: description.into(),
            transform: Arc::new(transform),
        });
    }

    /// Which coarse channel contains `frequency` \[MHz\]?
    pub fn get_coarse_channel_with_frequency(&self, frequency: f64) -> i64 {
        let band_fraction =
            (frequency - self.meta.fch1) / (self.meta.foff * self.meta.nchans as f64);
        (band_fraction * self.num_coarse_channels as f64).floor() as i64
    }

    pub fn num_coarse_channels(&self) -> i64 {
        self.num_coarse_channels
    }

    pub fn fine_channels_per_coarse(&self) -> i64 {
        self.fine_channels_per_coarse
    }

    /// The path of the underlying data source, if any.
    pub fn file_path(&self) -> String {
        match &self.data_source {
            Some(source) => source.path(),
            None => "n/a".to_string(),
        }
    }

    /// Collect the hits of every coarse channel.
    ///
    /// This is best-effort: a channel without a hit-search product logs a
    /// warning and is skipped. Any other error propagates.
    pub fn hits(&mut self) -> Result<Vec<Hit>, ScanError> {
        let mut all_hits = vec![];
        for cc_index in 0..self.num_coarse_channels {
            let cc = self.read_coarse_channel(cc_index)?;
            match cc.hits() {
                Ok(hits) => all_hits.extend(hits),
                Err(ScanError::NotComputed(what)) => warn!(
                    "No {what} available on coarse channel {cc_index}; this might indicate a bad \
                     pipeline"
                ),
                Err(e) => return Err(e),
            }
        }
        Ok(all_hits)
    }

    /// The range of drift rates searched across all channels \[Hz/s\].
    ///
    /// Best-effort in the same way as [`Scan::hits`].
    pub fn drift_range(&mut self) -> Result<(f64, f64), ScanError> {
        let mut drift_range = (0.0f64, 0.0f64);
        for cc_index in 0..self.num_coarse_channels {
            let cc = self.read_coarse_channel(cc_index)?;
            match cc.integrated_drift_plane() {
                Ok(plane) => {
                    for rate in plane.drift_rate_info() {
                        drift_range.0 = drift_range.0.min(rate.rate_hz_per_sec);
                        drift_range.1 = drift_range.1.max(rate.rate_hz_per_sec);
                    }
                }
                Err(ScanError::NotComputed(what)) => warn!(
                    "No {what} available on coarse channel {cc_index}; this might indicate a bad \
                     pipeline"
                ),
                Err(e) => return Err(e),
            }
        }
        Ok(drift_range)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Record the target device for this scan and all of its channels.
    pub fn set_device(&mut self, device: Device) -> Result<(), ScanError> {
        device.validate()?;
        self.device = device;
        for cc in self.coarse_channels.values_mut() {
            cc.set_device(device)?;
        }
        Ok(())
    }

    /// Migrate every loaded channel to the configured device now.
    pub fn push_device(&mut self) -> Result<(), ScanError> {
        for cc in self.coarse_channels.values_mut() {
            cc.set_device(self.device)?;
            cc.push_device()?;
        }
        Ok(())
    }

    /// A virtual slice of `count` coarse channels starting at
    /// `start_channel`, sharing this scan's data source and pipeline.
    /// `count = -1` extends through the last channel.
    pub fn slice_scan_channels(&self, start_channel: i64, count: i64) -> Result<Scan, ScanError> {
        if self.data_source.is_none() {
            return Err(ScanError::NoDataSource);
        }
        let count = if count == -1 {
            info!(
                "Got count of -1 channels, automatically extending to last coarse channel ({})",
                self.num_coarse_channels
            );
            self.num_coarse_channels - start_channel
        } else {
            count
        };
        if start_channel < 0 || count < 0 || start_channel + count > self.num_coarse_channels {
            return Err(ScanError::OutOfRange {
                index: start_channel + count,
                num_coarse_channels: self.num_coarse_channels,
            });
        }

        let mut meta = self.meta.clone();
        meta.fch1 = self.meta.fch1
            + self.meta.foff * (self.fine_channels_per_coarse * start_channel) as f64;
        meta.nchans = count * self.fine_channels_per_coarse;

        Ok(Scan {
            coarse_channels: BTreeMap::new(),
            data_source: self.data_source.clone(),
            pipeline: self.pipeline.clone(),
            meta,
            fine_channels_per_coarse: self.fine_channels_per_coarse,
            num_coarse_channels: count,
            coarse_channel_offset: self.coarse_channel_offset + start_channel,
            device: self.device,
        })
    }

    // Metadata proxies.

    pub fn metadata(&self) -> &ScanMetadata {
        &self.meta
    }

    pub fn fch1(&self) -> f64 {
        self.meta.fch1
    }

    pub fn foff(&self) -> f64 {
        self.meta.foff
    }

    pub fn tsamp(&self) -> f64 {
        self.meta.tsamp
    }

    pub fn tstart(&self) -> f64 {
        self.meta.tstart
    }

    pub fn source_name(&self) -> &str {
        &self.meta.source_name
    }

    pub fn nchans(&self) -> i64 {
        self.meta.nchans
    }

    pub fn nifs(&self) -> i64 {
        self.meta.nifs
    }

    pub fn ntsteps(&self) -> i64 {
        self.meta.ntsteps
    }

    /// The wall-clock length of the scan \[s\].
    pub fn tduration_secs(&self) -> f64 {
        self.meta.ntsteps as f64 * self.meta.tsamp
    }
}

impl std::fmt::Debug for Scan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scan")
            .field("source", &self.file_path())
            .field("source_name", &self.meta.source_name)
            .field("num_coarse_channels", &self.num_coarse_channels)
            .field("fine_channels_per_coarse", &self.fine_channels_per_coarse)
            .field("coarse_channel_offset", &self.coarse_channel_offset)
            .field("loaded", &self.coarse_channels.len())
            .field("pipeline_stages", &self.pipeline.len())
            .finish()
    }
}
