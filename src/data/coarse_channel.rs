// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A coarse channel: one contiguous sub-band of a scan and the unit of
//! parallelism in the search. Its expensive products (the power tensor, the
//! flag mask, the integrated drift plane, the hit list) are memoised behind
//! [`Lazy`] cells so a channel can be described long before any of them is
//! paid for.

use std::mem;

use ndarray::{ArcArray2, Array2};

use super::{Device, FrequencyDriftPlane, Hit, ScanError, ScanMetadata};
use crate::noise::NoiseStats;

/// A memoised value: either nothing, a producer that can make the value, or
/// the value itself.
///
/// Transitions are monotone: `NotComputed` → `Producer` (registered
/// externally) → `Ready` (on first read). A `Ready` cell never goes back.
pub enum Lazy<T> {
    NotComputed,
    Producer(Box<dyn FnOnce() -> Result<T, ScanError> + Send>),
    Ready(T),
}

impl<T> Lazy<T> {
    /// Get the value, running the producer if this is the first read.
    ///
    /// `what` names the product in the [`ScanError::NotComputed`] raised
    /// when the cell is empty.
    fn get(&mut self, what: &'static str) -> Result<&T, ScanError> {
        if let Lazy::Producer(_) = self {
            match mem::replace(self, Lazy::NotComputed) {
                Lazy::Producer(producer) => *self = Lazy::Ready(producer()?),
                _ => unreachable!("matched Producer above"),
            }
        }
        match self {
            Lazy::Ready(value) => Ok(value),
            Lazy::NotComputed => Err(ScanError::NotComputed(what)),
            Lazy::Producer(_) => unreachable!("producer was just consumed"),
        }
    }

    fn is_set(&self) -> bool {
        !matches!(self, Lazy::NotComputed)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lazy::NotComputed => write!(f, "NotComputed"),
            Lazy::Producer(_) => write!(f, "Producer(..)"),
            Lazy::Ready(value) => write!(f, "Ready({value:?})"),
        }
    }
}

/// One coarse channel of a scan: the power waterfall, its RFI mask, and the
/// search products derived from them.
///
/// Tensors are shared handles ([`ArcArray2`]), so cloning one into a
/// producer closure or a drift plane costs a reference count, not a copy.
#[derive(Debug)]
pub struct CoarseChannel {
    /// The channel's index within the whole file, including any slice
    /// offset.
    pub coarse_channel_number: i64,

    /// The scan's metadata with `fch1` and `nchans` rewritten to this
    /// channel's sub-band.
    pub(crate) meta: ScanMetadata,

    data: Lazy<ArcArray2<f32>>,
    mask: Lazy<ArcArray2<u8>>,
    noise_stats: Option<NoiseStats>,
    drift_plane: Lazy<FrequencyDriftPlane>,
    hits: Lazy<Vec<Hit>>,

    /// How many of the owning scan's pipeline stages have been applied.
    pub(crate) stages_applied: usize,

    device: Device,
}

impl CoarseChannel {
    /// A channel whose data and mask are already in memory.
    pub fn new(
        data: Array2<f32>,
        mask: Array2<u8>,
        meta: ScanMetadata,
        coarse_channel_number: i64,
    ) -> CoarseChannel {
        CoarseChannel {
            coarse_channel_number,
            meta,
            data: Lazy::Ready(data.into_shared()),
            mask: Lazy::Ready(mask.into_shared()),
            noise_stats: None,
            drift_plane: Lazy::NotComputed,
            hits: Lazy::NotComputed,
            stages_applied: 0,
            device: Device::default(),
        }
    }

    /// A channel that loads its data and mask on first access.
    pub fn with_producers(
        data: Box<dyn FnOnce() -> Result<ArcArray2<f32>, ScanError> + Send>,
        mask: Box<dyn FnOnce() -> Result<ArcArray2<u8>, ScanError> + Send>,
        meta: ScanMetadata,
        coarse_channel_number: i64,
    ) -> CoarseChannel {
        CoarseChannel {
            coarse_channel_number,
            meta,
            data: Lazy::Producer(data),
            mask: Lazy::Producer(mask),
            noise_stats: None,
            drift_plane: Lazy::NotComputed,
            hits: Lazy::NotComputed,
            stages_applied: 0,
            device: Device::default(),
        }
    }

    /// A channel with metadata only; used when hits are deserialised without
    /// their waterfall.
    pub fn from_metadata(meta: ScanMetadata, coarse_channel_number: i64) -> CoarseChannel {
        CoarseChannel {
            coarse_channel_number,
            meta,
            data: Lazy::NotComputed,
            mask: Lazy::NotComputed,
            noise_stats: None,
            drift_plane: Lazy::NotComputed,
            hits: Lazy::NotComputed,
            stages_applied: 0,
            device: Device::default(),
        }
    }

    /// The power waterfall (time × frequency), loading it on first access.
    pub fn data(&mut self) -> Result<ArcArray2<f32>, ScanError> {
        Ok(self.data.get("channel data")?.clone())
    }

    pub fn set_data(&mut self, new_data: ArcArray2<f32>) {
        self.data = Lazy::Ready(new_data);
    }

    /// The RFI mask matching the power waterfall, loading it on first
    /// access.
    pub fn mask(&mut self) -> Result<ArcArray2<u8>, ScanError> {
        Ok(self.mask.get("channel mask")?.clone())
    }

    pub fn set_mask(&mut self, new_mask: ArcArray2<u8>) {
        self.mask = Lazy::Ready(new_mask);
    }

    /// The noise statistics attached by an estimator stage.
    pub fn noise_estimate(&self) -> Result<NoiseStats, ScanError> {
        self.noise_stats
            .ok_or(ScanError::NotComputed("noise estimate"))
    }

    pub fn set_noise_estimate(&mut self, estimate: NoiseStats) {
        self.noise_stats = Some(estimate);
    }

    /// The integrated drift plane, running its producer if this is the first
    /// read. The returned handle shares its tensors with the memoised copy.
    pub fn integrated_drift_plane(&mut self) -> Result<FrequencyDriftPlane, ScanError> {
        Ok(self.drift_plane.get("integrated drift plane")?.clone())
    }

    pub fn set_integrated_drift_plane(&mut self, plane: FrequencyDriftPlane) {
        self.drift_plane = Lazy::Ready(plane);
    }

    /// Defer the drift integration until the plane is first read.
    pub fn set_integrated_drift_plane_producer(
        &mut self,
        producer: Box<dyn FnOnce() -> Result<FrequencyDriftPlane, ScanError> + Send>,
    ) {
        self.drift_plane = Lazy::Producer(producer);
    }

    /// Whether hits are available (set or producible) without triggering a
    /// search.
    pub fn has_hits(&self) -> bool {
        self.hits.is_set()
    }

    /// The detected hits, running the search producer if this is the first
    /// read.
    pub fn hits(&mut self) -> Result<Vec<Hit>, ScanError> {
        Ok(self.hits.get("hits")?.clone())
    }

    pub fn set_hits(&mut self, new_hits: Vec<Hit>) {
        self.hits = Lazy::Ready(new_hits);
    }

    /// Defer the hit search until the hits are first read.
    pub fn set_hits_producer(
        &mut self,
        producer: Box<dyn FnOnce() -> Result<Vec<Hit>, ScanError> + Send>,
    ) {
        self.hits = Lazy::Producer(producer);
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Record the target device. Tensors migrate lazily; see
    /// [`CoarseChannel::push_device`].
    pub fn set_device(&mut self, device: Device) -> Result<(), ScanError> {
        device.validate()?;
        self.device = device;
        Ok(())
    }

    /// Migrate all resident tensors to the configured device now. With only
    /// the CPU backend compiled, resident tensors are already home.
    pub fn push_device(&mut self) -> Result<(), ScanError> {
        self.device.validate()?;
        if let Lazy::Ready(plane) = &mut self.drift_plane {
            plane.set_device(self.device)?;
            plane.push_device()?;
        }
        Ok(())
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

    pub fn nchans(&self) -> i64 {
        self.meta.nchans
    }

    pub fn ntsteps(&self) -> i64 {
        self.meta.ntsteps
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
}
