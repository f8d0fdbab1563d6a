// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The read interface between the search pipeline and whatever holds the
//! waterfall data (an HDF5 filterbank file, a socket, an in-memory tensor).
//!
//! Implementations cache their metadata at construction so the accessors are
//! O(1), and their reads are independent: two workers may read different
//! coarse channels of the same source concurrently without extra locking.

mod error;

pub use error::SourceError;

use ndarray::prelude::*;

use crate::data::ScanMetadata;

/// Polymorphic read access to waterfall power, its flag mask, and the scan
/// metadata.
///
/// The data cube is `[time, feed, frequency]`. Reads must lie fully inside
/// [`WaterfallRead::data_shape`]; zero-padded reads are not allowed and must
/// fail with [`SourceError::OutOfBounds`].
pub trait WaterfallRead: Send + Sync {
    /// The shape of the full data cube, typically `[time, feed, frequency]`.
    fn data_shape(&self) -> Vec<i64>;

    /// Read a hyperslab of power values.
    fn read_data(&self, offset: &[i64], count: &[i64]) -> Result<Array3<f32>, SourceError>;

    /// Read the matching hyperslab of the flag mask. Sources without a mask
    /// return zeros of the requested shape.
    fn read_mask(&self, offset: &[i64], count: &[i64]) -> Result<Array3<u8>, SourceError>;

    /// The path or identifier of this source.
    fn path(&self) -> String;

    /// The scan metadata, cached at construction.
    fn metadata(&self) -> &ScanMetadata;
}

/// A [`WaterfallRead`] over tensors held in memory.
///
/// This is the adapter used by the test suite and by synthetic pipelines;
/// file formats live outside this crate and plug in through the same trait.
pub struct MemorySource {
    data: Array3<f32>,
    mask: Option<Array3<u8>>,
    metadata: ScanMetadata,
    path: String,
}

impl MemorySource {
    /// Wrap an in-memory `[time, feed, frequency]` cube. `metadata.nchans`
    /// and `metadata.ntsteps` are rewritten from the cube's shape.
    pub fn new(data: Array3<f32>, mut metadata: ScanMetadata, path: impl Into<String>) -> Self {
        metadata.ntsteps = data.shape()[0] as i64;
        metadata.nifs = data.shape()[1] as i64;
        metadata.nchans = data.shape()[2] as i64;
        MemorySource {
            data,
            mask: None,
            metadata,
            path: path.into(),
        }
    }

    /// Attach a flag mask matching the data cube's shape.
    pub fn with_mask(mut self, mask: Array3<u8>) -> Result<Self, SourceError> {
        if mask.shape() != self.data.shape() {
            return Err(SourceError::MaskShapeMismatch {
                data: self.data.shape().to_vec(),
                mask: mask.shape().to_vec(),
            });
        }
        self.mask = Some(mask);
        Ok(self)
    }

    fn checked_slice(&self, offset: &[i64], count: &[i64]) -> Result<[std::ops::Range<usize>; 3], SourceError> {
        if offset.len() != 3 || count.len() != 3 {
            return Err(SourceError::BadSelection {
                offset: offset.to_vec(),
                count: count.to_vec(),
            });
        }
        let shape = self.data.shape();
        let mut ranges = [0..0, 0..0, 0..0];
        for dim in 0..3 {
            let start = offset[dim];
            let len = count[dim];
            if start < 0 || len < 0 || start + len > shape[dim] as i64 {
                return Err(SourceError::OutOfBounds {
                    offset: offset.to_vec(),
                    count: count.to_vec(),
                    shape: shape.iter().map(|&d| d as i64).collect(),
                });
            }
            ranges[dim] = start as usize..(start + len) as usize;
        }
        Ok(ranges)
    }
}

impl WaterfallRead for MemorySource {
    fn data_shape(&self) -> Vec<i64> {
        self.data.shape().iter().map(|&d| d as i64).collect()
    }

    fn read_data(&self, offset: &[i64], count: &[i64]) -> Result<Array3<f32>, SourceError> {
        let [t, i, f] = self.checked_slice(offset, count)?;
        Ok(self.data.slice(s![t, i, f]).to_owned())
    }

    fn read_mask(&self, offset: &[i64], count: &[i64]) -> Result<Array3<u8>, SourceError> {
        let [t, i, f] = self.checked_slice(offset, count)?;
        match &self.mask {
            Some(mask) => Ok(mask.slice(s![t, i, f]).to_owned()),
            None => Ok(Array3::zeros((t.len(), i.len(), f.len()))),
        }
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn metadata(&self) -> &ScanMetadata {
        &self.metadata
    }
}
