//! Heap sources: the memory that backs a [`Heap`].
//!
//! A [`HeapSource`] is the crate's model of a program break. It hands out a
//! contiguous byte region that can only grow at its upper end, and it is the
//! only party that can make the region larger. [`Heap`] does all of its
//! block bookkeeping inside the bytes a source exposes.
//!
//! [`Heap`]: crate::Heap

use core::fmt;

use crate::{AllocError, HeapSource};

#[cfg(any(feature = "alloc", test))]
use alloc::vec::Vec;

/// A heap source backed by an inline byte array.
///
/// The arena grows within the array until all `N` bytes are in use, after
/// which [`grow`] fails. Because the storage lives inline, this source works
/// without `alloc` and makes out-of-memory behavior deterministic in tests.
///
/// [`grow`]: HeapSource::grow
pub struct FixedSource<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedSource<N> {
    /// Creates an empty source with `N` bytes of capacity.
    pub const fn new() -> FixedSource<N> {
        FixedSource {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Returns the total capacity of the source.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for FixedSource<N> {
    fn default() -> FixedSource<N> {
        FixedSource::new()
    }
}

impl<const N: usize> HeapSource for FixedSource<N> {
    fn grow(&mut self, delta: usize) -> Result<usize, AllocError> {
        let new_len = self.len.checked_add(delta).ok_or(AllocError)?;
        if new_len > N {
            return Err(AllocError);
        }

        let prev_end = self.len;
        self.len = new_len;
        Ok(prev_end)
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }
}

impl<const N: usize> fmt::Debug for FixedSource<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedSource")
            .field("capacity", &N)
            .field("len", &self.len)
            .finish()
    }
}

/// A growable heap source backed by a `Vec`.
///
/// By default the arena is limited only by the global allocator. A capacity
/// limit can be imposed with [`with_capacity_limit`] to exercise
/// out-of-memory paths without exhausting real memory.
///
/// [`with_capacity_limit`]: VecSource::with_capacity_limit
#[cfg(any(feature = "alloc", test))]
#[derive(Debug, Default)]
pub struct VecSource {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

#[cfg(any(feature = "alloc", test))]
impl VecSource {
    /// Creates an empty, unbounded source.
    pub const fn new() -> VecSource {
        VecSource {
            bytes: Vec::new(),
            limit: None,
        }
    }

    /// Creates an empty source that refuses to grow beyond `limit` bytes.
    pub const fn with_capacity_limit(limit: usize) -> VecSource {
        VecSource {
            bytes: Vec::new(),
            limit: Some(limit),
        }
    }
}

#[cfg(any(feature = "alloc", test))]
impl HeapSource for VecSource {
    fn grow(&mut self, delta: usize) -> Result<usize, AllocError> {
        let prev_end = self.bytes.len();
        let new_len = prev_end.checked_add(delta).ok_or(AllocError)?;

        if let Some(limit) = self.limit {
            if new_len > limit {
                return Err(AllocError);
            }
        }

        self.bytes.resize(new_len, 0);
        Ok(prev_end)
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
