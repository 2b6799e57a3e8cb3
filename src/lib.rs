//! A boundary-tag heap allocator for a single growable arena.
//!
//! [`Heap`] manages one contiguous byte region that only ever grows at its
//! upper end, in the manner of a classic `sbrk`-backed malloc. Each block
//! carries a packed `(size, allocated)` tag at both of its ends, so a
//! freed block can find and absorb free neighbors in O(1) without any
//! auxiliary index. Allocation is first-fit over the block chain, reusing
//! freed space before asking the backing [`HeapSource`] for more.
//!
//! The arena layout, byte for byte:
//!
//! ```text
//! [pad:4][prologue hdr:4][prologue ftr:4] { [hdr:4][payload][ftr:4] }* [epilogue hdr:4]
//! ```
//!
//! All payloads are 8-byte aligned and the smallest real block is 16
//! bytes. Handles are plain byte offsets into the arena, so the heap is
//! ordinary safe code: every access is bounds-checked slice indexing.
//!
//! # Example
//!
//! ```
//! use bt_alloc::{Heap, VecSource};
//!
//! let mut heap = Heap::try_new(VecSource::new()).unwrap();
//!
//! let a = heap.allocate(64).unwrap();
//! heap.payload_mut(a)[..5].copy_from_slice(b"hello");
//!
//! let a = heap.reallocate(Some(a), 128).unwrap().unwrap();
//! assert_eq!(&heap.payload(a)[..5], b"hello");
//!
//! heap.free(a);
//! assert!(heap.check_heap());
//! ```
//!
//! # Limits
//!
//! A heap is single-owner and performs no locking; drive it from one
//! logical thread. Tags are 32-bit words, so the arena is capped a little
//! under 4 GiB. Memory is never returned to the source.

#![doc(html_root_url = "https://docs.rs/bt_alloc/0.1.0")]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(any(feature = "alloc", test))]
extern crate alloc;

mod heap;
mod source;
mod tag;


pub use crate::heap::{BlockHandle, Heap, HeapStats, DEFAULT_GROWTH_QUANTUM};
pub use crate::source::FixedSource;
pub use crate::tag::{ALIGNMENT, MIN_BLOCK_SIZE};

#[cfg(any(feature = "alloc", test))]
pub use crate::source::VecSource;

use core::fmt;

/// Indicates an allocation failure due to arena exhaustion or an
/// unsupported request.
///
/// Out-of-memory is the only recoverable failure: the operation that
/// reported it has not changed the heap, and the caller may free other
/// blocks and retry.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("heap allocation failed")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// The error type for heap constructors.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AllocInitError {
    /// The source could not supply the initial region.
    ///
    /// The variant contains the number of bytes that could not be
    /// obtained.
    GrowFailed(usize),

    /// The configuration of the heap is invalid.
    ///
    /// Returned when the growth quantum is unusable or the source has
    /// already been written to.
    InvalidConfig,
}

impl fmt::Display for AllocInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocInitError::GrowFailed(bytes) => {
                write!(f, "heap source could not supply {bytes} bytes")
            }
            AllocInitError::InvalidConfig => f.write_str("invalid heap configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocInitError {}

/// Types which provide the memory behind a [`Heap`].
///
/// A source models a program break: a contiguous region that grows
/// monotonically at its upper end and is never unmapped or shrunk. The
/// heap performs all block bookkeeping inside the bytes the source
/// exposes.
///
/// Implementations must uphold the following:
/// - `grow` either extends the region by exactly `delta` bytes and
///   returns the previous length, or fails leaving the region untouched.
/// - `bytes` and `bytes_mut` expose the same region, whose length changes
///   only through `grow`.
/// - Newly grown bytes may hold any value; the heap overwrites the
///   metadata it needs.
pub trait HeapSource {
    /// Extends the region by `delta` bytes, returning the previous end
    /// offset.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the region cannot grow by `delta` bytes. The
    /// region must be left unchanged.
    fn grow(&mut self, delta: usize) -> Result<usize, AllocError>;

    /// Returns the current region.
    fn bytes(&self) -> &[u8];

    /// Returns the current region mutably.
    fn bytes_mut(&mut self) -> &mut [u8];
}
