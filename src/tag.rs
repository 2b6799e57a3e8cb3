//! Boundary-tag encoding.
//!
//! Every block stores a packed `(size, allocated)` word at each end: a
//! header immediately before the payload and a footer immediately after it.
//! The footer exists so that the block *preceding* an arbitrary block can be
//! found in O(1) by reading the word just before that block's header; this
//! is what makes constant-time coalescing possible.
//!
//! Block sizes are always a multiple of [`ALIGNMENT`], so the low bits of
//! the size are spare; the allocation state is packed into bit 0.

/// Alignment unit for payloads and block sizes, in bytes.
pub const ALIGNMENT: usize = 8;

/// Size of one boundary-tag word, in bytes.
pub(crate) const WORD_SIZE: usize = 4;

/// Metadata bytes per block: one header word plus one footer word.
pub(crate) const OVERHEAD: usize = 2 * WORD_SIZE;

/// The smallest representable real block: header and footer plus one
/// alignment unit of payload.
pub const MIN_BLOCK_SIZE: usize = OVERHEAD + ALIGNMENT;

/// The largest block size a tag word can encode.
pub(crate) const MAX_BLOCK_SIZE: usize = (u32::MAX & !(ALIGNMENT as u32 - 1)) as usize;

const ALLOCATED_BIT: u32 = 1;

/// Rounds `n` up to the next multiple of [`ALIGNMENT`].
///
/// The caller is responsible for ensuring `n + ALIGNMENT - 1` does not
/// overflow.
pub(crate) const fn align_up(n: usize) -> usize {
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// A packed `(size, allocated)` boundary tag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct Tag(u32);

impl Tag {
    /// Packs `size` and the allocation state into one word.
    ///
    /// `size` must be a multiple of [`ALIGNMENT`] and no greater than
    /// [`MAX_BLOCK_SIZE`].
    pub fn new(size: usize, allocated: bool) -> Tag {
        debug_assert_eq!(size % ALIGNMENT, 0);
        debug_assert!(size <= MAX_BLOCK_SIZE);

        Tag(size as u32 | if allocated { ALLOCATED_BIT } else { 0 })
    }

    /// Reinterprets a raw word as a tag.
    pub fn from_bits(bits: u32) -> Tag {
        Tag(bits)
    }

    /// Returns the raw word.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns the block size recorded in the tag.
    pub fn size(self) -> usize {
        (self.0 & !(ALIGNMENT as u32 - 1)) as usize
    }

    /// Returns whether the tag marks the block allocated.
    pub fn is_allocated(self) -> bool {
        self.0 & ALLOCATED_BIT != 0
    }
}
