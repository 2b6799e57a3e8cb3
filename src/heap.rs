//! The boundary-tag heap.
//!
//! [`Heap`] manages every byte its [`HeapSource`] exposes as a chain of
//! contiguous blocks. Allocation reuses previously freed blocks before
//! asking the source for more space, freeing merges a block with any free
//! neighbor, and reallocation composes the two with a copy decision.
//!
//! ## Characteristics
//!
//! #### Time complexity
//!
//! | Operation                | Best-case | Worst-case            |
//! |--------------------------|-----------|-----------------------|
//! | Allocate                 | O(1)      | O(blocks) + one grow  |
//! | Free                     | O(1)      | O(1)                  |
//! | Reallocate               | O(1)      | O(blocks) + copy      |
//!
//! #### Fragmentation
//!
//! First-fit placement accepts some external fragmentation in exchange for
//! allocation throughput; unconditional coalescing on free keeps it from
//! compounding. Splitting never leaves a remainder smaller than
//! [`MIN_BLOCK_SIZE`], so small requests suffer bounded internal
//! fragmentation instead of littering the arena with unusable slivers.

use core::{cmp, fmt};

use log::{error, trace};

use crate::{
    tag::{align_up, Tag, ALIGNMENT, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, OVERHEAD, WORD_SIZE},
    AllocError, AllocInitError, HeapSource,
};

/// Offset of the prologue header tag.
const PROLOGUE_HEADER: usize = WORD_SIZE;

/// Offset of the prologue footer tag.
const PROLOGUE_FOOTER: usize = 2 * WORD_SIZE;

/// Bytes occupied by the base layout: padding, prologue pair, and the
/// initial epilogue.
const BASE_LAYOUT: usize = 4 * WORD_SIZE;

/// Payload offset of the first real block.
const FIRST_PAYLOAD: usize = BASE_LAYOUT;

/// Default number of bytes requested from the source per growth step.
pub const DEFAULT_GROWTH_QUANTUM: usize = 4096;

/// A handle to an allocated block.
///
/// A handle is the byte offset of the block's payload within the arena; the
/// payload is always aligned to [`ALIGNMENT`] bytes. Handles are only
/// meaningful to the heap that issued them, and only until the block is
/// freed or reallocated.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BlockHandle(usize);

impl BlockHandle {
    /// Returns the payload's byte offset within the arena.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// A boundary-tag heap over a growable arena.
///
/// The arena layout, byte for byte:
///
/// ```text
/// [pad:4][prologue hdr:4][prologue ftr:4] { [hdr:4][payload][ftr:4] }* [epilogue hdr:4]
/// ```
///
/// The prologue is a minimal allocated block and the epilogue a zero-size
/// allocated header; together they let every real block read its neighbors'
/// tags without special-casing the arena's edges. Between completed
/// operations no two free blocks are ever adjacent.
///
/// A heap is single-owner: it is driven through `&mut self` and performs no
/// internal synchronization.
pub struct Heap<S: HeapSource> {
    source: S,
    quantum: usize,
}

impl<S: HeapSource> Heap<S> {
    /// Constructs a heap over `source` with the default growth quantum.
    ///
    /// Establishes the prologue and epilogue, then extends the arena by
    /// [`DEFAULT_GROWTH_QUANTUM`] bytes so the heap starts with one free
    /// block.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` is not empty or cannot supply the
    /// initial region.
    pub fn try_new(source: S) -> Result<Heap<S>, AllocInitError> {
        Heap::with_growth_quantum(source, DEFAULT_GROWTH_QUANTUM)
    }

    /// Constructs a heap over `source`, growing the arena by at least
    /// `quantum` bytes per growth step.
    ///
    /// A larger quantum amortizes the cost of the source's growth primitive
    /// over more allocations; a smaller one keeps small heaps small.
    ///
    /// # Errors
    ///
    /// Returns [`AllocInitError::InvalidConfig`] if `quantum` is zero, not
    /// a multiple of [`ALIGNMENT`], or larger than a tag can encode, or if
    /// `source` already contains bytes. Returns
    /// [`AllocInitError::GrowFailed`] if the source cannot supply the base
    /// layout plus one quantum.
    pub fn with_growth_quantum(source: S, quantum: usize) -> Result<Heap<S>, AllocInitError> {
        if quantum == 0 || quantum % ALIGNMENT != 0 || quantum > MAX_BLOCK_SIZE {
            return Err(AllocInitError::InvalidConfig);
        }

        if !source.bytes().is_empty() {
            return Err(AllocInitError::InvalidConfig);
        }

        let mut heap = Heap { source, quantum };

        heap.source
            .grow(BASE_LAYOUT)
            .map_err(|_| AllocInitError::GrowFailed(BASE_LAYOUT))?;

        heap.set_tag(PROLOGUE_HEADER, Tag::new(OVERHEAD, true));
        heap.set_tag(PROLOGUE_FOOTER, Tag::new(OVERHEAD, true));
        heap.set_tag(BASE_LAYOUT - WORD_SIZE, Tag::new(0, true));

        heap.extend(quantum)
            .map_err(|_| AllocInitError::GrowFailed(quantum))?;

        Ok(heap)
    }

    /// Attempts to allocate a block with at least `size` payload bytes.
    ///
    /// The returned handle's payload is aligned to [`ALIGNMENT`] bytes and
    /// its contents are unspecified. A free block is always preferred over
    /// growing the arena; blocks are carved first-fit, scanning from the
    /// start of the arena.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `size` is zero, or if no free block fits and the
    /// source cannot grow far enough. A failed allocation leaves the heap
    /// untouched.
    pub fn allocate(&mut self, size: usize) -> Result<BlockHandle, AllocError> {
        if size == 0 {
            return Err(AllocError);
        }

        let adjusted = adjust(size)?;

        if let Some(payload) = self.find_fit(adjusted) {
            self.place(payload, adjusted);
            return Ok(BlockHandle(payload));
        }

        let payload = self.extend(cmp::max(adjusted, self.quantum))?;
        self.place(payload, adjusted);
        Ok(BlockHandle(payload))
    }

    /// Frees the block behind `handle` and merges it with any free
    /// neighbor.
    ///
    /// `handle` must have been returned by [`allocate`] or [`reallocate`]
    /// on this heap and not yet freed. The baseline build trusts the caller
    /// and performs no validation; freeing a stale or foreign handle
    /// corrupts the block chain. With the `hardened` feature the common
    /// violations are detected and reported by panicking instead.
    ///
    /// [`allocate`]: Heap::allocate
    /// [`reallocate`]: Heap::reallocate
    pub fn free(&mut self, handle: BlockHandle) {
        #[cfg(feature = "hardened")]
        self.validate(handle);

        let payload = handle.0;
        let size = self.block_size(payload);

        self.set_block(payload, size, false);
        self.coalesce(payload);
    }

    /// Resizes the block behind `handle` to at least `size` payload bytes.
    ///
    /// - `handle == None` behaves as [`allocate`]`(size)`.
    /// - `size == 0` behaves as [`free`] and returns `Ok(None)`.
    /// - If the adjusted size matches the block, the handle is returned
    ///   unchanged.
    /// - Shrinking is done in place: the block is released, merged with any
    ///   free neighbor, and re-carved at the smaller size, moving the
    ///   payload backward if the merge relocated the block.
    /// - Growing allocates a fresh block, copies the payload, and frees the
    ///   old block.
    ///
    /// Payload bytes within `min(old, new)` are preserved exactly; any
    /// bytes beyond the old size are unspecified.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a required fresh allocation fails. The original
    /// block is untouched on that path.
    ///
    /// [`allocate`]: Heap::allocate
    /// [`free`]: Heap::free
    pub fn reallocate(
        &mut self,
        handle: Option<BlockHandle>,
        size: usize,
    ) -> Result<Option<BlockHandle>, AllocError> {
        let handle = match handle {
            Some(handle) => handle,
            None if size == 0 => return Ok(None),
            None => return self.allocate(size).map(Some),
        };

        if size == 0 {
            self.free(handle);
            return Ok(None);
        }

        #[cfg(feature = "hardened")]
        self.validate(handle);

        let payload = handle.0;
        let adjusted = adjust(size)?;
        let current = self.block_size(payload);

        if adjusted == current {
            return Ok(Some(handle));
        }

        if adjusted < current {
            // In-place shrink: release the block, absorb a free neighbor,
            // and carve the smaller size out of the merged region. The
            // payload moves backward only if the merge relocated the block.
            self.set_block(payload, current, false);
            let merged = self.coalesce(payload);

            if merged != payload {
                self.copy_payload(payload, merged, size);
            }

            self.place(merged, adjusted);
            return Ok(Some(BlockHandle(merged)));
        }

        let new = self.allocate(size)?;
        self.copy_payload(payload, new.0, current - OVERHEAD);
        self.free(handle);
        Ok(Some(new))
    }

    /// Borrows the payload bytes of an allocated block.
    ///
    /// `handle` must refer to a live allocation; the slice covers the
    /// block's full payload capacity, which may exceed the requested size.
    pub fn payload(&self, handle: BlockHandle) -> &[u8] {
        let payload = handle.0;
        let end = payload + self.block_size(payload) - OVERHEAD;
        &self.source.bytes()[payload..end]
    }

    /// Mutably borrows the payload bytes of an allocated block.
    ///
    /// `handle` must refer to a live allocation; the slice covers the
    /// block's full payload capacity, which may exceed the requested size.
    pub fn payload_mut(&mut self, handle: BlockHandle) -> &mut [u8] {
        let payload = handle.0;
        let end = payload + self.block_size(payload) - OVERHEAD;
        &mut self.source.bytes_mut()[payload..end]
    }

    /// Walks the block chain and reports whether the heap is consistent.
    ///
    /// Verifies the prologue, header/footer agreement, size alignment and
    /// minimums, arena bounds, the no-adjacent-free-blocks invariant, and
    /// epilogue termination. Every violation found is reported through
    /// [`log::error!`].
    ///
    /// Without an explicit free-list index this walk cannot verify that
    /// every free block is reachable from a free list, nor that allocated
    /// payloads are disjoint; it checks the block chain only.
    pub fn check_heap(&self) -> bool {
        let len = self.source.bytes().len();
        let mut consistent = true;

        if len < BASE_LAYOUT {
            error!("arena holds {len} bytes, shorter than the base layout");
            return false;
        }

        let prologue = Tag::new(OVERHEAD, true);
        if self.tag_at(PROLOGUE_HEADER) != prologue || self.tag_at(PROLOGUE_FOOTER) != prologue {
            error!("prologue tags damaged");
            consistent = false;
        }

        let mut payload = FIRST_PAYLOAD;
        let mut prev_free = false;

        loop {
            if payload > len {
                error!("block chain runs past the arena end at offset {payload}");
                return false;
            }

            let header = self.tag_at(payload - WORD_SIZE);
            let size = header.size();

            if size == 0 {
                if payload != len {
                    error!(
                        "epilogue at offset {} is not at the arena end",
                        payload - WORD_SIZE
                    );
                    consistent = false;
                }
                if !header.is_allocated() {
                    error!("epilogue is not tagged allocated");
                    consistent = false;
                }
                break;
            }

            if size % ALIGNMENT != 0 || size < MIN_BLOCK_SIZE {
                error!("block at offset {payload} has invalid size {size}");
                return false;
            }

            if len - payload < size {
                error!("block at offset {payload} overruns the arena");
                return false;
            }

            let footer = self.tag_at(payload + size - OVERHEAD);
            if footer != header {
                error!("boundary tags disagree at offset {payload}: {header:?} vs {footer:?}");
                consistent = false;
            }

            if payload % ALIGNMENT != 0 {
                error!("misaligned payload at offset {payload}");
                consistent = false;
            }

            if prev_free && !header.is_allocated() {
                error!("adjacent free blocks at offset {payload}");
                consistent = false;
            }

            prev_free = !header.is_allocated();
            payload += size;
        }

        consistent
    }

    /// Returns a snapshot of block and free-space counts.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            arena_len: self.source.bytes().len(),
            blocks: 0,
            free_blocks: 0,
            free_bytes: 0,
        };

        let mut payload = FIRST_PAYLOAD;
        loop {
            let tag = self.tag_at(payload - WORD_SIZE);
            if tag.size() == 0 {
                break;
            }

            stats.blocks += 1;
            if !tag.is_allocated() {
                stats.free_blocks += 1;
                stats.free_bytes += tag.size() - OVERHEAD;
            }

            payload += tag.size();
        }

        stats
    }

    /// Returns a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consumes the heap and returns the underlying source.
    ///
    /// All outstanding handles are invalidated.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Extends the arena by at least `bytes`, formats the new space as one
    /// free block over the reclaimed epilogue position, writes a fresh
    /// epilogue, and merges with a trailing free block if present. Returns
    /// the resulting free block's payload offset.
    fn extend(&mut self, bytes: usize) -> Result<usize, AllocError> {
        let bytes = align_up(bytes);

        let prev_end = self.source.bytes().len();
        if MAX_BLOCK_SIZE - prev_end < bytes {
            return Err(AllocError);
        }

        let prev_end = self.source.grow(bytes)?;
        trace!("extended arena by {bytes} bytes, end {prev_end} -> {}", prev_end + bytes);

        // The new block's header claims the old epilogue word, so its
        // payload begins exactly at the old arena end.
        self.set_block(prev_end, bytes, false);
        self.set_tag(prev_end + bytes - WORD_SIZE, Tag::new(0, true));

        Ok(self.coalesce(prev_end))
    }

    /// First-fit scan for a free block of at least `size` total bytes.
    fn find_fit(&self, size: usize) -> Option<usize> {
        let mut payload = FIRST_PAYLOAD;

        loop {
            let tag = self.tag_at(payload - WORD_SIZE);
            if tag.size() == 0 {
                return None;
            }

            if !tag.is_allocated() && tag.size() >= size {
                return Some(payload);
            }

            payload += tag.size();
        }
    }

    /// Carves `size` total bytes out of the free block at `payload`,
    /// splitting off the remainder as a fresh free block when it is large
    /// enough to stand alone.
    fn place(&mut self, payload: usize, size: usize) {
        let total = self.block_size(payload);
        debug_assert!(total >= size);

        if total - size >= MIN_BLOCK_SIZE {
            self.set_block(payload, size, true);
            self.set_block(payload + size, total - size, false);
        } else {
            self.set_block(payload, total, true);
        }
    }

    /// Merges the free block at `payload` with free neighbors, rewriting
    /// only the outer boundary tags, and returns the merged block's payload
    /// offset. The prologue and epilogue guarantee both neighbor reads are
    /// in bounds.
    fn coalesce(&mut self, payload: usize) -> usize {
        let size = self.block_size(payload);
        let prev = self.tag_at(payload - OVERHEAD);
        let next = self.tag_at(payload + size - WORD_SIZE);

        match (prev.is_allocated(), next.is_allocated()) {
            (true, true) => payload,
            (true, false) => {
                self.set_block(payload, size + next.size(), false);
                payload
            }
            (false, true) => {
                let merged = payload - prev.size();
                self.set_block(merged, prev.size() + size, false);
                merged
            }
            (false, false) => {
                let merged = payload - prev.size();
                self.set_block(merged, prev.size() + size + next.size(), false);
                merged
            }
        }
    }

    /// Copies `len` payload bytes from the block at `from` to the block at
    /// `to`. The ranges may overlap.
    fn copy_payload(&mut self, from: usize, to: usize, len: usize) {
        self.source.bytes_mut().copy_within(from..from + len, to);
    }

    fn block_size(&self, payload: usize) -> usize {
        self.tag_at(payload - WORD_SIZE).size()
    }

    /// Writes matching header and footer tags for the block at `payload`.
    fn set_block(&mut self, payload: usize, size: usize, allocated: bool) {
        let tag = Tag::new(size, allocated);
        self.set_tag(payload - WORD_SIZE, tag);
        self.set_tag(payload + size - OVERHEAD, tag);
    }

    fn tag_at(&self, offset: usize) -> Tag {
        let bytes = &self.source.bytes()[offset..offset + WORD_SIZE];
        Tag::from_bits(u32::from_ne_bytes(bytes.try_into().unwrap()))
    }

    fn set_tag(&mut self, offset: usize, tag: Tag) {
        self.source.bytes_mut()[offset..offset + WORD_SIZE]
            .copy_from_slice(&tag.bits().to_ne_bytes());
    }

    /// Checks that `handle` plausibly refers to a live allocation, panicking
    /// with a diagnostic otherwise.
    #[cfg(feature = "hardened")]
    fn validate(&self, handle: BlockHandle) {
        let payload = handle.0;
        let len = self.source.bytes().len();

        if payload % ALIGNMENT != 0 || payload < FIRST_PAYLOAD || payload >= len {
            panic!("bt_alloc: handle {handle:?} does not point into the arena");
        }

        let header = self.tag_at(payload - WORD_SIZE);
        if !header.is_allocated() {
            panic!("bt_alloc: double or foreign free of {handle:?}");
        }

        let size = header.size();
        if size < MIN_BLOCK_SIZE || len - payload < size {
            panic!("bt_alloc: corrupted header at {handle:?}");
        }

        if self.tag_at(payload + size - OVERHEAD) != header {
            panic!("bt_alloc: boundary tags disagree at {handle:?}");
        }
    }
}

impl<S: HeapSource> fmt::Debug for Heap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("arena_len", &self.source.bytes().len())
            .field("quantum", &self.quantum)
            .finish()
    }
}

/// Block and free-space counts reported by [`Heap::stats`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct HeapStats {
    /// Total bytes in the arena, metadata included.
    pub arena_len: usize,
    /// Number of real blocks (prologue and epilogue excluded).
    pub blocks: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Payload bytes available across all free blocks.
    pub free_bytes: usize,
}

/// Rounds a request up to a total block size: payload plus overhead,
/// aligned, and never below the minimum block.
fn adjust(size: usize) -> Result<usize, AllocError> {
    let padded = size
        .checked_add(OVERHEAD + ALIGNMENT - 1)
        .ok_or(AllocError)?
        & !(ALIGNMENT - 1);

    if padded > MAX_BLOCK_SIZE {
        return Err(AllocError);
    }

    Ok(cmp::max(padded, MIN_BLOCK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedSource, VecSource};

    fn new_heap() -> Heap<VecSource> {
        Heap::try_new(VecSource::new()).unwrap()
    }

    #[test]
    fn init_establishes_a_consistent_heap() {
        let heap = new_heap();
        assert!(heap.check_heap());

        let stats = heap.stats();
        assert_eq!(stats.arena_len, BASE_LAYOUT + DEFAULT_GROWTH_QUANTUM);
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.free_bytes, DEFAULT_GROWTH_QUANTUM - OVERHEAD);
    }

    #[test]
    fn invalid_quantum_is_rejected() {
        assert!(matches!(
            Heap::with_growth_quantum(VecSource::new(), 0),
            Err(AllocInitError::InvalidConfig)
        ));
        assert!(matches!(
            Heap::with_growth_quantum(VecSource::new(), 12),
            Err(AllocInitError::InvalidConfig)
        ));
    }

    #[test]
    fn non_empty_source_is_rejected() {
        let mut source = VecSource::new();
        source.grow(8).unwrap();
        assert!(matches!(
            Heap::try_new(source),
            Err(AllocInitError::InvalidConfig)
        ));
    }

    #[test]
    fn exhausted_source_fails_init() {
        assert!(matches!(
            Heap::try_new(FixedSource::<8>::new()),
            Err(AllocInitError::GrowFailed(_))
        ));
    }

    #[test]
    fn zero_size_allocation_fails_consistently() {
        let mut heap = new_heap();
        for _ in 0..3 {
            heap.allocate(0).unwrap_err();
        }
        assert!(heap.check_heap());
    }

    #[test]
    fn payloads_are_aligned() {
        let mut heap = new_heap();
        for size in [1, 7, 8, 13, 100, 5000] {
            let handle = heap.allocate(size).unwrap();
            assert_eq!(handle.offset() % ALIGNMENT, 0);
            assert!(heap.payload(handle).len() >= size);
        }
        assert!(heap.check_heap());
    }

    #[test]
    fn freed_space_is_reused_immediately() {
        let mut heap = new_heap();
        let a = heap.allocate(100).unwrap();
        heap.free(a);
        let b = heap.allocate(100).unwrap();
        assert_eq!(a, b);
        assert!(heap.check_heap());
    }

    #[test]
    fn adjacent_free_blocks_merge() {
        let mut heap = new_heap();
        let a = heap.allocate(16).unwrap();
        let b = heap.allocate(16).unwrap();

        heap.free(a);
        heap.free(b);
        assert!(heap.check_heap());
        assert_eq!(heap.stats().free_blocks, 1);

        // The merged region begins at `a` and satisfies a request larger
        // than either original block.
        let c = heap.allocate(32).unwrap();
        assert_eq!(c, a);
        assert!(heap.check_heap());
    }

    #[test]
    fn free_order_does_not_prevent_merging() {
        let mut heap = new_heap();
        let a = heap.allocate(24).unwrap();
        let b = heap.allocate(24).unwrap();
        let c = heap.allocate(24).unwrap();

        heap.free(c);
        heap.free(a);
        heap.free(b);

        assert!(heap.check_heap());
        assert_eq!(heap.stats().free_blocks, 1);
    }

    #[test]
    fn allocation_grows_past_the_quantum() {
        let mut heap = new_heap();
        let big = heap.allocate(3 * DEFAULT_GROWTH_QUANTUM).unwrap();
        assert!(heap.payload(big).len() >= 3 * DEFAULT_GROWTH_QUANTUM);
        assert!(heap.check_heap());
    }

    #[test]
    fn growth_merges_with_a_free_tail() {
        let mut heap = new_heap();

        // Consume the initial block exactly, then leave a free tail.
        let a = heap.allocate(DEFAULT_GROWTH_QUANTUM - OVERHEAD).unwrap();
        heap.free(a);

        // Larger than the tail: the heap must grow, and the new space must
        // fold into the existing trailing free block.
        let b = heap.allocate(DEFAULT_GROWTH_QUANTUM).unwrap();
        assert_eq!(b, a);
        assert!(heap.check_heap());
    }

    #[test]
    fn oom_is_reported_and_state_preserved() {
        let mut heap =
            Heap::try_new(VecSource::with_capacity_limit(BASE_LAYOUT + DEFAULT_GROWTH_QUANTUM))
                .unwrap();

        let a = heap.allocate(64).unwrap();
        heap.payload_mut(a).fill(0xAB);

        heap.allocate(2 * DEFAULT_GROWTH_QUANTUM).unwrap_err();

        assert!(heap.check_heap());
        assert!(heap.payload(a).iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn fixed_source_heap_allocates_without_alloc() {
        let mut heap = Heap::with_growth_quantum(FixedSource::<512>::new(), 256).unwrap();
        let a = heap.allocate(32).unwrap();
        heap.payload_mut(a).fill(7);
        assert!(heap.check_heap());
        heap.free(a);
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_none_allocates() {
        let mut heap = new_heap();
        let handle = heap.reallocate(None, 32).unwrap().unwrap();
        assert!(heap.payload(handle).len() >= 32);
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_to_zero_frees() {
        let mut heap = new_heap();
        let a = heap.allocate(8).unwrap();
        assert_eq!(heap.reallocate(Some(a), 0).unwrap(), None);

        // The freed space is available again.
        let b = heap.allocate(8).unwrap();
        assert_eq!(a, b);
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_none_to_zero_is_a_no_op() {
        let mut heap = new_heap();
        assert_eq!(heap.reallocate(None, 0).unwrap(), None);
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_same_size_returns_the_same_handle() {
        let mut heap = new_heap();
        let a = heap.allocate(32).unwrap();
        let b = heap.reallocate(Some(a), 32).unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reallocate_grow_preserves_content() {
        let mut heap = new_heap();
        let a = heap.allocate(32).unwrap();
        for (i, byte) in heap.payload_mut(a)[..32].iter_mut().enumerate() {
            *byte = i as u8;
        }

        let b = heap.reallocate(Some(a), 4096).unwrap().unwrap();
        for (i, &byte) in heap.payload(b)[..32].iter().enumerate() {
            assert_eq!(byte, i as u8);
        }
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_shrink_in_place_preserves_content() {
        let mut heap = new_heap();
        let a = heap.allocate(100).unwrap();
        for (i, byte) in heap.payload_mut(a)[..100].iter_mut().enumerate() {
            *byte = i as u8;
        }

        let b = heap.reallocate(Some(a), 10).unwrap().unwrap();
        assert_eq!(a, b);
        for (i, &byte) in heap.payload(b)[..10].iter().enumerate() {
            assert_eq!(byte, i as u8);
        }
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_shrink_moves_backward_into_a_free_predecessor() {
        let mut heap = new_heap();
        let x = heap.allocate(16).unwrap();
        let a = heap.allocate(100).unwrap();
        let _guard = heap.allocate(16).unwrap();

        for (i, byte) in heap.payload_mut(a)[..100].iter_mut().enumerate() {
            *byte = i as u8;
        }

        heap.free(x);

        let b = heap.reallocate(Some(a), 10).unwrap().unwrap();
        assert_eq!(b, x);
        for (i, &byte) in heap.payload(b)[..10].iter().enumerate() {
            assert_eq!(byte, i as u8);
        }
        assert!(heap.check_heap());
    }

    #[test]
    fn reallocate_oom_leaves_the_block_untouched() {
        let mut heap =
            Heap::try_new(VecSource::with_capacity_limit(BASE_LAYOUT + DEFAULT_GROWTH_QUANTUM))
                .unwrap();

        let a = heap.allocate(64).unwrap();
        heap.payload_mut(a).fill(0x5A);

        heap.reallocate(Some(a), 2 * DEFAULT_GROWTH_QUANTUM)
            .unwrap_err();

        assert!(heap.check_heap());
        assert!(heap.payload(a).iter().all(|&b| b == 0x5A));
    }

    #[cfg(feature = "hardened")]
    #[test]
    #[should_panic(expected = "double or foreign free")]
    fn hardened_double_free_panics() {
        let mut heap = new_heap();
        let a = heap.allocate(32).unwrap();
        heap.free(a);
        heap.free(a);
    }

    #[cfg(feature = "hardened")]
    #[test]
    #[should_panic(expected = "does not point into the arena")]
    fn hardened_misaligned_handle_panics() {
        let mut heap = new_heap();
        let a = heap.allocate(32).unwrap();
        heap.free(BlockHandle(a.offset() + 1));
    }
}
