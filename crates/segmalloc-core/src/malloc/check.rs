//! Heap walker and consistency checker.
//!
//! The checker re-derives every invariant from the raw arena bytes: it walks
//! the blocks physically from the prologue to the epilogue, then walks each
//! free-list bucket, and cross-references the two views.

use std::collections::{HashMap, HashSet};

use super::free_list::{FreeLists, NUM_BUCKETS, bucket_for};
use super::layout::{
    self, ALIGNMENT, DOUBLE_WORD, MIN_BLOCK_SIZE, NULL_LINK, PROLOGUE_SIZE, WORD_SIZE,
};
use crate::error::HeapCheckError;

/// One block seen by a physical walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Payload offset.
    pub ptr: usize,
    /// Block size including tags.
    pub size: usize,
    pub allocated: bool,
}

/// Summary produced by a successful heap check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapReport {
    pub blocks: usize,
    pub allocated_blocks: usize,
    pub free_blocks: usize,
    pub allocated_bytes: usize,
    pub free_bytes: usize,
    pub largest_free: usize,
    pub arena_bytes: usize,
}

/// Physical block iterator. Stops at the epilogue, or early if a header
/// points outside the arena.
pub struct Blocks<'a> {
    heap: &'a [u8],
    next: Option<usize>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let bp = self.next?;
        if bp < WORD_SIZE || bp > self.heap.len() {
            self.next = None;
            return None;
        }
        let tag = layout::read_word(self.heap, layout::header(bp));
        let size = layout::tag_size(tag);
        if size == 0 || bp + size > self.heap.len() {
            self.next = None;
            return None;
        }
        self.next = Some(bp + size);
        Some(BlockInfo {
            ptr: bp,
            size,
            allocated: layout::tag_allocated(tag),
        })
    }
}

/// Walks the blocks after the prologue at `prologue`.
pub fn walk_blocks(heap: &[u8], prologue: usize) -> Blocks<'_> {
    Blocks {
        heap,
        next: Some(prologue + PROLOGUE_SIZE),
    }
}

/// Checks every structural invariant of the heap.
pub fn check_heap(
    heap: &[u8],
    lists: &FreeLists,
    prologue: usize,
) -> Result<HeapReport, HeapCheckError> {
    let first = prologue + PROLOGUE_SIZE;
    if heap.len() < first {
        return Err(HeapCheckError::Truncated { len: heap.len() });
    }

    let padding = layout::read_word(heap, layout::header(prologue) - WORD_SIZE);
    if padding != 0 {
        return Err(HeapCheckError::BadPadding { tag: padding });
    }

    let sentinel = layout::pack(PROLOGUE_SIZE, true);
    let header = layout::read_word(heap, layout::header(prologue));
    let footer = layout::read_word(heap, prologue);
    if header != sentinel || footer != sentinel {
        return Err(HeapCheckError::BadPrologue { header, footer });
    }

    let mut report = HeapReport {
        arena_bytes: heap.len(),
        ..HeapReport::default()
    };
    // bp -> allocated bit, for every real block.
    let mut blocks: HashMap<usize, bool> = HashMap::new();
    let mut free: Vec<usize> = Vec::new();
    let mut prev_free: Option<usize> = None;
    let mut bp = first;

    loop {
        let tag = layout::read_word(heap, layout::header(bp));
        let size = layout::tag_size(tag);

        if size == 0 {
            if !layout::tag_allocated(tag) || bp != heap.len() {
                return Err(HeapCheckError::BadEpilogue {
                    offset: layout::header(bp),
                    tag,
                });
            }
            break;
        }
        if bp % ALIGNMENT != 0 {
            return Err(HeapCheckError::Misaligned { bp });
        }
        if size < MIN_BLOCK_SIZE || size % ALIGNMENT != 0 {
            return Err(HeapCheckError::BadSize { bp, size });
        }
        // Next header must lie inside the arena.
        if bp + size > heap.len() {
            return Err(HeapCheckError::OutOfBounds {
                bp,
                size,
                end: heap.len(),
            });
        }
        let footer = layout::read_word(heap, bp + size - DOUBLE_WORD);
        if footer != tag {
            return Err(HeapCheckError::TagMismatch {
                bp,
                header: tag,
                footer,
            });
        }

        let allocated = layout::tag_allocated(tag);
        report.blocks += 1;
        if allocated {
            report.allocated_blocks += 1;
            report.allocated_bytes += size;
            prev_free = None;
        } else {
            if let Some(first) = prev_free {
                return Err(HeapCheckError::AdjacentFree { first, second: bp });
            }
            report.free_blocks += 1;
            report.free_bytes += size;
            report.largest_free = report.largest_free.max(size);
            free.push(bp);
            prev_free = Some(bp);
        }
        blocks.insert(bp, allocated);
        bp += size;
    }

    let mut listed: HashSet<usize> = HashSet::new();
    for bucket in 0..NUM_BUCKETS {
        let mut prev = NULL_LINK;
        let mut prev_size = 0;
        let mut cursor = lists.head(bucket);
        while let Some(bp) = cursor {
            match blocks.get(&bp) {
                None => return Err(HeapCheckError::ForeignLink { bucket, bp }),
                Some(true) => return Err(HeapCheckError::AllocatedInBucket { bucket, bp }),
                Some(false) => {}
            }
            if !listed.insert(bp) {
                return Err(HeapCheckError::Duplicate { bp });
            }
            let size = layout::block_size(heap, bp);
            let expected = bucket_for(size);
            if expected != bucket {
                return Err(HeapCheckError::WrongBucket {
                    bp,
                    size,
                    bucket,
                    expected,
                });
            }
            if size < prev_size {
                return Err(HeapCheckError::Unsorted { bucket, bp });
            }
            let back = layout::pred(heap, bp);
            if back != prev {
                return Err(HeapCheckError::BrokenBackLink {
                    bp,
                    found: back,
                    expected: prev,
                });
            }
            prev = bp;
            prev_size = size;
            cursor = match layout::succ(heap, bp) {
                NULL_LINK => None,
                next => Some(next),
            };
        }
    }

    if let Some(&bp) = free.iter().find(|bp| !listed.contains(bp)) {
        return Err(HeapCheckError::Unlisted { bp });
    }

    Ok(report)
}
