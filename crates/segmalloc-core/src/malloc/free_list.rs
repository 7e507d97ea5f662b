//! Segregated free lists.
//!
//! Free blocks are grouped into `NUM_BUCKETS` power-of-two size classes.
//! Each bucket is a doubly linked list kept in ascending size order, and the
//! links live inside the free blocks themselves (first two payload words), so
//! the index needs no storage beyond one head offset per bucket.

use super::layout::{self, NULL_LINK};

/// Number of size-class buckets.
pub const NUM_BUCKETS: usize = 16;

/// Maps a block size to its bucket.
///
/// Bucket `i` holds sizes in `[2^i, 2^(i+1))`; the last bucket takes
/// everything from `2^(NUM_BUCKETS - 1)` up.
#[must_use]
pub fn bucket_for(size: usize) -> usize {
    let mut size = size;
    let mut bucket = 0;
    while bucket < NUM_BUCKETS - 1 && size > 1 {
        size >>= 1;
        bucket += 1;
    }
    bucket
}

/// Bucket heads for the segregated lists.
#[derive(Debug, Clone, Default)]
pub struct FreeLists {
    heads: [usize; NUM_BUCKETS],
}

impl FreeLists {
    /// Creates an index with every bucket empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every bucket without touching the arena.
    pub fn clear(&mut self) {
        self.heads = [NULL_LINK; NUM_BUCKETS];
    }

    /// Head of `bucket`, if any.
    #[must_use]
    pub fn head(&self, bucket: usize) -> Option<usize> {
        match self.heads[bucket] {
            NULL_LINK => None,
            bp => Some(bp),
        }
    }

    /// Walks `bucket` in list order.
    pub fn iter<'a>(&self, heap: &'a [u8], bucket: usize) -> BucketIter<'a> {
        BucketIter {
            heap,
            next: self.heads[bucket],
        }
    }

    /// Total number of free blocks across all buckets.
    #[must_use]
    pub fn len(&self, heap: &[u8]) -> usize {
        (0..NUM_BUCKETS).map(|b| self.iter(heap, b).count()).sum()
    }

    /// True when no bucket holds a block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heads.iter().all(|&h| h == NULL_LINK)
    }

    /// Links free block `bp` into its bucket, keeping ascending size order.
    pub fn insert(&mut self, heap: &mut [u8], bp: usize) {
        let size = layout::block_size(heap, bp);
        let bucket = bucket_for(size);

        let mut pred = NULL_LINK;
        let mut succ = self.heads[bucket];
        while succ != NULL_LINK && layout::block_size(heap, succ) < size {
            pred = succ;
            succ = layout::succ(heap, succ);
        }

        match (pred, succ) {
            // Middle of the list.
            (p, s) if p != NULL_LINK && s != NULL_LINK => {
                layout::set_pred(heap, bp, p);
                layout::set_succ(heap, bp, s);
                layout::set_pred(heap, s, bp);
                layout::set_succ(heap, p, bp);
            }
            // New head of a non-empty list.
            (NULL_LINK, s) if s != NULL_LINK => {
                layout::set_pred(heap, bp, NULL_LINK);
                layout::set_succ(heap, bp, s);
                layout::set_pred(heap, s, bp);
                self.heads[bucket] = bp;
            }
            // New tail.
            (p, NULL_LINK) if p != NULL_LINK => {
                layout::set_pred(heap, bp, p);
                layout::set_succ(heap, bp, NULL_LINK);
                layout::set_succ(heap, p, bp);
            }
            // Empty bucket.
            _ => {
                layout::set_pred(heap, bp, NULL_LINK);
                layout::set_succ(heap, bp, NULL_LINK);
                self.heads[bucket] = bp;
            }
        }
    }

    /// Unlinks free block `bp` from its bucket.
    ///
    /// The bucket is recomputed from the block's current header, so callers
    /// must remove a block before rewriting its size.
    pub fn remove(&mut self, heap: &mut [u8], bp: usize) {
        let bucket = bucket_for(layout::block_size(heap, bp));
        let pred = layout::pred(heap, bp);
        let succ = layout::succ(heap, bp);

        match (pred, succ) {
            (p, s) if p != NULL_LINK && s != NULL_LINK => {
                layout::set_succ(heap, p, s);
                layout::set_pred(heap, s, p);
            }
            (NULL_LINK, s) if s != NULL_LINK => {
                layout::set_pred(heap, s, NULL_LINK);
                self.heads[bucket] = s;
            }
            (p, NULL_LINK) if p != NULL_LINK => {
                layout::set_succ(heap, p, NULL_LINK);
            }
            _ => {
                self.heads[bucket] = NULL_LINK;
            }
        }
    }

    /// Finds a free block of at least `size` bytes.
    ///
    /// Buckets are scanned upward from `bucket_for(size)`; within a bucket the
    /// first sufficient block is the smallest one there.
    #[must_use]
    pub fn find_fit(&self, heap: &[u8], size: usize) -> Option<usize> {
        (bucket_for(size)..NUM_BUCKETS)
            .find_map(|bucket| self.iter(heap, bucket).find(|&bp| layout::block_size(heap, bp) >= size))
    }
}

/// Iterator over the block offsets of one bucket.
pub struct BucketIter<'a> {
    heap: &'a [u8],
    next: usize,
}

impl Iterator for BucketIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next == NULL_LINK {
            return None;
        }
        let bp = self.next;
        self.next = layout::succ(self.heap, bp);
        Some(bp)
    }
}
