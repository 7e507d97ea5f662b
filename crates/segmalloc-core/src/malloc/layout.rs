//! Block layout codec.
//!
//! Every block in the arena is bracketed by two 32-bit boundary tags that
//! carry the block size and the allocated bit:
//!
//! ```text
//!   offset bp - 4          bp                          bp + size - 8
//!   +-----------------+-------------------------------+-----------------+
//!   | header (size|a) | payload (pred, succ if free)  | footer (size|a) |
//!   +-----------------+-------------------------------+-----------------+
//! ```
//!
//! A block is identified by its payload offset `bp`. All functions here are
//! pure arithmetic over the arena bytes; they never consult the free lists.

/// Width of a tag or link word (bytes).
pub const WORD_SIZE: usize = 4;

/// Two words: header + footer overhead of every block.
pub const DOUBLE_WORD: usize = 8;

/// Payload alignment and block size granularity (bytes).
pub const ALIGNMENT: usize = 8;

/// Header + footer bytes carried by every block.
pub const OVERHEAD: usize = DOUBLE_WORD;

/// Smallest block that can hold header, two links and footer.
pub const MIN_BLOCK_SIZE: usize = 2 * DOUBLE_WORD;

/// Size of the prologue sentinel (header + footer, no payload).
pub const PROLOGUE_SIZE: usize = DOUBLE_WORD;

/// Payload offset of the prologue sentinel.
pub const PROLOGUE_BP: usize = 2 * WORD_SIZE;

/// Bytes written at initialization: padding, prologue header/footer, epilogue.
pub const SENTINEL_BYTES: usize = 4 * WORD_SIZE;

/// Null value for free-list links. Offset 0 is the padding word, never a block.
pub const NULL_LINK: usize = 0;

const ALLOC_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

/// Packs a block size and allocated flag into a tag word.
#[inline]
#[must_use]
pub const fn pack(size: usize, allocated: bool) -> u32 {
    (size as u32 & SIZE_MASK) | if allocated { ALLOC_BIT } else { 0 }
}

/// Size field of a tag word.
#[inline]
#[must_use]
pub const fn tag_size(tag: u32) -> usize {
    (tag & SIZE_MASK) as usize
}

/// Allocated bit of a tag word.
#[inline]
#[must_use]
pub const fn tag_allocated(tag: u32) -> bool {
    tag & ALLOC_BIT != 0
}

/// Rounds `n` up to the alignment unit, or `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(n: usize) -> Option<usize> {
    match n.checked_add(ALIGNMENT - 1) {
        Some(v) => Some(v & !(ALIGNMENT - 1)),
        None => None,
    }
}

/// Block size needed to serve a payload request of `n` bytes.
///
/// Requests up to one double word get the minimum block; everything else is
/// `n + OVERHEAD` rounded up to the alignment unit.
#[must_use]
pub const fn adjusted_block_size(n: usize) -> Option<usize> {
    if n <= DOUBLE_WORD {
        return Some(MIN_BLOCK_SIZE);
    }
    match n.checked_add(OVERHEAD) {
        Some(total) => align_up(total),
        None => None,
    }
}

/// Reads the 32-bit word at `offset`.
#[inline]
#[must_use]
pub fn read_word(heap: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; WORD_SIZE];
    word.copy_from_slice(&heap[offset..offset + WORD_SIZE]);
    u32::from_le_bytes(word)
}

/// Writes the 32-bit word at `offset`.
#[inline]
pub fn write_word(heap: &mut [u8], offset: usize, value: u32) {
    heap[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
}

/// Offset of the header tag of block `bp`.
#[inline]
#[must_use]
pub const fn header(bp: usize) -> usize {
    bp - WORD_SIZE
}

/// Offset of the footer tag of block `bp`, derived from its stored size.
#[inline]
#[must_use]
pub fn footer(heap: &[u8], bp: usize) -> usize {
    bp + block_size(heap, bp) - DOUBLE_WORD
}

/// Size stored in the header of block `bp`.
#[inline]
#[must_use]
pub fn block_size(heap: &[u8], bp: usize) -> usize {
    tag_size(read_word(heap, header(bp)))
}

/// Allocated bit stored in the header of block `bp`.
#[inline]
#[must_use]
pub fn is_allocated(heap: &[u8], bp: usize) -> bool {
    tag_allocated(read_word(heap, header(bp)))
}

/// Physically next block.
#[inline]
#[must_use]
pub fn next_block(heap: &[u8], bp: usize) -> usize {
    bp + block_size(heap, bp)
}

/// Physically previous block, found through its footer (the word just
/// before `bp`'s header).
#[inline]
#[must_use]
pub fn prev_block(heap: &[u8], bp: usize) -> usize {
    bp - tag_size(read_word(heap, bp - DOUBLE_WORD))
}

/// Writes matching header and footer tags for a block of `size` bytes at `bp`.
///
/// The footer position follows from `size`, not from whatever the header
/// held before, so this is also how blocks are resized.
#[inline]
pub fn set_block(heap: &mut [u8], bp: usize, size: usize, allocated: bool) {
    let tag = pack(size, allocated);
    write_word(heap, header(bp), tag);
    write_word(heap, bp + size - DOUBLE_WORD, tag);
}

/// Writes the epilogue header (size 0, allocated) whose payload offset is `bp`.
#[inline]
pub fn set_epilogue(heap: &mut [u8], bp: usize) {
    write_word(heap, header(bp), pack(0, true));
}

/// Predecessor link of free block `bp`.
#[inline]
#[must_use]
pub fn pred(heap: &[u8], bp: usize) -> usize {
    read_word(heap, bp) as usize
}

/// Successor link of free block `bp`.
#[inline]
#[must_use]
pub fn succ(heap: &[u8], bp: usize) -> usize {
    read_word(heap, bp + WORD_SIZE) as usize
}

#[inline]
pub fn set_pred(heap: &mut [u8], bp: usize, link: usize) {
    write_word(heap, bp, link as u32);
}

#[inline]
pub fn set_succ(heap: &mut [u8], bp: usize, link: usize) {
    write_word(heap, bp + WORD_SIZE, link as u32);
}
