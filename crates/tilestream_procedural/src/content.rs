//! # Content Cells
//!
//! A chunk's generated content is an ordered sequence of `ContentCell`s,
//! one per world cell in the chunk footprint. The streaming core treats the
//! tag as opaque; only the presentation surface gives it meaning.

use crate::chunk::CellPos;

/// Content type of a single cell.
///
/// The default generator partitions a continuous score into three bands:
/// low scores are `Mountain`, middle scores `Desert`, high scores `Forest`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentTag {
    /// Low band.
    Mountain = 0,
    /// Middle band.
    Desert = 1,
    /// High band.
    Forest = 2,
}

impl ContentTag {
    /// All tags, lowest band first.
    pub const ALL: [Self; 3] = [Self::Mountain, Self::Desert, Self::Forest];

    /// Returns the raw tag value, which is also the tag's index in `ALL`.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One generated cell: where it is and what it holds.
///
/// Produced only by content generation; never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentCell {
    /// World cell position.
    pub pos: CellPos,
    /// Content at that position.
    pub tag: ContentTag,
}

impl ContentCell {
    /// Creates a new content cell.
    #[inline]
    #[must_use]
    pub const fn new(pos: CellPos, tag: ContentTag) -> Self {
        Self { pos, tag }
    }
}
