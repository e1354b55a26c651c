//! # Presentation Surface
//!
//! The apply loop's only output. Called from the apply thread alone, so
//! implementations need no synchronization.

use std::collections::HashMap;

use tilestream_procedural::{CellPos, ContentTag};

/// Receives per-cell draw and erase instructions.
pub trait PresentationSurface {
    /// Draws `tag` at `pos`.
    fn draw(&mut self, pos: CellPos, tag: ContentTag);

    /// Erases whatever is at `pos`.
    fn erase(&mut self, pos: CellPos);
}

impl<S: PresentationSurface + ?Sized> PresentationSurface for &mut S {
    #[inline]
    fn draw(&mut self, pos: CellPos, tag: ContentTag) {
        (**self).draw(pos, tag);
    }

    #[inline]
    fn erase(&mut self, pos: CellPos) {
        (**self).erase(pos);
    }
}

/// In-memory tile map. Headless stand-in for a real display surface.
#[derive(Debug, Default)]
pub struct MemorySurface {
    cells: HashMap<CellPos, ContentTag>,
    draw_calls: u64,
    erase_calls: u64,
}

impl MemorySurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag currently drawn at `pos`.
    #[must_use]
    pub fn get(&self, pos: CellPos) -> Option<ContentTag> {
        self.cells.get(&pos).copied()
    }

    /// Number of cells currently drawn.
    #[must_use]
    pub fn drawn_cells(&self) -> usize {
        self.cells.len()
    }

    /// Drawn cells per tag, indexed by `ContentTag::as_u8`.
    #[must_use]
    pub fn tag_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for tag in self.cells.values() {
            counts[usize::from(tag.as_u8())] += 1;
        }
        counts
    }

    /// Total `draw` calls received.
    #[must_use]
    pub const fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Total `erase` calls received.
    #[must_use]
    pub const fn erase_calls(&self) -> u64 {
        self.erase_calls
    }

    /// Clears the map and the call counters.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.draw_calls = 0;
        self.erase_calls = 0;
    }
}

impl PresentationSurface for MemorySurface {
    fn draw(&mut self, pos: CellPos, tag: ContentTag) {
        self.draw_calls += 1;
        self.cells.insert(pos, tag);
    }

    fn erase(&mut self, pos: CellPos) {
        self.erase_calls += 1;
        self.cells.remove(&pos);
    }
}
