//! A set: the group of ways an index selects, plus its LRU state.

use crate::line::Line;
use crate::lru::Lru;

/// One cache set holding `associativity` lines and their recency order.
///
/// Invariant: no two valid lines in a set share a tag.
#[derive(Debug, Clone)]
pub struct Set {
    pub(crate) lines: Box<[Line]>,
    pub(crate) lru: Lru,
}

impl Set {
    /// Creates a set of `ways` invalid lines with `line_size`-byte buffers.
    pub fn new(ways: usize, line_size: usize) -> Self {
        Self {
            lines: (0..ways).map(|_| Line::new(line_size)).collect(),
            lru: Lru::new(ways),
        }
    }

    /// Number of ways in this set.
    pub fn ways(&self) -> usize {
        self.lines.len()
    }

    /// The lines of this set, indexed by way.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// LRU rank of `way` (0 = most recently used).
    pub fn lru_rank(&self, way: usize) -> u16 {
        self.lru.rank(way)
    }

    /// Returns the way holding a valid line with `tag`, if any.
    ///
    /// Does not touch the LRU order; recency updates are the engine's call.
    #[inline]
    pub fn find(&self, tag: u32) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }

    /// Returns the first invalid way, if any. Filling an invalid way is
    /// always preferred over evicting a valid line.
    #[inline]
    pub fn free_way(&self) -> Option<usize> {
        self.lines.iter().position(|line| !line.valid)
    }

    /// Invalidates every line and restores the initial LRU order.
    pub fn reset(&mut self) {
        for line in self.lines.iter_mut() {
            line.reset();
        }
        self.lru.reset();
    }
}
