//! Debug utilities for inspecting cache contents.
//!
//! These helpers render a human-readable snapshot of a cache (which lines
//! are valid, their status bits, LRU ranks, and tags) plus the statistics
//! summary. The format is for diagnostics only, not a machine contract.

use std::fmt::Write;

use crate::backing::BackingStore;
use crate::cache::Cache;

/// Detailed information about a single way of a set.
#[derive(Debug, Clone)]
pub struct WayInfo {
    /// Way index within the set.
    pub way: usize,
    /// Validity bit.
    pub valid: bool,
    /// Dirty bit.
    pub dirty: bool,
    /// LRU rank (0 = most recently used).
    pub lru: u16,
    /// Stored tag.
    pub tag: u32,
}

impl std::fmt::Display for WayInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "way {}: [{}{}] lru={} tag=0x{:x}",
            self.way,
            if self.valid { 'V' } else { '-' },
            if self.dirty { 'D' } else { '-' },
            self.lru,
            self.tag,
        )
    }
}

/// Collects the valid ways of set `index`.
pub fn set_info<B: BackingStore>(cache: &Cache<B>, index: usize) -> Vec<WayInfo> {
    let set = &cache.sets()[index];
    set.lines()
        .iter()
        .enumerate()
        .filter(|(_, line)| line.is_valid())
        .map(|(way, line)| WayInfo {
            way,
            valid: line.is_valid(),
            dirty: line.is_dirty(),
            lru: set.lru_rank(way),
            tag: line.tag(),
        })
        .collect()
}

/// Renders the cache contents and statistics as a multi-line string.
///
/// Sets with no valid lines are omitted. Ends with the statistics block,
/// including the aggregate hit rate.
pub fn dump<B: BackingStore>(cache: &Cache<B>) -> String {
    let mut out = String::new();
    writeln!(out, "Cache contents:").unwrap();
    let mut any = false;
    for index in 0..cache.sets().len() {
        let ways = set_info(cache, index);
        if ways.is_empty() {
            continue;
        }
        any = true;
        writeln!(out, "set {}:", index).unwrap();
        for info in ways {
            writeln!(out, "  {}", info).unwrap();
        }
    }
    if !any {
        writeln!(out, "  (all lines invalid)").unwrap();
    }
    write!(out, "{}", cache.stats()).unwrap();
    out
}
