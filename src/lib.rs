//! # cachesim-rs: an N-way set-associative cache simulator
//!
//! **`cachesim-rs`** models a hardware cache memory: sets of ways with tag,
//! valid, and dirty state, LRU replacement, and write-back to a pluggable
//! lower memory level. It is driven by a trace of memory operations and
//! reports hit/miss statistics.
//!
//! ## How it works
//!
//! An address decomposes into **tag**, **index**, and **byte offset**
//! against the cache geometry (associativity, set count, line size; all
//! powers of two). The index selects a set; the set's ways are scanned for
//! a valid line with the matching tag. A hit touches the LRU order and
//! serves data from the line. A miss picks a victim (the first invalid
//! way, or the least recently used one), writes it back if dirty, and
//! refills the line through the [`BackingStore`][backing::BackingStore]
//! below.
//!
//! ## Key features
//!
//! - **Composable levels**: a [`Cache`][cache::Cache] is generic over its
//!   backing store, and is itself a backing store, so `Cache<Cache<...>>`
//!   stacks levels, and [`hierarchy::MemorySystem`] wires split L1
//!   instruction/data caches over one shared L2.
//! - **Owned buffers**: every line owns its fixed-size data buffer for the
//!   cache's lifetime; fills copy into it.
//! - **Counter-based LRU**: per-set recency ranks, always a permutation of
//!   `0..ways`, updated in O(ways) with no allocation.
//! - **Trace replay**: the [`trace`] module parses the
//!   `<opcode> <hex-address>` command protocol; the `cachesim` binary
//!   replays a trace against a two-level hierarchy.
//!
//! ## Basic usage
//!
//! ```rust
//! use cachesim_rs::cache::Cache;
//! use cachesim_rs::backing::MainMemory;
//!
//! // 4-way, 64 sets, 16-byte lines, over a 64 KiB flat memory.
//! let mut cache = Cache::with_geometry(4, 64, 16, MainMemory::new(1 << 16)).unwrap();
//!
//! cache.write(0x1234, &[0xab]).unwrap();
//!
//! let mut byte = [0u8; 1];
//! cache.read(0x1234, &mut byte).unwrap();
//! assert_eq!(byte[0], 0xab);
//!
//! assert_eq!(cache.stats().misses, 1); // the write's fill
//! assert_eq!(cache.stats().hits, 1);   // the read
//! ```
//!
//! ## Core components
//!
//! - **[`cache`]**: the engine (lookup, replacement, writeback, statistics).
//! - **[`params`]**: geometry validation and address decomposition.
//! - **[`lru`]**: per-set replacement tracking.
//! - **[`backing`]**: the lower-level contract and a flat-memory stub.
//! - **[`hierarchy`]**: explicit L1I/L1D-over-L2 composition.
//! - **[`trace`]**: the trace command protocol.
//! - **[`debug`]**: human-readable cache dumps.

pub mod backing;
pub mod cache;
pub mod debug;
pub mod error;
pub mod hierarchy;
pub mod line;
pub mod lru;
pub mod params;
pub mod set;
pub mod trace;
