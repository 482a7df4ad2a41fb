//! Explicit multi-level composition: two L1 caches over a shared L2.
//!
//! The hierarchy replaces process-wide cache singletons with a single owner:
//! [`MemorySystem`] holds the instruction and data L1s, the L2 they share,
//! and wires the levels together through the
//! [`BackingStore`][crate::backing::BackingStore] contract. The L2 is held
//! behind `Rc<RefCell<…>>` because both L1s must reach it; everything else
//! is plain ownership.
//!
//! ```text
//!   ifetch ──▶ L1I ──┐
//!                    ├──▶ shared L2 ──▶ M (e.g. MainMemory)
//!   read/write ▶ L1D ┘
//! ```
//!
//! The call chain is acyclic by construction: the L2 exists before either
//! L1, and nothing hands an upper level to a lower one. No coherence
//! protocol is modeled; the `modified`/`evicted` notifications between
//! levels are deliberately left as no-ops, and a coherence-aware design
//! would extend exactly those two callbacks.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backing::{BackingStore, Status, STATUS_OK, STATUS_REJECTED};
use crate::cache::{Cache, Statistics};
use crate::error::CacheError;
use crate::params::CacheParams;

/// A cache level shared by several upper levels.
pub type SharedCache<B> = Rc<RefCell<Cache<B>>>;

/// A shared cache services the level above it the same way an owned one
/// does. `modified`/`evicted` notifications terminate here (no coherence).
impl<B: BackingStore> BackingStore for SharedCache<B> {
    fn read(&mut self, address: u32, data: &mut [u8]) -> Status {
        match self.borrow_mut().read(address, data) {
            Ok(()) => STATUS_OK,
            Err(_) => STATUS_REJECTED,
        }
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Status {
        match self.borrow_mut().write(address, data) {
            Ok(()) => STATUS_OK,
            Err(_) => STATUS_REJECTED,
        }
    }
}

/// A two-level memory system: split L1 (instruction + data) over one L2.
///
/// `M` is whatever sits below the L2, typically
/// [`MainMemory`][crate::backing::MainMemory].
///
/// The L2 line size must be at least the L1 line size, so an L1 fill never
/// crosses an L2 line boundary; the constructor enforces this.
pub struct MemorySystem<M: BackingStore> {
    l1i: Cache<SharedCache<M>>,
    l1d: Cache<SharedCache<M>>,
    l2: SharedCache<M>,
}

impl<M: BackingStore> MemorySystem<M> {
    /// Builds the hierarchy: both L1s use `l1_params`, the shared L2 uses
    /// `l2_params`, and `store` services the L2.
    pub fn new(
        l1_params: CacheParams,
        l2_params: CacheParams,
        store: M,
    ) -> Result<Self, CacheError> {
        if l2_params.line_size() < l1_params.line_size() {
            return Err(CacheError::Configuration {
                param: "l2 line_size",
                value: l2_params.line_size(),
            });
        }
        let l2: SharedCache<M> = Rc::new(RefCell::new(Cache::new(l2_params, store)));
        Ok(Self {
            l1i: Cache::new(l1_params, Rc::clone(&l2)),
            l1d: Cache::new(l1_params, Rc::clone(&l2)),
            l2,
        })
    }

    /// Data read through the L1 data cache.
    pub fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), CacheError> {
        self.l1d.read(address, out)
    }

    /// Data write through the L1 data cache.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), CacheError> {
        self.l1d.write(address, data)
    }

    /// Instruction fetch through the L1 instruction cache.
    pub fn ifetch(&mut self, address: u32, out: &mut [u8]) -> Result<(), CacheError> {
        self.l1i.read(address, out)
    }

    /// Drops `address` from every level, upper levels first.
    ///
    /// A dirty L1 line is written back into the L2 before the L2 itself is
    /// invalidated, so the data still reaches the bottom store.
    pub fn invalidate(&mut self, address: u32) {
        self.l1d.invalidate(address);
        self.l1i.invalidate(address);
        self.l2.borrow_mut().invalidate(address);
    }

    /// Resets every level: all lines invalid, all statistics zeroed.
    pub fn reset(&mut self) {
        self.l1i.reset();
        self.l1d.reset();
        self.l2.borrow_mut().reset();
    }

    /// The L1 instruction cache.
    pub fn l1i(&self) -> &Cache<SharedCache<M>> {
        &self.l1i
    }

    /// The L1 data cache.
    pub fn l1d(&self) -> &Cache<SharedCache<M>> {
        &self.l1d
    }

    /// Statistics of the shared L2.
    pub fn l2_stats(&self) -> Statistics {
        *self.l2.borrow().stats()
    }

    /// Runs `f` against the shared L2 (it cannot be borrowed out directly).
    pub fn with_l2<T>(&self, f: impl FnOnce(&Cache<M>) -> T) -> T {
        f(&self.l2.borrow())
    }
}
