//! Error taxonomy for cache construction and per-access failures.
//!
//! Construction problems (`Configuration`) are fatal: no cache object is
//! produced. Access problems (`CrossesLineBoundary`) are reported per call
//! and never corrupt cache state.

use std::fmt;

/// Errors produced by [`CacheParams`][crate::params::CacheParams]
/// construction and by the read/write operations of
/// [`Cache`][crate::cache::Cache].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// A geometry parameter is invalid (not a power of two, or out of the
    /// supported range). Carries the offending parameter name and value.
    Configuration {
        /// Which parameter was rejected.
        param: &'static str,
        /// The rejected value.
        value: usize,
    },

    /// A read/write request would extend past the end of its cache line.
    ///
    /// The bytes within the line have been transferred; `transferred` is how
    /// many. Accesses are documented to never span a line boundary, so the
    /// excess is a caller error.
    CrossesLineBoundary {
        /// The requested address.
        address: u32,
        /// The requested length in bytes.
        requested: usize,
        /// How many bytes actually fit in the line (and were transferred).
        transferred: usize,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Configuration { param, value } => {
                write!(f, "invalid cache configuration: {} = {}", param, value)
            }
            CacheError::CrossesLineBoundary {
                address,
                requested,
                transferred,
            } => {
                write!(
                    f,
                    "access at 0x{:08x} crosses a line boundary: requested {} bytes, {} fit in the line",
                    address, requested, transferred
                )
            }
        }
    }
}

impl std::error::Error for CacheError {}
