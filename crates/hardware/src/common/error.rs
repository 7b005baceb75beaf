//! Configuration error definitions.
//!
//! Operating errors inside the core are programmer faults and fail fast via
//! assertions; the only recoverable error surface is configuration
//! validation, reported to the embedding frontend through [`ConfigError`].

use thiserror::Error;

/// A rejected configuration value.
///
/// Returned by `Config::validate` before any structure is built, so the
/// embedding frontend can report the problem instead of panicking inside a
/// constructor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The fetch width must be a power of two no larger than the bank limit.
    #[error("fetch width {0} must be a power of two <= {max}", max = crate::common::MAX_FETCH_WIDTH)]
    FetchWidth(usize),

    /// The conditional-branch budget must fit the packed prediction word.
    #[error("conditional branch budget {0} must be in 1..={max}", max = crate::common::MAX_COND_BRANCHES)]
    CondBranchBudget(usize),

    /// BTB entries must divide evenly into banks x ways, with a power-of-two set count.
    #[error("BTB geometry {entries} entries / {banks} banks / {ways} ways does not form a power-of-two set count")]
    BtbGeometry {
        /// Total BTB entry count.
        entries: usize,
        /// Bank count (equals the fetch width).
        banks: usize,
        /// Set associativity.
        ways: usize,
    },

    /// Trace cache entries must divide evenly into sets x ways, with a power-of-two set count.
    #[error("trace cache geometry {entries} entries / {ways} ways does not form a power-of-two set count")]
    TcmGeometry {
        /// Total trace cache entry count.
        entries: usize,
        /// Set associativity.
        ways: usize,
    },

    /// The physical register file must be strictly larger than the logical space.
    #[error("physical register count {physical} must exceed logical register count {logical}")]
    RegisterFile {
        /// Logical register count.
        logical: usize,
        /// Physical register count.
        physical: usize,
    },

    /// The branch checkpoint count must fit the 64-bit global branch mask.
    #[error("branch checkpoint count {0} must be in 1..=64")]
    BranchCheckpoints(usize),
}
