//! Frontend pipeline stages.
//!
//! The frontend orchestrates instruction supply for the out-of-order
//! backend: each cycle the fetch engine asks the BPU for a predicted
//! bundle, validates it instruction by instruction, and reports BTB
//! misses back for precise roll-back and retry.

/// Fetch stage: per-cycle BPU-driven bundle fetch and validation.
pub mod fetch;

pub use fetch::{FetchOutcome, FetchUnit, FetchedInsn, InsnSource};
