//! Superscalar RISC-V front-end simulator library.
//!
//! This crate implements the cycle-level instruction-fetch front end of an
//! out-of-order core, with the following pieces:
//! 1. **BPU:** branch prediction unit orchestrating a banked BTB, two
//!    gshare predictors, a return address stack, a branch queue of
//!    outstanding predictions, and trace cache metadata.
//! 2. **TCM:** trace cache metadata supplying non-sequential fetch
//!    bundles, built online from observed BTB bundles via a line-fill
//!    buffer.
//! 3. **Renamer:** unified-PRF register renaming with in-order active
//!    list, free list, map tables, and per-branch shadow-map checkpoints.
//! 4. **Fetch:** the per-cycle orchestrator validating predicted bundles
//!    and driving BTB-miss retries.
//! 5. **Support:** configuration, branch taxonomy, the decoder contract,
//!    and branch prediction measurements.

/// Common types (branch taxonomy, fused tags, configuration errors).
pub mod common;
/// Front-end configuration (defaults, enums, hierarchical structures).
pub mod config;
/// Core front end (branch prediction units, fetch pipeline, renamer).
pub mod core;
/// Decoder contract (instruction fields, opcodes, ABI registers).
pub mod isa;
/// Branch prediction measurement collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Branch prediction unit; owns every prediction structure.
pub use crate::core::units::bru::Bpu;
/// Per-cycle fetch orchestrator.
pub use crate::core::pipeline::frontend::FetchUnit;
/// Register renamer with per-branch checkpoints.
pub use crate::core::pipeline::Renamer;
/// Branch prediction measurements.
pub use crate::stats::BpuStats;
