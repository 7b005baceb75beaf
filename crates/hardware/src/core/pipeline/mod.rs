//! Instruction pipeline infrastructure.
//!
//! This module contains the pipeline pieces the front end owns:
//! 1. **Frontend:** the fetch orchestrator driving the BPU.
//! 2. **Renamer:** unified-PRF register renaming with per-branch
//!    checkpoints, dispatch, scheduling state, and in-order retirement.
//!
//! The execution backend (issue, execute, writeback) is an external
//! collaborator and consumes the renamer's stage-addressed entry points.

/// Frontend pipeline stages.
pub mod frontend;

/// Register renamer with GBM-indexed branch checkpoints.
pub mod renamer;

pub use renamer::Renamer;
