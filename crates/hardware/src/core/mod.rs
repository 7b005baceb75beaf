//! Core front-end implementation.
//!
//! This module contains the instruction-fetch front end of the modeled
//! core: the branch prediction machinery and the pipeline pieces built on
//! top of it (fetch orchestration and register renaming).

/// Instruction pipeline (fetch frontend and register renamer).
pub mod pipeline;

/// Functional units (branch prediction machinery).
pub mod units;
