//! Unit tests for the core front end.

/// Pipeline tests (register renamer).
pub mod pipeline;

/// Functional unit tests (branch prediction machinery).
pub mod units;
