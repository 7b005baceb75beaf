//! # Unit Tests
//!
//! Fine-grained tests for the front-end components, organized to mirror
//! the library's module tree, plus end-to-end scenarios exercising the
//! whole predict/fetch/rename flow.

/// Unit tests for the core front end (prediction units and pipeline).
pub mod core;

/// End-to-end fetch, training, and recovery scenarios.
pub mod scenarios;
