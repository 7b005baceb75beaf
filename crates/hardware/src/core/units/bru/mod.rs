//! Branch prediction unit (BRU) structures.
//!
//! This module contains the front end's prediction machinery: the branch
//! prediction unit orchestrator, the banked branch target buffer, the
//! gshare index function, the return address stack, the branch queue of
//! outstanding predictions, and the trace cache metadata.

pub use self::bpu::{Bpu, FetchPrediction};
pub use self::btb::BundlePrediction;

/// Branch Prediction Unit orchestrating lookup, update, and recovery.
pub mod bpu;

/// Branch Queue of outstanding branch predictions.
pub mod bq;

/// Banked Branch Target Buffer for locating branches within fetch bundles.
pub mod btb;

/// Gshare index function shared by the direction and indirect predictors.
pub mod gshare;

/// Return Address Stack for predicting return targets.
pub mod ras;

/// Trace Cache Metadata: alternate non-sequential bundle provider.
pub mod tcm;
