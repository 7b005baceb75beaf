//! Branch prediction measurement collection and reporting.
//!
//! This module tracks the front end's steady-state measurements:
//! 1. **Per-category counts:** retired branches by kind (conditional,
//!    direct jump/call, indirect jump/call, return).
//! 2. **Mispredictions:** per-category misprediction counts; direct jumps
//!    and calls can never mispredict and are asserted as such at commit.
//! 3. **Trace cache:** hit count for the non-sequential bundle provider.
//! 4. **Report:** a fixed-width table emitted on teardown to a sink handed
//!    in from outside.

use std::fmt::{self, Write};

/// Branch prediction measurements, accumulated at commit time.
///
/// The counters are component-local state owned by the BPU; the embedding
/// simulator requests the report once, on teardown.
#[derive(Clone, Debug, Default)]
pub struct BpuStats {
    /// Retired conditional branches.
    pub branch_n: u64,
    /// Retired direct jumps.
    pub jump_direct_n: u64,
    /// Retired direct calls.
    pub call_direct_n: u64,
    /// Retired indirect jumps.
    pub jump_indirect_n: u64,
    /// Retired indirect calls.
    pub call_indirect_n: u64,
    /// Retired returns.
    pub return_n: u64,

    /// Mispredicted conditional branches.
    pub branch_m: u64,
    /// Mispredicted indirect jumps.
    pub jump_indirect_m: u64,
    /// Mispredicted indirect calls.
    pub call_indirect_m: u64,
    /// Mispredicted returns.
    pub return_m: u64,

    /// Fetch bundles supplied by the trace cache instead of the BTB.
    pub tc_hits: u64,
}

impl BpuStats {
    /// Sum of all retired branch-class instructions.
    pub const fn total(&self) -> u64 {
        self.branch_n
            + self.jump_direct_n
            + self.call_direct_n
            + self.jump_indirect_n
            + self.call_indirect_n
            + self.return_n
    }

    /// Sum of all mispredictions.
    pub const fn total_mispredicted(&self) -> u64 {
        self.branch_m + self.jump_indirect_m + self.call_indirect_m + self.return_m
    }

    /// Writes the teardown report: one row per category with the count,
    /// misprediction count, misprediction rate, and mispredictions per
    /// thousand retired instructions.
    ///
    /// # Errors
    ///
    /// Propagates formatting errors from the sink.
    pub fn report<W: Write>(&self, num_instr: u64, out: &mut W) -> fmt::Result {
        let row = |out: &mut W, name: &str, n: u64, m: u64| -> fmt::Result {
            let rate = if n > 0 {
                100.0 * (m as f64 / n as f64)
            } else {
                0.0
            };
            let mpki = if num_instr > 0 {
                1000.0 * (m as f64 / num_instr as f64)
            } else {
                0.0
            };
            writeln!(out, "{name:<17}{n:10} {m:10} {rate:5.2}% {mpki:5.2}")
        };

        writeln!(out, "BRANCH PREDICTION MEASUREMENTS---------------------")?;
        writeln!(out, "Type                      n          m     mr  mpki")?;
        row(out, "All", self.total(), self.total_mispredicted())?;
        row(out, "Branch", self.branch_n, self.branch_m)?;
        row(out, "Jump Direct", self.jump_direct_n, 0)?;
        row(out, "Call Direct", self.call_direct_n, 0)?;
        row(out, "Jump Indirect", self.jump_indirect_n, self.jump_indirect_m)?;
        row(out, "Call Indirect", self.call_indirect_n, self.call_indirect_m)?;
        row(out, "Return", self.return_n, self.return_m)?;
        writeln!(out, "tc.hits          {:10}", self.tc_hits)
    }
}
