//! Configuration system for the front-end simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the front end. It provides:
//! 1. **Defaults:** Baseline hardware constants (fetch shape, BTB, gshare,
//!    RAS, branch queue, trace cache, renamer).
//! 2. **Structures:** Hierarchical config for fetch, branch prediction,
//!    trace cache, and renaming.
//! 3. **Validation:** [`Config::validate`] rejects geometries the hardware
//!    model cannot express, before any structure is built.
//!
//! Configuration is supplied as JSON by the embedding simulator, or use
//! `Config::default()` for a representative 4-wide machine.

use serde::Deserialize;

use crate::common::{ConfigError, MAX_COND_BRANCHES, MAX_FETCH_WIDTH};

/// Default configuration constants for the front end.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden in the supplied JSON.
mod defaults {
    /// Default fetch width `n` (instructions per cycle). Must be a power
    /// of two because it doubles as the BTB bank count.
    pub const FETCH_WIDTH: usize = 4;

    /// Default conditional-branch budget `m` per fetch bundle.
    pub const COND_BRANCHES: usize = 2;

    /// Default total Branch Target Buffer entry count.
    pub const BTB_ENTRIES: usize = 1024;

    /// Default BTB set associativity (ways per set).
    pub const BTB_ASSOC: usize = 4;

    /// Default PC index width (log2 table size) for the conditional-branch
    /// gshare predictor.
    pub const CB_PC_BITS: usize = 16;

    /// Default branch history register length for the conditional-branch
    /// gshare predictor.
    pub const CB_BHR_BITS: usize = 8;

    /// Default PC index width (log2 table size) for the indirect-target
    /// gshare predictor.
    pub const IB_PC_BITS: usize = 14;

    /// Default branch history register length for the indirect-target
    /// gshare predictor.
    pub const IB_BHR_BITS: usize = 6;

    /// Default Return Address Stack depth.
    pub const RAS_SIZE: usize = 32;

    /// Default branch queue capacity (maximum outstanding branches).
    pub const BQ_SIZE: usize = 64;

    /// Default total trace cache entry count.
    pub const TCM_ENTRIES: usize = 512;

    /// Default trace cache set associativity.
    pub const TCM_ASSOC: usize = 4;

    /// Default logical register count seen by the renamer.
    pub const LOGICAL_REGS: usize = 32;

    /// Default physical register file size.
    pub const PHYSICAL_REGS: usize = 128;

    /// Default number of in-flight branch checkpoints (GBM width in use).
    pub const BRANCH_CHECKPOINTS: usize = 16;
}

/// How a gshare index mixes the PC slice with the branch history register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum IndexMix {
    /// XOR the history into the high bits of the PC slice (classic gshare).
    #[default]
    Xor,
    /// Concatenate the history above a shortened PC slice.
    Concat,
}

/// Root configuration structure for the front end.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use tracefront_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.fetch.width, 4);
/// assert!(config.validate().is_ok());
/// ```
///
/// Deserializing from JSON (typical embedding usage):
///
/// ```
/// use tracefront_core::config::Config;
///
/// let json = r#"{
///     "fetch": { "width": 8, "cond_branches": 3 },
///     "bpu": { "btb_entries": 2048, "btb_assoc": 2, "ras_size": 16 },
///     "tcm": { "entries": 1024, "assoc": 4, "fill_on_taken_branch": true },
///     "renamer": { "logical_regs": 32, "physical_regs": 160, "branch_checkpoints": 32 }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.fetch.width, 8);
/// assert_eq!(config.bpu.btb_entries, 2048);
/// assert!(config.tcm.fill_on_taken_branch);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Fetch bundle shape (`n` and `m`).
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Branch prediction unit structures.
    #[serde(default)]
    pub bpu: BpuConfig,
    /// Trace cache metadata structures.
    #[serde(default)]
    pub tcm: TcmConfig,
    /// Register renamer structures.
    #[serde(default)]
    pub renamer: RenamerConfig,
}

impl Config {
    /// Checks every geometry constraint the hardware model relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: non-power-of-two fetch
    /// width, oversized conditional budget, BTB/TCM set counts that are
    /// not powers of two, a physical register file no larger than the
    /// logical space, or a checkpoint count outside `1..=64`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.fetch.width;
        if n == 0 || !n.is_power_of_two() || n > MAX_FETCH_WIDTH {
            return Err(ConfigError::FetchWidth(n));
        }
        let m = self.fetch.cond_branches;
        if m == 0 || m > MAX_COND_BRANCHES {
            return Err(ConfigError::CondBranchBudget(m));
        }

        let btb_sets = self
            .bpu
            .btb_entries
            .checked_div(n * self.bpu.btb_assoc)
            .unwrap_or(0);
        if btb_sets == 0 || !btb_sets.is_power_of_two() {
            return Err(ConfigError::BtbGeometry {
                entries: self.bpu.btb_entries,
                banks: n,
                ways: self.bpu.btb_assoc,
            });
        }

        let tcm_sets = self
            .tcm
            .entries
            .checked_div(n * self.tcm.assoc)
            .unwrap_or(0);
        if tcm_sets == 0 || !tcm_sets.is_power_of_two() {
            return Err(ConfigError::TcmGeometry {
                entries: self.tcm.entries,
                ways: self.tcm.assoc,
            });
        }

        if self.renamer.physical_regs <= self.renamer.logical_regs {
            return Err(ConfigError::RegisterFile {
                logical: self.renamer.logical_regs,
                physical: self.renamer.physical_regs,
            });
        }
        let b = self.renamer.branch_checkpoints;
        if b == 0 || b > 64 {
            return Err(ConfigError::BranchCheckpoints(b));
        }

        Ok(())
    }
}

/// Fetch bundle shape.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Instructions fetched per cycle (`n`). Power of two, at most 16.
    #[serde(default = "FetchConfig::default_width")]
    pub width: usize,

    /// Maximum conditional branches per fetch bundle (`m`).
    #[serde(default = "FetchConfig::default_cond_branches")]
    pub cond_branches: usize,
}

impl FetchConfig {
    /// Returns the default fetch width.
    fn default_width() -> usize {
        defaults::FETCH_WIDTH
    }

    /// Returns the default conditional-branch budget.
    fn default_cond_branches() -> usize {
        defaults::COND_BRANCHES
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            width: defaults::FETCH_WIDTH,
            cond_branches: defaults::COND_BRANCHES,
        }
    }
}

/// Branch prediction unit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BpuConfig {
    /// Total Branch Target Buffer entries, split across `n` banks.
    #[serde(default = "BpuConfig::default_btb_entries")]
    pub btb_entries: usize,

    /// BTB set associativity.
    #[serde(default = "BpuConfig::default_btb_assoc")]
    pub btb_assoc: usize,

    /// Conditional-branch gshare: PC index width (log2 of the table size).
    #[serde(default = "BpuConfig::default_cb_pc_bits")]
    pub cb_pc_bits: usize,

    /// Conditional-branch gshare: branch history register length.
    #[serde(default = "BpuConfig::default_cb_bhr_bits")]
    pub cb_bhr_bits: usize,

    /// Indirect-target gshare: PC index width (log2 of the table size).
    #[serde(default = "BpuConfig::default_ib_pc_bits")]
    pub ib_pc_bits: usize,

    /// Indirect-target gshare: branch history register length.
    #[serde(default = "BpuConfig::default_ib_bhr_bits")]
    pub ib_bhr_bits: usize,

    /// How each gshare index mixes PC and history bits.
    #[serde(default)]
    pub index_mix: IndexMix,

    /// Return Address Stack depth.
    #[serde(default = "BpuConfig::default_ras_size")]
    pub ras_size: usize,

    /// Branch queue capacity (maximum outstanding branch predictions).
    #[serde(default = "BpuConfig::default_bq_size")]
    pub bq_size: usize,
}

impl BpuConfig {
    /// Returns the default total BTB entry count.
    fn default_btb_entries() -> usize {
        defaults::BTB_ENTRIES
    }

    /// Returns the default BTB associativity.
    fn default_btb_assoc() -> usize {
        defaults::BTB_ASSOC
    }

    /// Returns the default conditional-branch PC index width.
    fn default_cb_pc_bits() -> usize {
        defaults::CB_PC_BITS
    }

    /// Returns the default conditional-branch history length.
    fn default_cb_bhr_bits() -> usize {
        defaults::CB_BHR_BITS
    }

    /// Returns the default indirect-target PC index width.
    fn default_ib_pc_bits() -> usize {
        defaults::IB_PC_BITS
    }

    /// Returns the default indirect-target history length.
    fn default_ib_bhr_bits() -> usize {
        defaults::IB_BHR_BITS
    }

    /// Returns the default RAS depth.
    fn default_ras_size() -> usize {
        defaults::RAS_SIZE
    }

    /// Returns the default branch queue capacity.
    fn default_bq_size() -> usize {
        defaults::BQ_SIZE
    }
}

impl Default for BpuConfig {
    fn default() -> Self {
        Self {
            btb_entries: defaults::BTB_ENTRIES,
            btb_assoc: defaults::BTB_ASSOC,
            cb_pc_bits: defaults::CB_PC_BITS,
            cb_bhr_bits: defaults::CB_BHR_BITS,
            ib_pc_bits: defaults::IB_PC_BITS,
            ib_bhr_bits: defaults::IB_BHR_BITS,
            index_mix: IndexMix::default(),
            ras_size: defaults::RAS_SIZE,
            bq_size: defaults::BQ_SIZE,
        }
    }
}

/// Trace cache metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TcmConfig {
    /// Total trace cache entries, organized as sets x ways.
    #[serde(default = "TcmConfig::default_entries")]
    pub entries: usize,

    /// Trace cache set associativity.
    #[serde(default = "TcmConfig::default_assoc")]
    pub assoc: usize,

    /// When true, a finished line fill is discarded unless the trace
    /// contains at least one predicted-taken conditional branch.
    #[serde(default)]
    pub fill_on_taken_branch: bool,
}

impl TcmConfig {
    /// Returns the default trace cache entry count.
    fn default_entries() -> usize {
        defaults::TCM_ENTRIES
    }

    /// Returns the default trace cache associativity.
    fn default_assoc() -> usize {
        defaults::TCM_ASSOC
    }
}

impl Default for TcmConfig {
    fn default() -> Self {
        Self {
            entries: defaults::TCM_ENTRIES,
            assoc: defaults::TCM_ASSOC,
            fill_on_taken_branch: false,
        }
    }
}

/// Register renamer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RenamerConfig {
    /// Logical (architectural) register count `L`.
    #[serde(default = "RenamerConfig::default_logical_regs")]
    pub logical_regs: usize,

    /// Physical register file size `P`. Must exceed `L`; the free list and
    /// active list are both sized `P - L`.
    #[serde(default = "RenamerConfig::default_physical_regs")]
    pub physical_regs: usize,

    /// Maximum unresolved branches `B` (width of the global branch mask).
    #[serde(default = "RenamerConfig::default_branch_checkpoints")]
    pub branch_checkpoints: usize,
}

impl RenamerConfig {
    /// Returns the default logical register count.
    fn default_logical_regs() -> usize {
        defaults::LOGICAL_REGS
    }

    /// Returns the default physical register count.
    fn default_physical_regs() -> usize {
        defaults::PHYSICAL_REGS
    }

    /// Returns the default branch checkpoint count.
    fn default_branch_checkpoints() -> usize {
        defaults::BRANCH_CHECKPOINTS
    }
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            logical_regs: defaults::LOGICAL_REGS,
            physical_regs: defaults::PHYSICAL_REGS,
            branch_checkpoints: defaults::BRANCH_CHECKPOINTS,
        }
    }
}
