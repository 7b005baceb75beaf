//! Register renamer with a unified physical register file.
//!
//! The renamer tracks speculative and architectural register mappings for
//! an out-of-order backend. It provides:
//! 1. **Renaming:** logical-to-physical mapping through the Rename Map
//!    Table (RMT), with new destinations popped from the Free List (FL).
//! 2. **Checkpoints:** a per-branch shadow copy of the RMT, the FL head,
//!    and the Global Branch Mask (GBM), allocated by GBM bit position.
//! 3. **Dispatch:** an in-order Active List (AL) of in-flight
//!    instructions, one entry each.
//! 4. **Resolution:** single-cycle recovery to a branch's checkpoint on
//!    misprediction; checkpoint reclamation on correct resolution.
//! 5. **Retirement:** in-order commit updating the Architectural Map
//!    Table (AMT) and recycling the previous mapping, plus a complete
//!    squash back to the committed state.
//!
//! Both circular structures resolve the `head == tail` ambiguity
//! explicitly: the FL with a `full` flag, the AL with an occupancy count.

use tracing::debug;

/// Classification flags carried per Active List entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstClass {
    /// Instruction is a load.
    pub load: bool,
    /// Instruction is a store.
    pub store: bool,
    /// Instruction is a branch.
    pub branch: bool,
    /// Instruction is an atomic memory operation.
    pub amo: bool,
    /// Instruction is a system (CSR) instruction.
    pub csr: bool,
}

/// Destination register pair for a dispatched instruction.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dest {
    /// Logical destination register.
    pub log_reg: usize,
    /// Physical register allocated for it at rename.
    pub phys_reg: usize,
}

/// Head-of-Active-List view returned by [`Renamer::precommit`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RetireInfo {
    /// Execution finished.
    pub completed: bool,
    /// Exception raised; must be handled before commit.
    pub exception: bool,
    /// Load ordering violation detected.
    pub load_violation: bool,
    /// Branch misprediction surfaced at retirement.
    pub branch_misprediction: bool,
    /// Value misprediction surfaced at retirement.
    pub value_misprediction: bool,
    /// Classification flags from dispatch.
    pub class: InstClass,
    /// Program counter of the instruction.
    pub pc: u64,
}

/// One in-flight instruction.
#[derive(Clone, Copy, Debug, Default)]
struct AlEntry {
    dest_valid: bool,
    log_reg: usize,
    phys_reg: usize,

    completed: bool,
    exception: bool,
    load_violation: bool,
    branch_misprediction: bool,
    value_misprediction: bool,

    class: InstClass,
    pc: u64,
}

/// Per-branch rename checkpoint, owned by one GBM bit.
#[derive(Clone, Debug, Default)]
struct BranchCheckpoint {
    /// Shadow copy of the RMT at checkpoint time.
    shadow_rmt: Vec<usize>,
    /// FL head index at checkpoint time.
    fl_head: usize,
    /// GBM at checkpoint time (including this branch's own bit).
    gbm: u64,
}

/// Rename/dispatch/schedule/retire state with GBM-indexed checkpoints.
pub struct Renamer {
    logical: usize,
    branches: usize,

    /// Speculative logical-to-physical map.
    rmt: Vec<usize>,
    /// Committed (architectural) logical-to-physical map.
    amt: Vec<usize>,

    /// Circular FIFO of free physical registers; pop at head, push at tail.
    free_list: Vec<usize>,
    fl_head: usize,
    fl_tail: usize,
    /// Disambiguates `fl_head == fl_tail`: set means every slot holds a
    /// free register.
    fl_full: bool,

    /// Circular FIFO of in-flight instructions, oldest at head.
    active_list: Vec<AlEntry>,
    al_head: usize,
    al_tail: usize,
    al_count: usize,

    /// Physical register file and its ready bits.
    prf: Vec<u64>,
    prf_ready: Vec<bool>,

    /// Bit i set while branch checkpoint i is in use.
    gbm: u64,
    checkpoints: Vec<BranchCheckpoint>,
}

impl Renamer {
    /// Creates a renamer for `logical` architectural registers, `physical`
    /// physical registers, and up to `branches` unresolved branches.
    ///
    /// The pipeline starts empty: RMT and AMT hold the identity mapping,
    /// the FL holds every physical register outside the AMT, and the AL
    /// has no entries.
    ///
    /// # Panics
    ///
    /// Panics unless `physical > logical` and `1 <= branches <= 64`.
    pub fn new(logical: usize, physical: usize, branches: usize) -> Self {
        assert!(physical > logical);
        assert!((1..=64).contains(&branches));

        let window = physical - logical;
        Self {
            logical,
            branches,
            rmt: (0..logical).collect(),
            amt: (0..logical).collect(),
            free_list: (logical..physical).collect(),
            fl_head: 0,
            fl_tail: 0,
            fl_full: true,
            active_list: vec![AlEntry::default(); window],
            al_head: 0,
            al_tail: 0,
            al_count: 0,
            prf: vec![0; physical],
            prf_ready: (0..physical).map(|p| p < logical).collect(),
            gbm: 0,
            checkpoints: vec![
                BranchCheckpoint {
                    shadow_rmt: vec![0; logical],
                    fl_head: 0,
                    gbm: 0,
                };
                branches
            ],
        }
    }

    //
    // Rename stage
    //

    /// True if the FL cannot supply `bundle_dst` destination registers.
    pub fn stall_reg(&self, bundle_dst: usize) -> bool {
        self.free_regs() < bundle_dst
    }

    /// True if fewer than `bundle_branch` checkpoints are free.
    pub fn stall_branch(&self, bundle_branch: usize) -> bool {
        let free = self.branches - (self.gbm.count_ones() as usize);
        free < bundle_branch
    }

    /// The current GBM, attached to each renamed instruction so the
    /// scheduler can squash it when an older checkpointed branch resolves
    /// incorrectly.
    pub const fn get_branch_mask(&self) -> u64 {
        self.gbm
    }

    /// Renames a single source register through the RMT.
    pub fn rename_rsrc(&self, log_reg: usize) -> usize {
        self.rmt[log_reg]
    }

    /// Renames a single destination register: pops a free physical
    /// register and installs the new mapping.
    ///
    /// # Panics
    ///
    /// Panics if the FL is empty; callers must check [`Self::stall_reg`].
    pub fn rename_rdst(&mut self, log_reg: usize) -> usize {
        assert!(!self.stall_reg(1), "rename with empty free list");

        let phys_reg = self.free_list[self.fl_head];
        self.fl_head = (self.fl_head + 1) % self.free_list.len();
        self.fl_full = false;
        self.rmt[log_reg] = phys_reg;
        phys_reg
    }

    /// Creates a branch checkpoint and returns its ID (its GBM bit
    /// position).
    ///
    /// The checkpoint captures the RMT, the FL head, and the GBM with this
    /// branch's own bit already set.
    ///
    /// # Panics
    ///
    /// Panics if the GBM is saturated; callers must check
    /// [`Self::stall_branch`].
    pub fn checkpoint(&mut self) -> usize {
        assert!(!self.stall_branch(1), "checkpoint with saturated GBM");

        let branch_id = (0..self.branches)
            .find(|&i| self.gbm & (1 << i) == 0)
            .unwrap_or_else(|| unreachable!("stall_branch(1) guaranteed a free bit"));

        self.gbm |= 1 << branch_id;
        let checkpoint = &mut self.checkpoints[branch_id];
        checkpoint.shadow_rmt.copy_from_slice(&self.rmt);
        checkpoint.fl_head = self.fl_head;
        checkpoint.gbm = self.gbm;
        branch_id
    }

    //
    // Dispatch stage
    //

    /// True if the AL cannot accept `bundle_inst` more instructions.
    pub fn stall_dispatch(&self, bundle_inst: usize) -> bool {
        self.active_list.len() - self.al_count < bundle_inst
    }

    /// Dispatches one instruction into the AL, returning its AL index.
    ///
    /// # Panics
    ///
    /// Panics if the AL is full; callers must check
    /// [`Self::stall_dispatch`].
    pub fn dispatch_inst(&mut self, dest: Option<Dest>, class: InstClass, pc: u64) -> usize {
        assert!(!self.stall_dispatch(1), "dispatch into full active list");

        let al_index = self.al_tail;
        self.active_list[al_index] = AlEntry {
            dest_valid: dest.is_some(),
            log_reg: dest.map_or(0, |d| d.log_reg),
            phys_reg: dest.map_or(0, |d| d.phys_reg),
            completed: false,
            exception: false,
            load_violation: false,
            branch_misprediction: false,
            value_misprediction: false,
            class,
            pc,
        };
        self.al_tail = (self.al_tail + 1) % self.active_list.len();
        self.al_count += 1;
        al_index
    }

    //
    // Schedule / register-read / writeback stages
    //

    /// Tests the ready bit of a physical register.
    pub fn is_ready(&self, phys_reg: usize) -> bool {
        self.prf_ready[phys_reg]
    }

    /// Clears the ready bit (a producer is in flight).
    pub fn clear_ready(&mut self, phys_reg: usize) {
        self.prf_ready[phys_reg] = false;
    }

    /// Sets the ready bit (the producer wrote back).
    pub fn set_ready(&mut self, phys_reg: usize) {
        self.prf_ready[phys_reg] = true;
    }

    /// Reads a physical register.
    pub fn read(&self, phys_reg: usize) -> u64 {
        self.prf[phys_reg]
    }

    /// Writes a physical register.
    pub fn write(&mut self, phys_reg: usize, value: u64) {
        self.prf[phys_reg] = value;
    }

    /// Marks the AL entry as completed.
    pub fn set_complete(&mut self, al_index: usize) {
        self.active_list[al_index].completed = true;
    }

    /// Marks the AL entry as excepted.
    pub fn set_exception(&mut self, al_index: usize) {
        self.active_list[al_index].exception = true;
    }

    /// Marks the AL entry as a load ordering violation.
    pub fn set_load_violation(&mut self, al_index: usize) {
        self.active_list[al_index].load_violation = true;
    }

    /// Marks the AL entry as a retirement-time branch misprediction.
    pub fn set_branch_misprediction(&mut self, al_index: usize) {
        self.active_list[al_index].branch_misprediction = true;
    }

    /// Marks the AL entry as a value misprediction.
    pub fn set_value_misprediction(&mut self, al_index: usize) {
        self.active_list[al_index].value_misprediction = true;
    }

    /// Queries the exception bit of an AL entry.
    pub fn get_exception(&self, al_index: usize) -> bool {
        self.active_list[al_index].exception
    }

    //
    // Branch resolution
    //

    /// Resolves the branch owning checkpoint `branch_id`.
    ///
    /// A correct resolution frees the checkpoint: the branch's bit is
    /// cleared from the GBM and from every checkpointed GBM (younger
    /// sibling branches no longer sit in its shadow).
    ///
    /// A misprediction restores the GBM (from which restoring also frees
    /// every younger branch's bit), the RMT, and the FL head from the
    /// checkpoint, rolls the AL tail back to just after the branch, and
    /// recomputes both occupancy figures from the ring pointers. The AL
    /// entry is *not* marked mispredicted: recovery happens here, not at
    /// retirement.
    pub fn resolve(&mut self, al_index: usize, branch_id: usize, correct: bool) {
        let mask = 1u64 << branch_id;

        if correct {
            self.gbm &= !mask;
            for checkpoint in &mut self.checkpoints {
                checkpoint.gbm &= !mask;
            }
            return;
        }

        debug!(branch_id, al_index, "rename recovery from branch checkpoint");

        self.gbm = self.checkpoints[branch_id].gbm & !mask;
        for (i, checkpoint) in self.checkpoints.iter_mut().enumerate() {
            if i != branch_id {
                checkpoint.gbm &= !mask;
            }
        }

        self.rmt.copy_from_slice(&self.checkpoints[branch_id].shadow_rmt);

        // Every register popped after the checkpoint is free again; with
        // the head restored, head == tail can only mean a full FL (the AL
        // keeps the branch itself, so at least one register stays pinned
        // unless nothing was in flight at all).
        self.fl_head = self.checkpoints[branch_id].fl_head;
        self.fl_full = self.fl_head == self.fl_tail;

        // Roll the AL tail back to just after the branch. The branch stays,
        // so the AL cannot be empty: head == tail means full.
        let size = self.active_list.len();
        for offset in 1..size {
            let idx = (al_index + offset) % size;
            if idx == self.al_tail {
                break;
            }
            self.active_list[idx] = AlEntry::default();
        }
        self.al_tail = (al_index + 1) % size;
        let live = (self.al_tail + size - self.al_head) % size;
        self.al_count = if live == 0 { size } else { live };
    }

    //
    // Retire stage
    //

    /// Examines the instruction at the head of the AL without removing it.
    /// Returns `None` when the AL is empty.
    pub fn precommit(&self) -> Option<RetireInfo> {
        if self.al_count == 0 {
            return None;
        }
        let entry = &self.active_list[self.al_head];
        Some(RetireInfo {
            completed: entry.completed,
            exception: entry.exception,
            load_violation: entry.load_violation,
            branch_misprediction: entry.branch_misprediction,
            value_misprediction: entry.value_misprediction,
            class: entry.class,
            pc: entry.pc,
        })
    }

    /// Commits the instruction at the head of the AL.
    ///
    /// If the instruction has a destination, the previous architectural
    /// mapping is recycled onto the FL tail and the AMT is updated to the
    /// committed physical register.
    ///
    /// # Panics
    ///
    /// Panics unless the head exists, is completed, and carries no
    /// unrecovered exception, load violation, or misprediction flag; the
    /// caller validates via [`Self::precommit`] first.
    pub fn commit(&mut self) {
        assert!(self.al_count > 0, "commit on empty active list");
        let entry = self.active_list[self.al_head];
        assert!(entry.completed, "commit of incomplete instruction");
        assert!(!entry.exception, "commit of excepted instruction");
        assert!(!entry.load_violation, "commit of load-violating instruction");
        assert!(!entry.branch_misprediction, "commit of mispredicted branch");
        assert!(!entry.value_misprediction, "commit of value-mispredicted instruction");

        if entry.dest_valid {
            assert!(!self.fl_full, "free list overflow at commit");
            self.free_list[self.fl_tail] = self.amt[entry.log_reg];
            self.fl_tail = (self.fl_tail + 1) % self.free_list.len();
            if self.fl_tail == self.fl_head {
                self.fl_full = true;
            }
            self.amt[entry.log_reg] = entry.phys_reg;
        }

        self.active_list[self.al_head] = AlEntry::default();
        self.al_head = (self.al_head + 1) % self.active_list.len();
        self.al_count -= 1;
    }

    /// Complete squash back to the committed architectural state.
    ///
    /// Afterwards the RMT equals the AMT, the FL is full, the AL is empty,
    /// the GBM is zero, every checkpoint is cleared, and every
    /// architectural physical register is ready.
    pub fn squash(&mut self) {
        debug!("renamer squashed to architectural state");

        self.rmt.copy_from_slice(&self.amt);
        for &phys_reg in &self.amt {
            self.prf_ready[phys_reg] = true;
        }

        self.fl_head = self.fl_tail;
        self.fl_full = true;

        self.al_head = 0;
        self.al_tail = 0;
        self.al_count = 0;
        self.active_list.fill(AlEntry::default());

        self.gbm = 0;
        for checkpoint in &mut self.checkpoints {
            checkpoint.gbm = 0;
            checkpoint.fl_head = 0;
            checkpoint.shadow_rmt.fill(0);
        }
    }

    /// Number of free physical registers available for renaming.
    fn free_regs(&self) -> usize {
        if self.fl_full {
            self.free_list.len()
        } else {
            (self.fl_tail + self.free_list.len() - self.fl_head) % self.free_list.len()
        }
    }
}

impl std::fmt::Debug for Renamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renamer")
            .field("logical", &self.logical)
            .field("physical", &self.prf.len())
            .field("in_flight", &self.al_count)
            .field("gbm", &self.gbm)
            .finish_non_exhaustive()
    }
}
