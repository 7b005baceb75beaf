//! Branch taxonomy and per-slot branch metadata.
//!
//! These are the leaf types exchanged between the BTB, the trace cache
//! metadata, and the branch prediction unit. The numeric order of
//! [`BranchKind`] is part of the external interface and must not change.

/// Classification of a control-flow instruction.
///
/// The discriminants are the wire encoding shared with external tooling:
/// conditional=0, direct jump=1, direct call=2, indirect jump=3,
/// indirect call=4, return=5.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BranchKind {
    /// Conditional branch (taken/not-taken decided by the direction predictor).
    #[default]
    Conditional = 0,
    /// Unconditional direct jump (JAL not writing the link register).
    JumpDirect = 1,
    /// Direct call (JAL writing the link register).
    CallDirect = 2,
    /// Indirect jump (JALR, neither call nor return).
    JumpIndirect = 3,
    /// Indirect call (JALR writing the link register).
    CallIndirect = 4,
    /// Return (JALR discarding its link and jumping through the link register).
    Return = 5,
}

impl BranchKind {
    /// Returns true for the conditional branch kind.
    #[inline]
    pub const fn is_conditional(self) -> bool {
        matches!(self, Self::Conditional)
    }

    /// Returns true for kinds that push the return address stack.
    #[inline]
    pub const fn is_call(self) -> bool {
        matches!(self, Self::CallDirect | Self::CallIndirect)
    }

    /// Returns true for kinds whose target cannot be supplied by the BTB
    /// or trace cache (indirect jumps, indirect calls, returns).
    #[inline]
    pub const fn is_indirect(self) -> bool {
        matches!(self, Self::JumpIndirect | Self::CallIndirect | Self::Return)
    }
}

/// BTB (or trace cache) output for a single instruction slot of a fetch bundle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BtbSlot {
    /// True if this slot is a known branch.
    pub hit: bool,
    /// Branch classification; meaningless when `hit` is false.
    pub kind: BranchKind,
    /// Taken target; valid for conditional branches and direct jumps/calls.
    pub target: u64,
}

/// Opaque handle into the branch queue: `(index << 1) | phase`.
///
/// Every branch handle the BPU hands out — the per-bundle fetch tag from
/// `mark` and the per-branch tags from `push` — uses this fused format, so
/// the embedding pipeline only ever carries a single integer per branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PredTag(pub u64);

impl PredTag {
    /// Fuses a branch queue index and its phase bit into a tag.
    #[inline]
    pub const fn fuse(index: usize, phase: bool) -> Self {
        Self(((index as u64) << 1) | phase as u64)
    }

    /// The branch queue index half of the tag.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    /// The phase half of the tag.
    #[inline]
    pub const fn phase(self) -> bool {
        (self.0 & 1) == 1
    }
}
