//! Instruction Set Architecture (ISA) surface needed by the front end.
//!
//! The full decoder lives with the execution core, outside this crate. The
//! front end only consumes the decoder contract: opcode category,
//! destination register, first source register, and the direct
//! jump/branch target. That contract is captured here:
//!
//! * `opcodes`: the three control-transfer major opcodes.
//! * `abi`: the link-register convention used to classify calls/returns.
//! * `instruction`: the [`Insn`] newtype with field and target extraction.

/// Application Binary Interface (ABI) register name mappings.
pub mod abi;

/// Instruction encoding structure and bit extraction utilities.
pub mod instruction;

/// Major opcodes for control-transfer instructions.
pub mod opcodes;

pub use instruction::Insn;
