//! Major opcodes relevant to control flow.
//!
//! The front end only needs to recognize the three control-transfer
//! opcodes; every other major opcode is treated as a plain sequential
//! instruction.

/// Conditional branch instructions (BEQ, BNE, etc.).
pub const OP_BRANCH: u32 = 0b1100011;

/// Jump and Link Register (JALR).
pub const OP_JALR: u32 = 0b1100111;

/// Jump and Link (JAL).
pub const OP_JAL: u32 = 0b1101111;

/// Integer register-immediate instructions (ADDI, etc.); the encoding
/// family of the canonical NOP.
pub const OP_IMM: u32 = 0b0010011;
