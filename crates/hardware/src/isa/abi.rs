//! RISC-V Application Binary Interface (ABI) register name constants.
//!
//! Only the registers that matter to branch classification are named here:
//! the zero register and the link register, which together disambiguate
//! calls and returns from plain indirect jumps.

/// Register x0 (zero register, always zero).
pub const REG_ZERO: usize = 0;
/// Register x1 (return address, ra). The ABI link register.
pub const REG_RA: usize = 1;
