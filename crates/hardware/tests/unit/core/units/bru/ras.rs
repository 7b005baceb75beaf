//! Return Address Stack (RAS) Tests.
//!
//! Verifies LIFO prediction, non-destructive peek, ring overwrite on
//! overflow, and best-effort TOS checkpoint restoration.

use tracefront_core::core::units::bru::ras::Ras;

// ══════════════════════════════════════════════════════════
// 1. Basic push/pop/peek
// ══════════════════════════════════════════════════════════

#[test]
fn nested_calls_unwind_in_reverse() {
    let mut ras = Ras::new(16);
    ras.push(0x1004);
    ras.push(0x2008);
    ras.push(0x300C);

    assert_eq!(ras.pop(), 0x300C);
    assert_eq!(ras.pop(), 0x2008);
    assert_eq!(ras.pop(), 0x1004);
}

#[test]
fn peek_matches_subsequent_pop() {
    let mut ras = Ras::new(8);
    ras.push(0x1004);
    let peeked = ras.peek();
    assert_eq!(peeked, ras.pop());
}

// ══════════════════════════════════════════════════════════
// 2. Overflow
// ══════════════════════════════════════════════════════════

#[test]
fn deep_recursion_wraps_over_oldest_frames() {
    let mut ras = Ras::new(4);
    for i in 0..6u64 {
        ras.push(0x1000 + i * 4);
    }
    // The four most recent frames survive, newest first.
    assert_eq!(ras.pop(), 0x1014);
    assert_eq!(ras.pop(), 0x1010);
    assert_eq!(ras.pop(), 0x100C);
    assert_eq!(ras.pop(), 0x1008);
}

// ══════════════════════════════════════════════════════════
// 3. Checkpoint/restore
// ══════════════════════════════════════════════════════════

#[test]
fn tos_restore_rewinds_speculative_calls() {
    let mut ras = Ras::new(8);
    ras.push(0x1004);
    let checkpoint = ras.tos();

    // Two speculative calls down a mispredicted path.
    ras.push(0xBAD4);
    ras.push(0xBAD8);

    ras.set_tos(checkpoint);
    assert_eq!(ras.peek(), 0x1004);
}

#[test]
fn restore_is_best_effort_after_wrap() {
    // A checkpoint taken before the ring wraps cannot protect entries the
    // wrap overwrote; the TOS index still restores.
    let mut ras = Ras::new(2);
    ras.push(0x1000);
    let checkpoint = ras.tos();
    ras.push(0x2000);
    ras.push(0x3000); // overwrites 0x1000's slot

    ras.set_tos(checkpoint);
    assert_eq!(ras.tos(), checkpoint);
    // The value underneath is stale; only the index is exact.
    assert_eq!(ras.peek(), 0x3000);
}
