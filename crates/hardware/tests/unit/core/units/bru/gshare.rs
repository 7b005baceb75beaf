//! Gshare Index Tests.
//!
//! Verifies speculative history maintenance, checkpoint/restore, and the
//! two index mixing modes.

use tracefront_core::config::IndexMix;
use tracefront_core::core::units::bru::gshare::GshareIndex;

// ══════════════════════════════════════════════════════════
// 1. History register behaviour
// ══════════════════════════════════════════════════════════

#[test]
fn history_is_a_bounded_shift_register() {
    let mut idx = GshareIndex::new(12, 4, IndexMix::Xor);
    for _ in 0..10 {
        idx.update_bhr(true);
    }
    assert_eq!(idx.bhr(), 0b1111, "history saturates at its length");
    idx.update_bhr(false);
    assert_eq!(idx.bhr(), 0b1110);
}

#[test]
fn restore_undoes_speculative_updates() {
    let mut idx = GshareIndex::new(12, 8, IndexMix::Xor);
    idx.update_bhr(true);
    idx.update_bhr(false);
    let checkpoint = idx.bhr();
    let index_then = idx.index(0xABC0);

    idx.update_bhr(true);
    idx.update_bhr(true);
    idx.set_bhr(checkpoint);

    assert_eq!(idx.bhr(), checkpoint);
    assert_eq!(idx.index(0xABC0), index_then);
}

// ══════════════════════════════════════════════════════════
// 2. Index mixing
// ══════════════════════════════════════════════════════════

#[test]
fn xor_differentiates_contexts_of_one_branch() {
    let mut idx = GshareIndex::new(10, 4, IndexMix::Xor);
    let cold = idx.index(0x2000);
    idx.update_bhr(true);
    assert_ne!(idx.index(0x2000), cold, "history must influence the index");
}

#[test]
fn concat_partitions_index_bits() {
    let mut idx = GshareIndex::new(8, 2, IndexMix::Concat);
    // With all-zero history, only the low 6 PC bits survive.
    assert_eq!(idx.index(0x0FFC), 0x3F);
    idx.update_bhr(true);
    assert_eq!(idx.index(0x0FFC), (1 << 6) | 0x3F);
}

#[test]
fn index_fits_table() {
    let idx = GshareIndex::new(6, 3, IndexMix::Xor);
    assert_eq!(idx.table_size(), 64);
    for pc in (0..0x4000).step_by(4) {
        assert!(idx.index(pc) < idx.table_size());
    }
}

// ══════════════════════════════════════════════════════════
// 3. Commit-time re-indexing
// ══════════════════════════════════════════════════════════

#[test]
fn fetch_time_context_reproduces_fetch_time_index() {
    let mut idx = GshareIndex::new(10, 6, IndexMix::Xor);
    idx.update_bhr(true);
    idx.update_bhr(false);
    idx.update_bhr(true);

    let fetch_bhr = idx.bhr();
    let fetch_index = idx.index(0x1234 & !3);

    // Later branches shift the live history.
    for taken in [true, true, false, true] {
        idx.update_bhr(taken);
    }

    assert_eq!(idx.index_with(0x1234 & !3, fetch_bhr), fetch_index);
}
