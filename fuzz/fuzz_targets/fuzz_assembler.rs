//! Fuzz target for transaction assembly.
//!
//! Feeds arbitrary kind sequences (one byte per message) and checks that the
//! assembler never panics and never emits an empty transaction.

#![no_main]

use cdc_consumer::{MessageKind, RawMessage, TransactionAssembler};
use libfuzzer_sys::fuzz_target;

const KINDS: [MessageKind; 5] = [
    MessageKind::Begin,
    MessageKind::Change,
    MessageKind::Truncate,
    MessageKind::Message,
    MessageKind::Commit,
];

fuzz_target!(|data: &[u8]| {
    let mut assembler = TransactionAssembler::new();

    for (i, byte) in data.iter().enumerate() {
        let kind = KINDS[(*byte as usize) % KINDS.len()];
        let message = RawMessage::new(kind, serde_json::json!(i), i as u64);
        match assembler.feed(message) {
            Ok(assembled) => {
                if let Some(txn) = assembled.into_transaction() {
                    assert!(!txn.is_empty());
                }
            }
            Err(_) => assembler.abandon(),
        }
    }
});
