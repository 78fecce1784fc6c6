// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transaction assembly from the raw message stream.
//!
//! Commit boundaries, not message boundaries, define atomicity:
//!
//! ```text
//!            begin                      change / truncate / message
//! Idle ───────────────────→ InTransaction ◄──────────┐
//!  ▲  │                        │    │                 │
//!  │  │ message                │    └─────────────────┘
//!  │  ▼ (singleton txn)        │ commit
//!  └───────────────────────────┘ (emit if non-empty, discard if empty)
//! ```
//!
//! Anything else (`change`/`truncate`/`commit` while Idle, `begin` while
//! InTransaction) is a protocol violation and is returned as an error; the
//! assembler state is left untouched.

use crate::error::{ConsumerError, Result};
use crate::message::{Event, MessageKind, RawMessage, Transaction};
use crate::position::LogPosition;
use tracing::trace;

#[derive(Debug, Default)]
enum AssemblerState {
    #[default]
    Idle,
    InTransaction {
        begin_position: LogPosition,
        events: Vec<Event>,
    },
}

impl AssemblerState {
    fn name(&self) -> &'static str {
        match self {
            AssemblerState::Idle => "Idle",
            AssemblerState::InTransaction { .. } => "InTransaction",
        }
    }
}

/// What feeding one message produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// The message was absorbed; nothing completed.
    Pending,
    /// A transaction completed.
    Transaction(Transaction),
    /// A `commit` closed a transaction with no events; nothing to deliver.
    EmptyDiscarded(LogPosition),
}

impl Assembled {
    /// The completed transaction, if any.
    pub fn into_transaction(self) -> Option<Transaction> {
        match self {
            Assembled::Transaction(txn) => Some(txn),
            _ => None,
        }
    }
}

/// Groups raw messages into [`Transaction`]s.
#[derive(Debug, Default)]
pub struct TransactionAssembler {
    state: AssemblerState,
}

impl TransactionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next message in wire order.
    pub fn feed(&mut self, message: RawMessage) -> Result<Assembled> {
        let RawMessage {
            kind,
            payload,
            position,
        } = message;

        match kind {
            MessageKind::Begin => {
                if self.in_transaction() {
                    return Err(ConsumerError::protocol(self.state.name(), kind, position));
                }
                trace!(position = %position, "Transaction begin");
                self.state = AssemblerState::InTransaction {
                    begin_position: position,
                    events: Vec::new(),
                };
                Ok(Assembled::Pending)
            }
            MessageKind::Commit => match std::mem::take(&mut self.state) {
                AssemblerState::Idle => {
                    Err(ConsumerError::protocol(AssemblerState::Idle.name(), kind, position))
                }
                AssemblerState::InTransaction {
                    begin_position,
                    events,
                } if events.is_empty() => {
                    trace!(
                        begin = %begin_position,
                        commit = %position,
                        "Discarding empty transaction"
                    );
                    Ok(Assembled::EmptyDiscarded(position))
                }
                AssemblerState::InTransaction {
                    begin_position,
                    events,
                } => {
                    trace!(
                        begin = %begin_position,
                        commit = %position,
                        events = events.len(),
                        "Transaction committed"
                    );
                    Ok(Assembled::Transaction(Transaction::new(position, events)))
                }
            },
            MessageKind::Change | MessageKind::Truncate | MessageKind::Message => {
                match &mut self.state {
                    AssemblerState::InTransaction { events, .. } => {
                        events.push(payload);
                        Ok(Assembled::Pending)
                    }
                    AssemblerState::Idle if kind == MessageKind::Message => {
                        trace!(position = %position, "Standalone message");
                        Ok(Assembled::Transaction(Transaction::new(position, vec![payload])))
                    }
                    AssemblerState::Idle => {
                        Err(ConsumerError::protocol(AssemblerState::Idle.name(), kind, position))
                    }
                }
            }
        }
    }

    /// Check if a transaction is open (begun but not committed).
    pub fn in_transaction(&self) -> bool {
        matches!(self.state, AssemblerState::InTransaction { .. })
    }

    /// Number of events accumulated in the open transaction.
    pub fn open_event_count(&self) -> usize {
        match &self.state {
            AssemblerState::Idle => 0,
            AssemblerState::InTransaction { events, .. } => events.len(),
        }
    }

    /// Drop any partially assembled transaction.
    pub fn abandon(&mut self) {
        self.state = AssemblerState::Idle;
    }
}
