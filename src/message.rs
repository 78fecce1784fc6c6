// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Decoded replication messages and assembled transactions.
//!
//! The connection hands the consumer one [`RawMessage`] at a time, already
//! decoded from the wire. Payloads are opaque [`Event`] values; the consumer
//! never looks inside them except to classify a wal2json record by its
//! `action` field in [`RawMessage::from_wal2json`].

use crate::position::LogPosition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque, already-parsed change record.
pub type Event = serde_json::Value;

/// Kind of a decoded replication message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Begin,
    /// Row insert, update or delete.
    Change,
    Truncate,
    /// Logical decoding message; may appear inside or outside a transaction.
    Message,
    Commit,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Begin => "begin",
            MessageKind::Change => "change",
            MessageKind::Truncate => "truncate",
            MessageKind::Message => "message",
            MessageKind::Commit => "commit",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = UnknownMessageKind;

    /// Accepts wal2json format-version 2 action codes and spelled-out names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" | "BEGIN" => Ok(MessageKind::Begin),
            "I" | "U" | "D" | "INSERT" | "UPDATE" | "DELETE" | "CHANGE" => Ok(MessageKind::Change),
            "T" | "TRUNCATE" => Ok(MessageKind::Truncate),
            "M" | "MESSAGE" => Ok(MessageKind::Message),
            "C" | "COMMIT" => Ok(MessageKind::Commit),
            _ => Err(UnknownMessageKind(s.to_string())),
        }
    }
}

/// A message kind string that is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message kind: {0}")]
pub struct UnknownMessageKind(pub String);

/// One decoded message from the replication stream, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub kind: MessageKind,
    pub payload: Event,
    pub position: LogPosition,
}

impl RawMessage {
    pub fn new(kind: MessageKind, payload: Event, position: impl Into<LogPosition>) -> Self {
        Self {
            kind,
            payload,
            position: position.into(),
        }
    }

    pub fn begin(position: impl Into<LogPosition>) -> Self {
        Self::new(MessageKind::Begin, Event::Null, position)
    }

    pub fn change(payload: Event, position: impl Into<LogPosition>) -> Self {
        Self::new(MessageKind::Change, payload, position)
    }

    pub fn truncate(payload: Event, position: impl Into<LogPosition>) -> Self {
        Self::new(MessageKind::Truncate, payload, position)
    }

    pub fn message(payload: Event, position: impl Into<LogPosition>) -> Self {
        Self::new(MessageKind::Message, payload, position)
    }

    pub fn commit(position: impl Into<LogPosition>) -> Self {
        Self::new(MessageKind::Commit, Event::Null, position)
    }

    /// Classify a wal2json (format-version 2) record by its `action` field.
    ///
    /// Returns `None` when the record has no string `action` or the action
    /// is not one the consumer understands.
    pub fn from_wal2json(record: Event, position: impl Into<LogPosition>) -> Option<Self> {
        let kind = record.get("action")?.as_str()?.parse().ok()?;
        Some(Self::new(kind, record, position))
    }
}

/// A committed unit of change.
///
/// `events` is never empty for a transaction handed to the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Position of the commit (or of the standalone message).
    pub commit_position: LogPosition,
    pub events: Vec<Event>,
}

impl Transaction {
    pub fn new(commit_position: LogPosition, events: Vec<Event>) -> Self {
        Self {
            commit_position,
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
