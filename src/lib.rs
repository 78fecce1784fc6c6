//! # CDC Consumer
//!
//! A change-data-capture consumer for a database logical-replication stream.
//!
//! ## Architecture
//!
//! The consumer sits between a replication connection and a downstream batch
//! handler, turning raw messages into confirmed batches of transactions:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                               EventLoop                                   │
//! │                                                                           │
//! │  ┌───────────────────────┐   ┌─────────────────────┐   ┌───────────────┐  │
//! │  │ ReplicationConnection │──►│ TransactionAssembler│──►│ PendingBatch  │  │
//! │  │ (poll_message)        │   │ (begin..commit)     │   │ + BatchGate   │  │
//! │  └───────────────────────┘   └─────────────────────┘   └───────────────┘  │
//! │         ▲                                                      │          │
//! │         │ send_feedback                                        ▼          │
//! │  ┌─────────────────────┐                              ┌───────────────┐   │
//! │  │ ConfirmationTracker │◄─────────────────────────────│ BatchHandler  │   │
//! │  │ (monotonic flush)   │        handler Ok            │ (downstream)  │   │
//! │  └─────────────────────┘                              └───────────────┘   │
//! │         ▲                                                                 │
//! │         │ keepalive tick                                                  │
//! │  ┌──────────────────────┐                                                 │
//! │  │ DelayedCallScheduler │                                                 │
//! │  └──────────────────────┘                                                 │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Guarantee
//!
//! At-least-once. A batch is confirmed only after the handler returned `Ok`
//! for it. Any error ends the run without confirming, so a restart resumes
//! from the last confirmed position and may re-deliver transactions.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cdc_consumer::{ConsumerConfig, Event, EventLoop, HandlerError, ReplicationConnection};
//!
//! async fn consume<C: ReplicationConnection>(connection: C) {
//!     let config = ConsumerConfig {
//!         slot_name: "orders_slot".into(),
//!         max_transactions_gather_count: Some(500),
//!         max_transactions_gather_time: Some("2s".into()),
//!         ..Default::default()
//!     };
//!
//!     let handler = |batch: Vec<Vec<Event>>| -> Result<(), HandlerError> {
//!         println!("{} transactions", batch.len());
//!         Ok(())
//!     };
//!
//!     let mut event_loop = EventLoop::new(config, connection, handler).expect("valid config");
//!
//!     // Runs until the connection closes or something fails
//!     let err = event_loop.run().await.unwrap_err();
//!     if !err.is_shutdown() {
//!         eprintln!("consumer failed: {}", err);
//!     }
//! }
//! ```

pub mod assembler;
pub mod batch;
pub mod config;
pub mod confirmation;
pub mod connection;
pub mod error;
pub mod event_loop;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod position;
pub mod scheduler;

// Re-exports for convenience
pub use assembler::{Assembled, TransactionAssembler};
pub use batch::{BatchGate, PendingBatch};
pub use config::{ConsumerConfig, SloConfig};
pub use confirmation::{ConfirmationTracker, Keepalive};
pub use connection::{ConnectionError, ReplicationConnection};
pub use error::{ConsumerError, Result};
pub use event_loop::{ConsumerStats, EventLoop, LoopContext};
pub use handler::{BatchHandler, HandlerError};
pub use message::{Event, MessageKind, RawMessage, Transaction};
pub use position::{LogPosition, LogPositionParseError};
pub use scheduler::DelayedCallScheduler;
