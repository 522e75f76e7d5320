//! Digital Totem tribe client
//!
//! Holds a tribe's habit document locally and keeps a shared spreadsheet
//! endpoint informed of every change.
//!
//! # Architecture
//!
//! - **Store**: the tribe document behind a `watch` channel, mutated atomically
//! - **Storage**: RocksDB-backed persistence with schema migration
//! - **Outbox**: optimistic, at-most-once pushes with delivery reports
//! - **Remote**: HTTP client for the tribe endpoint
//!
//! # Example
//!
//! ```no_run
//! use totem_tribe::{TribeConfig, TribeStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TribeStore::open(TribeConfig::default())?;
//!     store.connect_tribe("https://script.example.com/exec").await?;
//!     store.toggle_habit(store.today(), 0)?;
//!     store.settled().await;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod outbox;
pub mod remote;
pub mod storage;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TribeConfig;
pub use document::{TribeDocument, CONNECT_ERROR_MESSAGE, OFFLINE_SENTINEL, SCHEMA_VERSION};
pub use error::{Error, Result};
pub use outbox::{Delivery, Outcome, SkipReason, UpdateKind};
pub use remote::{HttpRemote, OutboundUpdate, Remote};
pub use storage::Storage;
pub use store::TribeStore;
