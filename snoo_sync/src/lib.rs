//! Client-side reddit object sync: an identity-unique record graph fed by incremental
//! payload merges, with TTL eviction, optimistic mutations and a flattened comment tree.

pub mod cli;
pub mod collapse;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod expiration;
pub mod identity;
pub mod optimistic;
pub mod parser;
pub mod records;
pub mod remote;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod tree;
pub mod utils;

pub use context::SyncContext;
pub use error::{RemoteError, SyncError, SyncResult};
pub use records::{Record, RecordId, RecordKind};
pub use session::{CommentQuery, CommentSession};
pub use store::RecordStore;
