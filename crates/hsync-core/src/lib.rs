//! `hsync-core`: configuration, error type and identifiers shared by the
//! hub and the gateway.

pub mod config;
pub mod error;
pub mod types;

pub use config::{HsyncConfig, HubConfig, QueuePolicy};
pub use error::{Result, SyncError};
pub use types::OriginatorId;
