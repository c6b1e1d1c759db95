//! Type definitions for Watchlog.
//!
//! This module contains the core identifiers and records shared by every
//! Watchlog component.

mod ids;
mod record;
mod timestamps;

pub use ids::{Cursor, PartitionToken, PlayId, PlayKey, ProfileId};
pub use record::PlayRecord;
pub use timestamps::{Timestamp, WatchedAt};
