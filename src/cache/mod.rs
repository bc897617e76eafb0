//! Request cache for backend reads
//!
//! An in-memory, key-addressed store of asynchronous results with staleness
//! and in-flight de-duplication, optionally written through to a SQLite
//! tier so cached pages survive between CLI invocations.

pub mod entry;
pub mod key;
pub mod request;
pub mod storage;

use std::time::Duration;

/// Staleness windows per class of resource.
///
/// A Ready entry older than its window is refetched on the next read even
/// if no mutation invalidated it.
pub struct StaleTime;

impl StaleTime {
    // Content edited from the console itself; mutations invalidate explicitly
    pub const DEFAULT: Duration = Duration::from_secs(60); // 1 min

    // Written by site visitors (contact forms, sign-ups), not by the console
    pub const INBOX: Duration = Duration::from_secs(30); // 30 sec

    // Global settings rarely change
    pub const SETTINGS: Duration = Duration::from_secs(60 * 60); // 1 hr
}

// Re-export main types
pub use entry::{CacheEntry, EntrySnapshot, EntryStatus};
pub use key::{CacheKey, SortDirection, SortSpec};
pub use request::{Payload, RequestCache};
pub use storage::CacheStorage;
