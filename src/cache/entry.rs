//! Cache entry lifecycle

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::key::CacheKey;
use crate::error::ApiError;

/// Where an entry is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Ready,
    Failed,
}

/// One cached query result.
///
/// Exactly one entry exists per key; a refetch overwrites it in place.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: EntryStatus,
    /// Last successful payload; kept while a refetch is pending
    pub data: Option<Value>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Set by invalidation; cleared when a new request starts
    pub stale: bool,
    /// Request that currently owns this entry
    pub generation: u64,
}

impl CacheEntry {
    pub(crate) fn pending(key: CacheKey, generation: u64, previous: Option<CacheEntry>) -> Self {
        let (data, last_fetched_at) = previous
            .map(|prev| (prev.data, prev.last_fetched_at))
            .unwrap_or((None, None));

        Self {
            key,
            status: EntryStatus::Pending,
            data,
            error: None,
            last_fetched_at,
            stale: false,
            generation,
        }
    }

    pub(crate) fn ready(key: CacheKey, data: Value, fetched_at: DateTime<Utc>, generation: u64) -> Self {
        Self {
            key,
            status: EntryStatus::Ready,
            data: Some(data),
            error: None,
            last_fetched_at: Some(fetched_at),
            stale: false,
            generation,
        }
    }

    /// Whether the entry is older than `stale_time`.
    pub fn is_expired(&self, stale_time: Duration, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at {
            None => true,
            Some(at) => match chrono::Duration::from_std(stale_time) {
                Ok(window) => at + window <= now,
                Err(_) => false,
            },
        }
    }

    /// Ready, not invalidated, and inside its staleness window
    pub fn is_fresh(&self, stale_time: Duration, now: DateTime<Utc>) -> bool {
        self.status == EntryStatus::Ready && !self.stale && !self.is_expired(stale_time, now)
    }

    pub fn snapshot(&self, stale_time: Duration, now: DateTime<Utc>) -> EntrySnapshot {
        EntrySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            stale: self.stale || (self.status == EntryStatus::Ready && self.is_expired(stale_time, now)),
        }
    }
}

/// Read-only view of an entry handed to controllers
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub status: EntryStatus,
    pub data: Option<Value>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
}
