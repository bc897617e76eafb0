//! Cache keys and their deterministic fingerprints

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sort direction for collection reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9, oldest first)
    Asc,
    /// Descending order (Z-A, 9-0, newest first)
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort field plus direction, encoded on the wire as `field,direction`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Query-string form, e.g. `createdAt,desc`
    pub fn encode(&self) -> String {
        format!("{},{}", self.field, self.direction.as_str())
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for SortSpec {
    type Err = String;

    /// Parses `field` or `field,asc|desc`; direction defaults to ascending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, dir) = match s.split_once(',') {
            Some((field, dir)) => (field.trim(), Some(dir.trim())),
            None => (s.trim(), None),
        };

        if field.is_empty() {
            return Err("sort field must not be empty".to_string());
        }

        let direction = match dir.map(|d| d.to_ascii_lowercase()) {
            None => SortDirection::Asc,
            Some(d) if d == "asc" => SortDirection::Asc,
            Some(d) if d == "desc" => SortDirection::Desc,
            Some(d) => return Err(format!("unknown sort direction '{}'", d)),
        };

        Ok(SortSpec::new(field, direction))
    }
}

/// Identity of one cached query.
///
/// Two keys are equal iff every component is equal; a key is the only
/// identity an entry has.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheKey {
    /// One page of a filtered, sorted collection
    Collection {
        resource: String,
        filter: String,
        page: usize,
        size: usize,
        sort: Option<SortSpec>,
    },
    /// A single entity read by id
    Item { resource: String, id: String },
}

impl CacheKey {
    pub fn collection(
        resource: impl Into<String>,
        filter: impl Into<String>,
        page: usize,
        size: usize,
        sort: Option<SortSpec>,
    ) -> Self {
        CacheKey::Collection {
            resource: resource.into(),
            filter: filter.into(),
            page,
            size,
            sort,
        }
    }

    pub fn item(resource: impl Into<String>, id: impl Into<String>) -> Self {
        CacheKey::Item {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Resource type component shared by both key shapes
    pub fn resource(&self) -> &str {
        match self {
            CacheKey::Collection { resource, .. } | CacheKey::Item { resource, .. } => resource,
        }
    }

    /// True for any collection read of `resource`, whatever its filter or page.
    pub fn is_collection_of(&self, resource: &str) -> bool {
        matches!(self, CacheKey::Collection { resource: r, .. } if r == resource)
    }

    /// True for the single-item read of `id` in `resource`.
    pub fn is_item(&self, resource: &str, id: &str) -> bool {
        matches!(self, CacheKey::Item { resource: r, id: i } if r == resource && i == id)
    }

    /// Deterministic SHA-256 fingerprint, used as the persistent tier's
    /// primary key.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        match self {
            CacheKey::Collection {
                resource,
                filter,
                page,
                size,
                sort,
            } => {
                hasher.update(b"collection|");
                hasher.update(resource.as_bytes());
                hasher.update(b"|");
                // Length prefix keeps "a|b" filters from colliding with separators
                hasher.update(filter.len().to_string().as_bytes());
                hasher.update(b":");
                hasher.update(filter.as_bytes());
                hasher.update(b"|");
                hasher.update(page.to_string().as_bytes());
                hasher.update(b"|");
                hasher.update(size.to_string().as_bytes());
                hasher.update(b"|");
                if let Some(sort) = sort {
                    hasher.update(sort.encode().as_bytes());
                }
            }
            CacheKey::Item { resource, id } => {
                hasher.update(b"item|");
                hasher.update(resource.as_bytes());
                hasher.update(b"|");
                hasher.update(id.as_bytes());
            }
        }

        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Collection {
                resource,
                filter,
                page,
                size,
                sort,
            } => {
                write!(f, "{}[filter={:?} page={} size={}", resource, filter, page, size)?;
                if let Some(sort) = sort {
                    write!(f, " sort={}", sort)?;
                }
                write!(f, "]")
            }
            CacheKey::Item { resource, id } => write!(f, "{}/{}", resource, id),
        }
    }
}
