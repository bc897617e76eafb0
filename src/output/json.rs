//! JSON output formatting

use chrono::Utc;
use serde::{Deserialize, Serialize};

use adminop::client::Page;

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    /// The actual data
    pub data: T,

    /// Metadata about the response
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// Timestamp of the response
    pub timestamp: String,

    /// CLI version
    pub version: String,

    /// Paging position, for collection reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
}

/// Where a page sits in its collection
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> From<&Page<T>> for PageMeta {
    fn from(page: &Page<T>) -> Self {
        Self {
            page: page.page_index,
            size: page.page_size,
            total_elements: page.total_elements,
            total_pages: page.total_pages(),
        }
    }
}

impl<T> JsonOutput<T> {
    /// Create a new JSON output with metadata
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                pagination: None,
            },
        }
    }

    pub fn with_pagination(mut self, pagination: PageMeta) -> Self {
        self.meta.pagination = Some(pagination);
        self
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    let output = JsonOutput::new(data);
    serde_json::to_string_pretty(&output)
}

/// Format one page of a collection as pretty-printed JSON
pub fn format_json_page<T: Serialize>(page: &Page<T>) -> Result<String, serde_json::Error> {
    let output = JsonOutput::new(&page.content).with_pagination(PageMeta::from(page));
    serde_json::to_string_pretty(&output)
}
