//! Pagination types shared by the transport and the controllers
//!
//! Pagination is zero-indexed: `page=0&size=N` is the first page. Sorting is
//! sent as `sort=field,direction`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheKey, SortSpec};

/// Page size used when nothing else is configured
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One page of a collection, in server-assigned order.
///
/// `page_index * page_size` items logically precede `content[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: usize,
    #[serde(rename = "number", alias = "pageIndex", default)]
    pub page_index: usize,
    #[serde(rename = "size", alias = "pageSize", default)]
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: usize, page_index: usize, page_size: usize) -> Self {
        Self {
            content,
            total_elements,
            page_index,
            page_size,
        }
    }

    pub fn empty(page_index: usize, page_size: usize) -> Self {
        Self::new(Vec::new(), 0, page_index, page_size)
    }

    /// Number of pages needed for `total_elements`
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.page_size)
    }

    pub fn has_next_page(&self) -> bool {
        self.page_index + 1 < self.total_pages()
    }

    /// Zero-based position of `content[0]` in the whole collection
    pub fn offset(&self) -> usize {
        self.page_index * self.page_size
    }
}

impl Page<Value> {
    /// Decode the raw JSON items into `T`
    pub fn decode<T: DeserializeOwned>(self) -> Result<Page<T>, serde_json::Error> {
        let content = self
            .content
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;

        Ok(Page {
            content,
            total_elements: self.total_elements,
            page_index: self.page_index,
            page_size: self.page_size,
        })
    }
}

/// Parameters of one collection read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: String,
    pub page: usize,
    pub size: usize,
    pub sort: Option<SortSpec>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: String::new(),
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn sort(mut self, sort: Option<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    /// Cache key identifying this read of `resource`
    pub fn cache_key(&self, resource: &str) -> CacheKey {
        CacheKey::collection(resource, self.filter.clone(), self.page, self.size, self.sort.clone())
    }

    /// Convert to query string parameters.
    ///
    /// `search` is omitted when the filter is empty.
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page.to_string()), ("size", self.size.to_string())];

        if let Some(ref sort) = self.sort {
            params.push(("sort", sort.encode()));
        }

        if !self.filter.is_empty() {
            params.push(("search", self.filter.clone()));
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SortDirection;
    use serde_json::json;

    #[test]
    fn test_page_deserializes_backend_shape() {
        let page: Page<Value> = serde_json::from_value(json!({
            "content": [{"id": 1}, {"id": 2}],
            "totalElements": 12,
            "number": 1,
            "size": 2,
            "totalPages": 6
        }))
        .unwrap();

        assert_eq!(page.content.len(), 2);
        assert_eq!(page.total_elements, 12);
        assert_eq!(page.page_index, 1);
        assert_eq!(page.page_size, 2);
        assert_eq!(page.offset(), 2);
    }

    #[test]
    fn test_page_counts() {
        let page: Page<u32> = Page::new(vec![1, 2, 3], 23, 0, 10);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next_page());

        let last: Page<u32> = Page::new(vec![1, 2, 3], 23, 2, 10);
        assert!(!last.has_next_page());

        let empty: Page<u32> = Page::empty(0, 10);
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next_page());
    }

    #[test]
    fn test_page_decode() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Tag {
            id: u32,
            name: String,
        }

        let raw = Page::new(vec![json!({"id": 1, "name": "rust"})], 1, 0, 10);
        let page: Page<Tag> = raw.decode().unwrap();
        assert_eq!(
            page.content,
            vec![Tag {
                id: 1,
                name: "rust".to_string()
            }]
        );
    }

    #[test]
    fn test_list_query_params_default() {
        let params = ListQuery::new().to_query_params();
        assert_eq!(
            params,
            vec![("page", "0".to_string()), ("size", DEFAULT_PAGE_SIZE.to_string())]
        );
    }

    #[test]
    fn test_list_query_params_full() {
        let params = ListQuery::new()
            .filter("ali")
            .page(2)
            .size(25)
            .sort(Some(SortSpec::new("email", SortDirection::Desc)))
            .to_query_params();

        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("size", "25".to_string())));
        assert!(params.contains(&("sort", "email,desc".to_string())));
        assert!(params.contains(&("search", "ali".to_string())));
    }

    #[test]
    fn test_list_query_cache_key() {
        let query = ListQuery::new().filter("x").page(1).size(5);
        assert_eq!(
            query.cache_key("tags"),
            CacheKey::collection("tags", "x", 1, 5, None)
        );
    }
}
