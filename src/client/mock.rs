//! In-memory backend for testing
//!
//! Provides a [`ResourceApi`] implementation that keeps records per resource
//! kind and answers list queries the way the real backend does: substring
//! search, `field,direction` sorting and zero-based pages.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{ApiResult, ListQuery, Page, ResourceApi};
use crate::cache::SortDirection;
use crate::error::ApiError;
use crate::resource::{Record, ResourceDescriptor, ResourceKind, record_id, value_to_text};

/// Mock API client for testing.
///
/// Seed records via builder methods, then use in tests.
///
/// # Example
/// ```ignore
/// let mock = MockResourceApi::new()
///     .with_records(ResourceKind::Tags, vec![json!({"id": 1, "name": "rust"})])
///     .await;
///
/// let page = mock.list(&ResourceKind::Tags.descriptor(), &ListQuery::new()).await?;
/// assert_eq!(page.total_elements, 1);
/// ```
#[derive(Default)]
pub struct MockResourceApi {
    /// Records per resource type name, in insertion order
    records: Arc<Mutex<HashMap<String, Vec<Record>>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Simulated round-trip time applied to every call
    latency: Arc<Mutex<Option<Duration>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
    /// Captured requests for test assertions
    captured_requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get_by_id: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Get total number of API calls made.
    pub fn total(&self) -> usize {
        self.list + self.get_by_id + self.create + self.update + self.delete
    }
}

/// A captured API request for test assertions.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// The API method called (e.g., "list", "delete")
    pub method: &'static str,
    pub resource: String,
    /// Query parameters of list calls
    pub query: Option<ListQuery>,
    /// Entity id of item calls
    pub id: Option<String>,
}

impl MockResourceApi {
    /// Create a new mock client with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the records of one resource kind. Non-object values are skipped.
    pub async fn with_records(self, kind: ResourceKind, records: Vec<Value>) -> Self {
        let records = records
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        self.records
            .lock()
            .await
            .insert(kind.type_name().to_string(), records);
        self
    }

    /// Configure an error to return on the next API call.
    /// The error is consumed after one use.
    pub async fn with_error(self, error: ApiError) -> Self {
        self.fail_next(error).await;
        self
    }

    /// Delay every response by `latency`.
    pub async fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().await = Some(latency);
        self
    }

    /// Arm a one-shot error on an already shared mock.
    pub async fn fail_next(&self, error: ApiError) {
        *self.error.lock().await = Some(error);
    }

    /// Get the call counts for verification in tests.
    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    /// Get all captured requests for test assertions.
    pub async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.captured_requests.lock().await.clone()
    }

    /// Current records of one kind
    pub async fn records(&self, kind: ResourceKind) -> Vec<Record> {
        self.records
            .lock()
            .await
            .get(kind.type_name())
            .cloned()
            .unwrap_or_default()
    }

    /// Count and capture a call, wait out the latency, then consume any armed error.
    async fn begin(
        &self,
        method: &'static str,
        resource: &ResourceDescriptor,
        query: Option<&ListQuery>,
        id: Option<&str>,
    ) -> ApiResult<()> {
        {
            let mut counts = self.call_count.lock().await;
            match method {
                "list" => counts.list += 1,
                "get_by_id" => counts.get_by_id += 1,
                "create" => counts.create += 1,
                "update" => counts.update += 1,
                _ => counts.delete += 1,
            }
        }

        self.captured_requests.lock().await.push(CapturedRequest {
            method,
            resource: resource.type_name().to_string(),
            query: query.cloned(),
            id: id.map(str::to_string),
        });

        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.error.lock().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn matches_filter(record: &Record, filter: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    let needle = filter.to_lowercase();
    record
        .values()
        .filter_map(value_to_text)
        .any(|text| text.to_lowercase().contains(&needle))
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (x, y) => {
            let x = x.and_then(value_to_text).unwrap_or_default();
            let y = y.and_then(value_to_text).unwrap_or_default();
            x.cmp(&y)
        }
    }
}

fn next_id(records: &[Record]) -> u64 {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_u64))
        .max()
        .unwrap_or(0)
        + 1
}

fn payload_object(payload: &Value) -> ApiResult<Record> {
    payload
        .as_object()
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("payload must be a JSON object".to_string()))
}

#[async_trait]
impl ResourceApi for MockResourceApi {
    async fn list(&self, resource: &ResourceDescriptor, query: &ListQuery) -> ApiResult<Page<Value>> {
        self.begin("list", resource, Some(query), None).await?;

        let records = self.records.lock().await;
        let mut matching: Vec<&Record> = records
            .get(resource.type_name())
            .map(|all| all.iter().filter(|r| matches_filter(r, &query.filter)).collect())
            .unwrap_or_default();

        if let Some(ref sort) = query.sort {
            matching.sort_by(|a, b| {
                let ord = compare_field(a, b, &sort.field);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let total = matching.len();
        let content = matching
            .into_iter()
            .skip(query.page * query.size)
            .take(query.size)
            .map(|r| Value::Object(r.clone()))
            .collect();

        Ok(Page::new(content, total, query.page, query.size))
    }

    async fn get_by_id(&self, resource: &ResourceDescriptor, id: &str) -> ApiResult<Value> {
        self.begin("get_by_id", resource, None, Some(id)).await?;

        let records = self.records.lock().await;
        records
            .get(resource.type_name())
            .and_then(|all| all.iter().find(|r| record_id(r).as_deref() == Some(id)))
            .map(|r| Value::Object(r.clone()))
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", resource.type_name(), id)))
    }

    async fn create(&self, resource: &ResourceDescriptor, payload: &Value) -> ApiResult<Value> {
        self.begin("create", resource, None, None).await?;

        let mut record = payload_object(payload)?;
        let mut records = self.records.lock().await;
        let all = records.entry(resource.type_name().to_string()).or_default();

        if let Some(identity) = record.get(resource.identity_field) {
            if all.iter().any(|r| r.get(resource.identity_field) == Some(identity)) {
                return Err(ApiError::Conflict(format!(
                    "{} {} already exists",
                    resource.identity_field,
                    value_to_text(identity).unwrap_or_default()
                )));
            }
        }

        record.insert("id".to_string(), Value::from(next_id(all)));
        all.push(record.clone());

        Ok(Value::Object(record))
    }

    async fn update(&self, resource: &ResourceDescriptor, id: &str, payload: &Value) -> ApiResult<Value> {
        self.begin("update", resource, None, Some(id)).await?;

        let changes = payload_object(payload)?;
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(resource.type_name())
            .and_then(|all| all.iter_mut().find(|r| record_id(r).as_deref() == Some(id)))
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", resource.type_name(), id)))?;

        for (field, value) in changes {
            if field != "id" {
                record.insert(field, value);
            }
        }

        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, resource: &ResourceDescriptor, id: &str) -> ApiResult<()> {
        self.begin("delete", resource, None, Some(id)).await?;

        let mut records = self.records.lock().await;
        let all = records.entry(resource.type_name().to_string()).or_default();
        let initial_len = all.len();
        all.retain(|r| record_id(r).as_deref() != Some(id));

        if all.len() == initial_len {
            return Err(ApiError::NotFound(format!("{} {}", resource.type_name(), id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SortSpec;
    use serde_json::json;

    async fn users() -> MockResourceApi {
        MockResourceApi::new()
            .with_records(
                ResourceKind::Users,
                vec![
                    json!({"id": 1, "email": "carol@x.io"}),
                    json!({"id": 2, "email": "alice@x.io"}),
                    json!({"id": 3, "email": "bob@y.io"}),
                ],
            )
            .await
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let mock = users().await;
        let desc = ResourceKind::Users.descriptor();

        let query = ListQuery::new()
            .filter("X.IO")
            .size(1)
            .sort(Some(SortSpec::new("email", SortDirection::Asc)));
        let page = mock.list(&desc, &query).await.unwrap();

        assert_eq!(page.total_elements, 2);
        assert_eq!(page.content, vec![json!({"id": 2, "email": "alice@x.io"})]);

        let second = mock.list(&desc, &query.clone().page(1)).await.unwrap();
        assert_eq!(second.content[0]["email"], "carol@x.io");
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_rejects_duplicates() {
        let mock = users().await;
        let desc = ResourceKind::Users.descriptor();

        let created = mock.create(&desc, &json!({"email": "dan@x.io"})).await.unwrap();
        assert_eq!(created["id"], 4);

        let err = mock
            .create(&desc, &json!({"email": "dan@x.io"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_id() {
        let mock = users().await;
        let desc = ResourceKind::Users.descriptor();

        let updated = mock
            .update(&desc, "2", &json!({"email": "alice@z.io", "id": 99}))
            .await
            .unwrap();
        assert_eq!(updated, json!({"id": 2, "email": "alice@z.io"}));

        assert!(matches!(
            mock.delete(&desc, "42").await,
            Err(ApiError::NotFound(_))
        ));
        mock.delete(&desc, "2").await.unwrap();
        assert_eq!(mock.records(ResourceKind::Users).await.len(), 2);
    }

    #[tokio::test]
    async fn test_error_is_consumed_once() {
        let mock = users()
            .await
            .with_error(ApiError::ServerError("boom".to_string()))
            .await;
        let desc = ResourceKind::Users.descriptor();

        assert!(mock.list(&desc, &ListQuery::new()).await.is_err());
        assert!(mock.list(&desc, &ListQuery::new()).await.is_ok());
        assert_eq!(mock.call_counts().await.list, 2);
    }

    #[tokio::test]
    async fn test_captures_requests() {
        let mock = users().await;
        let desc = ResourceKind::Users.descriptor();

        mock.get_by_id(&desc, "1").await.unwrap();

        let requests = mock.captured_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "get_by_id");
        assert_eq!(requests[0].resource, "users");
        assert_eq!(requests[0].id.as_deref(), Some("1"));
    }
}
