//! Mutation Coordinator
//!
//! Runs create/update/delete against the backend and, only after the server
//! confirms success, invalidates the cache entries the change affects.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::RequestCache;
use crate::client::ResourceApi;
use crate::error::{ApiError, Result};
use crate::resource::{ResourceDescriptor, record_id};

/// A single write against one resource kind
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    Create(Value),
    Update { id: String, payload: Value },
    Delete(String),
}

impl MutationOp {
    pub fn name(&self) -> &'static str {
        match self {
            MutationOp::Create(_) => "create",
            MutationOp::Update { .. } => "update",
            MutationOp::Delete(_) => "delete",
        }
    }

    /// Id of the entity the operation targets, when known up front
    pub fn target_id(&self) -> Option<&str> {
        match self {
            MutationOp::Create(_) => None,
            MutationOp::Update { id, .. } | MutationOp::Delete(id) => Some(id),
        }
    }
}

/// Decrements the in-flight count when the mutation settles or is dropped
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Write access to one resource kind, decoding responses as `T`.
///
/// Distinct `mutate` calls are never merged; each one reaches the backend.
pub struct ResourceMutation<T> {
    descriptor: ResourceDescriptor,
    api: Arc<dyn ResourceApi>,
    cache: RequestCache,
    in_flight: Arc<AtomicUsize>,
    last_error: Arc<Mutex<Option<ApiError>>>,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ResourceMutation<T> {
    pub fn new(descriptor: ResourceDescriptor, api: Arc<dyn ResourceApi>, cache: RequestCache) -> Self {
        Self {
            descriptor,
            api,
            cache,
            in_flight: Arc::new(AtomicUsize::new(0)),
            last_error: Arc::new(Mutex::new(None)),
            _item: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Whether any mutation issued through this coordinator is in flight
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Failure of the most recent mutation, cleared when a new one starts
    pub fn last_error(&self) -> Option<ApiError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_error(&self, error: Option<ApiError>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Execute `op`. On success every collection of this resource kind and
    /// the item entry of the affected id are invalidated; on failure the
    /// cache is left untouched.
    ///
    /// Returns the server's representation of the entity (`Null` for deletes).
    pub async fn mutate(&self, op: MutationOp) -> std::result::Result<Value, ApiError> {
        let _pending = PendingGuard::enter(&self.in_flight);
        self.set_last_error(None);

        let resource = &self.descriptor;
        let result = match &op {
            MutationOp::Create(payload) => self.api.create(resource, payload).await,
            MutationOp::Update { id, payload } => self.api.update(resource, id, payload).await,
            MutationOp::Delete(id) => self.api.delete(resource, id).await.map(|()| Value::Null),
        };

        match result {
            Ok(entity) => {
                let id = op
                    .target_id()
                    .map(str::to_string)
                    .or_else(|| entity.as_object().and_then(record_id));
                let type_name = resource.type_name();

                let marked = self.cache.invalidate(|key| {
                    key.is_collection_of(type_name)
                        || id.as_deref().is_some_and(|id| key.is_item(type_name, id))
                });
                debug!(
                    "{} {} succeeded, invalidated {} cache entries",
                    op.name(),
                    type_name,
                    marked
                );
                Ok(entity)
            }
            Err(e) => {
                debug!("{} {} failed: {}", op.name(), resource.type_name(), e);
                self.set_last_error(Some(e.clone()));
                Err(e)
            }
        }
    }

    /// Create an entity from any serializable payload
    pub async fn create<P: Serialize>(&self, payload: &P) -> Result<T> {
        let payload = serde_json::to_value(payload)?;
        let entity = self.mutate(MutationOp::Create(payload)).await?;
        self.decode(entity)
    }

    pub async fn update<P: Serialize>(&self, id: &str, payload: &P) -> Result<T> {
        let payload = serde_json::to_value(payload)?;
        let entity = self
            .mutate(MutationOp::Update {
                id: id.to_string(),
                payload,
            })
            .await?;
        self.decode(entity)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.mutate(MutationOp::Delete(id.to_string())).await?;
        Ok(())
    }

    fn decode(&self, entity: Value) -> Result<T> {
        serde_json::from_value(entity).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "Failed to decode {} response: {}",
                self.descriptor.type_name(),
                e
            ))
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::client::MockResourceApi;
    use crate::error::Error;
    use crate::query::{QueryStatus, ResourceQuery};
    use crate::resource::ResourceKind;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Subscriber {
        #[serde(default)]
        id: u64,
        email: String,
    }

    async fn api() -> Arc<MockResourceApi> {
        Arc::new(
            MockResourceApi::new()
                .with_records(
                    ResourceKind::Subscribers,
                    vec![
                        json!({"id": 1, "email": "a@x.io"}),
                        json!({"id": 2, "email": "b@x.io"}),
                    ],
                )
                .await
                .with_records(ResourceKind::Tags, vec![json!({"id": 1, "name": "rust"})])
                .await,
        )
    }

    fn dyn_api(api: &Arc<MockResourceApi>) -> Arc<dyn ResourceApi> {
        Arc::clone(api) as Arc<dyn ResourceApi>
    }

    #[tokio::test]
    async fn test_create_then_list_shows_new_total() {
        let api = api().await;
        let cache = RequestCache::new();
        let kind = ResourceKind::Subscribers;
        let list: ResourceQuery<Subscriber> = ResourceQuery::new(kind.descriptor(), dyn_api(&api), cache.clone());
        let mutation: ResourceMutation<Subscriber> =
            ResourceMutation::new(kind.descriptor(), dyn_api(&api), cache.clone());

        let before = list.fetch().await.page.unwrap().total_elements;

        let created = mutation
            .create(&json!({"email": "new@x.io"}))
            .await
            .unwrap();
        assert_eq!(created.email, "new@x.io");
        assert!(list.view().stale);

        let after = list.fetch().await;
        assert_eq!(after.status, QueryStatus::Ready);
        assert_eq!(after.page.unwrap().total_elements, before + 1);
        assert_eq!(api.call_counts().await.list, 2);
    }

    #[tokio::test]
    async fn test_success_invalidates_only_mutated_kind() {
        let api = api().await;
        let cache = RequestCache::new();
        let subscribers: ResourceQuery<Value> =
            ResourceQuery::new(ResourceKind::Subscribers.descriptor(), dyn_api(&api), cache.clone());
        let tags: ResourceQuery<Value> = ResourceQuery::new(ResourceKind::Tags.descriptor(), dyn_api(&api), cache.clone());
        let mutation: ResourceMutation<Value> =
            ResourceMutation::new(ResourceKind::Subscribers.descriptor(), dyn_api(&api), cache.clone());

        subscribers.fetch().await;
        tags.fetch().await;

        mutation.delete("1").await.unwrap();

        assert!(subscribers.view().stale);
        assert!(!tags.view().stale);
    }

    #[tokio::test]
    async fn test_update_invalidates_item_entry() {
        let api = api().await;
        let cache = RequestCache::new();
        let item = CacheKey::item("subscribers", "2");
        let other = CacheKey::item("subscribers", "1");

        for key in [&item, &other] {
            cache
                .read(key, || async { Ok::<_, ApiError>(json!({"cached": true})) })
                .await
                .unwrap();
        }

        let mutation: ResourceMutation<Subscriber> =
            ResourceMutation::new(ResourceKind::Subscribers.descriptor(), dyn_api(&api), cache.clone());
        let updated = mutation
            .update("2", &json!({"email": "changed@x.io"}))
            .await
            .unwrap();

        assert_eq!(updated, Subscriber { id: 2, email: "changed@x.io".to_string() });
        assert!(cache.peek(&item).unwrap().stale);
        // Other items of the same kind are left alone
        assert!(!cache.peek(&other).unwrap().stale);
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_untouched() {
        let api = api().await;
        let cache = RequestCache::new();
        let list: ResourceQuery<Subscriber> =
            ResourceQuery::new(ResourceKind::Subscribers.descriptor(), dyn_api(&api), cache.clone());
        let mutation: ResourceMutation<Subscriber> =
            ResourceMutation::new(ResourceKind::Subscribers.descriptor(), dyn_api(&api), cache.clone());

        list.fetch().await;

        let err = mutation
            .create(&json!({"email": "a@x.io"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Conflict(_))));
        assert!(matches!(mutation.last_error(), Some(ApiError::Conflict(_))));
        assert!(!list.view().stale);
        assert!(!mutation.is_pending());
    }

    #[tokio::test]
    async fn test_network_failure_is_reported() {
        let api = api().await;
        api.fail_next(ApiError::Network("offline".to_string())).await;
        let mutation: ResourceMutation<Value> =
            ResourceMutation::new(ResourceKind::Tags.descriptor(), dyn_api(&api), RequestCache::new());

        let result = mutation.mutate(MutationOp::Delete("1".to_string())).await;
        assert_eq!(result, Err(ApiError::Network("offline".to_string())));

        // A later success clears the recorded failure
        mutation.mutate(MutationOp::Delete("1".to_string())).await.unwrap();
        assert_eq!(mutation.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_pending_while_in_flight() {
        let api = Arc::new(
            MockResourceApi::new()
                .with_latency(Duration::from_millis(100))
                .await,
        );
        let mutation: ResourceMutation<Value> =
            ResourceMutation::new(ResourceKind::Tags.descriptor(), dyn_api(&api), RequestCache::new());

        assert!(!mutation.is_pending());

        let create = mutation.mutate(MutationOp::Create(json!({"name": "async"})));
        let probe = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mutation.is_pending()
        };
        let (result, pending_midway) = tokio::join!(create, probe);

        assert!(result.is_ok());
        assert!(pending_midway);
        assert!(!mutation.is_pending());
    }

    #[tokio::test]
    async fn test_repeated_mutations_are_not_merged() {
        let api = api().await;
        let mutation: ResourceMutation<Value> =
            ResourceMutation::new(ResourceKind::Tags.descriptor(), dyn_api(&api), RequestCache::new());

        let payload = json!({"name": "same"});
        let (a, b) = tokio::join!(
            mutation.mutate(MutationOp::Update { id: "1".to_string(), payload: payload.clone() }),
            mutation.mutate(MutationOp::Update { id: "1".to_string(), payload: payload.clone() }),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(api.call_counts().await.update, 2);
    }

    #[test]
    fn test_op_target_id() {
        assert_eq!(MutationOp::Delete("9".to_string()).target_id(), Some("9"));
        assert_eq!(MutationOp::Create(json!({})).target_id(), None);
        assert_eq!(MutationOp::Create(json!({})).name(), "create");
    }
}
