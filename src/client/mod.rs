//! Backend API client
//!
//! [`ResourceApi`] is the fixed contract the core consumes for every
//! resource kind. [`RestClient`] implements it over HTTP.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
use crate::resource::ResourceDescriptor;

#[cfg(test)]
pub mod mock;
pub mod pagination;
pub mod rest;

#[cfg(test)]
pub use mock::MockResourceApi;
pub use pagination::{DEFAULT_PAGE_SIZE, ListQuery, Page};
pub use rest::RestClient;

/// Result of a transport call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Transport contract for one backend serving every resource kind.
///
/// Payloads and entities travel as JSON; typed decoding happens in the
/// controllers.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Read one page of a collection
    async fn list(&self, resource: &ResourceDescriptor, query: &ListQuery) -> ApiResult<Page<Value>>;

    /// Read a single entity
    async fn get_by_id(&self, resource: &ResourceDescriptor, id: &str) -> ApiResult<Value>;

    /// Create an entity and return it as stored by the server
    async fn create(&self, resource: &ResourceDescriptor, payload: &Value) -> ApiResult<Value>;

    /// Replace an entity's fields and return the result
    async fn update(&self, resource: &ResourceDescriptor, id: &str, payload: &Value) -> ApiResult<Value>;

    /// Delete an entity
    async fn delete(&self, resource: &ResourceDescriptor, id: &str) -> ApiResult<()>;
}
