//! Console context
//!
//! [`Console`] owns the process-wide [`RequestCache`] and the backend
//! client, and hands out controllers that share them. Created once at
//! startup; [`Console::logout`] drops every cached result.

use std::sync::Arc;

use futures::future::FutureExt;
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::cache::{CacheKey, CacheStorage, RequestCache, StaleTime};
use crate::client::{ResourceApi, RestClient};
use crate::config::{Config, Preferences};
use crate::confirm::ConfirmationGate;
use crate::error::{ApiError, Result};
use crate::mutation::ResourceMutation;
use crate::query::ResourceQuery;
use crate::resource::{ResourceDescriptor, ResourceKind};

pub struct Console {
    api: Arc<dyn ResourceApi>,
    cache: RequestCache,
    preferences: Preferences,
}

impl Console {
    pub fn new(api: Arc<dyn ResourceApi>, cache: RequestCache) -> Self {
        Self {
            api,
            cache,
            preferences: Preferences::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Wire a console from configuration: REST transport plus a cache that
    /// persists to disk unless `no_cache` is set.
    pub fn from_config(config: &Config, no_cache: bool) -> Result<Self> {
        let api = RestClient::new(config.require_api_url()?, config.api_token.clone())?;

        let mut cache = RequestCache::new().with_default_stale_time(config.preferences.stale_time());
        if no_cache {
            debug!("Persistent cache disabled");
        } else {
            let storage = match &config.cache_dir {
                Some(dir) => CacheStorage::open_at(dir),
                None => CacheStorage::open(),
            };
            match storage {
                Ok(storage) => cache = cache.with_storage(storage),
                Err(e) => warn!("Persistent cache unavailable, using memory only: {}", e),
            }
        }

        Ok(Self::new(Arc::new(api), cache).with_preferences(config.preferences.clone()))
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Descriptor for `kind`, with the configured staleness window applied to
    /// kinds that don't define their own
    pub fn descriptor(&self, kind: ResourceKind) -> ResourceDescriptor {
        let descriptor = kind.descriptor();
        if descriptor.stale_time == StaleTime::DEFAULT {
            let stale_time = self.preferences.stale_time();
            descriptor.with_stale_time(stale_time)
        } else {
            descriptor
        }
    }

    /// Read access: a query controller for `kind`
    pub fn list<T: DeserializeOwned>(&self, kind: ResourceKind) -> ResourceQuery<T> {
        let query = ResourceQuery::new(self.descriptor(kind), Arc::clone(&self.api), self.cache.clone())
            .with_debounce(self.preferences.debounce());

        if let Err(e) = query.set_page_size(self.preferences.page_size) {
            warn!("Ignoring configured page size: {}", e);
        }
        query
    }

    /// Write access: a mutation coordinator for `kind`
    pub fn mutation<T: DeserializeOwned>(&self, kind: ResourceKind) -> ResourceMutation<T> {
        ResourceMutation::new(self.descriptor(kind), Arc::clone(&self.api), self.cache.clone())
    }

    /// The typed-confirmation gate for destructive actions on `kind`
    pub fn confirmation(&self, kind: ResourceKind) -> ConfirmationGate {
        ConfirmationGate::new(self.descriptor(kind)).with_policy(self.preferences.failure_policy())
    }

    /// Read a single entity through the cache
    pub async fn get<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Result<T> {
        let descriptor = self.descriptor(kind);
        self.cache
            .set_stale_time(descriptor.type_name(), descriptor.stale_time);
        let key = CacheKey::item(descriptor.type_name(), id);

        let api = Arc::clone(&self.api);
        let item_id = id.to_string();
        let value = self
            .cache
            .read(&key, move || {
                async move { api.get_by_id(&descriptor, &item_id).await }.boxed()
            })
            .await?;

        serde_json::from_value(value).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to decode {} {}: {}", kind, id, e)).into()
        })
    }

    /// Forget every cached result, in memory and on disk
    pub fn logout(&self) {
        debug!("Clearing request cache");
        self.cache.clear();
    }
}
