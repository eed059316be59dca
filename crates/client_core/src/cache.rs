//! Versioned query cache with explicit invalidation.
//!
//! Each cache scope (a single entity, or the family of list pages for a
//! kind) carries a version counter. Reads are keyed by `(scope, entry,
//! version)`: while the version is stable, identical reads return the cached
//! snapshot without touching the network; bumping the version makes the next
//! read fetch exactly once. Bumps are published on a broadcast channel so
//! interested callers can observe invalidations instead of threading
//! timestamps through their state.

use std::{collections::HashMap, future::Future, sync::Arc};

use moka::future::Cache;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Protocol,
    Run,
    Sample,
    User,
    Group,
    Policy,
    Search,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Protocol => "protocol",
            EntityKind::Run => "run",
            EntityKind::Sample => "sample",
            EntityKind::User => "user",
            EntityKind::Group => "group",
            EntityKind::Policy => "policy",
            EntityKind::Search => "search",
        }
    }
}

/// Invalidation scope: one entity (`kind` + its id) or a list family
/// (`kind` + `"list"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub id: String,
}

impl CacheKey {
    pub fn entity(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Scope covering every cached list page of `kind`.
    pub fn lists(kind: EntityKind) -> Self {
        Self {
            kind,
            id: "list".to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

/// Published on every version bump.
#[derive(Debug, Clone)]
pub struct Invalidation {
    pub key: CacheKey,
    pub version: u64,
}

pub struct QueryCache {
    versions: Mutex<HashMap<CacheKey, u64>>,
    values: Cache<(CacheKey, String, u64), Arc<Value>>,
    invalidations: broadcast::Sender<Invalidation>,
}

impl QueryCache {
    pub fn new(capacity: u64) -> Self {
        let (invalidations, _) = broadcast::channel(256);
        Self {
            versions: Mutex::new(HashMap::new()),
            values: Cache::new(capacity),
            invalidations,
        }
    }

    /// Current version of a scope. Scopes start at 0.
    pub async fn version(&self, key: &CacheKey) -> u64 {
        let versions = self.versions.lock().await;
        versions.get(key).copied().unwrap_or(0)
    }

    /// Return the cached snapshot for `(key, entry)` at the scope's current
    /// version, running `fetch` exactly once when there is none. Not-found
    /// results are cached as absent under the same discipline.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        entry: &str,
        fetch: F,
    ) -> Result<Option<Arc<Value>>, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, ClientError>>,
    {
        let version = self.version(key).await;
        let value_key = (key.clone(), entry.to_string(), version);
        if let Some(cached) = self.values.get(&value_key).await {
            return Ok(present(cached));
        }

        debug!(scope = %key, entry, version, "cache miss, fetching");
        let fetched = fetch().await?;
        let stored = Arc::new(fetched.unwrap_or(Value::Null));
        self.values.insert(value_key, Arc::clone(&stored)).await;
        Ok(present(stored))
    }

    /// Bump a scope's version and publish the invalidation. Cached snapshots
    /// of older versions age out of the value store on their own.
    pub async fn invalidate(&self, key: &CacheKey) -> u64 {
        let version = {
            let mut versions = self.versions.lock().await;
            let slot = versions.entry(key.clone()).or_insert(0);
            *slot += 1;
            *slot
        };
        debug!(scope = %key, version, "cache invalidated");
        let _ = self.invalidations.send(Invalidation {
            key: key.clone(),
            version,
        });
        version
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }
}

fn present(value: Arc<Value>) -> Option<Arc<Value>> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}
