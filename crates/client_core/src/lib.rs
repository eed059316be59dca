//! Query/mutation layer for the labflow REST API.
//!
//! [`ApiClient`] pairs a reqwest client with an injected credential provider
//! and a versioned [`QueryCache`]. Read accessors are cached per entity (or
//! per list family) and re-fetch only after an explicit invalidation.
//! Mutations perform the network operation and nothing else; cache
//! invalidation stays with the caller, which knows what its edit touched.

use std::{collections::BTreeMap, sync::Arc};

use model::{
    domain::{
        Group, Policy, ProtocolId, Protocols, RunId, Runs, SampleResult, Samples, SearchResults,
        ServerHealth, User, Users,
    },
    entity::{Protocol, Run},
};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub mod auth;
pub mod cache;
pub mod error;
pub mod session;

pub use auth::{AuthError, CredentialProvider, MissingCredentialProvider, StaticCredential};
pub use cache::{CacheKey, EntityKind, Invalidation, QueryCache};
pub use error::{ClientError, FetchError};
pub use session::ErrorLog;

const DEFAULT_CACHE_CAPACITY: u64 = 4_096;

/// String-keyed, string-valued list filters. Ordered so the flattened query
/// string, and therefore the cache entry it keys, is deterministic.
pub type FilterParams = BTreeMap<String, String>;

/// Flatten filter parameters to a `?name=value&...` query string, empty for
/// no filters.
pub fn params_to_query(params: &FilterParams) -> String {
    if params.is_empty() {
        return String::new();
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        serializer.append_pair(name, value);
    }
    format!("?{}", serializer.finish())
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    cache: QueryCache,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            cache: QueryCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn protocol(&self, id: ProtocolId) -> Result<Option<Protocol>, ClientError> {
        let key = CacheKey::entity(EntityKind::Protocol, id.0.to_string());
        self.cached_get_one(key, &format!("protocol/{}", id.0)).await
    }

    pub async fn run(&self, id: RunId) -> Result<Option<Run>, ClientError> {
        let key = CacheKey::entity(EntityKind::Run, id.0.to_string());
        self.cached_get_one(key, &format!("run/{}", id.0)).await
    }

    pub async fn user(&self, id: &str) -> Result<Option<User>, ClientError> {
        let key = CacheKey::entity(EntityKind::User, id);
        self.cached_get_one(key, &format!("user/{id}")).await
    }

    /// Profile of the signed-in user, addressed by the identity provider's
    /// subject claim.
    pub async fn current_user(&self, subject: &str) -> Result<Option<User>, ClientError> {
        self.user(subject).await
    }

    /// Result rows for one sample of a run. A sample can carry several rows,
    /// one per plate well it was sequenced in.
    pub async fn run_sample(
        &self,
        run_id: RunId,
        sample_id: &str,
    ) -> Result<Option<Vec<SampleResult>>, ClientError> {
        let key = CacheKey::entity(EntityKind::Sample, format!("run/{}/{sample_id}", run_id.0));
        self.cached_get_one(key, &format!("run/{}/sample/{sample_id}", run_id.0)).await
    }

    pub async fn protocols(&self, filters: &FilterParams) -> Result<Protocols, ClientError> {
        let query = params_to_query(filters);
        self.cached_list(CacheKey::lists(EntityKind::Protocol), &query, &format!("protocol{query}"))
            .await
    }

    pub async fn runs(&self, filters: &FilterParams) -> Result<Runs, ClientError> {
        let query = params_to_query(filters);
        self.cached_list(CacheKey::lists(EntityKind::Run), &query, &format!("run{query}")).await
    }

    pub async fn samples(&self, filters: &FilterParams) -> Result<Samples, ClientError> {
        let query = params_to_query(filters);
        self.cached_list(CacheKey::lists(EntityKind::Sample), &query, &format!("sample{query}"))
            .await
    }

    pub async fn users(&self, filters: &FilterParams) -> Result<Users, ClientError> {
        let query = params_to_query(filters);
        self.cached_list(CacheKey::lists(EntityKind::User), &query, &format!("user{query}")).await
    }

    pub async fn groups(&self, filters: &FilterParams) -> Result<Vec<Group>, ClientError> {
        let query = params_to_query(filters);
        self.cached_list(CacheKey::lists(EntityKind::Group), &query, &format!("group{query}"))
            .await
    }

    pub async fn run_samples(
        &self,
        run_id: RunId,
        filters: &FilterParams,
    ) -> Result<Samples, ClientError> {
        let query = params_to_query(filters);
        let scope = CacheKey::entity(EntityKind::Sample, format!("run/{}", run_id.0));
        self.cached_list(scope, &query, &format!("run/{}/sample{query}", run_id.0)).await
    }

    /// Access-control rules attached to a resource path (e.g. `protocol/7`).
    pub async fn policies(&self, path: &str) -> Result<Vec<Policy>, ClientError> {
        let scope = CacheKey::entity(EntityKind::Policy, path);
        self.cached_list(scope, "", &format!("{path}/permission")).await
    }

    pub async fn search(&self, filters: &FilterParams) -> Result<SearchResults, ClientError> {
        let query = params_to_query(filters);
        self.cached_list(CacheKey::lists(EntityKind::Search), &query, &format!("search{query}"))
            .await
    }

    /// Liveness probe. The only unauthenticated call, and never cached.
    pub async fn health(&self) -> Result<ServerHealth, ClientError> {
        let response = self.http.get(format!("{}/health", self.base_url)).send().await?;
        let response = error_for_response(response).await?;
        Ok(response.json().await?)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create (`POST protocol`) when the protocol has no id, otherwise
    /// replace (`PUT protocol/{id}`). Returns the server's copy, id assigned.
    pub async fn upsert_protocol(&self, protocol: &Protocol) -> Result<Protocol, ClientError> {
        let (method, path) = match protocol.id {
            Some(id) => (Method::PUT, format!("protocol/{}", id.0)),
            None => (Method::POST, "protocol".to_string()),
        };
        info!(%method, path, "saving protocol");
        self.api_send_json(method, &path, protocol).await
    }

    pub async fn upsert_run(&self, run: &Run) -> Result<Run, ClientError> {
        let (method, path) = match run.id {
            Some(id) => (Method::PUT, format!("run/{}", id.0)),
            None => (Method::POST, "run".to_string()),
        };
        info!(%method, path, "saving run");
        self.api_send_json(method, &path, run).await
    }

    pub async fn upsert_user(&self, user: &User) -> Result<User, ClientError> {
        let (method, path) = match &user.id {
            Some(id) => (Method::PUT, format!("user/{id}")),
            None => (Method::POST, "user".to_string()),
        };
        info!(%method, path, "saving user");
        self.api_send_json(method, &path, user).await
    }

    /// Instantiate and submit a run from a protocol snapshot.
    pub async fn create_run(&self, protocol: &Protocol) -> Result<Run, ClientError> {
        let run = Run::from_protocol(protocol);
        self.upsert_run(&run).await
    }

    pub async fn delete_protocol(&self, id: ProtocolId) -> Result<(), ClientError> {
        info!(protocol_id = id.0, "deleting protocol");
        self.api_delete(&format!("protocol/{}", id.0)).await
    }

    pub async fn delete_run(&self, id: RunId) -> Result<(), ClientError> {
        info!(run_id = id.0, "deleting run");
        self.api_delete(&format!("run/{}", id.0)).await
    }

    // ------------------------------------------------------------------
    // Cache control
    // ------------------------------------------------------------------

    /// Bump a cache scope after a confirmed mutation; the next read of that
    /// scope re-fetches.
    pub async fn invalidate(&self, key: &CacheKey) -> u64 {
        self.cache.invalidate(key).await
    }

    pub fn subscribe_invalidations(&self) -> tokio::sync::broadcast::Receiver<Invalidation> {
        self.cache.subscribe()
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn authorized(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let token = self.credentials.bearer_token().await?;
        Ok(self
            .http
            .request(method, format!("{}/{path}", self.base_url))
            .bearer_auth(token))
    }

    /// Authenticated GET returning `None` for a missing entity and the raw
    /// JSON payload otherwise.
    async fn api_get_one(&self, path: &str) -> Result<Option<Value>, ClientError> {
        let request = self.authorized(Method::GET, path).await?;
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path, "not found");
            return Ok(None);
        }
        let response = error_for_response(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn api_send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.authorized(method, path).await?.json(body);
        let response = error_for_response(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn api_delete(&self, path: &str) -> Result<(), ClientError> {
        let request = self.authorized(Method::DELETE, path).await?;
        error_for_response(request.send().await?).await?;
        Ok(())
    }

    async fn cached_get_one<T: DeserializeOwned>(
        &self,
        key: CacheKey,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        let value = self.cache.get_or_fetch(&key, "", || self.api_get_one(path)).await?;
        value
            .map(|value| serde_json::from_value((*value).clone()))
            .transpose()
            .map_err(ClientError::from)
    }

    /// List reads share their scope's version and fall back to the payload's
    /// default (an empty page) when the server has nothing at the path.
    async fn cached_list<T: DeserializeOwned + Default>(
        &self,
        scope: CacheKey,
        entry: &str,
        path: &str,
    ) -> Result<T, ClientError> {
        let value = self.cache.get_or_fetch(&scope, entry, || self.api_get_one(path)).await?;
        match value {
            Some(value) => Ok(serde_json::from_value((*value).clone())?),
            None => Ok(T::default()),
        }
    }
}

async fn error_for_response(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::new(url, status, body).into())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
