//! Offline cache agent.
//!
//! Sits between an application and the network, serving GET requests from
//! the current cache generation with a stale-while-revalidate policy and
//! managing the generation lifecycle across deployments:
//!
//! - `install` eagerly stores the offline manifest in the current generation
//! - `activate` purges every other generation and starts intercepting
//! - `handle` answers one request, spawning the background revalidation

pub mod error;
pub mod network;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crawlgate_core::cache::RequestKey;
use crawlgate_core::{AgentConfig, CacheDb, Error, Generation, RequestDescriptor, StoredResponse};

use crate::url::{canonicalize, join_path, same_origin};

pub use error::AgentError;
pub use network::{HttpNetwork, Network, NetworkResponse};

/// Lifecycle of one agent version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Parsed,
    Installed,
    Activated,
    /// Install failed; this agent version will never activate.
    Redundant,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// Not intercepted: non-GET, or the agent is not active yet.
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "HIT",
            ResponseSource::Network | ResponseSource::Passthrough => "MISS",
        }
    }
}

/// Whether a network response may be written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Cacheable,
    NonCacheable(&'static str),
}

impl CachePolicy {
    /// Only same-origin 200 responses are stored.
    pub fn for_response(scope: &Url, response: &NetworkResponse) -> Self {
        if !same_origin(scope, &response.url) {
            CachePolicy::NonCacheable("cross-origin")
        } else if response.status != 200 {
            CachePolicy::NonCacheable("status is not 200")
        } else {
            CachePolicy::Cacheable
        }
    }
}

type FetchTask = JoinHandle<Result<NetworkResponse, Error>>;

/// Result of handling one request.
#[derive(Debug)]
pub struct Interception {
    pub response: StoredResponse,
    pub source: ResponseSource,
    revalidation: Option<FetchTask>,
}

impl Interception {
    fn new(response: StoredResponse, source: ResponseSource) -> Self {
        Self { response, source, revalidation: None }
    }

    /// Wait for the background revalidation, if any, then return the response.
    ///
    /// Revalidation failures have already been logged and are ignored here.
    pub async fn settle(self) -> StoredResponse {
        if let Some(task) = self.revalidation
            && let Err(e) = task.await
        {
            warn!(error = %e, "revalidation task did not complete");
        }
        self.response
    }
}

struct Lifecycle {
    state: AgentState,
    installed: Option<Generation>,
    active: Option<Generation>,
}

/// Versioned offline cache in front of a [`Network`].
pub struct CacheAgent<N: Network> {
    db: CacheDb,
    generation: String,
    manifest: Vec<String>,
    scope: Url,
    network: Arc<N>,
    lifecycle: RwLock<Lifecycle>,
}

impl<N: Network> CacheAgent<N> {
    pub fn new(
        db: CacheDb, generation: impl Into<String>, manifest: Vec<String>, scope: Url, network: N,
    ) -> Self {
        Self {
            db,
            generation: generation.into(),
            manifest,
            scope,
            network: Arc::new(network),
            lifecycle: RwLock::new(Lifecycle { state: AgentState::Parsed, installed: None, active: None }),
        }
    }

    /// Build an agent scoped to `config.upstream`.
    pub fn from_config(db: CacheDb, config: &AgentConfig, network: N) -> Result<Self, Error> {
        let scope = canonicalize(&config.upstream).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(db, config.generation.clone(), config.manifest.clone(), scope, network))
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub async fn state(&self) -> AgentState {
        self.lifecycle.read().await.state
    }

    /// Cache key for `path` inside this agent's scope.
    pub fn key_for(&self, path: &str) -> RequestKey {
        RequestKey::get(join_path(&self.scope, path))
    }

    /// Populate the current generation with every manifest resource.
    ///
    /// All-or-nothing: if any resource fails to fetch or is not cacheable,
    /// nothing is stored and the agent becomes [`AgentState::Redundant`].
    pub async fn install(&self) -> Result<Generation, AgentError> {
        let existed = self.db.has_generation(&self.generation).await?;
        let generation = self.db.open_generation(&self.generation).await?;

        match self.fetch_manifest().await {
            Ok(entries) => {
                let count = entries.len();
                generation.put_all(entries).await?;

                let mut lifecycle = self.lifecycle.write().await;
                lifecycle.state = AgentState::Installed;
                lifecycle.installed = Some(generation.clone());
                info!(generation = %self.generation, resources = count, "cache agent installed");
                Ok(generation)
            }
            Err(e) => {
                if !existed && let Err(cleanup) = self.db.delete_generation(&self.generation).await {
                    warn!(generation = %self.generation, error = %cleanup, "failed to remove empty generation");
                }
                self.lifecycle.write().await.state = AgentState::Redundant;
                warn!(generation = %self.generation, error = %e, "cache agent install failed");
                Err(e)
            }
        }
    }

    async fn fetch_manifest(&self) -> Result<Vec<(RequestKey, StoredResponse)>, AgentError> {
        let mut entries = Vec::with_capacity(self.manifest.len());
        for path in &self.manifest {
            let request = RequestDescriptor::get(path.as_str());
            let response = self
                .network
                .fetch(&request, Bytes::new())
                .await
                .map_err(|e| AgentError::Install { path: path.clone(), reason: e.to_string() })?;

            if let CachePolicy::NonCacheable(reason) = CachePolicy::for_response(&self.scope, &response) {
                let rejected = Error::NotCacheable { url: response.url.to_string(), status: response.status };
                return Err(AgentError::Install { path: path.clone(), reason: format!("{rejected} ({reason})") });
            }

            entries.push((self.key_for(path), response.to_stored()));
        }
        Ok(entries)
    }

    /// Purge every other generation and start intercepting requests.
    ///
    /// Returns the names of the purged generations.
    pub async fn activate(&self) -> Result<Vec<String>, AgentError> {
        let generation = {
            let lifecycle = self.lifecycle.read().await;
            match (lifecycle.state, &lifecycle.installed) {
                (AgentState::Installed | AgentState::Activated, Some(generation)) => generation.clone(),
                _ => return Err(AgentError::NotInstalled),
            }
        };

        let mut purged = Vec::new();
        for name in self.db.generations().await? {
            if name == self.generation {
                continue;
            }
            if self.db.delete_generation(&name).await? {
                purged.push(name);
            }
        }

        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.state = AgentState::Activated;
        lifecycle.active = Some(generation);
        info!(generation = %self.generation, purged = ?purged, "cache agent activated");
        Ok(purged)
    }

    /// Install, then activate without waiting.
    pub async fn start(&self) -> Result<Vec<String>, AgentError> {
        self.install().await?;
        self.activate().await
    }

    /// Handle one outbound request.
    pub async fn handle(&self, request: RequestDescriptor, body: Bytes) -> Result<Interception, AgentError> {
        let active = if request.is_get() { self.lifecycle.read().await.active.clone() } else { None };

        match active {
            Some(generation) => {
                stale_while_revalidate(&generation, Arc::clone(&self.network), &self.scope, request).await
            }
            None => self.passthrough(request, body).await,
        }
    }

    async fn passthrough(&self, request: RequestDescriptor, body: Bytes) -> Result<Interception, AgentError> {
        let url = join_path(&self.scope, &request.path).to_string();
        let response = self
            .network
            .fetch(&request, body)
            .await
            .map_err(|source| AgentError::Network { url, source })?;
        Ok(Interception::new(response.to_stored(), ResponseSource::Passthrough))
    }
}

/// Serve `request` from `generation`, refreshing the entry in the background.
///
/// The cache lookup and the network fetch start together. A cached entry is
/// returned at once and the fetch keeps running detached; without one the
/// caller waits for the network.
async fn stale_while_revalidate<N: Network>(
    generation: &Generation, network: Arc<N>, scope: &Url, request: RequestDescriptor,
) -> Result<Interception, AgentError> {
    let key = RequestKey::get(join_path(scope, &request.path));
    let url = key.url().to_string();

    let fetch = spawn_fetch(generation.clone(), network, scope.clone(), key.clone(), request);

    let cached = match generation.match_request(&key).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!(url = %url, error = %e, "cache lookup failed");
            None
        }
    };

    if let Some(response) = cached {
        debug!(url = %url, "cache hit");
        return Ok(Interception { response, source: ResponseSource::Cache, revalidation: Some(fetch) });
    }

    debug!(url = %url, "cache miss");
    match fetch.await {
        Ok(Ok(response)) => Ok(Interception::new(response.to_stored(), ResponseSource::Network)),
        Ok(Err(source)) => Err(AgentError::Network { url, source }),
        Err(e) => Err(AgentError::Task(e.to_string())),
    }
}

/// Fetch from the network and store the result if it is cacheable.
fn spawn_fetch<N: Network>(
    generation: Generation, network: Arc<N>, scope: Url, key: RequestKey, request: RequestDescriptor,
) -> FetchTask {
    tokio::spawn(async move {
        let url = key.url().to_string();
        let response = match network.fetch(&request, Bytes::new()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "network fetch failed");
                return Err(e);
            }
        };

        match CachePolicy::for_response(&scope, &response) {
            CachePolicy::Cacheable => {
                if let Err(e) = generation.put(&key, &response.to_stored()).await {
                    warn!(url = %url, error = %e, "failed to store response, skipping cache");
                }
            }
            CachePolicy::NonCacheable(reason) => debug!(url = %url, status = response.status, reason, "not caching"),
        }

        Ok(response)
    })
}
