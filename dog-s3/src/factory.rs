use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::{CredentialsIdentity, DetectionMode, DetectionProperties, S3AccessConfig};
use crate::strategy::{
    FastMimeTypeDetectionStrategy, MimeTypeDetectionStrategy, PreciseMimeTypeDetectionStrategy,
};
use crate::{S3ObjectClient, S3Result};

/// Strategy for a detection mode
pub fn strategy_from_mode(mode: DetectionMode) -> Arc<dyn MimeTypeDetectionStrategy> {
    debug!("Selecting MIME detection strategy: mode={}", mode);
    match mode {
        DetectionMode::Fast => Arc::new(FastMimeTypeDetectionStrategy::new()),
        DetectionMode::Precise => Arc::new(PreciseMimeTypeDetectionStrategy::new()),
    }
}

pub fn strategy_from_properties(properties: &DetectionProperties) -> Arc<dyn MimeTypeDetectionStrategy> {
    strategy_from_mode(properties.mime_detection)
}

/// Strategy for a mode name such as `"fast"` or `"PRECISE"`.
///
/// Fails with [`crate::S3Error::UnsupportedDetectionMode`] for any other name.
pub fn strategy_from_config(mode: &str) -> S3Result<Arc<dyn MimeTypeDetectionStrategy>> {
    Ok(strategy_from_mode(mode.parse()?))
}

/// Shared clients, at most one per key.
///
/// Creation runs under the key's shard lock, so concurrent first access for a
/// key constructs exactly one client and every caller gets that instance.
/// Clones share the same map; create one at startup and pass it around.
pub struct ClientCache<K, C> {
    clients: Arc<DashMap<K, Arc<C>>>,
}

impl<K: Eq + Hash, C> ClientCache<K, C> {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
        }
    }

    /// Cached client for `key`, created with `create` on first use
    pub fn get_or_create<F>(&self, key: K, create: F) -> Arc<C>
    where
        F: FnOnce() -> C,
    {
        let entry = self.clients.entry(key).or_insert_with(|| Arc::new(create()));
        Arc::clone(entry.value())
    }

    pub fn get(&self, key: &K) -> Option<Arc<C>> {
        self.clients.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, key: &K) -> Option<Arc<C>> {
        self.clients.remove(key).map(|(_, client)| client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl<K: Eq + Hash, C> Default for ClientCache<K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C> Clone for ClientCache<K, C> {
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
        }
    }
}

/// What makes two access configurations share a client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub credentials: CredentialsIdentity,
}

impl ClientKey {
    pub fn from_config(config: &S3AccessConfig) -> Self {
        Self {
            region: config.region().to_string(),
            endpoint_url: config.endpoint_url().map(String::from),
            credentials: config.credentials_identity().clone(),
        }
    }
}

/// Hands out one [`S3ObjectClient`] per distinct access configuration
#[derive(Clone, Default)]
pub struct S3ClientFactory {
    cache: ClientCache<ClientKey, S3ObjectClient>,
}

impl S3ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing cache, e.g. one shared with other factories
    pub fn with_cache(cache: ClientCache<ClientKey, S3ObjectClient>) -> Self {
        Self { cache }
    }

    pub fn get_client(&self, config: &S3AccessConfig) -> Arc<S3ObjectClient> {
        self.cache.get_or_create(ClientKey::from_config(config), || {
            debug!(
                "Creating S3 client: region={}, endpoint={:?}",
                config.region(),
                config.endpoint_url()
            );
            S3ObjectClient::from_config(config)
        })
    }

    pub fn cached_clients(&self) -> usize {
        self.cache.len()
    }
}
