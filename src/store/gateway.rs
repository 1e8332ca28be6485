//! Lazily-connected handle to the configured vector store.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{
    ArtifactRecord, CollectionInfo, CollectionSchema, Hit, LocalStore, OutputField,
    PatternQuery, SearchRequest, VectorStore,
};
use crate::vector::{Metric, VectorDimension};

const MEMORY_SCHEME: &str = "memory://";
const FILE_SCHEME: &str = "file://";

/// Opens the store named by `config.uri`.
///
/// `memory://` gives a process-local store; a directory path or `file://`
/// URI gives a persisted store under `<uri>/<db_name>`. Any other scheme is
/// a remote store this build has no client for.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn VectorStore>> {
    let uri = config.uri.trim();
    if config.token.is_some() {
        debug!("Store token configured; the local backend does not use it");
    }

    if uri == MEMORY_SCHEME {
        return Ok(Arc::new(LocalStore::in_memory()));
    }

    let root = if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
        PathBuf::from(path)
    } else if let Some((scheme, _)) = uri.split_once("://") {
        return Err(StoreError::Unavailable {
            uri: uri.to_string(),
            reason: format!(
                "no client for '{scheme}://' stores; use a directory path, file:// or memory://"
            ),
        });
    } else if uri.is_empty() {
        return Err(StoreError::Unavailable {
            uri: uri.to_string(),
            reason: "store.uri is empty".to_string(),
        });
    } else {
        PathBuf::from(uri)
    };

    Ok(Arc::new(LocalStore::open(root.join(&config.db_name))?))
}

/// Produces a store client on demand.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> StoreResult<Arc<dyn VectorStore>>;
}

impl<F> StoreConnector for F
where
    F: Fn() -> StoreResult<Arc<dyn VectorStore>> + Send + Sync,
{
    fn connect(&self) -> StoreResult<Arc<dyn VectorStore>> {
        self()
    }
}

/// Owns the store client for its lifetime.
///
/// The first call that needs the store connects and checks liveness by
/// listing collections. A failed attempt leaves the gateway unconnected and
/// the next call tries again.
pub struct StoreGateway {
    uri: String,
    connector: Box<dyn StoreConnector>,
    client: Mutex<Option<Arc<dyn VectorStore>>>,
}

impl StoreGateway {
    /// Gateway for the configured store.
    pub fn new(config: &StoreConfig) -> Self {
        let config = config.clone();
        Self::with_connector(config.uri.clone(), move || open_store(&config))
    }

    pub fn with_connector(uri: impl Into<String>, connector: impl StoreConnector + 'static) -> Self {
        Self {
            uri: uri.into(),
            connector: Box::new(connector),
            client: Mutex::new(None),
        }
    }

    /// Gateway over an already-open store.
    pub fn with_store(store: Arc<dyn VectorStore>) -> Self {
        let uri = store.backend_name().to_string();
        let connected = store.clone();
        let gateway = Self::with_connector(uri, move || -> StoreResult<Arc<dyn VectorStore>> {
            Ok(store.clone())
        });
        *gateway.client.lock() = Some(connected);
        gateway
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_connected(&self) -> bool {
        self.client.lock().is_some()
    }

    /// Returns the connected client, connecting first if needed.
    pub fn ensure_client(&self) -> StoreResult<Arc<dyn VectorStore>> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let unavailable = |reason: String| StoreError::Unavailable {
            uri: self.uri.clone(),
            reason,
        };

        let client = self.connector.connect().map_err(|e| match e {
            StoreError::Unavailable { .. } => e,
            other => unavailable(other.to_string()),
        });
        let client = match client {
            Ok(client) => client,
            Err(e) => {
                warn!(uri = %self.uri, "Vector store connection failed: {e}");
                return Err(e);
            }
        };

        if let Err(e) = client.list_collections() {
            warn!(uri = %self.uri, "Vector store liveness check failed: {e}");
            return Err(unavailable(e.to_string()));
        }

        info!(uri = %self.uri, backend = client.backend_name(), "Connected to vector store");
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.ensure_client()?.list_collections()
    }

    pub fn has_collection(&self, name: &str) -> StoreResult<bool> {
        self.ensure_client()?.has_collection(name)
    }

    /// Creates a cosine-style auto-id collection with dynamic fields.
    pub fn create_collection(
        &self,
        name: &str,
        dimension: VectorDimension,
        metric: Metric,
    ) -> StoreResult<()> {
        self.create_collection_with_schema(
            CollectionSchema::new(name, dimension).with_metric(metric),
        )
    }

    pub fn create_collection_with_schema(&self, schema: CollectionSchema) -> StoreResult<()> {
        self.ensure_client()?.create_collection(schema)
    }

    pub fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.ensure_client()?.drop_collection(name)
    }

    pub fn describe(&self, name: &str) -> StoreResult<CollectionInfo> {
        self.ensure_client()?.describe_collection(name)
    }

    pub fn insert(&self, name: &str, records: Vec<ArtifactRecord>) -> StoreResult<Vec<u64>> {
        self.ensure_client()?.insert(name, records)
    }

    pub fn flush(&self, name: &str) -> StoreResult<()> {
        self.ensure_client()?.flush(name)
    }

    pub fn row_count(&self, name: &str) -> StoreResult<u64> {
        self.ensure_client()?.row_count(name)
    }

    pub fn search(&self, request: &SearchRequest) -> StoreResult<Vec<Hit>> {
        self.ensure_client()?.search(request)
    }

    /// Case-sensitive substring match on `field`, in insertion order.
    pub fn pattern_query(
        &self,
        collection: &str,
        field: OutputField,
        substring: &str,
        limit: usize,
        output_fields: &[OutputField],
    ) -> StoreResult<Vec<Hit>> {
        let query = PatternQuery::new(collection, field, substring)
            .limit(limit)
            .output_fields(output_fields);
        self.ensure_client()?.query(&query)
    }
}
