use std::sync::Arc;

use crate::config::{Config, IndexBackend};
use crate::ingest::Indexer;
use crate::llm::completion::{ChatAnswerer, GenerativeAnswerer};
use crate::llm::embeddings::{EmbeddingProvider, HttpEmbedder};
use crate::router::SimilarityRouter;
use crate::search::postgres::PgVectorIndex;
use crate::search::vector::SnapshotIndex;
use crate::search::VectorIndex;
use crate::store::json::JsonFaqStore;
use crate::store::postgres::PgFaqStore;
use crate::store::FaqStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub router: Arc<SimilarityRouter>,
    pub indexer: Arc<Indexer>,
    pub index: Arc<dyn VectorIndex>,
    /// Set for the snapshot backend, which has to be loaded before use
    pub snapshot: Option<Arc<SnapshotIndex>>,
    pub embedding_model: String,
}

impl AppState {
    /// Wire up the configured store, index and providers. The index is not
    /// loaded yet; call [`prepare_index`](Self::prepare_index) before
    /// answering questions.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.llm.timeout())
            .build()?;

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone()));
        let answerer: Arc<dyn GenerativeAnswerer> =
            Arc::new(ChatAnswerer::new(http_client, config.llm.clone()));
        let model = config.llm.embedding_model.as_str();

        match config.index_backend {
            IndexBackend::Snapshot => {
                std::fs::create_dir_all(&config.data_dir)?;
                let store = Arc::new(JsonFaqStore::open_or_create(&config.store_path())?);
                let snapshot = Arc::new(SnapshotIndex::new(&config.snapshot_path(), model));
                Ok(Self::from_parts(
                    config,
                    store,
                    snapshot.clone(),
                    Some(snapshot),
                    embedder,
                    answerer,
                ))
            }
            IndexBackend::Postgres => {
                let url = config
                    .database_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("postgres backend needs DATABASE_URL"))?;
                let store = PgFaqStore::connect(&url).await?;
                let index = Arc::new(PgVectorIndex::new(store.clone(), model));
                Ok(Self::from_parts(
                    config,
                    Arc::new(store),
                    index,
                    None,
                    embedder,
                    answerer,
                ))
            }
        }
    }

    /// Assemble state from already-built components. `snapshot`, when
    /// given, must be the same object as `index`.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn FaqStore>,
        index: Arc<dyn VectorIndex>,
        snapshot: Option<Arc<SnapshotIndex>>,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn GenerativeAnswerer>,
    ) -> Self {
        let embedding_model = embedder.model_name().to_string();
        let router = SimilarityRouter::new(
            embedder.clone(),
            index.clone(),
            answerer,
            config.similarity_threshold,
        );
        let indexer = Indexer::new(store, index.clone(), embedder);

        Self {
            config,
            router: Arc::new(router),
            indexer: Arc::new(indexer),
            index,
            snapshot,
            embedding_model,
        }
    }

    /// Load the snapshot index, rebuilding it when missing or stale. The
    /// database index is always ready.
    pub async fn prepare_index(&self) -> crate::error::Result<()> {
        if let Some(snapshot) = &self.snapshot {
            self.indexer.open_snapshot(snapshot).await?;
        }
        Ok(())
    }
}
