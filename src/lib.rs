pub mod config;
pub mod identity;
pub mod rest;
pub mod storage;
pub mod tasks;

use std::sync::Arc;
use std::time::Instant;

use config::ServerConfig;
use identity::TokenVerifier;
use storage::Storage;
use tasks::TaskService;

/// Shared state handed to every request handler as `Arc<AppContext>`.
/// The daemon holds no other mutable state between requests — everything
/// lives in storage.
pub struct AppContext {
    pub config: ServerConfig,
    pub storage: Storage,
    pub tasks: TaskService,
    pub verifier: TokenVerifier,
    pub started_at: Instant,
}

impl AppContext {
    pub async fn bootstrap(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let storage = Storage::new_with_slow_query(&config.data_dir, config.slow_query_ms).await?;
        let verifier = TokenVerifier::from_data_dir(&config.data_dir)?;
        let tasks = TaskService::new(storage.clone());
        Ok(Arc::new(Self {
            config,
            storage,
            tasks,
            verifier,
            started_at: Instant::now(),
        }))
    }
}
