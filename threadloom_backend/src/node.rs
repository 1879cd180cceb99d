use crate::api;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::ThreadloomConfig;
use crate::database::Database;
use crate::threading::CommentService;
use anyhow::Result;

/// Bootstraps the backend once and hands out cloned handles for whichever
/// entrypoint (REST server, one-shot CLI command) needs them.
pub struct ThreadloomNode {
    config: ThreadloomConfig,
    bootstrap: BootstrapResources,
}

impl ThreadloomNode {
    pub fn start(config: ThreadloomConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;
        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            db_path = %config.paths.db_path.display(),
            "threadloom node initialized"
        );
        Ok(Self { config, bootstrap })
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        api::serve_http(self.config.clone(), self.database()).await
    }

    pub fn comments(&self) -> CommentService {
        CommentService::from_config(self.database(), &self.config)
    }

    pub fn config(&self) -> &ThreadloomConfig {
        &self.config
    }

    /// Returns a clone of the database handle.
    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }
}
