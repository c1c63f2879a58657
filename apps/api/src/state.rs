use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::CompletionClient;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Clients are built once in `main` and live for the whole process.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub llm: Arc<dyn CompletionClient>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        llm: Arc<dyn CompletionClient>,
        config: Config,
    ) -> Self {
        Self { store, llm, config }
    }
}
