use std::sync::Arc;

use matzip_agent::{AnthropicClient, IntentResolver, SearchAgent};
use matzip_core::config::{AppConfig, ConfigError, LoadOptions};
use matzip_core::{ResolutionPolicy, SearchError};
use matzip_search::{EsClient, RestaurantIndex};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub agent: Arc<SearchAgent<AnthropicClient, EsClient>>,
    /// Separate backend handle for the health probe; the agent owns its own.
    pub probe_client: EsClient,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("search backend client failed: {0}")]
    SearchClient(#[source] SearchError),
    #[error("model client failed: {0}")]
    ModelClient(#[source] SearchError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let es_client = EsClient::new(&config.search).map_err(BootstrapError::SearchClient)?;
    let probe_client = es_client.clone();
    let llm_client = AnthropicClient::new(&config.llm).map_err(BootstrapError::ModelClient)?;

    let policy = ResolutionPolicy::new(config.resolver.clone());
    let agent = Arc::new(SearchAgent::new(
        IntentResolver::new(llm_client, policy),
        RestaurantIndex::new(es_client),
    ));

    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        search_backend = %config.search.base_url,
        model = %config.llm.model,
        "search and model clients initialized"
    );

    Ok(Application { config, agent, probe_client })
}
