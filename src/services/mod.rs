pub mod providers;
pub mod ranker;
pub mod recommendations;

use std::path::Path;
use std::sync::Arc;

use crate::{
    catalog::{load_catalog, Catalog},
    config::Config,
    services::providers::{CacheSettings, ProviderChain},
};

pub use recommendations::Recommender;

/// Backend services built once at startup
///
/// Startup never fails on a bad artifact directory: the catalog stays `None`
/// and the search endpoint answers 503 until the process is restarted with
/// valid artifacts.
pub struct ServiceHandles {
    pub catalog: Option<Arc<Catalog>>,
    pub providers: Arc<ProviderChain>,
    pub providers_ready: bool,
    pub init_error: Option<String>,
}

impl ServiceHandles {
    pub fn new(catalog: Option<Arc<Catalog>>, providers: Arc<ProviderChain>) -> Self {
        Self {
            catalog,
            providers,
            providers_ready: true,
            init_error: None,
        }
    }

    pub async fn initialize(config: &Config) -> Self {
        let mut init_error = None;

        let catalog = match load_catalog(Path::new(&config.artifacts_path)).await {
            Ok(catalog) => {
                tracing::info!(
                    movies = catalog.len(),
                    dimensions = catalog.dimensions(),
                    clustered = catalog.has_clusters(),
                    "Movie catalog loaded"
                );
                Some(Arc::new(catalog))
            }
            Err(e) => {
                tracing::error!(path = %config.artifacts_path, error = %e, "Failed to load movie catalog");
                init_error = Some(e.to_string());
                None
            }
        };

        let (providers, providers_ready) = match ProviderChain::from_config(config) {
            Ok(chain) => {
                tracing::info!(configured = ?chain.configured_providers(), "Movie providers ready");
                (chain, true)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build provider HTTP client, external lookups disabled");
                init_error.get_or_insert_with(|| e.to_string());
                (ProviderChain::new(Vec::new(), CacheSettings::default()), false)
            }
        };

        Self {
            catalog,
            providers: Arc::new(providers),
            providers_ready,
            init_error,
        }
    }

    pub fn recommender_ready(&self) -> bool {
        self.catalog.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_with_missing_artifacts_degrades() {
        let config = Config {
            artifacts_path: "/definitely/not/a/real/artifacts/dir".to_string(),
            ..Config::default()
        };

        let services = ServiceHandles::initialize(&config).await;
        assert!(!services.recommender_ready());
        assert!(services.providers_ready);
        assert!(services
            .init_error
            .as_deref()
            .is_some_and(|e| e.contains("Artifacts path not found")));
        assert!(services.providers.configured_providers().is_empty());
    }
}
