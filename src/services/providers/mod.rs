/// External movie data providers
///
/// Each provider maps its own payloads onto `MovieRecord`. The `ProviderChain`
/// asks them in priority order (TMDB, then OMDB) and owns one lookup cache per
/// provider. Provider failures never reach the caller: they are logged and
/// treated as misses.
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as HttpClient, Response};

use crate::{
    cache::{CacheKey, LookupCache},
    config::Config,
    error::{AppError, AppResult},
    models::{MovieId, MovieRecord},
};

pub mod omdb;
pub mod tmdb;

pub use omdb::OmdbProvider;
pub use tmdb::TmdbProvider;

/// Result of a detail lookup by ID
#[derive(Debug, Clone, PartialEq)]
pub enum DetailLookup {
    /// Full record from this provider
    Record(MovieRecord),
    /// The provider only knows the movie under another provider's ID
    CrossReference(MovieId),
}

/// Trait for external movie data providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieProvider: Send + Sync {
    /// Search by free-text title and return the top candidate, normalized
    ///
    /// `Ok(None)` means the provider answered but has no match, or has no API key.
    async fn search(&self, title: &str) -> AppResult<Option<MovieRecord>>;

    /// Fetch a movie by ID; IDs the provider doesn't understand yield `Ok(None)`
    async fn details(&self, id: &MovieId) -> AppResult<Option<DetailLookup>>;

    /// Provider name for logging and messages
    fn name(&self) -> &'static str;

    /// Whether an API key was supplied
    fn is_configured(&self) -> bool;
}

/// Turns a non-success HTTP status into an `ExternalApi` error
pub(crate) async fn ensure_success(provider: &str, response: Response) -> AppResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ExternalApi(format!(
        "{} API returned status {}: {}",
        provider, status, body
    )))
}

struct ProviderSlot {
    provider: Arc<dyn MovieProvider>,
    searches: LookupCache<Option<MovieRecord>>,
    details: LookupCache<Option<DetailLookup>>,
}

/// Cache sizing shared by every provider in a chain
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl: Option<chrono::Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl: None,
        }
    }
}

impl CacheSettings {
    fn build<V: Clone>(&self) -> LookupCache<V> {
        let cache = LookupCache::new(self.capacity);
        match self.ttl {
            Some(ttl) => cache.with_ttl(ttl),
            None => cache,
        }
    }
}

/// Configured TTL as a duration; values chrono can't represent disable expiry
fn cache_ttl(secs: Option<u64>) -> Option<chrono::Duration> {
    let secs = secs?;
    let ttl = i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds);
    if ttl.is_none() {
        tracing::warn!(ttl_secs = secs, "Lookup cache TTL out of range, entries will not expire");
    }
    ttl
}

/// Providers in priority order, each behind its own lookup cache
pub struct ProviderChain {
    slots: Vec<ProviderSlot>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn MovieProvider>>, settings: CacheSettings) -> Self {
        let slots = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                provider,
                searches: settings.build(),
                details: settings.build(),
            })
            .collect();
        Self { slots }
    }

    /// Builds the TMDB → OMDB chain sharing one HTTP client with the configured timeout
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()?;

        let providers: Vec<Arc<dyn MovieProvider>> = vec![
            Arc::new(TmdbProvider::new(
                http_client.clone(),
                config.tmdb_api_key.clone(),
                config.tmdb_api_url.clone(),
            )),
            Arc::new(OmdbProvider::new(
                http_client,
                config.omdb_api_key.clone(),
                config.omdb_api_url.clone(),
            )),
        ];

        for provider in &providers {
            if !provider.is_configured() {
                tracing::warn!(
                    provider = provider.name(),
                    "API key not configured, provider will always miss"
                );
            }
        }

        let settings = CacheSettings {
            capacity: config.lookup_cache_capacity,
            ttl: cache_ttl(config.lookup_cache_ttl_secs),
        };

        Ok(Self::new(providers, settings))
    }

    /// Names of providers that have an API key
    pub fn configured_providers(&self) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|slot| slot.provider.is_configured())
            .map(|slot| slot.provider.name())
            .collect()
    }

    /// First provider hit for `title`, in priority order
    pub async fn lookup_any(&self, title: &str) -> Option<MovieRecord> {
        let key = CacheKey::TitleSearch(title.to_string());

        for slot in &self.slots {
            let name = slot.provider.name();
            let outcome = slot
                .searches
                .get_or_compute(&key, || slot.provider.search(title))
                .await;

            match outcome {
                Ok(Some(record)) => {
                    tracing::info!(query = %title, provider = name, "External lookup hit");
                    return Some(record);
                }
                Ok(None) => {
                    tracing::debug!(query = %title, provider = name, "External lookup miss");
                }
                Err(e) => {
                    tracing::warn!(
                        query = %title,
                        provider = name,
                        error = %e,
                        "External lookup failed, trying next provider"
                    );
                }
            }
        }

        None
    }

    /// Detail lookup by ID, following at most one cross-reference per provider
    pub async fn details(&self, id: &MovieId) -> Option<MovieRecord> {
        let mut current = id.clone();

        for slot in &self.slots {
            let name = slot.provider.name();
            let key = CacheKey::Details(current.clone());
            let outcome = slot
                .details
                .get_or_compute(&key, || slot.provider.details(&current))
                .await;

            match outcome {
                Ok(Some(DetailLookup::Record(record))) => return Some(record),
                Ok(Some(DetailLookup::CrossReference(next))) => {
                    tracing::info!(
                        id = %current,
                        cross_reference = %next,
                        provider = name,
                        "Following provider cross-reference"
                    );
                    current = next;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id = %current, provider = name, error = %e, "Detail lookup failed");
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;
    use mockall::predicate;

    fn record(title: &str, source: Provenance) -> MovieRecord {
        MovieRecord {
            id: MovieId::Tmdb(1),
            title: title.to_string(),
            overview: String::new(),
            genres: "Drama".to_string(),
            release_date: String::new(),
            vote_average: 7.0,
            poster_path: String::new(),
            source,
        }
    }

    fn mock(name: &'static str) -> MockMovieProvider {
        let mut provider = MockMovieProvider::new();
        provider.expect_name().return_const(name);
        provider.expect_is_configured().return_const(true);
        provider
    }

    fn chain(providers: Vec<MockMovieProvider>) -> ProviderChain {
        let providers = providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn MovieProvider>)
            .collect();
        ProviderChain::new(providers, CacheSettings::default())
    }

    #[tokio::test]
    async fn test_primary_hit_skips_secondary() {
        let mut primary = mock("TMDB");
        primary
            .expect_search()
            .times(1)
            .returning(|_| Ok(Some(record("Inception", Provenance::Tmdb))));
        let mut secondary = mock("OMDB");
        secondary.expect_search().never();

        let found = chain(vec![primary, secondary]).lookup_any("Inception").await;
        assert_eq!(found.unwrap().source, Provenance::Tmdb);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_through_to_secondary() {
        let mut primary = mock("TMDB");
        primary
            .expect_search()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("timeout".to_string())));
        let mut secondary = mock("OMDB");
        secondary
            .expect_search()
            .times(1)
            .returning(|_| Ok(Some(record("Inception", Provenance::Omdb))));

        let found = chain(vec![primary, secondary]).lookup_any("Inception").await;
        assert_eq!(found.unwrap().source, Provenance::Omdb);
    }

    #[tokio::test]
    async fn test_all_providers_missing() {
        let mut primary = mock("TMDB");
        primary.expect_search().returning(|_| Ok(None));
        let mut secondary = mock("OMDB");
        secondary
            .expect_search()
            .returning(|_| Err(AppError::ExternalApi("503".to_string())));

        assert!(chain(vec![primary, secondary]).lookup_any("Nothing").await.is_none());
    }

    #[tokio::test]
    async fn test_repeated_lookup_served_from_cache() {
        let mut primary = mock("TMDB");
        primary.expect_search().times(1).returning(|_| Ok(None));
        let mut secondary = mock("OMDB");
        secondary
            .expect_search()
            .times(1)
            .returning(|_| Ok(Some(record("Heat", Provenance::Omdb))));

        let chain = chain(vec![primary, secondary]);
        assert!(chain.lookup_any("Heat").await.is_some());
        assert!(chain.lookup_any("  heat ").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_lookup_is_retried() {
        let mut primary = mock("TMDB");
        primary
            .expect_search()
            .times(2)
            .returning(|_| Err(AppError::ExternalApi("timeout".to_string())));

        let chain = chain(vec![primary]);
        assert!(chain.lookup_any("Heat").await.is_none());
        assert!(chain.lookup_any("Heat").await.is_none());
    }

    #[tokio::test]
    async fn test_details_follows_cross_reference() {
        let mut primary = mock("TMDB");
        primary
            .expect_details()
            .with(predicate::eq(MovieId::Tmdb(42)))
            .times(1)
            .returning(|_| {
                Ok(Some(DetailLookup::CrossReference(MovieId::Imdb(
                    "tt0000042".to_string(),
                ))))
            });
        let mut secondary = mock("OMDB");
        secondary
            .expect_details()
            .with(predicate::eq(MovieId::Imdb("tt0000042".to_string())))
            .times(1)
            .returning(|_| Ok(Some(DetailLookup::Record(record("Obscure", Provenance::Omdb)))));

        let found = chain(vec![primary, secondary]).details(&MovieId::Tmdb(42)).await;
        assert_eq!(found.unwrap().title, "Obscure");
    }

    #[tokio::test]
    async fn test_details_without_cross_reference_misses() {
        let mut primary = mock("TMDB");
        primary.expect_details().returning(|_| Ok(None));
        let mut secondary = mock("OMDB");
        secondary
            .expect_details()
            .with(predicate::eq(MovieId::Tmdb(7)))
            .returning(|_| Ok(None));

        assert!(chain(vec![primary, secondary]).details(&MovieId::Tmdb(7)).await.is_none());
    }

    #[test]
    fn test_cache_ttl_out_of_range_disables_expiry() {
        assert_eq!(cache_ttl(None), None);
        assert_eq!(cache_ttl(Some(60)), Some(chrono::Duration::seconds(60)));
        assert_eq!(cache_ttl(Some(u64::MAX)), None);
        assert_eq!(cache_ttl(Some(i64::MAX as u64)), None);
    }

    #[tokio::test]
    async fn test_provider_timeout_is_a_miss() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "results": [] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = Config {
            tmdb_api_key: Some("test_key".to_string()),
            tmdb_api_url: server.uri(),
            api_timeout_secs: 1,
            ..Config::default()
        };
        let chain = ProviderChain::from_config(&config).unwrap();

        let started = std::time::Instant::now();
        assert!(chain.lookup_any("Inception").await.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_configured_providers() {
        let primary = mock("TMDB");
        let mut secondary = MockMovieProvider::new();
        secondary.expect_name().return_const("OMDB");
        secondary.expect_is_configured().return_const(false);

        assert_eq!(chain(vec![primary, secondary]).configured_providers(), vec!["TMDB"]);
    }
}
