use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB API key; the TMDB provider always misses without it
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// OMDB API key; the OMDB provider always misses without it
    #[serde(default)]
    pub omdb_api_key: Option<String>,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// OMDB API base URL
    #[serde(default = "default_omdb_api_url")]
    pub omdb_api_url: String,

    /// Directory holding the vectorizer, SVD, k-means and catalog artifacts
    #[serde(default = "default_artifacts_path")]
    pub artifacts_path: String,

    /// Timeout applied to every external provider request
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Maximum entries per provider lookup cache
    #[serde(default = "default_lookup_cache_capacity")]
    pub lookup_cache_capacity: usize,

    /// Optional expiry for cached provider lookups
    #[serde(default)]
    pub lookup_cache_ttl_secs: Option<u64>,

    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_omdb_api_url() -> String {
    "http://www.omdbapi.com".to_string()
}

fn default_artifacts_path() -> String {
    "ml_model/artifacts".to_string()
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_lookup_cache_capacity() -> usize {
    100
}

fn default_cors_origins() -> String {
    "http://localhost:3000,https://localhost:3000,http://127.0.0.1:3000".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            omdb_api_key: None,
            tmdb_api_url: default_tmdb_api_url(),
            omdb_api_url: default_omdb_api_url(),
            artifacts_path: default_artifacts_path(),
            api_timeout_secs: default_api_timeout_secs(),
            lookup_cache_capacity: default_lookup_cache_capacity(),
            lookup_cache_ttl_secs: None,
            cors_origins: default_cors_origins(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Allowed CORS origins, blank entries skipped
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
