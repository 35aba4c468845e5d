/// TMDB (The Movie Database) provider
///
/// Primary provider. A title lookup is two requests:
/// 1. Search: /search/movie → ranked candidates, first one taken
/// 2. Details: /movie/{id} → genres, synopsis, rating, poster
///
/// Ratings are TMDB's native 0-10 `vote_average`.
use reqwest::Client as HttpClient;
use tracing::instrument;

use crate::{
    error::AppResult,
    models::{MovieId, MovieRecord, TmdbMovieDetails, TmdbSearchResponse},
    services::providers::{ensure_success, DetailLookup, MovieProvider},
};

const PROVIDER_NAME: &str = "TMDB";
const LANGUAGE: &str = "en-US";

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
}

impl TmdbProvider {
    pub fn new(http_client: HttpClient, api_key: Option<String>, api_url: String) -> Self {
        Self {
            http_client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// TMDB ID and title of the top search result
    async fn search_first(
        &self,
        api_key: &str,
        query: &str,
    ) -> AppResult<Option<(u64, Option<String>)>> {
        let url = format!("{}/search/movie", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", api_key),
                ("query", query),
                ("language", LANGUAGE),
                ("page", "1"),
                ("include_adult", "false"),
            ])
            .send()
            .await?;

        let search: TmdbSearchResponse =
            ensure_success(PROVIDER_NAME, response).await?.json().await?;

        tracing::debug!(
            query = %query,
            results = search.results.len(),
            provider = PROVIDER_NAME,
            "Title search completed"
        );

        Ok(search.results.into_iter().next().map(|r| (r.id, r.title)))
    }

    async fn fetch_details(&self, api_key: &str, movie_id: u64) -> AppResult<TmdbMovieDetails> {
        let url = format!("{}/movie/{}", self.api_url, movie_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", api_key), ("language", LANGUAGE)])
            .send()
            .await?;

        let details: TmdbMovieDetails =
            ensure_success(PROVIDER_NAME, response).await?.json().await?;
        Ok(details)
    }
}

#[async_trait::async_trait]
impl MovieProvider for TmdbProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn search(&self, title: &str) -> AppResult<Option<MovieRecord>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        let Some((movie_id, search_title)) = self.search_first(api_key, title).await? else {
            return Ok(None);
        };

        let details = self.fetch_details(api_key, movie_id).await?;
        let record = if details.is_cross_reference_only() {
            MovieRecord {
                title: search_title.unwrap_or_else(|| title.to_string()),
                ..MovieRecord::from(details)
            }
        } else {
            MovieRecord::from(details)
        };

        tracing::info!(
            query = %title,
            tmdb_id = movie_id,
            matched = %record.title,
            provider = PROVIDER_NAME,
            "Movie resolved"
        );

        Ok(Some(record))
    }

    #[instrument(skip(self, id), fields(provider = PROVIDER_NAME, id = %id))]
    async fn details(&self, id: &MovieId) -> AppResult<Option<DetailLookup>> {
        let (Some(api_key), MovieId::Tmdb(movie_id)) = (self.api_key.as_deref(), id) else {
            return Ok(None);
        };

        let details = self.fetch_details(api_key, *movie_id).await?;
        if !details.is_cross_reference_only() {
            return Ok(Some(DetailLookup::Record(details.into())));
        }

        Ok(details
            .imdb_id
            .filter(|imdb| !imdb.is_empty())
            .map(|imdb| DetailLookup::CrossReference(MovieId::Imdb(imdb))))
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
