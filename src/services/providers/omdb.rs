/// OMDB (Open Movie Database) provider
///
/// Secondary provider. A title lookup is a single `t=` request that already
/// returns full details; IMDB IDs are looked up with `i=`. OMDB answers misses
/// with HTTP 200 and `"Response": "False"`.
///
/// Ratings are IMDB's `imdbRating` parsed as a float, with "N/A" read as 0.
use reqwest::Client as HttpClient;
use tracing::instrument;

use crate::{
    error::AppResult,
    models::{MovieId, MovieRecord, OmdbMovie},
    services::providers::{ensure_success, DetailLookup, MovieProvider},
};

const PROVIDER_NAME: &str = "OMDB";

#[derive(Clone)]
pub struct OmdbProvider {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
}

impl OmdbProvider {
    pub fn new(http_client: HttpClient, api_key: Option<String>, api_url: String) -> Self {
        Self {
            http_client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> AppResult<Option<OmdbMovie>> {
        let url = format!("{}/", self.api_url);

        let response = self.http_client.get(&url).query(params).send().await?;
        let movie: OmdbMovie = ensure_success(PROVIDER_NAME, response).await?.json().await?;

        if !movie.is_hit() {
            tracing::debug!(
                error = movie.error.as_deref().unwrap_or("unknown"),
                provider = PROVIDER_NAME,
                "OMDB reported no match"
            );
            return Ok(None);
        }
        Ok(Some(movie))
    }
}

#[async_trait::async_trait]
impl MovieProvider for OmdbProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn search(&self, title: &str) -> AppResult<Option<MovieRecord>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        let movie = self
            .fetch(&[
                ("apikey", api_key),
                ("t", title),
                ("type", "movie"),
                ("plot", "full"),
            ])
            .await?;

        Ok(movie.map(|m| {
            let record = m.into_record(title);
            tracing::info!(
                query = %title,
                matched = %record.title,
                provider = PROVIDER_NAME,
                "Movie resolved"
            );
            record
        }))
    }

    #[instrument(skip(self, id), fields(provider = PROVIDER_NAME, id = %id))]
    async fn details(&self, id: &MovieId) -> AppResult<Option<DetailLookup>> {
        let (Some(api_key), MovieId::Imdb(imdb_id)) = (self.api_key.as_deref(), id) else {
            return Ok(None);
        };

        let movie = self
            .fetch(&[("apikey", api_key), ("i", imdb_id.as_str()), ("plot", "full")])
            .await?;

        Ok(movie.map(|m| DetailLookup::Record(m.into_record(imdb_id))))
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OmdbProvider {
        OmdbProvider::new(HttpClient::new(), Some("test_key".to_string()), server.uri())
    }

    #[tokio::test]
    async fn test_search_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("apikey", "test_key"))
            .and(query_param("t", "Inception"))
            .and(query_param("type", "movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Title": "Inception",
                "Year": "2010",
                "Genre": "Action, Adventure, Sci-Fi",
                "Plot": "A thief who steals corporate secrets.",
                "Poster": "https://example.test/inception.jpg",
                "imdbRating": "8.8",
                "imdbID": "tt1375666",
                "Response": "True"
            })))
            .mount(&server)
            .await;

        let record = provider(&server).search("Inception").await.unwrap().unwrap();
        assert_eq!(record.source, Provenance::Omdb);
        assert_eq!(record.genres, "Action Adventure Sci-Fi");
        assert_eq!(record.vote_average, 8.8);
    }

    #[tokio::test]
    async fn test_search_miss_reported_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "Response": "False", "Error": "Movie not found!" })),
            )
            .mount(&server)
            .await;

        assert_eq!(provider(&server).search("Nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_unauthorized_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "Response": "False", "Error": "Invalid API key!" })),
            )
            .mount(&server)
            .await;

        assert!(provider(&server).search("Inception").await.is_err());
    }

    #[tokio::test]
    async fn test_details_by_imdb_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("i", "tt0000042"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Title": "Obscure",
                "Year": "1931",
                "imdbRating": "N/A",
                "imdbID": "tt0000042",
                "Response": "True"
            })))
            .mount(&server)
            .await;

        let lookup = provider(&server)
            .details(&MovieId::Imdb("tt0000042".to_string()))
            .await
            .unwrap();

        match lookup {
            Some(DetailLookup::Record(record)) => {
                assert_eq!(record.title, "Obscure");
                assert_eq!(record.vote_average, 0.0);
            }
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_details_ignores_tmdb_ids() {
        let server = MockServer::start().await;
        assert_eq!(provider(&server).details(&MovieId::Tmdb(7)).await.unwrap(), None);
    }
}
