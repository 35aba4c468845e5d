use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier for a movie, either a local catalog row or an external provider ID
///
/// Serialized as `{"kind": "tmdb", "value": 27205}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MovieId {
    /// Row index in the local catalog
    Dataset(usize),
    /// TMDB numeric ID
    Tmdb(u64),
    /// IMDB ID (e.g., "tt1375666")
    Imdb(String),
}

impl Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovieId::Dataset(row) => write!(f, "dataset:{}", row),
            MovieId::Tmdb(id) => write!(f, "tmdb:{}", id),
            MovieId::Imdb(id) => write!(f, "imdb:{}", id),
        }
    }
}

/// Data source that produced a movie record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "dataset")]
    Dataset,
    #[serde(rename = "TMDB")]
    Tmdb,
    #[serde(rename = "OMDB")]
    Omdb,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Dataset => "dataset",
            Provenance::Tmdb => "TMDB",
            Provenance::Omdb => "OMDB",
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized movie metadata, whichever source it came from
///
/// `genres` is a single space-joined string so every source can be filtered the
/// same way. `vote_average` keeps the source's native scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieRecord {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub genres: String,
    pub release_date: String,
    pub vote_average: f64,
    pub poster_path: String,
    pub source: Provenance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationMethod {
    ClusterBased,
    Popular,
}

/// A recommended movie together with how it was selected
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(flatten)]
    pub movie: MovieRecord,
    /// Ranking is rating-based, so this stays at zero
    pub similarity_score: f64,
    #[serde(rename = "recommendation_method")]
    pub method: RecommendationMethod,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    FoundLocal,
    FoundExternal,
    NotFound,
}

/// Outcome of resolving a title into recommendations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionResult {
    pub movie: Option<MovieRecord>,
    pub recommendations: Vec<Recommendation>,
    pub status: ResolutionStatus,
    pub message: String,
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Response from GET /search/movie
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResult {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

/// Response from GET /movie/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

impl TmdbMovieDetails {
    /// A payload without a title only carries the IMDB cross-reference
    pub fn is_cross_reference_only(&self) -> bool {
        self.title.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

impl From<TmdbMovieDetails> for MovieRecord {
    fn from(details: TmdbMovieDetails) -> Self {
        let genres = details
            .genres
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        MovieRecord {
            id: MovieId::Tmdb(details.id),
            title: details.title.unwrap_or_default(),
            overview: details.overview.unwrap_or_default(),
            genres,
            release_date: details.release_date.unwrap_or_default(),
            vote_average: details.vote_average.unwrap_or(0.0),
            poster_path: details.poster_path.unwrap_or_default(),
            source: Provenance::Tmdb,
        }
    }
}

// ============================================================================
// OMDB API Types
// ============================================================================

/// Response from OMDB title (`t=`) and ID (`i=`) lookups
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbMovie {
    pub response: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default, rename = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(default, rename = "imdbID")]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl OmdbMovie {
    pub fn is_hit(&self) -> bool {
        self.response == "True"
    }

    /// Builds a record, using `fallback_title` when OMDB omits the title
    pub fn into_record(self, fallback_title: &str) -> MovieRecord {
        let vote_average = parse_imdb_rating(self.imdb_rating.as_deref());
        MovieRecord {
            id: MovieId::Imdb(self.imdb_id.unwrap_or_default()),
            title: self
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_title.to_string()),
            overview: self.plot.unwrap_or_default(),
            genres: self.genre.unwrap_or_default().replace(", ", " "),
            release_date: self.year.unwrap_or_default(),
            vote_average,
            poster_path: self.poster.unwrap_or_default(),
            source: Provenance::Omdb,
        }
    }
}

/// OMDB reports ratings as strings, with "N/A" for unrated titles
pub fn parse_imdb_rating(rating: Option<&str>) -> f64 {
    match rating {
        Some("N/A") | None => 0.0,
        Some(value) => value.trim().parse().unwrap_or(0.0),
    }
}
