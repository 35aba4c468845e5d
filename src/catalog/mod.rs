/// Local movie catalog
///
/// Holds the preprocessed movie table together with each movie's embedding and
/// cluster label. Built once at startup and shared read-only across requests.
use crate::{
    error::{AppError, AppResult},
    models::{MovieId, MovieRecord, Provenance},
};

pub mod artifacts;

pub use artifacts::load_catalog;

/// One movie of the local catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub title: String,
    pub overview: String,
    pub genres: String,
    pub keywords: String,
    pub release_date: String,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub poster_path: String,
    pub embedding: Vec<f32>,
    pub cluster: Option<u32>,
}

/// Read-only catalog with title lookup
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    normalized_titles: Vec<String>,
    dimensions: usize,
    clustered: bool,
}

/// Lowercases and trims a title for comparison
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

impl Catalog {
    /// Builds a catalog, checking that every embedding has the same length and
    /// that cluster labels are either present on every row or on none
    pub fn from_entries(entries: Vec<CatalogEntry>) -> AppResult<Self> {
        let dimensions = entries.first().map_or(0, |e| e.embedding.len());

        if let Some((row, entry)) = entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.embedding.len() != dimensions)
        {
            return Err(AppError::Artifact(format!(
                "Row {} has embedding length {}, expected {}",
                row,
                entry.embedding.len(),
                dimensions
            )));
        }

        let labelled = entries.iter().filter(|e| e.cluster.is_some()).count();
        if labelled != 0 && labelled != entries.len() {
            return Err(AppError::Artifact(format!(
                "Only {} of {} rows carry a cluster label",
                labelled,
                entries.len()
            )));
        }

        let normalized_titles = entries.iter().map(|e| normalize_title(&e.title)).collect();

        Ok(Self {
            clustered: labelled > 0,
            entries,
            normalized_titles,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&CatalogEntry> {
        self.entries.get(row)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Embedding dimensionality shared by every row
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Whether a cluster assignment was loaded
    pub fn has_clusters(&self) -> bool {
        self.clustered
    }

    /// First row whose normalized title equals the normalized query
    pub fn find_exact(&self, title: &str) -> Option<usize> {
        let query = normalize_title(title);
        if query.is_empty() {
            return None;
        }
        self.normalized_titles.iter().position(|t| *t == query)
    }

    /// First row whose normalized title contains the normalized query
    pub fn find_partial(&self, title: &str) -> Option<usize> {
        let query = normalize_title(title);
        if query.is_empty() {
            return None;
        }
        self.normalized_titles
            .iter()
            .position(|t| t.contains(query.as_str()))
    }

    /// Exact match first, then substring match
    pub fn find(&self, title: &str) -> Option<usize> {
        self.find_exact(title).or_else(|| self.find_partial(title))
    }

    /// Movie record for a catalog row, tagged with dataset provenance
    pub fn record(&self, row: usize) -> Option<MovieRecord> {
        self.entries.get(row).map(|entry| MovieRecord {
            id: MovieId::Dataset(row),
            title: entry.title.clone(),
            overview: entry.overview.clone(),
            genres: entry.genres.clone(),
            release_date: entry.release_date.clone(),
            vote_average: entry.vote_average.unwrap_or(0.0),
            poster_path: entry.poster_path.clone(),
            source: Provenance::Dataset,
        })
    }
}
