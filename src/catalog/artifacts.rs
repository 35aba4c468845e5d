/// Catalog artifact loading
///
/// The offline training step exports four JSON artifacts:
/// 1. `tfidf_vectorizer.json` → vocabulary and IDF weights
/// 2. `svd_model.json` → projection from TF-IDF space to the embedding space
/// 3. `kmeans_model.json` → cluster centers and per-row labels (optional)
/// 4. `movies_preprocessed.json` → the movie table
///
/// Loading recomputes every row's embedding from its text features and attaches
/// the cluster label, so the catalog never needs the models again afterwards.
use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Catalog, CatalogEntry};
use crate::error::{AppError, AppResult};

pub const VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
pub const SVD_FILE: &str = "svd_model.json";
pub const KMEANS_FILE: &str = "kmeans_model.json";
pub const CATALOG_FILE: &str = "movies_preprocessed.json";

/// TF-IDF text vectorizer
#[derive(Debug, Clone, Deserialize)]
pub struct TfidfVectorizer {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f32>,
}

impl TfidfVectorizer {
    fn validate(&self) -> AppResult<()> {
        if let Some((term, &column)) = self
            .vocabulary
            .iter()
            .find(|(_, &column)| column >= self.idf.len())
        {
            return Err(AppError::Artifact(format!(
                "Vocabulary term '{}' maps to column {} but only {} IDF weights exist",
                term,
                column,
                self.idf.len()
            )));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Sparse L2-normalized TF-IDF vector as (column, weight) pairs sorted by column
    pub fn transform(&self, text: &str) -> Vec<(usize, f32)> {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in tokenize(text) {
            if let Some(&column) = self.vocabulary.get(&token) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let mut weights: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(column, tf)| (column, tf * self.idf.get(column).copied().unwrap_or(0.0)))
            .collect();
        weights.sort_by_key(|(column, _)| *column);

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in weights.iter_mut() {
                *w /= norm;
            }
        }
        weights
    }
}

/// Lowercased word tokens of two or more characters
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
}

/// Row-major matrix from nested JSON arrays; every row must have the same width
fn matrix(rows: Vec<Vec<f32>>, name: &str) -> AppResult<Array2<f32>> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if rows.is_empty() || width == 0 {
        return Err(AppError::Artifact(format!("{} is empty", name)));
    }
    if let Some(row) = rows.iter().position(|r| r.len() != width) {
        return Err(AppError::Artifact(format!(
            "{} row {} has {} values, expected {}",
            name,
            row,
            rows[row].len(),
            width
        )));
    }

    let height = rows.len();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((height, width), flat)
        .map_err(|e| AppError::Artifact(format!("{} has an invalid shape: {}", name, e)))
}

/// `svd_model.json` as stored on disk
#[derive(Deserialize)]
pub struct SvdArtifact {
    components: Vec<Vec<f32>>,
}

/// Truncated SVD projection
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SvdArtifact")]
pub struct SvdModel {
    /// `n_components × n_features`
    pub components: Array2<f32>,
}

impl TryFrom<SvdArtifact> for SvdModel {
    type Error = AppError;

    fn try_from(artifact: SvdArtifact) -> AppResult<Self> {
        Self::from_rows(artifact.components)
    }
}

impl SvdModel {
    pub fn from_rows(components: Vec<Vec<f32>>) -> AppResult<Self> {
        Ok(Self {
            components: matrix(components, "SVD components")?,
        })
    }

    fn validate(&self, n_features: usize) -> AppResult<()> {
        if self.components.ncols() != n_features {
            return Err(AppError::Artifact(format!(
                "SVD components have {} weights, vectorizer has {} features",
                self.components.ncols(),
                n_features
            )));
        }
        Ok(())
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Embeds a sparse TF-IDF vector; columns past the trained width are ignored
    pub fn project(&self, sparse: &[(usize, f32)]) -> Vec<f32> {
        let mut dense = Array1::<f32>::zeros(self.components.ncols());
        for &(column, weight) in sparse {
            if let Some(slot) = dense.get_mut(column) {
                *slot = weight;
            }
        }
        self.components.dot(&dense).to_vec()
    }
}

/// `kmeans_model.json` as stored on disk
#[derive(Deserialize)]
pub struct KMeansArtifact {
    cluster_centers: Vec<Vec<f32>>,
    #[serde(default)]
    labels: Option<Vec<u32>>,
}

/// K-means cluster model
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "KMeansArtifact")]
pub struct KMeansModel {
    /// `k × n_components`
    pub cluster_centers: Array2<f32>,
    pub labels: Option<Vec<u32>>,
}

impl TryFrom<KMeansArtifact> for KMeansModel {
    type Error = AppError;

    fn try_from(artifact: KMeansArtifact) -> AppResult<Self> {
        Self::from_rows(artifact.cluster_centers, artifact.labels)
    }
}

impl KMeansModel {
    pub fn from_rows(cluster_centers: Vec<Vec<f32>>, labels: Option<Vec<u32>>) -> AppResult<Self> {
        Ok(Self {
            cluster_centers: matrix(cluster_centers, "K-means cluster centers")?,
            labels,
        })
    }

    fn validate(&self, n_components: usize, rows: usize) -> AppResult<()> {
        if self.cluster_centers.ncols() != n_components {
            return Err(AppError::Artifact(format!(
                "K-means centers must have {} dimensions",
                n_components
            )));
        }
        if let Some(labels) = &self.labels {
            if labels.len() != rows {
                return Err(AppError::Artifact(format!(
                    "K-means model has {} labels for {} catalog rows",
                    labels.len(),
                    rows
                )));
            }
            let k = self.cluster_centers.nrows() as u32;
            if let Some(label) = labels.iter().find(|&&l| l >= k) {
                return Err(AppError::Artifact(format!(
                    "Cluster label {} is outside the {} trained clusters",
                    label, k
                )));
            }
        }
        Ok(())
    }

    /// Nearest center by squared Euclidean distance, lowest index on ties
    ///
    /// `None` when the embedding width doesn't match the centers.
    pub fn predict(&self, embedding: &[f32]) -> Option<u32> {
        if embedding.len() != self.cluster_centers.ncols() {
            return None;
        }
        let point = ArrayView1::from(embedding);

        self.cluster_centers
            .axis_iter(Axis(0))
            .map(|center| (&center - &point).mapv(|d| d * d).sum())
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (index, distance)| match best {
                Some((_, nearest)) if nearest <= distance => best,
                _ => Some((index, distance)),
            })
            .map(|(index, _)| index as u32)
    }
}

/// A row of the preprocessed movie table
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRow {
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub combined_features: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<f64>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl CatalogRow {
    fn combined_features(&self) -> String {
        match &self.combined_features {
            Some(features) => features.clone(),
            None => [&self.overview, &self.genres, &self.keywords]
                .iter()
                .map(|part| part.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Builds catalog entries from already-parsed artifacts
pub fn build_catalog(
    rows: Vec<CatalogRow>,
    vectorizer: &TfidfVectorizer,
    svd: &SvdModel,
    kmeans: Option<&KMeansModel>,
) -> AppResult<Catalog> {
    vectorizer.validate()?;
    svd.validate(vectorizer.n_features())?;
    if let Some(model) = kmeans {
        model.validate(svd.n_components(), rows.len())?;
    }

    let entries = rows
        .into_iter()
        .enumerate()
        .map(|(row, movie)| {
            let embedding = svd.project(&vectorizer.transform(&movie.combined_features()));
            let cluster = kmeans.and_then(|model| match &model.labels {
                Some(labels) => labels.get(row).copied(),
                None => model.predict(&embedding),
            });

            CatalogEntry {
                vote_count: movie.vote_count.map(|c| c.max(0.0) as u64),
                title: movie.title,
                overview: movie.overview.unwrap_or_default(),
                genres: movie.genres.unwrap_or_default(),
                keywords: movie.keywords.unwrap_or_default(),
                release_date: movie.release_date.unwrap_or_default(),
                vote_average: movie.vote_average,
                poster_path: movie.poster_path.unwrap_or_default(),
                embedding,
                cluster,
            }
        })
        .collect();

    Catalog::from_entries(entries)
}

async fn read_artifact<T: DeserializeOwned>(dir: &Path, file: &str) -> AppResult<T> {
    let path = dir.join(file);
    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::Artifact(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Artifact(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Loads every artifact from `dir` and builds the catalog
///
/// A missing k-means artifact is tolerated: the catalog loads without cluster
/// labels and ranking falls back to popularity.
pub async fn load_catalog(dir: &Path) -> AppResult<Catalog> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Err(AppError::Artifact(format!(
            "Artifacts path not found: {}",
            dir.display()
        )));
    }

    let vectorizer: TfidfVectorizer = read_artifact(dir, VECTORIZER_FILE).await?;
    let svd: SvdModel = read_artifact(dir, SVD_FILE).await?;
    let rows: Vec<CatalogRow> = read_artifact(dir, CATALOG_FILE).await?;

    let kmeans: Option<KMeansModel> =
        if tokio::fs::try_exists(dir.join(KMEANS_FILE)).await.unwrap_or(false) {
            Some(read_artifact(dir, KMEANS_FILE).await?)
        } else {
            tracing::warn!(
                path = %dir.display(),
                "K-means artifact missing, recommendations will use popularity ranking"
            );
            None
        };

    let catalog = build_catalog(rows, &vectorizer, &svd, kmeans.as_ref())?;

    tracing::info!(
        movies = catalog.len(),
        features = svd.n_components(),
        clustered = catalog.has_clusters(),
        "Catalog artifacts loaded"
    );

    Ok(catalog)
}
