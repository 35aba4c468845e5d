use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    catalog::{Catalog, CatalogEntry},
    error::{AppError, AppResult},
    models::RecommendationMethod,
};

/// Catalog rows in ranking order, tagged with how they were ranked
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidates {
    pub rows: Vec<usize>,
    pub method: RecommendationMethod,
}

/// Ranks movies that share a cluster with a given catalog row
pub struct ClusterRanker {
    catalog: Arc<Catalog>,
}

impl ClusterRanker {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Up to `limit` same-cluster rows by rating, never including `row` itself
    ///
    /// Without a cluster assignment this degrades to the popularity ranking.
    pub fn rank_cluster(&self, row: usize, limit: usize) -> AppResult<RankedCandidates> {
        let entry = self.catalog.get(row).ok_or_else(|| {
            AppError::Internal(format!(
                "Catalog row {} out of range ({} rows)",
                row,
                self.catalog.len()
            ))
        })?;

        let Some(cluster) = entry.cluster else {
            tracing::warn!(row, "Cluster assignment unavailable, falling back to popular movies");
            return Ok(RankedCandidates {
                rows: popularity_ranking(&self.catalog, limit, Some(row)),
                method: RecommendationMethod::Popular,
            });
        };

        let mut members: Vec<usize> = self
            .catalog
            .entries()
            .iter()
            .enumerate()
            .filter(|(candidate, e)| *candidate != row && e.cluster == Some(cluster))
            .map(|(candidate, _)| candidate)
            .collect();

        // stable sort keeps catalog order among equal or missing ratings
        let entries = self.catalog.entries();
        members.sort_by(|&a, &b| compare_rating(&entries[a], &entries[b]));
        members.truncate(limit);

        tracing::debug!(row, cluster, candidates = members.len(), "Cluster ranking completed");

        Ok(RankedCandidates {
            rows: members,
            method: RecommendationMethod::ClusterBased,
        })
    }
}

/// Higher ratings first, missing ratings last
fn compare_rating(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    compare_desc(a.vote_average, b.vote_average)
}

fn compare_desc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rows ordered by rating, then vote count, then catalog order
pub fn popularity_ranking(catalog: &Catalog, limit: usize, exclude: Option<usize>) -> Vec<usize> {
    let entries = catalog.entries();
    let mut rows: Vec<usize> = (0..entries.len()).filter(|&r| Some(r) != exclude).collect();

    rows.sort_by(|&a, &b| {
        compare_rating(&entries[a], &entries[b])
            .then_with(|| compare_desc(entries[a].vote_count, entries[b].vote_count))
    });
    rows.truncate(limit);
    rows
}
