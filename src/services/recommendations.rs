use std::sync::Arc;

use crate::{
    catalog::Catalog,
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationMethod, ResolutionResult, ResolutionStatus},
    services::{
        providers::ProviderChain,
        ranker::{popularity_ranking, ClusterRanker, RankedCandidates},
        ServiceHandles,
    },
};

pub const DEFAULT_RECOMMENDATIONS: usize = 10;
pub const MIN_RECOMMENDATIONS: i64 = 1;
pub const MAX_RECOMMENDATIONS: i64 = 50;

/// Out-of-range counts fall back to the default rather than being rejected
pub fn clamp_count(requested: i64) -> usize {
    if (MIN_RECOMMENDATIONS..=MAX_RECOMMENDATIONS).contains(&requested) {
        requested as usize
    } else {
        DEFAULT_RECOMMENDATIONS
    }
}

/// Keeps candidates whose genres mention any preferred genre
///
/// Blank preferences are ignored. If nothing matches, the unfiltered list is
/// returned so a preference can never empty the recommendations.
pub fn apply_genre_preferences(
    candidates: Vec<Recommendation>,
    preferred_genres: &[String],
) -> Vec<Recommendation> {
    let wanted: Vec<String> = preferred_genres
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();

    if wanted.is_empty() {
        return candidates;
    }

    let matches = |rec: &Recommendation| {
        let genres = rec.movie.genres.to_lowercase();
        wanted.iter().any(|g| genres.contains(g.as_str()))
    };

    if !candidates.iter().any(|rec| matches(rec)) {
        tracing::debug!(
            genres = ?wanted,
            candidates = candidates.len(),
            "No candidate matches preferred genres, keeping unfiltered list"
        );
        return candidates;
    }

    candidates.into_iter().filter(|rec| matches(rec)).collect()
}

struct LocalIndex {
    catalog: Arc<Catalog>,
    ranker: ClusterRanker,
}

/// Resolves a title into a searched movie and a ranked recommendation list
///
/// Branches, in order:
/// 1. Local: the title matches the catalog → same-cluster movies
/// 2. External: a provider knows the title → popular catalog movies
/// 3. Not found → popular catalog movies
///
/// Genre preferences are applied last, then the list is cut to the requested count.
pub struct Recommender {
    local: Option<LocalIndex>,
    providers: Arc<ProviderChain>,
}

impl Recommender {
    pub fn new(services: &ServiceHandles) -> Self {
        let local = services.catalog.clone().map(|catalog| LocalIndex {
            ranker: ClusterRanker::new(catalog.clone()),
            catalog,
        });

        Self {
            local,
            providers: services.providers.clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.local.is_some()
    }

    pub async fn resolve(
        &self,
        title: &str,
        count: i64,
        preferred_genres: &[String],
    ) -> AppResult<ResolutionResult> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Movie name cannot be empty".to_string()));
        }

        let local = self.local.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("Recommendation service unavailable".to_string())
        })?;
        let catalog = local.catalog.as_ref();
        let count = clamp_count(count);

        let (movie, candidates, status, message) = if let Some(row) = catalog.find(title) {
            tracing::info!(query = %title, row, "Movie found in dataset");
            let ranked = Self::rank_local(local, row, count * 2);
            (
                catalog.record(row),
                ranked,
                ResolutionStatus::FoundLocal,
                "Movie found in dataset".to_string(),
            )
        } else if let Some(record) = self.providers.lookup_any(title).await {
            let message = format!("Movie found via {} API", record.source);
            let ranked = RankedCandidates {
                rows: popularity_ranking(catalog, count * 2, None),
                method: RecommendationMethod::Popular,
            };
            (Some(record), ranked, ResolutionStatus::FoundExternal, message)
        } else {
            tracing::info!(query = %title, "Movie not found locally or externally");
            let ranked = RankedCandidates {
                rows: popularity_ranking(catalog, count, None),
                method: RecommendationMethod::Popular,
            };
            (
                None,
                ranked,
                ResolutionStatus::NotFound,
                format!("Movie \"{}\" not found", title),
            )
        };

        let recommendations = Self::to_recommendations(catalog, candidates);
        let mut recommendations = apply_genre_preferences(recommendations, preferred_genres);
        recommendations.truncate(count);

        tracing::info!(
            query = %title,
            status = ?status,
            recommendations = recommendations.len(),
            "Recommendations ready"
        );

        Ok(ResolutionResult {
            movie,
            recommendations,
            status,
            message,
        })
    }

    /// Cluster ranking for a local hit; ranking errors degrade to popularity
    fn rank_local(local: &LocalIndex, row: usize, limit: usize) -> RankedCandidates {
        match local.ranker.rank_cluster(row, limit) {
            Ok(ranked) => ranked,
            Err(e) => {
                tracing::error!(row, error = %e, "Cluster ranking failed, using popular movies");
                RankedCandidates {
                    rows: popularity_ranking(&local.catalog, limit, Some(row)),
                    method: RecommendationMethod::Popular,
                }
            }
        }
    }

    fn to_recommendations(catalog: &Catalog, ranked: RankedCandidates) -> Vec<Recommendation> {
        ranked
            .rows
            .into_iter()
            .filter_map(|row| catalog.record(row))
            .map(|movie| Recommendation {
                movie,
                similarity_score: 0.0,
                method: ranked.method,
            })
            .collect()
    }
}
