//! The recommendation engine: derived-state lifecycle, candidate
//! generation, ranking, and the popularity fallback.
//!
//! All derived structures (graph, profiles, text index, model) live in an
//! immutable [`EngineSnapshot`]. A rebuild constructs a complete new
//! snapshot off to the side and swaps the shared `Arc` at the end, so
//! readers always observe a single generation and are never blocked by an
//! in-flight retrain.

pub mod candidates;
pub mod features;
pub mod graph;
pub mod model;
pub mod profiles;
pub mod text_index;
pub mod training;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::models::{ContentType, Item, RecommendedItem};
use crate::store::ContentStore;

use features::ItemSignals;
use graph::CoVisitationGraph;
use model::{GradientBoostedRegressor, RankingModel, StandardScaler};
use profiles::UserProfile;
use text_index::TextIndex;

/// Candidate pool size fed into ranking.
const N_CANDIDATES: usize = 500;

/// Popularity pull size when ranking is asked to fall back with no
/// candidate list at all.
const FALLBACK_POPULAR_PULL: usize = 50;

/// One complete generation of derived state.
pub struct EngineSnapshot {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub graph: CoVisitationGraph,
    pub text_index: TextIndex,
    pub profiles: HashMap<String, UserProfile>,
    pub model: Option<RankingModel>,
}

impl EngineSnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            graph: CoVisitationGraph::default(),
            text_index: TextIndex::default(),
            profiles: HashMap::new(),
            model: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// Summary of one rebuild, including which stages degraded to empty
/// artifacts because the store failed mid-pipeline.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub generation: u64,
    pub graph_items: usize,
    pub indexed_items: usize,
    pub profiled_users: usize,
    pub training_examples: usize,
    pub model_trained: bool,
    pub degraded_stages: Vec<&'static str>,
}

/// Outcome of a retrain request. A request issued while another rebuild is
/// running is coalesced into it rather than queued.
#[derive(Debug, Clone)]
pub enum RetrainStatus {
    Completed(RebuildReport),
    Skipped,
}

pub struct RecommendationEngine {
    store: Arc<dyn ContentStore>,
    snapshot: RwLock<Arc<EngineSnapshot>>,
    rebuild_guard: Mutex<()>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(EngineSnapshot::empty())),
            rebuild_guard: Mutex::new(()),
        }
    }

    /// Current published snapshot. Callers hold the returned `Arc` for the
    /// duration of one operation so a concurrent swap cannot mix
    /// generations under them.
    pub async fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// First-time build; identical to [`retrain`](Self::retrain).
    pub async fn initialize(&self) -> RetrainStatus {
        self.retrain().await
    }

    /// Rebuilds every derived structure from the current logs and swaps the
    /// result in atomically.
    ///
    /// Store failures degrade the affected stage to its empty artifact and
    /// are reported in [`RebuildReport::degraded_stages`]; the rebuild
    /// itself never fails. Concurrent calls coalesce: if a rebuild is
    /// already running this returns [`RetrainStatus::Skipped`] immediately.
    pub async fn retrain(&self) -> RetrainStatus {
        let _guard = match self.rebuild_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!("retrain already in progress; request coalesced");
                return RetrainStatus::Skipped;
            }
        };

        let mut degraded_stages = Vec::new();

        let graph_log = match self
            .store
            .interactions_by_types(&graph::GRAPH_INTERACTION_TYPES)
            .await
        {
            Ok(log) => log,
            Err(err) => {
                tracing::warn!(error = %err, "co-visitation log fetch failed; building empty graph");
                degraded_stages.push("co_visitation_graph");
                Vec::new()
            }
        };
        let graph = CoVisitationGraph::build(&graph_log);

        let items = match self.store.all_items().await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %err, "item fetch failed; text index and training degraded");
                degraded_stages.push("item_catalog");
                Vec::new()
            }
        };
        let text_index = TextIndex::fit(&items);
        let item_map: HashMap<String, Item> =
            items.iter().map(|item| (item.item_id.clone(), item.clone())).collect();
        let item_ids: Vec<String> = items.iter().map(|item| item.item_id.clone()).collect();

        let full_log = match self.store.all_interactions().await {
            Ok(log) => log,
            Err(err) => {
                tracing::warn!(error = %err, "interaction log fetch failed; profiles and training degraded");
                degraded_stages.push("interaction_log");
                Vec::new()
            }
        };
        let profiles = profiles::build_profiles(&full_log, &item_map);

        let user_ids = match self.store.user_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(error = %err, "user id fetch failed; negative sampling skipped");
                degraded_stages.push("user_ids");
                Vec::new()
            }
        };

        let now = Utc::now();
        let mut rng = model::seeded_rng(model::TRAINING_SEED);
        let training_set = training::build_training_set(
            &full_log, &item_map, &profiles, &user_ids, &item_ids, now, &mut rng,
        );

        let model = if training_set.is_empty() {
            tracing::warn!("no training data available; serving popularity fallback");
            None
        } else {
            let rows: Vec<Vec<f64>> =
                training_set.iter().map(|example| example.features.clone()).collect();
            let targets: Vec<f64> = training_set.iter().map(|example| example.label).collect();

            let scaler = StandardScaler::fit(&rows);
            let scaled: Vec<Vec<f64>> = rows.iter().map(|row| scaler.transform(row)).collect();
            let mut booster = GradientBoostedRegressor::new();
            booster.fit(&scaled, &targets, &mut rng);
            Some(RankingModel { scaler, booster })
        };

        let generation = self.snapshot().await.generation + 1;
        let report = RebuildReport {
            generation,
            graph_items: graph.len(),
            indexed_items: text_index.len(),
            profiled_users: profiles.len(),
            training_examples: training_set.len(),
            model_trained: model.is_some(),
            degraded_stages,
        };

        let next = Arc::new(EngineSnapshot {
            generation,
            built_at: now,
            graph,
            text_index,
            profiles,
            model,
        });
        *self.snapshot.write().await = next;

        tracing::info!(
            generation = report.generation,
            graph_items = report.graph_items,
            indexed_items = report.indexed_items,
            profiled_users = report.profiled_users,
            training_examples = report.training_examples,
            model_trained = report.model_trained,
            degraded = ?report.degraded_stages,
            "engine rebuild complete"
        );
        RetrainStatus::Completed(report)
    }

    /// Multi-strategy candidate generation against the current snapshot.
    pub async fn generate_candidates(
        &self,
        user_id: &str,
        content_type: Option<ContentType>,
        n_candidates: usize,
    ) -> Vec<String> {
        let snapshot = self.snapshot().await;
        candidates::generate(
            self.store.as_ref(),
            &snapshot.graph,
            &snapshot.text_index,
            user_id,
            content_type,
            n_candidates,
        )
        .await
    }

    /// Scores and orders candidates with the learned model, or falls back
    /// to popularity ordering when the model is untrained, the candidate
    /// list is empty, or scoring fails as a whole. Individual candidates
    /// whose metadata or features are unavailable are excluded, not fatal.
    pub async fn rank(&self, user_id: &str, candidate_ids: &[String]) -> Vec<RecommendedItem> {
        let snapshot = self.snapshot().await;
        let Some(model) = snapshot.model.as_ref() else {
            return self.popularity_ranking(candidate_ids).await;
        };
        if candidate_ids.is_empty() {
            return self.popularity_ranking(candidate_ids).await;
        }

        let items = match self.store.items_by_ids(candidate_ids).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "candidate metadata fetch failed; popularity fallback");
                return self.popularity_ranking(candidate_ids).await;
            }
        };
        let by_id: HashMap<&str, &Item> =
            items.iter().map(|item| (item.item_id.as_str(), item)).collect();

        let zero_profile = UserProfile::default();
        let profile = snapshot.profiles.get(user_id).unwrap_or(&zero_profile);
        let now = Utc::now();

        // Iterate in candidate order so equal scores keep the input order
        // under the stable sort below.
        let mut scored: Vec<RecommendedItem> = Vec::with_capacity(candidate_ids.len());
        for candidate_id in candidate_ids {
            let Some(item) = by_id.get(candidate_id.as_str()) else {
                continue;
            };
            let signals = ItemSignals::from_item(item);
            let Some(feature_vector) = features::extract(profile, &signals, 0, now) else {
                continue;
            };
            let score = model.score(&feature_vector);
            scored.push(RecommendedItem::from_item(item, score));
        }
        scored.sort_by(|a, b| b.ml_score.total_cmp(&a.ml_score));

        tracing::debug!(user_id, count = scored.len(), "ranked candidates");
        scored
    }

    /// Deterministic fallback: `view_count` desc, `rating` desc,
    /// `ml_score = 0.0`. With no candidates given, pulls a fresh popularity
    /// top list instead.
    pub async fn popularity_ranking(&self, candidate_ids: &[String]) -> Vec<RecommendedItem> {
        let items = if candidate_ids.is_empty() {
            self.store.popular_items(None, FALLBACK_POPULAR_PULL).await
        } else {
            self.store.items_by_ids(candidate_ids).await.map(|mut items| {
                items.sort_by(|a, b| {
                    b.view_count
                        .cmp(&a.view_count)
                        .then_with(|| b.rating.total_cmp(&a.rating))
                });
                items
            })
        };

        match items {
            Ok(items) => items
                .iter()
                .map(|item| RecommendedItem::from_item(item, 0.0))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "popularity ranking failed; returning empty list");
                Vec::new()
            }
        }
    }

    /// Straight popularity pull used when the caller's A/B assignment opts
    /// out of learned ranking entirely.
    pub async fn popular_fallback(
        &self,
        n: usize,
        content_type: Option<ContentType>,
    ) -> Vec<RecommendedItem> {
        match self.store.popular_items(content_type, n).await {
            Ok(items) => items
                .iter()
                .map(|item| RecommendedItem::from_item(item, 0.0))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "popularity pull failed; returning empty list");
                Vec::new()
            }
        }
    }

    /// Full serving pipeline: candidates, ranking, post-ranking
    /// content-type filter, truncate to `n`. Always returns a (possibly
    /// empty) list.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        n: usize,
        content_type: Option<ContentType>,
    ) -> Vec<RecommendedItem> {
        let candidate_ids = self.generate_candidates(user_id, content_type, N_CANDIDATES).await;
        let mut ranked = self.rank(user_id, &candidate_ids).await;

        // Filter after ranking, so fewer than n may return.
        if let Some(ct) = content_type {
            ranked.retain(|item| item.content_type == ct);
        }
        ranked.truncate(n);
        ranked
    }
}
