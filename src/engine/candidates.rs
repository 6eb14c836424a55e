use std::collections::HashSet;

use crate::models::ContentType;
use crate::store::ContentStore;

use super::graph::CoVisitationGraph;
use super::text_index::TextIndex;

/// Recency window used to build the seen-item exclusion set.
const SEEN_HISTORY: usize = 50;

/// Recent items feeding the graph strategy, and neighbors pulled per item.
const GRAPH_SOURCE_ITEMS: usize = 10;
const GRAPH_NEIGHBORS_PER_ITEM: usize = 20;

/// Popularity strategy pull size.
const POPULARITY_PULL: usize = 100;

/// Recent items feeding the content strategy, and neighbors pulled per item.
const CONTENT_SOURCE_ITEMS: usize = 3;
const CONTENT_NEIGHBORS_PER_ITEM: usize = 50;

struct CandidatePool<'a> {
    seen: HashSet<&'a str>,
    included: HashSet<String>,
    candidates: Vec<String>,
}

impl CandidatePool<'_> {
    fn push(&mut self, item_id: String) {
        if !self.seen.contains(item_id.as_str()) && self.included.insert(item_id.clone()) {
            self.candidates.push(item_id);
        }
    }
}

/// Merges the graph, popularity, and content strategies into a bounded,
/// de-duplicated candidate set that excludes the user's recently seen items.
///
/// The union preserves first-seen insertion order (graph, then popularity,
/// then content) so truncation to `n_candidates` is deterministic. A failing
/// strategy is logged and skipped; if everything fails the result is empty
/// rather than an error.
pub async fn generate(
    store: &dyn ContentStore,
    graph: &CoVisitationGraph,
    text_index: &TextIndex,
    user_id: &str,
    content_type: Option<ContentType>,
    n_candidates: usize,
) -> Vec<String> {
    // Seen-set is best-effort: recency-limited, not full history.
    let recent_items: Vec<String> = match store.recent_interactions(user_id, SEEN_HISTORY).await {
        Ok(interactions) => {
            let mut ordered = Vec::new();
            let mut dedupe = HashSet::new();
            for interaction in interactions {
                if dedupe.insert(interaction.item_id.clone()) {
                    ordered.push(interaction.item_id);
                }
            }
            ordered
        }
        Err(err) => {
            tracing::warn!(user_id, error = %err, "recent-history lookup failed; graph and content strategies skipped");
            Vec::new()
        }
    };
    let seen: HashSet<&str> = recent_items.iter().map(String::as_str).collect();

    let mut pool = CandidatePool { seen, included: HashSet::new(), candidates: Vec::new() };

    // Strategy 1: co-visitation neighbors of the most recent items.
    for item_id in recent_items.iter().take(GRAPH_SOURCE_ITEMS) {
        for neighbor in graph.neighbors(item_id, GRAPH_NEIGHBORS_PER_ITEM) {
            pool.push(neighbor);
        }
    }

    // Strategy 2: global popularity, content-type filter applied at the store.
    match store.popular_items(content_type, POPULARITY_PULL).await {
        Ok(items) => {
            for item in items {
                pool.push(item.item_id);
            }
        }
        Err(err) => {
            tracing::warn!(user_id, error = %err, "popularity strategy failed; skipped");
        }
    }

    // Strategy 3: text-similar items for the few most recent items.
    for item_id in recent_items.iter().take(CONTENT_SOURCE_ITEMS) {
        for similar in text_index.similar_items(item_id, CONTENT_NEIGHBORS_PER_ITEM) {
            pool.push(similar);
        }
    }

    let mut candidates = pool.candidates;
    candidates.truncate(n_candidates);

    // Backfill from popularity until the quota is met or the source is
    // exhausted. Items already unioned (even if truncated away) stay out.
    if candidates.len() < n_candidates {
        match store.popular_items(content_type, n_candidates).await {
            Ok(items) => {
                for item in items {
                    if candidates.len() >= n_candidates {
                        break;
                    }
                    if !pool.seen.contains(item.item_id.as_str())
                        && pool.included.insert(item.item_id.clone())
                    {
                        candidates.push(item.item_id);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "popularity backfill failed; returning partial candidate set");
            }
        }
    }

    tracing::debug!(user_id, count = candidates.len(), "generated candidates");
    candidates
}
