use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use recsys_api::engine::{RecommendationEngine, RetrainStatus};
use recsys_api::models::{ContentType, Interaction, InteractionType, Item};
use recsys_api::store::{ContentStore, MemoryStore, StoreResult};

fn item(id: &str, ct: ContentType, category: &str, views: i64, rating: f64) -> Item {
    Item {
        item_id: id.to_string(),
        title: format!("Title {id}"),
        content_type: ct,
        category: category.to_string(),
        tags: vec![category.to_string()],
        description: format!("Description for {id} about {category}"),
        thumbnail_url: String::new(),
        publish_ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        rating,
        view_count: views,
    }
}

fn interaction(
    user: &str,
    item: &str,
    ty: InteractionType,
    offset_seconds: i64,
    dwell: i64,
) -> Interaction {
    Interaction::new(
        user.to_string(),
        item.to_string(),
        ty,
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()
            + chrono::Duration::seconds(offset_seconds),
        dwell,
        None,
        serde_json::Value::Null,
    )
}

/// Store with a catalog but no interaction history: every user is cold.
async fn cold_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_item(item("v1", ContentType::Video, "tech", 500, 4.0)).await;
    store.add_item(item("v2", ContentType::Video, "tech", 300, 4.8)).await;
    store.add_item(item("m1", ContentType::Movie, "drama", 400, 3.5)).await;
    store.add_item(item("m2", ContentType::Movie, "drama", 400, 2.0)).await;
    store.add_item(item("a1", ContentType::Article, "tech", 100, 5.0)).await;
    store
}

/// Store with enough engagement history to train the ranking model.
async fn active_store() -> Arc<MemoryStore> {
    let store = cold_store().await;
    let ids = ["v1", "v2", "m1", "m2", "a1"];
    for (u, user) in ["u1", "u2", "u3"].iter().enumerate() {
        for (i, id) in ids.iter().enumerate() {
            let dwell = 15 + (u as i64 * 37 + i as i64 * 19) % 90;
            let ty = if (u + i) % 3 == 0 { InteractionType::Like } else { InteractionType::View };
            store
                .add_interaction(interaction(user, id, ty, (i as i64) * 300, dwell))
                .await;
        }
    }
    store
}

#[tokio::test]
async fn test_cold_start_untrained_returns_popularity_ordering() {
    let store = cold_store().await;
    let engine = RecommendationEngine::new(store);

    // No retrain has run: model untrained, popularity fallback everywhere.
    let recommendations = engine.get_recommendations("nobody", 3, None).await;
    assert!(recommendations.len() <= 3);
    let ids: Vec<&str> = recommendations.iter().map(|r| r.item_id.as_str()).collect();
    // view_count desc, then rating desc.
    assert_eq!(ids, vec!["v1", "m1", "m2"]);
    assert!(recommendations.iter().all(|r| r.ml_score == 0.0));
}

#[tokio::test]
async fn test_cold_start_applies_content_type_filter() {
    let store = cold_store().await;
    let engine = RecommendationEngine::new(store);

    let recommendations = engine
        .get_recommendations("nobody", 10, Some(ContentType::Movie))
        .await;
    assert!(!recommendations.is_empty());
    assert!(recommendations.iter().all(|r| r.content_type == ContentType::Movie));
    let ids: Vec<&str> = recommendations.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_untrained_rank_scores_zero_and_orders_by_popularity() {
    let store = cold_store().await;
    let engine = RecommendationEngine::new(store);

    let candidates = vec!["a1".to_string(), "v1".to_string(), "v2".to_string()];
    let ranked = engine.rank("nobody", &candidates).await;

    let ids: Vec<&str> = ranked.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v2", "a1"]);
    assert!(ranked.iter().all(|r| r.ml_score == 0.0));
}

#[tokio::test]
async fn test_candidates_are_bounded_and_exclude_seen_items() {
    let store = active_store().await;
    let engine = RecommendationEngine::new(store);
    engine.initialize().await;

    let candidates = engine.generate_candidates("u1", None, 3).await;
    assert!(candidates.len() <= 3);
    // u1 has interacted with the whole catalog; none of it may come back.
    for seen in ["v1", "v2", "m1", "m2", "a1"] {
        assert!(!candidates.contains(&seen.to_string()), "{seen} was seen");
    }
}

#[tokio::test]
async fn test_session_views_build_symmetric_unit_edges() {
    let store = Arc::new(MemoryStore::new());
    store.add_item(item("A", ContentType::Video, "tech", 1, 1.0)).await;
    store.add_item(item("B", ContentType::Video, "tech", 1, 1.0)).await;
    store.add_item(item("C", ContentType::Video, "tech", 1, 1.0)).await;
    store.add_interaction(interaction("u1", "A", InteractionType::View, 0, 30)).await;
    store.add_interaction(interaction("u1", "B", InteractionType::View, 300, 30)).await;
    store.add_interaction(interaction("u1", "C", InteractionType::View, 600, 30)).await;

    let engine = RecommendationEngine::new(store);
    engine.initialize().await;

    let snapshot = engine.snapshot().await;
    for (a, b) in [("A", "B"), ("A", "C"), ("B", "C")] {
        assert_eq!(snapshot.graph.weight(a, b), 1);
        assert_eq!(snapshot.graph.weight(b, a), 1);
    }
}

#[tokio::test]
async fn test_retrain_trains_model_and_scores_candidates() {
    let store = active_store().await;
    let engine = RecommendationEngine::new(store);

    let status = engine.initialize().await;
    let RetrainStatus::Completed(report) = status else {
        panic!("initial build should complete");
    };
    assert!(report.model_trained);
    assert!(report.degraded_stages.is_empty());
    assert!(report.training_examples > 0);
    assert!(engine.snapshot().await.is_trained());

    // A fresh user still gets scored recommendations from the learned path.
    let recommendations = engine.get_recommendations("newcomer", 4, None).await;
    assert!(!recommendations.is_empty());
    assert!(recommendations.len() <= 4);
}

#[tokio::test]
async fn test_retrain_twice_is_stable_on_a_fixed_candidate_set() {
    let store = active_store().await;
    let engine = RecommendationEngine::new(store);
    let candidates = vec![
        "v1".to_string(),
        "v2".to_string(),
        "m1".to_string(),
        "m2".to_string(),
        "a1".to_string(),
    ];

    engine.retrain().await;
    let first: Vec<String> = engine
        .rank("newcomer", &candidates)
        .await
        .into_iter()
        .map(|r| r.item_id)
        .collect();

    engine.retrain().await;
    assert_eq!(engine.snapshot().await.generation, 2);
    let second: Vec<String> = engine
        .rank("newcomer", &candidates)
        .await
        .into_iter()
        .map(|r| r.item_id)
        .collect();

    assert_eq!(first, second);
}

/// Store wrapper that slows the first pipeline fetch so a rebuild can be
/// caught in flight.
struct SlowStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl ContentStore for SlowStore {
    async fn all_interactions(&self) -> StoreResult<Vec<Interaction>> {
        self.inner.all_interactions().await
    }

    async fn interactions_by_types(
        &self,
        types: &[InteractionType],
    ) -> StoreResult<Vec<Interaction>> {
        tokio::time::sleep(self.delay).await;
        self.inner.interactions_by_types(types).await
    }

    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        self.inner.recent_interactions(user_id, limit).await
    }

    async fn all_items(&self) -> StoreResult<Vec<Item>> {
        self.inner.all_items().await
    }

    async fn items_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Item>> {
        self.inner.items_by_ids(ids).await
    }

    async fn popular_items(
        &self,
        content_type: Option<ContentType>,
        limit: usize,
    ) -> StoreResult<Vec<Item>> {
        self.inner.popular_items(content_type, limit).await
    }

    async fn user_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.user_ids().await
    }

    async fn record_interaction(&self, interaction: Interaction) -> StoreResult<()> {
        self.inner.record_interaction(interaction).await
    }
}

#[tokio::test]
async fn test_concurrent_retrain_is_coalesced() {
    let store = Arc::new(SlowStore {
        inner: active_store().await,
        delay: Duration::from_millis(100),
    });
    let engine = Arc::new(RecommendationEngine::new(store));

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.retrain().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Second request while the first is still fetching: coalesced.
    let second = engine.retrain().await;
    assert!(matches!(second, RetrainStatus::Skipped));

    let first = background.await.expect("background retrain panicked");
    assert!(matches!(first, RetrainStatus::Completed(_)));
    assert_eq!(engine.snapshot().await.generation, 1);
}

#[tokio::test]
async fn test_readers_see_old_snapshot_during_rebuild() {
    let store = Arc::new(SlowStore {
        inner: active_store().await,
        delay: Duration::from_millis(100),
    });
    let engine = Arc::new(RecommendationEngine::new(store));

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.retrain().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Rebuild in flight: readers still get generation 0 (untrained) and a
    // working popularity path.
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.generation, 0);
    let recommendations = engine.get_recommendations("nobody", 3, None).await;
    assert!(recommendations.iter().all(|r| r.ml_score == 0.0));

    background.await.expect("background retrain panicked");
    assert_eq!(engine.snapshot().await.generation, 1);
}
