use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{ContentType, Interaction, InteractionType, Item};

use super::{ContentStore, StoreResult};

/// In-memory [`ContentStore`] used by tests and local runs.
///
/// Implements the same ordering contracts as the Postgres store so the two
/// are interchangeable behind the trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, Item>,
    interactions: Vec<Interaction>,
    user_ids: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_item(&self, item: Item) {
        self.inner.write().await.items.insert(item.item_id.clone(), item);
    }

    pub async fn add_user(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut inner = self.inner.write().await;
        if !inner.user_ids.contains(&user_id) {
            inner.user_ids.push(user_id);
        }
    }

    pub async fn add_interaction(&self, interaction: Interaction) {
        let mut inner = self.inner.write().await;
        if !inner.user_ids.contains(&interaction.user_id) {
            let user_id = interaction.user_id.clone();
            inner.user_ids.push(user_id);
        }
        inner.interactions.push(interaction);
    }
}

fn by_popularity(a: &Item, b: &Item) -> std::cmp::Ordering {
    b.view_count
        .cmp(&a.view_count)
        .then_with(|| b.rating.total_cmp(&a.rating))
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn all_interactions(&self) -> StoreResult<Vec<Interaction>> {
        Ok(self.inner.read().await.interactions.clone())
    }

    async fn interactions_by_types(
        &self,
        types: &[InteractionType],
    ) -> StoreResult<Vec<Interaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .interactions
            .iter()
            .filter(|i| types.contains(&i.interaction_type))
            .cloned()
            .collect())
    }

    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        let inner = self.inner.read().await;
        let mut history: Vec<Interaction> = inner
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        Ok(history)
    }

    async fn all_items(&self) -> StoreResult<Vec<Item>> {
        let inner = self.inner.read().await;
        let mut items: Vec<Item> = inner.items.values().cloned().collect();
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(items)
    }

    async fn items_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Item>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.items.get(id).cloned()).collect())
    }

    async fn popular_items(
        &self,
        content_type: Option<ContentType>,
        limit: usize,
    ) -> StoreResult<Vec<Item>> {
        let inner = self.inner.read().await;
        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|item| content_type.map_or(true, |ct| item.content_type == ct))
            .cloned()
            .collect();
        items.sort_by(by_popularity);
        items.truncate(limit);
        Ok(items)
    }

    async fn user_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.read().await.user_ids.clone())
    }

    async fn record_interaction(&self, interaction: Interaction) -> StoreResult<()> {
        self.add_interaction(interaction).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, views: i64, rating: f64, ct: ContentType) -> Item {
        Item {
            item_id: id.to_string(),
            title: id.to_string(),
            content_type: ct,
            category: "general".to_string(),
            tags: vec![],
            description: String::new(),
            thumbnail_url: String::new(),
            publish_ts: Utc::now(),
            rating,
            view_count: views,
        }
    }

    #[tokio::test]
    async fn test_popular_items_orders_by_views_then_rating() {
        let store = MemoryStore::new();
        store.add_item(item("a", 10, 3.0, ContentType::Video)).await;
        store.add_item(item("b", 10, 4.5, ContentType::Video)).await;
        store.add_item(item("c", 50, 1.0, ContentType::Movie)).await;

        let popular = store.popular_items(None, 10).await.unwrap();
        let ids: Vec<&str> = popular.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let movies = store.popular_items(Some(ContentType::Movie), 10).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].item_id, "c");
    }

    #[tokio::test]
    async fn test_recent_interactions_newest_first_and_limited() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for (idx, offset) in [(0, 0i64), (1, 60), (2, 120)] {
            store
                .add_interaction(Interaction::new(
                    "u1".to_string(),
                    format!("i{idx}"),
                    InteractionType::View,
                    base + chrono::Duration::seconds(offset),
                    10,
                    None,
                    serde_json::Value::Null,
                ))
                .await;
        }

        let recent = store.recent_interactions("u1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].item_id, "i2");
        assert_eq!(recent[1].item_id, "i1");
    }
}
