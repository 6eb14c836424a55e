use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::models::{ContentType, Interaction, InteractionType, Item};

use super::{ContentStore, StoreError, StoreResult};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// PostgreSQL-backed [`ContentStore`].
///
/// Enum-valued columns are stored as text and parsed at the read boundary;
/// a value that fails to parse surfaces as [`StoreError::CorruptRecord`]
/// rather than leaking loosely-typed data into the engine.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ItemRow {
    item_id: String,
    title: String,
    content_type: String,
    category: String,
    tags: Vec<String>,
    description: String,
    thumbnail_url: String,
    publish_ts: DateTime<Utc>,
    rating: f64,
    view_count: i64,
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let content_type: ContentType = row
            .content_type
            .parse()
            .map_err(StoreError::CorruptRecord)?;
        Ok(Item {
            item_id: row.item_id,
            title: row.title,
            content_type,
            category: row.category,
            tags: row.tags,
            description: row.description,
            thumbnail_url: row.thumbnail_url,
            publish_ts: row.publish_ts,
            rating: row.rating,
            view_count: row.view_count,
        })
    }
}

#[derive(FromRow)]
struct InteractionRow {
    interaction_id: String,
    user_id: String,
    item_id: String,
    interaction_type: String,
    timestamp: DateTime<Utc>,
    dwell_seconds: i64,
    rating: Option<f64>,
    context: serde_json::Value,
}

impl TryFrom<InteractionRow> for Interaction {
    type Error = StoreError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        let interaction_type: InteractionType = row
            .interaction_type
            .parse()
            .map_err(StoreError::CorruptRecord)?;
        Ok(Interaction {
            interaction_id: row.interaction_id,
            user_id: row.user_id,
            item_id: row.item_id,
            interaction_type,
            timestamp: row.timestamp,
            dwell_seconds: row.dwell_seconds,
            rating: row.rating,
            context: row.context,
        })
    }
}

const ITEM_COLUMNS: &str = "item_id, title, content_type, category, tags, description, \
                            thumbnail_url, publish_ts, rating, view_count";

const INTERACTION_COLUMNS: &str = "interaction_id, user_id, item_id, interaction_type, \
                                   \"timestamp\", dwell_seconds, rating, context";

fn collect_items(rows: Vec<ItemRow>) -> StoreResult<Vec<Item>> {
    rows.into_iter().map(Item::try_from).collect()
}

fn collect_interactions(rows: Vec<InteractionRow>) -> StoreResult<Vec<Interaction>> {
    rows.into_iter().map(Interaction::try_from).collect()
}

#[async_trait]
impl ContentStore for PgStore {
    async fn all_interactions(&self) -> StoreResult<Vec<Interaction>> {
        let sql = format!("SELECT {INTERACTION_COLUMNS} FROM interactions");
        let rows: Vec<InteractionRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        collect_interactions(rows)
    }

    async fn interactions_by_types(
        &self,
        types: &[InteractionType],
    ) -> StoreResult<Vec<Interaction>> {
        let names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM interactions WHERE interaction_type = ANY($1)"
        );
        let rows: Vec<InteractionRow> = sqlx::query_as(&sql)
            .bind(&names)
            .fetch_all(&self.pool)
            .await?;
        collect_interactions(rows)
    }

    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM interactions \
             WHERE user_id = $1 ORDER BY \"timestamp\" DESC LIMIT $2"
        );
        let rows: Vec<InteractionRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        collect_interactions(rows)
    }

    async fn all_items(&self) -> StoreResult<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY item_id");
        let rows: Vec<ItemRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        collect_items(rows)
    }

    async fn items_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ANY($1)");
        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        collect_items(rows)
    }

    async fn popular_items(
        &self,
        content_type: Option<ContentType>,
        limit: usize,
    ) -> StoreResult<Vec<Item>> {
        let rows: Vec<ItemRow> = match content_type {
            Some(ct) => {
                let sql = format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE content_type = $1 \
                     ORDER BY view_count DESC, rating DESC LIMIT $2"
                );
                sqlx::query_as(&sql)
                    .bind(ct.as_str())
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {ITEM_COLUMNS} FROM items \
                     ORDER BY view_count DESC, rating DESC LIMIT $1"
                );
                sqlx::query_as(&sql)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        collect_items(rows)
    }

    async fn user_ids(&self) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT user_id FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn record_interaction(&self, interaction: Interaction) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO interactions \
             (interaction_id, user_id, item_id, interaction_type, \"timestamp\", \
              dwell_seconds, rating, context) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&interaction.interaction_id)
        .bind(&interaction.user_id)
        .bind(&interaction.item_id)
        .bind(interaction.interaction_type.as_str())
        .bind(interaction.timestamp)
        .bind(interaction.dwell_seconds)
        .bind(interaction.rating)
        .bind(&interaction.context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
