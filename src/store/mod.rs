//! Persistent-store seam.
//!
//! The engine only ever talks to [`ContentStore`]; the Postgres-backed
//! implementation serves production while the in-memory one backs tests and
//! local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

use async_trait::async_trait;

use crate::models::{ContentType, Interaction, InteractionType, Item};

/// Errors surfaced by a store implementation.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/append access to users, items, and the interaction log.
///
/// Ordering contracts the engine relies on:
/// - `recent_interactions` is newest-first;
/// - `popular_items` is `view_count` descending, then `rating` descending.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Full interaction log, unfiltered.
    async fn all_interactions(&self) -> StoreResult<Vec<Interaction>>;

    /// Full interaction log filtered to the given types.
    async fn interactions_by_types(
        &self,
        types: &[InteractionType],
    ) -> StoreResult<Vec<Interaction>>;

    /// A user's most recent interactions, newest first.
    async fn recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>>;

    /// Every item currently in the catalog.
    async fn all_items(&self) -> StoreResult<Vec<Item>>;

    /// Items matching the given ids; unknown ids are silently absent.
    async fn items_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Item>>;

    /// Popularity pull: `view_count` desc, `rating` desc, optional
    /// content-type filter.
    async fn popular_items(
        &self,
        content_type: Option<ContentType>,
        limit: usize,
    ) -> StoreResult<Vec<Item>>;

    /// Every known user id (used for negative sampling).
    async fn user_ids(&self) -> StoreResult<Vec<String>>;

    /// Appends one interaction to the log.
    async fn record_interaction(&self, interaction: Interaction) -> StoreResult<()>;
}
