use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{ContentType, Interaction, InteractionType, RecommendedItem};

use super::AppState;

/// Hard cap on recommendations per request.
const MAX_RECOMMENDATIONS: usize = 100;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: String,
    pub n: Option<usize>,
    pub content_type: Option<String>,
    /// Externally computed A/B assignment: whether this request may use the
    /// learned ranking path. The engine still falls back to popularity when
    /// untrained.
    pub use_ml: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendedItem>,
    pub algorithm: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub content_type: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub user_id: String,
    pub item_id: String,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dwell_seconds: i64,
    pub rating: Option<f64>,
    #[serde(default)]
    pub context: Value,
}

fn parse_content_type(raw: Option<&str>) -> AppResult<Option<ContentType>> {
    raw.map(|value| value.parse::<ContentType>().map_err(AppError::InvalidInput))
        .transpose()
}

// Handlers

/// Health check endpoint with engine readiness
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.engine.snapshot().await;
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "started_at": state.started_at,
        "engine": {
            "generation": snapshot.generation,
            "trained": snapshot.is_trained(),
            "built_at": snapshot.built_at,
        },
    }))
}

/// Personalized recommendations for a user
pub async fn recommend(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let n = query.n.unwrap_or(10).min(MAX_RECOMMENDATIONS);
    let content_type = parse_content_type(query.content_type.as_deref())?;
    let use_ml = query.use_ml.unwrap_or(true);

    let trained = state.engine.snapshot().await.is_trained();
    let (recommendations, algorithm) = if use_ml && trained {
        (
            state.engine.get_recommendations(&query.user_id, n, content_type).await,
            "learned_ranking",
        )
    } else {
        (
            state.engine.popular_fallback(n, content_type).await,
            "popularity",
        )
    };

    Ok(Json(RecommendationResponse {
        recommendations,
        algorithm,
        timestamp: Utc::now(),
    }))
}

/// Popular/trending items
pub async fn popular(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> AppResult<Json<Value>> {
    let content_type = parse_content_type(query.content_type.as_deref())?;
    let limit = query.limit.unwrap_or(20).min(MAX_RECOMMENDATIONS);

    let items = state.store.popular_items(content_type, limit).await?;
    let count = items.len();
    Ok(Json(json!({
        "items": items,
        "count": count,
    })))
}

/// Records a user interaction event
pub async fn log_event(
    State(state): State<AppState>,
    Json(event): Json<EventRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let interaction = Interaction::new(
        event.user_id,
        event.item_id,
        event.interaction_type,
        event.ts.unwrap_or_else(Utc::now),
        event.dwell_seconds,
        event.rating,
        event.context,
    );
    interaction.validate().map_err(AppError::InvalidInput)?;

    let interaction_id = interaction.interaction_id.clone();
    let timestamp = interaction.timestamp;
    state.store.record_interaction(interaction).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "interaction_id": interaction_id,
            "timestamp": timestamp,
        })),
    ))
}

/// Kicks off a background engine rebuild (admin endpoint)
pub async fn retrain(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let engine = state.engine.clone();
    tokio::spawn(async move {
        engine.retrain().await;
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "message": "engine rebuild started in background",
            "timestamp": Utc::now(),
        })),
    )
}
