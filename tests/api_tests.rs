use std::sync::Arc;

use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use serde_json::json;

use recsys_api::api::{create_router, AppState};
use recsys_api::models::{ContentType, Item};
use recsys_api::store::MemoryStore;

fn item(id: &str, ct: ContentType, views: i64, rating: f64) -> Item {
    Item {
        item_id: id.to_string(),
        title: format!("Title {id}"),
        content_type: ct,
        category: "general".to_string(),
        tags: vec![],
        description: String::new(),
        thumbnail_url: String::new(),
        publish_ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        rating,
        view_count: views,
    }
}

async fn create_test_server() -> TestServer {
    let store = Arc::new(MemoryStore::new());
    store.add_item(item("v1", ContentType::Video, 900, 4.0)).await;
    store.add_item(item("v2", ContentType::Video, 500, 3.0)).await;
    store.add_item(item("m1", ContentType::Movie, 700, 4.5)).await;

    let state = AppState::new(store);
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check_reports_untrained_engine() {
    let server = create_test_server().await;

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["engine"]["trained"], false);
    assert_eq!(body["engine"]["generation"], 0);
}

#[tokio::test]
async fn test_recommend_falls_back_to_popularity_when_untrained() {
    let server = create_test_server().await;

    let response = server
        .get("/api/recommend")
        .add_query_param("user_id", "newcomer")
        .add_query_param("n", "2")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["algorithm"], "popularity");
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 2);
    assert_eq!(recommendations[0]["item_id"], "v1");
    assert_eq!(recommendations[1]["item_id"], "m1");
    assert_eq!(recommendations[0]["ml_score"], 0.0);
}

#[tokio::test]
async fn test_recommend_honors_content_type_filter() {
    let server = create_test_server().await;

    let response = server
        .get("/api/recommend")
        .add_query_param("user_id", "newcomer")
        .add_query_param("content_type", "movie")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["item_id"], "m1");
}

#[tokio::test]
async fn test_recommend_rejects_invalid_content_type() {
    let server = create_test_server().await;

    let response = server
        .get("/api/recommend")
        .add_query_param("user_id", "newcomer")
        .add_query_param("content_type", "hologram")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("invalid content type"));
}

#[tokio::test]
async fn test_recommend_with_use_ml_false_uses_popularity() {
    let server = create_test_server().await;

    let response = server
        .get("/api/recommend")
        .add_query_param("user_id", "newcomer")
        .add_query_param("use_ml", "false")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["algorithm"], "popularity");
}

#[tokio::test]
async fn test_popular_endpoint_orders_and_counts() {
    let server = create_test_server().await;

    let response = server
        .get("/api/popular")
        .add_query_param("limit", "2")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["item_id"], "v1");
    assert_eq!(body["items"][1]["item_id"], "m1");
}

#[tokio::test]
async fn test_event_logging_round_trip() {
    let server = create_test_server().await;

    let response = server
        .post("/api/event")
        .json(&json!({
            "user_id": "u1",
            "item_id": "v1",
            "type": "like",
            "dwell_seconds": 42
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "success");
    assert!(body["interaction_id"].as_str().is_some());
}

#[tokio::test]
async fn test_event_with_invalid_rating_is_rejected() {
    let server = create_test_server().await;

    let response = server
        .post("/api/event")
        .json(&json!({
            "user_id": "u1",
            "item_id": "v1",
            "type": "view",
            "rating": 9.5
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_retrain_is_accepted_and_trains_in_background() {
    let server = create_test_server().await;

    // Record some engagement so the rebuild has training data.
    for (item_id, ty, dwell) in
        [("v1", "view", 90), ("v2", "like", 30), ("m1", "view", 45), ("v1", "bookmark", 20)]
    {
        server
            .post("/api/event")
            .json(&json!({
                "user_id": "u1",
                "item_id": item_id,
                "type": ty,
                "dwell_seconds": dwell
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    let response = server.post("/api/admin/retrain").await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    // Poll health until the background rebuild publishes a new generation.
    let mut trained = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let health: serde_json::Value = server.get("/api/health").await.json();
        if health["engine"]["generation"].as_u64() == Some(1) {
            trained = health["engine"]["trained"].as_bool().unwrap_or(false);
            break;
        }
    }
    assert!(trained, "background retrain did not publish a trained snapshot");
}
