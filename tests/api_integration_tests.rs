//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle against real cache backends.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use favicon_cache::{
    api::create_router,
    build_cache,
    cache::{current_timestamp_secs, SqliteCache},
    config::{BackendKind, Config, MaintenanceMode},
    AppState, FaviconCache, Resolver, ResolverRegistry, Result,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

fn sqlite_config(dir: &TempDir) -> Config {
    Config {
        db_type: BackendKind::Sqlite,
        db_url: dir.path().join("faviconcache.db"),
        hold_time: 1000,
        limit_total_bytes: 100,
        blob_max_bytes: 50,
        maintenance_mode: MaintenanceMode::Off,
        ..Config::default()
    }
}

async fn open_sqlite(dir: &TempDir) -> (SqliteCache, FaviconCache) {
    let sqlite = SqliteCache::open(&sqlite_config(dir)).await.unwrap();
    let cache = FaviconCache::new(sqlite.clone());
    (sqlite, cache)
}

fn app(cache: &FaviconCache) -> Router {
    create_router(AppState::new(cache.clone()))
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: Router, uri: &str, body: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
}

async fn body_to_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}

/// Resolver that knows a single icon for `a.example` and nothing else.
struct StaticResolver;

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, authority: &str) -> Result<(Option<Vec<u8>>, Option<String>)> {
        if authority == "a.example" {
            Ok((Some(b"PNGDATA".to_vec()), Some("image/png".to_string())))
        } else {
            Ok((None, None))
        }
    }
}

// == Health / Stats ==

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let (_, cache) = open_sqlite(&dir).await;

    let response = get(app(&cache), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_stats_reports_backend_and_storage() {
    let dir = tempfile::tempdir().unwrap();
    let (_, cache) = open_sqlite(&dir).await;
    cache
        .store("resolverX", "a.example", Some("image/png"), Some(b"PNGDATA"))
        .await;
    cache
        .store("resolverX", "b.example", Some("image/png"), Some(b"PNGDATA"))
        .await;
    cache.store("resolverX", "c.example", None, None).await;

    let response = get(app(&cache), "/stats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["backend"], "sqlite");
    assert_eq!(json["stores"], 3);
    assert_eq!(json["blob_count"], 1);
    assert_eq!(json["mapping_count"], 3);
    assert_eq!(json["total_bytes"], 7);
}

// == Entry Inspection ==

#[tokio::test]
async fn test_entry_positive_negative_and_miss() {
    let dir = tempfile::tempdir().unwrap();
    let (_, cache) = open_sqlite(&dir).await;
    cache
        .store("resolverX", "a.example", Some("image/png"), Some(b"PNGDATA"))
        .await;
    cache.store("resolverX", "c.example", None, None).await;

    let response = get(app(&cache), "/entries/resolverX/a.example").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(response.into_body()).await, b"PNGDATA");

    let response = get(app(&cache), "/entries/resolverX/c.example").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(app(&cache), "/entries/resolverX/b.example").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("b.example"));
}

#[tokio::test]
async fn test_rejected_stores_are_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let (sqlite, cache) = open_sqlite(&dir).await;

    // no mime type
    assert!(!cache
        .store("resolverX", "a.example", None, Some(b"PNGDATA"))
        .await);
    // over the 50 byte ceiling
    assert!(!cache
        .store("resolverX", "b.example", Some("image/png"), Some(&[0u8; 51]))
        .await);

    for uri in ["/entries/resolverX/a.example", "/entries/resolverX/b.example"] {
        assert_eq!(get(app(&cache), uri).await.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(sqlite.blob_count().await.unwrap(), 0);
    assert_eq!(sqlite.mapping_count().await.unwrap(), 0);
}

// == Maintenance ==

#[tokio::test]
async fn test_maintenance_not_due_reports_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (_, cache) = open_sqlite(&dir).await;

    let response = post_json(app(&cache), "/maintenance", "{}").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!({"ran": false}));
}

#[tokio::test]
async fn test_forced_maintenance_evicts_oldest_blob() {
    let dir = tempfile::tempdir().unwrap();
    let (sqlite, cache) = open_sqlite(&dir).await;
    let now = current_timestamp_secs();

    // three 40 byte blobs written one second apart, 120 bytes > limit 100
    for (i, authority) in ["a.example", "b.example", "c.example"].iter().enumerate() {
        let data = vec![b'a' + i as u8; 40];
        assert!(sqlite
            .store_at(now - 2 + i as i64, "resolverX", authority, Some("image/png"), Some(&data))
            .await
            .unwrap());
    }

    let response = post_json(app(&cache), "/maintenance", r#"{"force":true}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ran"], true);
    assert_eq!(json["evicted_blobs"], 1);
    assert_eq!(json["total_bytes_before"], 120);
    assert_eq!(json["total_bytes_after"], 80);

    assert_eq!(
        get(app(&cache), "/entries/resolverX/a.example").await.status(),
        StatusCode::NOT_FOUND
    );
    for uri in ["/entries/resolverX/b.example", "/entries/resolverX/c.example"] {
        assert_eq!(get(app(&cache), uri).await.status(), StatusCode::OK);
    }

    let json = body_to_json(get(app(&cache), "/stats").await.into_body()).await;
    assert_eq!(json["total_bytes"], 80);
    assert_eq!(json["maintenance_runs"], 1);
}

#[tokio::test]
async fn test_expired_mappings_and_orphans_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let (sqlite, cache) = open_sqlite(&dir).await;
    let now = current_timestamp_secs();

    // shared blob: one stale and one fresh referrer
    sqlite
        .store_at(now - 5000, "resolverX", "old.example", Some("image/png"), Some(b"SHARED"))
        .await
        .unwrap();
    sqlite
        .store_at(now, "resolverX", "new.example", Some("image/png"), Some(b"SHARED"))
        .await
        .unwrap();
    // orphaned once its only referrer expires
    sqlite
        .store_at(now - 5000, "resolverX", "gone.example", Some("image/png"), Some(b"LONELY"))
        .await
        .unwrap();

    let json = body_to_json(
        post_json(app(&cache), "/maintenance", r#"{"force":true}"#)
            .await
            .into_body(),
    )
    .await;
    assert_eq!(json["expired_mappings"], 2);
    assert_eq!(json["orphaned_blobs"], 1);

    assert_eq!(
        get(app(&cache), "/entries/resolverX/old.example").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(app(&cache), "/entries/resolverX/new.example").await.status(),
        StatusCode::OK
    );
    assert_eq!(sqlite.blob_count().await.unwrap(), 1);
}

// == Resolver Flow ==

#[tokio::test]
async fn test_resolved_icons_become_inspectable() {
    let dir = tempfile::tempdir().unwrap();
    let (_, cache) = open_sqlite(&dir).await;
    let mut registry = ResolverRegistry::new();
    registry.register("resolverX", Arc::new(StaticResolver));

    let icon = registry
        .search_favicon(&cache, "resolverX", "a.example")
        .await;
    assert_eq!(icon, Some((b"PNGDATA".to_vec(), "image/png".to_string())));
    assert_eq!(
        registry
            .search_favicon(&cache, "resolverX", "nothing.example")
            .await,
        None
    );

    let response = get(app(&cache), "/entries/resolverX/a.example").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response.into_body()).await, b"PNGDATA");

    let response = get(app(&cache), "/entries/resolverX/nothing.example").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_entries_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = build_cache(&sqlite_config(&dir)).await.unwrap();
        cache
            .store("resolverX", "a.example", Some("image/png"), Some(b"PNGDATA"))
            .await;
    }

    let cache = build_cache(&sqlite_config(&dir)).await.unwrap();
    let response = get(app(&cache), "/entries/resolverX/a.example").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_memory_backend_via_factory() {
    let config = Config {
        db_type: BackendKind::Memory,
        ..Config::default()
    };
    let cache = build_cache(&config).await.unwrap();
    cache
        .store("resolverX", "a.example", Some("image/png"), Some(b"PNGDATA"))
        .await;

    let json = body_to_json(get(app(&cache), "/stats").await.into_body()).await;
    assert_eq!(json["backend"], "mem");
    assert_eq!(json["blob_count"], 1);
}
