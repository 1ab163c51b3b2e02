//! Redis Transport Integration Tests
//!
//! These tests require a running Redis instance and are ignored by default.
//!
//! ```bash
//! cargo test --features redis --test redis_integration_test -- --ignored
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
//!
//! ## What's Tested
//!
//! 1. Connection and health check
//! 2. Basic set/get through the distributed backend
//! 3. TTL expiration behavior
//! 4. Pattern deletion via SCAN
//! 5. Connection pooling under concurrent load

#![cfg(feature = "redis")]

use cache_warden::backend::{CacheBackend, DistributedBackend};
use cache_warden::transport::RedisKv;
use cache_warden::Invalidator;
use std::env;
use std::time::Duration;

/// Helper: Get Redis connection URL from environment or use default
fn get_redis_url() -> String {
    env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Helper: Backend isolated under its own namespace
fn create_test_backend(namespace: &str) -> DistributedBackend<RedisKv> {
    let redis_url = get_redis_url();
    println!("Connecting to Redis: {}", redis_url);

    let kv = RedisKv::from_connection_string(&redis_url).expect("Failed to create Redis client");
    DistributedBackend::new(kv).with_namespace(format!("cw_test_{}", namespace))
}

#[tokio::test]
#[ignore]
async fn test_redis_health_check() {
    let backend = create_test_backend("health");
    assert!(backend.health_check().await.expect("Health check failed"));
}

#[tokio::test]
#[ignore]
async fn test_redis_set_get_delete() {
    let backend = create_test_backend("basic");
    backend.clear().await.expect("Failed to clear");

    backend
        .set("user:1", b"alice".to_vec(), None)
        .await
        .expect("Failed to set");
    assert_eq!(
        backend.get("user:1").await.expect("Failed to get"),
        Some(b"alice".to_vec())
    );

    assert!(backend.delete("user:1").await.expect("Failed to delete"));
    assert!(backend.get("user:1").await.expect("Failed to get").is_none());
}

#[tokio::test]
#[ignore]
async fn test_redis_ttl_expiration() {
    let backend = create_test_backend("ttl");

    backend
        .set("short", b"v".to_vec(), Some(Duration::from_millis(200)))
        .await
        .expect("Failed to set");
    assert!(backend.get("short").await.expect("Failed to get").is_some());

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(backend.get("short").await.expect("Failed to get").is_none());
}

#[tokio::test]
#[ignore]
async fn test_redis_pattern_invalidation() {
    let backend = create_test_backend("pattern");
    backend.clear().await.expect("Failed to clear");
    for key in ["user:1", "user:2", "order:1"] {
        backend
            .set(key, Vec::new(), None)
            .await
            .expect("Failed to set");
    }

    let invalidator = Invalidator::new(backend.clone());
    invalidator
        .register_pattern("user:*", "user_updated")
        .expect("valid pattern");

    let removed = invalidator
        .invalidate_by_event("user_updated", None)
        .await
        .expect("Failed to invalidate");
    assert_eq!(removed, 2);
    assert_eq!(
        backend.keys().await.expect("Failed to list"),
        vec!["order:1".to_string()]
    );
}

#[tokio::test]
#[ignore]
async fn test_redis_concurrent_access() {
    let backend = create_test_backend("concurrent");

    let mut handles = vec![];
    for i in 0..20 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("key_{}", i);
            backend
                .set(&key, vec![i as u8; 32], None)
                .await
                .expect("Failed to set");
            backend.get(&key).await.expect("Failed to get")
        }));
    }

    for handle in handles {
        let value = handle.await.expect("Task failed");
        assert!(value.is_some());
    }

    let pool = backend.client().pool_stats();
    assert!(pool.connections >= 1);
}
