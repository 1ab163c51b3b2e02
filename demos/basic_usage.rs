//! Basic usage example of the caching engine.
//!
//! Run with: cargo run --example basic_usage
//! Set RUST_LOG=debug to see per-operation cache logs.

use cache_warden::backend::{CacheBackend, LruStore};
use cache_warden::{Invalidator, Memoizer, MonitoredCache, Result};
use std::time::Duration;

/// Stand-in for a slow database lookup.
async fn load_profile(user_id: u64) -> String {
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("profile of user {}", user_id)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== cache-warden - Basic Example ===\n");

    // 1. Store with capacity, default TTL and monitoring
    println!("1. Initializing monitored LRU store...");
    let store = LruStore::with_default_ttl(1_000, Some(Duration::from_secs(300)))?;
    let cache = MonitoredCache::new(store.clone());
    println!("   ✓ Cache ready (max {} entries)\n", store.max_size());

    // 2. Plain get/set
    println!("2. Caching user records:");
    for id in 1..=3 {
        cache
            .set(&format!("user:{}", id), format!("user {}", id).into_bytes(), None)
            .await?;
    }
    cache.set("order:1", b"order 1".to_vec(), None).await?;
    let hit = cache.get("user:1").await?;
    let miss = cache.get("user:42").await?;
    println!("   ✓ user:1 -> {:?}", hit.map(String::from_utf8));
    println!("   ✓ user:42 -> {:?}\n", miss);

    // 3. Event-driven invalidation
    println!("3. Invalidating on 'user_updated':");
    let invalidator = Invalidator::new(cache.clone());
    invalidator.register_pattern("user:*", "user_updated")?;
    let removed = invalidator.invalidate_by_event("user_updated", None).await?;
    println!("   ✓ Removed {} keys, remaining: {:?}\n", removed, cache.keys().await?);

    // 4. Versioned keys
    println!("4. Versioned keys:");
    let before = invalidator.get_versioned_key("config");
    invalidator.increment_version();
    let after = invalidator.get_versioned_key("config");
    println!("   ✓ {} -> {}\n", before, after);

    // 5. Memoization: the second call is served from the cache
    println!("5. Memoizing load_profile:");
    let memo = Memoizer::with_backend(cache.clone(), "demo::load_profile");
    for attempt in 1..=2 {
        let started = std::time::Instant::now();
        let profile: String = memo.call_async(&(7u64,), || load_profile(7)).await?;
        println!(
            "   ✓ Attempt {}: '{}' in {:?}",
            attempt,
            profile,
            started.elapsed()
        );
    }

    // 6. Monitoring summary
    let stats = cache.stats();
    println!("\n6. Stats:");
    println!(
        "   hits={} misses={} writes={} deletes={} hit_rate={:.2} avg_latency={:?}",
        stats.hits, stats.misses, stats.writes, stats.deletes, stats.hit_rate, stats.avg_latency
    );
    store.log_stats();

    println!("\n=== Example Complete ===\n");

    Ok(())
}
