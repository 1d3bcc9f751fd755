//! Expired Entry Purge Task
//!
//! Background task that periodically drops expired entries from the
//! in-memory cache provider.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::InMemoryCacheProvider;

/// Spawns a background task that purges expired cache entries.
///
/// Expired entries are never served anyway; purging only frees their memory
/// before LRU eviction would.
///
/// # Arguments
/// * `provider` - Shared in-memory provider
/// * `cleanup_interval_secs` - Interval in seconds between purge runs
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_cleanup_task(
    provider: Arc<InMemoryCacheProvider>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting cache purge task"
        );

        loop {
            tokio::time::sleep(interval).await;

            match provider.purge_expired() {
                Ok(0) => debug!("Cache purge: no expired entries found"),
                Ok(removed) => info!(removed, "Cache purge: removed expired entries"),
                Err(e) => warn!(error = %e, "Cache purge failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachePriority, CacheProvider};

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let provider = Arc::new(InMemoryCacheProvider::new(100, None));
        provider
            .set("expire_soon", "value".to_string(), CachePriority::Normal, Some(1))
            .unwrap();

        let handle = spawn_cleanup_task(provider.clone(), 1);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(provider.len().unwrap(), 0, "Expired entry should be purged");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_live_entries() {
        let provider = Arc::new(InMemoryCacheProvider::new(100, None));
        provider
            .set("long_lived", "value".to_string(), CachePriority::Normal, Some(3600))
            .unwrap();
        provider.increment("counter", 1, 1).unwrap();

        let handle = spawn_cleanup_task(provider.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(provider.get("long_lived").unwrap().as_deref(), Some("value"));
        assert_eq!(provider.len().unwrap(), 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(Arc::new(InMemoryCacheProvider::default()), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
