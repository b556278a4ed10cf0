use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Insight, InsightStore, NewInsight};
use crate::error::StorageResult;

/// In-memory insight ledger.
///
/// Cloning shares the underlying ledger. Ids start at 1 and are allocated
/// while the write lock is held, so ledger order always matches id order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    insights: RwLock<Vec<Insight>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl InsightStore for MemoryStore {
    async fn append(&self, insight: NewInsight) -> StorageResult<Insight> {
        let mut insights = self.inner.insights.write().await;
        let stored = insight.into_insight(self.allocate_id(), Utc::now());
        insights.push(stored.clone());

        debug!(
            insight_id = stored.id,
            provenance = %stored.provenance,
            "Insight appended"
        );

        Ok(stored)
    }

    async fn get(&self, id: u64) -> StorageResult<Option<Insight>> {
        let insights = self.inner.insights.read().await;
        // ids are dense and start at 1
        let found = usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|idx| insights.get(idx))
            .filter(|insight| insight.id == id)
            .cloned();
        Ok(found)
    }

    async fn list(&self, caller_id: Option<&str>) -> StorageResult<Vec<Insight>> {
        let insights = self.inner.insights.read().await;
        Ok(insights
            .iter()
            .filter(|insight| match caller_id {
                Some(caller) => insight.caller_id.as_deref() == Some(caller),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn count(&self) -> StorageResult<usize> {
        Ok(self.inner.insights.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::Mode;
    use crate::storage::Provenance;
    use std::collections::HashSet;

    fn draft(prompt: &str) -> NewInsight {
        NewInsight::new(Mode::Behavior, "Customer Segmentation", prompt)
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let first = store.append(draft("one")).await.unwrap();
        let second = store.append(draft("two")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.created_at >= first.created_at);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let store = MemoryStore::new();
        store.append(draft("one")).await.unwrap();
        let second = store.append(draft("two")).await.unwrap();

        let found = store.get(second.id).await.unwrap().unwrap();
        assert_eq!(found.prompt, "two");
        assert!(store.get(0).await.unwrap().is_none());
        assert!(store.get(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_caller() {
        let store = MemoryStore::new();
        store
            .append(draft("a").with_caller(Some("user-1".to_string())))
            .await
            .unwrap();
        store
            .append(draft("b").with_caller(Some("user-2".to_string())))
            .await
            .unwrap();
        store.append(draft("c")).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 3);
        let mine = store.list(Some("user-1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].prompt, "a");
    }

    #[tokio::test]
    async fn test_clones_share_ledger() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.append(draft("shared")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_separate_stores_are_independent() {
        let a = MemoryStore::new();
        let b = MemoryStore::new();
        a.append(draft("a")).await.unwrap();
        let in_b = b.append(draft("b")).await.unwrap();
        assert_eq!(in_b.id, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_never_duplicate_ids() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(draft(&format!("prompt {i}"))).await.unwrap().id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 64);
        assert_eq!(*ids.iter().max().unwrap(), 64);

        let listed: Vec<u64> = store.list(None).await.unwrap().iter().map(|i| i.id).collect();
        assert!(listed.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_stored_provenance_preserved() {
        let store = MemoryStore::new();
        let stored = store
            .append(draft("x").apply(crate::storage::InsightPatch::default().provenance(Provenance::Ml)))
            .await
            .unwrap();
        assert_eq!(stored.provenance, Provenance::Ml);
    }
}
