//! Process-wide retrieval cache with single-flight discipline.
//!
//! One slot per instrument key; the first requester runs the fetch and
//! publishes the record to every waiter. Entries expire after the
//! configured TTL and are refetched on the next request.

use crate::RetrievalError;
use chrono::Utc;
use dashmap::DashMap;
use lexaudit_core::{InstrumentKey, RetrievalRecord};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

type Slot = Arc<OnceCell<Arc<RetrievalRecord>>>;

pub struct RetrievalCache {
    entries: DashMap<InstrumentKey, Slot>,
    ttl: Duration,
}

impl RetrievalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Return the cached record for `key`, or run `fetch` exactly once and
    /// publish its result to all concurrent requesters.
    ///
    /// A failed fetch leaves the slot empty: the next requester retries.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &InstrumentKey,
        fetch: F,
    ) -> Result<Arc<RetrievalRecord>, RetrievalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RetrievalRecord, RetrievalError>>,
    {
        self.evict_if_stale(key);

        let slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let record = slot
            .get_or_try_init(|| async {
                debug!(key = %key, "cache miss, fetching");
                fetch().await.map(Arc::new)
            })
            .await?;
        Ok(record.clone())
    }

    /// Peek without fetching.
    pub fn get(&self, key: &InstrumentKey) -> Option<Arc<RetrievalRecord>> {
        self.entries
            .get(key)
            .and_then(|slot| slot.get().cloned())
            .filter(|record| !self.is_stale(record))
    }

    /// Drop every expired entry. Called between runs when the cache is
    /// reused process-wide.
    pub fn purge_expired(&self) {
        self.entries.retain(|_, slot| match slot.get() {
            Some(record) => !self.is_stale(record),
            // Keep empty slots: an init may be in flight.
            None => true,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_stale(&self, key: &InstrumentKey) {
        let stale = self
            .entries
            .get(key)
            .and_then(|slot| slot.get().cloned())
            .map(|record| self.is_stale(&record))
            .unwrap_or(false);
        if stale {
            debug!(key = %key, "evicting expired retrieval record");
            self.entries.remove(key);
        }
    }

    fn is_stale(&self, record: &RetrievalRecord) -> bool {
        let age = Utc::now().signed_duration_since(record.fetched_at);
        age.to_std().map(|age| age > self.ttl).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexaudit_core::{InstrumentType, TrustLevel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key() -> InstrumentKey {
        InstrumentKey::new(InstrumentType::Law, "8112", Some(1990))
    }

    fn record(key: &InstrumentKey) -> RetrievalRecord {
        RetrievalRecord {
            instrument_key: key.clone(),
            source_url: "https://planalto.gov.br/l8112".to_string(),
            fetched_text: "Art. 1º ...".to_string(),
            fetched_at: Utc::now(),
            checksum: "deadbeef".to_string(),
            trust_level: TrustLevel::Official,
        }
    }

    #[tokio::test]
    async fn test_second_request_reuses_record() {
        let cache = RetrievalCache::new(Duration::from_secs(3600));
        let fetches = AtomicUsize::new(0);
        let key = key();

        for _ in 0..3 {
            let got = cache
                .get_or_fetch(&key, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(record(&key))
                })
                .await
                .unwrap();
            assert_eq!(got.instrument_key, key);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_single_flight() {
        let cache = Arc::new(RetrievalCache::new(Duration::from_secs(3600)));
        let fetches = Arc::new(AtomicUsize::new(0));
        let key = key();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let fetches = fetches.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(&key, || async {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        // Hold the slot long enough for peers to pile up.
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(record(&key))
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_slot_retryable() {
        let cache = RetrievalCache::new(Duration::from_secs(3600));
        let key = key();

        let err = cache
            .get_or_fetch(&key, || async {
                Err(RetrievalError::Transient("flaky".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Transient(_)));

        let got = cache
            .get_or_fetch(&key, || async { Ok(record(&key)) })
            .await
            .unwrap();
        assert_eq!(got.instrument_key, key);
    }

    #[tokio::test]
    async fn test_expired_record_is_refetched() {
        let cache = RetrievalCache::new(Duration::from_millis(0));
        let fetches = AtomicUsize::new(0);
        let key = key();

        for _ in 0..2 {
            cache
                .get_or_fetch(&key, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    let mut r = record(&key);
                    // Backdate so the zero TTL sees it as stale.
                    r.fetched_at = Utc::now() - chrono::Duration::seconds(5);
                    Ok(r)
                })
                .await
                .unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_fresh_entries() {
        let cache = RetrievalCache::new(Duration::from_secs(3600));
        let key = key();
        cache
            .get_or_fetch(&key, || async { Ok(record(&key)) })
            .await
            .unwrap();
        cache.purge_expired();
        assert!(cache.get(&key).is_some());
    }
}
