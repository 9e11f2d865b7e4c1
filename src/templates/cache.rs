//! Read-mostly template cache with per-key single-flight population.
//!
//! Each key owns a `OnceCell`. Concurrent lookups of one key wait on the same
//! cell, so the inner resolver sees a single fetch. Unknown keys are cached
//! like hits; failed fetches leave the cell empty for the next caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{ResolveError, TemplateResolver};
use crate::models::{Template, TemplateKey, TemplateSource};

type Slot = Arc<OnceCell<Option<Arc<Template>>>>;

pub struct CachingResolver<R> {
    inner: R,
    slots: Mutex<HashMap<TemplateKey, Slot>>,
    fetches: AtomicUsize,
}

impl<R: TemplateResolver> CachingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of lookups that reached the inner resolver.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Drop the cached answer for one key; the next lookup fetches again.
    pub fn invalidate(&self, key: &TemplateKey) {
        self.lock_slots().remove(key);
    }

    fn slot(&self, key: &TemplateKey) -> Slot {
        self.lock_slots().entry(key.clone()).or_default().clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<TemplateKey, Slot>> {
        // the map is only ever touched by short non-panicking sections
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<R: TemplateResolver> TemplateResolver for CachingResolver<R> {
    async fn resolve(&self, key: &TemplateKey) -> Result<Option<Arc<Template>>, ResolveError> {
        let slot = self.slot(key);
        let cached = slot
            .get_or_try_init(|| async {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Template cache miss");
                self.inner.resolve(key).await
            })
            .await?;
        Ok(cached.clone())
    }

    fn source(&self) -> TemplateSource {
        self.inner.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::store::tests::sample_template;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Slow resolver that counts its own calls and can fail once.
    struct SlowResolver {
        calls: AtomicUsize,
        fail_first: AtomicBool,
    }

    impl SlowResolver {
        fn new(fail_first: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: AtomicBool::new(fail_first),
            }
        }
    }

    #[async_trait]
    impl TemplateResolver for SlowResolver {
        async fn resolve(
            &self,
            key: &TemplateKey,
        ) -> Result<Option<Arc<Template>>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(ResolveError::Unavailable("registry down".into()));
            }
            if key.institution == "Known" {
                Ok(Some(Arc::new(sample_template("Known"))))
            } else {
                Ok(None)
            }
        }

        fn source(&self) -> TemplateSource {
            TemplateSource::InstitutionRegistry
        }
    }

    #[tokio::test]
    async fn concurrent_lookups_collapse_into_one_fetch() {
        let cache = Arc::new(CachingResolver::new(SlowResolver::new(false)));
        let key = TemplateKey::new("Known", "Diploma");
        let lookups = (0..16).map(|_| {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            async move { cache.resolve(&key).await }
        });
        let results = join_all(lookups).await;
        assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_across_tasks_collapse() {
        let cache = Arc::new(CachingResolver::new(SlowResolver::new(false)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache.resolve(&TemplateKey::new("Known", "Diploma")).await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn unknown_key_is_cached() {
        let cache = CachingResolver::new(SlowResolver::new(false));
        let key = TemplateKey::new("Unknown", "Diploma");
        assert!(cache.resolve(&key).await.unwrap().is_none());
        assert!(cache.resolve(&key).await.unwrap().is_none());
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = CachingResolver::new(SlowResolver::new(true));
        let key = TemplateKey::new("Known", "Diploma");
        assert!(cache.resolve(&key).await.is_err());
        assert!(cache.resolve(&key).await.unwrap().is_some());
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = CachingResolver::new(SlowResolver::new(false));
        let key = TemplateKey::new("Known", "Diploma");
        cache.resolve(&key).await.unwrap();
        cache.invalidate(&key);
        cache.resolve(&key).await.unwrap();
        assert_eq!(cache.fetch_count(), 2);
        assert_eq!(cache.source(), TemplateSource::InstitutionRegistry);
    }
}
