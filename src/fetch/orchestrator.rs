//! Join-all fetch orchestration.

use crate::cache::TtlCache;
use crate::error::{FallbackError, LmsError};
use crate::models::{SourceResult, SourceStatus};
use futures::future::{join_all, BoxFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type FallbackFn<'a, T> = Box<dyn FnOnce() -> Result<T, FallbackError> + Send + 'a>;

/// One independent unit of remote work.
pub struct FetchTask<'a, T> {
    key: String,
    remote_call: BoxFuture<'a, Result<T, LmsError>>,
    fallback: Option<FallbackFn<'a, T>>,
    use_cache: bool,
}

impl<'a, T> FetchTask<'a, T> {
    pub fn new<F>(key: impl Into<String>, remote_call: F) -> Self
    where
        F: Future<Output = Result<T, LmsError>> + Send + 'a,
    {
        Self {
            key: key.into(),
            remote_call: Box::pin(remote_call),
            fallback: None,
            use_cache: false,
        }
    }

    /// Substitute data to use when the remote call fails.
    pub fn with_fallback<G>(mut self, generate: G) -> Self
    where
        G: FnOnce() -> Result<T, FallbackError> + Send + 'a,
    {
        self.fallback = Some(Box::new(generate));
        self
    }

    /// Consult the orchestrator's cache before going to the network.
    pub fn cached(mut self) -> Self {
        self.use_cache = true;
        self
    }
}

/// A source whose remote call failed and that has no usable fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub key: String,
    pub error: String,
    pub fallback_error: String,
}

/// Every task's settled outcome from one `fetch_all` call, in task order.
#[derive(Debug)]
pub struct FetchReport<T> {
    pub results: Vec<SourceResult<T>>,
    pub failures: Vec<SourceFailure>,
    pub elapsed: Duration,
}

impl<T> FetchReport<T> {
    /// At least one source is showing synthetic data.
    pub fn is_degraded(&self) -> bool {
        self.results.iter().any(|r| r.is_fallback)
    }

    /// Every remote call failed (whether or not fallbacks covered them).
    pub fn all_failed(&self) -> bool {
        let total = self.results.len() + self.failures.len();
        total > 0
            && self
                .results
                .iter()
                .all(|r| r.status == SourceStatus::Failed)
    }

    /// All sources produced a value, real or synthetic.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn degraded_keys(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_fallback)
            .map(|r| r.key.clone())
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&SourceResult<T>> {
        self.results.iter().find(|r| r.key == key)
    }
}

enum Settled<T> {
    Ready(SourceResult<T>),
    Unusable(SourceFailure),
}

/// Runs fetch tasks concurrently against an optional shared cache.
#[derive(Clone, Default)]
pub struct Orchestrator {
    cache: Option<Arc<TtlCache>>,
    task_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<TtlCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Treat any remote call slower than `limit` as a transport failure.
    pub fn with_task_timeout(mut self, limit: Duration) -> Self {
        self.task_timeout = Some(limit);
        self
    }

    /// Run every task concurrently and return once all have settled.
    ///
    /// Never fails: remote errors become fallback results, and sources with
    /// no usable fallback are listed in [`FetchReport::failures`].
    pub async fn fetch_all<'a, T>(&self, tasks: Vec<FetchTask<'a, T>>) -> FetchReport<T>
    where
        T: Serialize + DeserializeOwned + Send + 'a,
    {
        let started = Instant::now();
        let count = tasks.len();
        debug!("Fetching {} sources", count);

        let settled = join_all(tasks.into_iter().map(|task| self.run_task(task))).await;

        let mut results = Vec::with_capacity(count);
        let mut failures = Vec::new();
        for outcome in settled {
            match outcome {
                Settled::Ready(result) => results.push(result),
                Settled::Unusable(failure) => failures.push(failure),
            }
        }

        let report = FetchReport {
            results,
            failures,
            elapsed: started.elapsed(),
        };
        info!(
            "Fetched {} sources in {:.2}s ({} fallback, {} unusable)",
            count,
            report.elapsed.as_secs_f64(),
            report.degraded_keys().len(),
            report.failures.len()
        );
        report
    }

    async fn run_task<'a, T>(&self, task: FetchTask<'a, T>) -> Settled<T>
    where
        T: Serialize + DeserializeOwned + Send + 'a,
    {
        let FetchTask {
            key,
            remote_call,
            fallback,
            use_cache,
        } = task;

        let cache = if use_cache {
            self.cache.as_deref()
        } else {
            None
        };

        if let Some(value) = cache.and_then(|c| c.read::<T>(&key)) {
            return Settled::Ready(SourceResult::success(&key, value, true));
        }

        let outcome = match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, remote_call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LmsError::Timeout(limit)),
            },
            None => remote_call.await,
        };

        let remote_error = match outcome {
            Ok(value) => {
                if let Some(cache) = cache {
                    cache.write(&key, &value);
                }
                return Settled::Ready(SourceResult::success(&key, value, false));
            }
            Err(e) => e,
        };

        let Some(generate) = fallback else {
            error!("Source '{}' failed and has no fallback: {}", key, remote_error);
            return Settled::Unusable(SourceFailure {
                error: remote_error.to_string(),
                fallback_error: FallbackError::Missing(key.clone()).to_string(),
                key,
            });
        };

        warn!("Source '{}' unavailable, using fallback data: {}", key, remote_error);
        let generated = std::panic::catch_unwind(AssertUnwindSafe(generate)).unwrap_or_else(|_| {
            Err(FallbackError::Synthesis {
                key: key.clone(),
                reason: "generator panicked".to_string(),
            })
        });

        match generated {
            Ok(value) => Settled::Ready(SourceResult::fallback(&key, value)),
            Err(e) => {
                error!("Fallback for source '{}' failed: {}", key, e);
                Settled::Unusable(SourceFailure {
                    error: remote_error.to_string(),
                    fallback_error: e.to_string(),
                    key,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Utc};

    fn ok_after(ms: u64, value: Vec<u32>) -> impl Future<Output = Result<Vec<u32>, LmsError>> {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        }
    }

    async fn transport_failure() -> Result<Vec<u32>, LmsError> {
        Err(LmsError::Transport("connection reset".to_string()))
    }

    fn test_cache() -> Arc<TtlCache> {
        let clock = Arc::new(ManualClock::new(
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        Arc::new(TtlCache::new(
            Box::new(MemoryStore::new()),
            "test",
            Duration::from_secs(600),
            clock,
        ))
    }

    #[tokio::test]
    async fn test_failed_source_is_isolated() {
        let tasks = vec![
            FetchTask::new("users", transport_failure()).with_fallback(|| Ok(vec![0; 3])),
            FetchTask::new("courses", ok_after(0, vec![1, 2, 3, 4, 5]))
                .with_fallback(|| Ok(vec![])),
        ];

        let report = Orchestrator::new().fetch_all(tasks).await;

        let courses = report.get("courses").unwrap();
        assert!(!courses.is_fallback);
        assert_eq!(courses.status, SourceStatus::Success);
        assert_eq!(courses.value.len(), 5);

        let users = report.get("users").unwrap();
        assert!(users.is_fallback);
        assert_eq!(users.status, SourceStatus::Failed);
        assert_eq!(users.value.len(), 3);

        assert!(report.is_degraded());
        assert!(report.is_complete());
        assert!(!report.all_failed());
        assert_eq!(report.degraded_keys(), vec!["users".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_slowest_task_not_sum() {
        let tasks = vec![
            FetchTask::new("a", ok_after(120, vec![1])),
            FetchTask::new("b", ok_after(300, vec![2])),
            FetchTask::new("c", ok_after(45, vec![3])),
            FetchTask::new("d", ok_after(210, vec![4])),
        ];

        let started = Instant::now();
        let report = Orchestrator::new().fetch_all(tasks).await;
        let elapsed = started.elapsed();

        assert_eq!(report.results.len(), 4);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
        let keys: Vec<&str> = report.results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_triggers_fallback() {
        let tasks = vec![FetchTask::new("slow", ok_after(5_000, vec![1]))
            .with_fallback(|| Ok(vec![9]))];

        let report = Orchestrator::new()
            .with_task_timeout(Duration::from_secs(1))
            .fetch_all(tasks)
            .await;

        let slow = report.get("slow").unwrap();
        assert!(slow.is_fallback);
        assert_eq!(slow.value, vec![9]);
        assert!(report.elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let cache = test_cache();
        cache.write("courses", &vec![7u32, 8]);
        let orchestrator = Orchestrator::new().with_cache(cache);

        let tasks = vec![FetchTask::new("courses", transport_failure())
            .with_fallback(|| Ok(vec![]))
            .cached()];
        let report = orchestrator.fetch_all(tasks).await;

        let courses = report.get("courses").unwrap();
        assert_eq!(courses.value, vec![7, 8]);
        assert!(courses.from_cache);
        assert!(!courses.is_fallback);
    }

    #[tokio::test]
    async fn test_success_is_written_back_but_fallback_is_not() {
        let cache = test_cache();
        let orchestrator = Orchestrator::new().with_cache(cache.clone());

        let tasks = vec![
            FetchTask::new("courses", ok_after(0, vec![1, 2])).cached(),
            FetchTask::new("users", transport_failure())
                .with_fallback(|| Ok(vec![5]))
                .cached(),
        ];
        orchestrator.fetch_all(tasks).await;

        assert_eq!(cache.read::<Vec<u32>>("courses"), Some(vec![1, 2]));
        assert_eq!(cache.read::<Vec<u32>>("users"), None);
    }

    #[tokio::test]
    async fn test_uncached_task_ignores_cache() {
        let cache = test_cache();
        cache.write("courses", &vec![7u32]);
        let orchestrator = Orchestrator::new().with_cache(cache);

        let report = orchestrator
            .fetch_all(vec![FetchTask::new("courses", ok_after(0, vec![1]))])
            .await;
        assert_eq!(report.get("courses").unwrap().value, vec![1]);
        assert!(!report.get("courses").unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_missing_or_broken_fallback_is_unusable() {
        let tasks = vec![
            FetchTask::new("users", transport_failure()),
            FetchTask::new("courses", transport_failure()).with_fallback(|| {
                Err(FallbackError::Synthesis {
                    key: "courses".to_string(),
                    reason: "no template".to_string(),
                })
            }),
            FetchTask::new("categories", transport_failure())
                .with_fallback(|| panic!("generator bug")),
        ];

        let report = Orchestrator::new().fetch_all(tasks).await;

        assert!(report.results.is_empty());
        assert_eq!(report.failures.len(), 3);
        assert!(!report.is_complete());
        assert!(report.all_failed());
        assert!(report.failures[2].fallback_error.contains("panicked"));
    }

    #[test]
    fn test_all_failed_with_fallbacks() {
        let report = tokio_test::block_on(Orchestrator::new().fetch_all(vec![
            FetchTask::new("a", transport_failure()).with_fallback(|| Ok(vec![1])),
            FetchTask::new("b", transport_failure()).with_fallback(|| Ok(vec![2])),
        ]));
        assert!(report.all_failed());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_empty_task_list() {
        let report = Orchestrator::new()
            .fetch_all(Vec::<FetchTask<'_, Vec<u32>>>::new())
            .await;
        assert!(report.results.is_empty());
        assert!(!report.all_failed());
        assert!(!report.is_degraded());
    }
}
