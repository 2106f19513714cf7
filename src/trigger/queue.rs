//! Pending build trigger queue
//!
//! Watchers enqueue build urls; a single worker dispatches them in
//! not-before order. Enqueueing a url that is already pending collapses
//! to one entry at the earlier time, so a burst of commits produces one
//! build. Failed dispatches re-enter the queue with a delay instead of
//! blocking everything behind them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{Crumb, TriggerClient, TriggerResponse, origin_of};

/// Delay before retrying a failed trigger
const RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct PendingBuild {
    url: String,
    not_before: Instant,
}

/// State behind the queue lock. The pending list and the crumb cache
/// move together because a dispatch touches both.
struct QueueInner {
    /// Sorted by `not_before` ascending; ties keep insertion order
    pending: Vec<PendingBuild>,
    /// Origin to crumb; a cached `None` means the origin issues no crumbs
    crumbs: HashMap<String, Option<Crumb>>,
}

enum NextStep {
    Dispatch(PendingBuild),
    WaitUntil(Instant),
    WaitForWork,
}

/// Queue of pending build triggers with one dispatch worker
pub struct BuildTriggerQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl BuildTriggerQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                pending: Vec::new(),
                crumbs: HashMap::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue a build trigger for immediate dispatch
    pub async fn enqueue(&self, url: &str) {
        self.enqueue_at(url, Instant::now()).await;
    }

    /// Enqueue a build trigger that must not dispatch before `not_before`
    pub async fn enqueue_at(&self, url: &str, not_before: Instant) {
        debug!(%url, "BuildTriggerQueue::enqueue_at: called");
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.pending.iter().position(|p| p.url == url) {
            if inner.pending[existing].not_before <= not_before {
                debug!(%url, "Already queued no later; keeping existing entry");
                return;
            }
            inner.pending.remove(existing);
        }

        let index = inner
            .pending
            .iter()
            .position(|p| p.not_before > not_before)
            .unwrap_or(inner.pending.len());
        inner.pending.insert(
            index,
            PendingBuild {
                url: url.to_string(),
                not_before,
            },
        );
        let head_changed = index == 0;
        drop(inner);

        // Only a new head can move the worker's wake-up earlier.
        if head_changed {
            self.notify.notify_one();
        }
    }

    /// Urls currently pending, earliest first
    pub async fn pending_urls(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.pending.iter().map(|p| p.url.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.pending.is_empty()
    }

    /// Run the dispatch worker until cancelled. One trigger is in flight
    /// at a time; the worker sleeps until the head entry is due and wakes
    /// early when an earlier entry arrives. Cancellation wins over queued
    /// work: due entries are dropped, not drained.
    pub async fn run(self: Arc<Self>, client: Arc<dyn TriggerClient>, cancel: CancellationToken) {
        info!("Build trigger worker started");
        while !cancel.is_cancelled() {
            let step = {
                let mut inner = self.inner.lock().await;
                match inner.pending.first().map(|p| p.not_before) {
                    Some(due) if due <= Instant::now() => NextStep::Dispatch(inner.pending.remove(0)),
                    Some(due) => NextStep::WaitUntil(due),
                    None => NextStep::WaitForWork,
                }
            };

            match step {
                NextStep::Dispatch(build) => {
                    // An in-flight dispatch is abandoned on cancellation.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.dispatch(build.url, client.as_ref()) => {}
                    }
                }
                NextStep::WaitUntil(due) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep_until(due) => {}
                    }
                }
                NextStep::WaitForWork => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
        info!("Build trigger worker stopped");
    }

    async fn dispatch(&self, url: String, client: &dyn TriggerClient) {
        let origin = match origin_of(&url) {
            Ok(origin) => origin,
            Err(e) => {
                // A url that never parses will never dispatch; drop it.
                warn!(%url, error = %e, "Dropping unparsable build url");
                return;
            }
        };

        let crumb = self.crumb_for(&origin, client).await;

        match client.start_build(&url, crumb.as_ref()).await {
            Ok(TriggerResponse::Started) => {
                info!(%url, "Build triggered");
            }
            Ok(TriggerResponse::Missing) => {
                info!(%url, "Build job not found; dropping trigger");
            }
            Ok(TriggerResponse::NotBuildable) => {
                info!(%url, "Build job is not buildable; dropping trigger");
            }
            Ok(TriggerResponse::Forbidden) => {
                warn!(%url, %origin, "Crumb rejected; refreshing and retrying");
                self.invalidate_crumb(&origin).await;
                self.enqueue(&url).await;
            }
            Ok(TriggerResponse::Failed { status, body }) => {
                warn!(
                    %url,
                    status,
                    body = %body.lines().next().unwrap_or_default(),
                    "Build trigger failed; retrying in {}s",
                    RETRY_DELAY.as_secs()
                );
                self.enqueue_at(&url, Instant::now() + RETRY_DELAY).await;
            }
            Err(e) => {
                warn!(%url, error = %e, "Build trigger request error; retrying in {}s", RETRY_DELAY.as_secs());
                self.enqueue_at(&url, Instant::now() + RETRY_DELAY).await;
            }
        }
    }

    /// Cached crumb for an origin, fetching on first use. A fetch error
    /// leaves the cache untouched and sends this trigger bare.
    async fn crumb_for(&self, origin: &str, client: &dyn TriggerClient) -> Option<Crumb> {
        {
            let inner = self.inner.lock().await;
            if let Some(cached) = inner.crumbs.get(origin) {
                return cached.clone();
            }
        }
        match client.fetch_crumb(origin).await {
            Ok(crumb) => {
                let mut inner = self.inner.lock().await;
                inner.crumbs.insert(origin.to_string(), crumb.clone());
                crumb
            }
            Err(e) => {
                warn!(%origin, error = %e, "Failed to fetch crumb; sending trigger without one");
                None
            }
        }
    }

    async fn invalidate_crumb(&self, origin: &str) {
        self.inner.lock().await.crumbs.remove(origin);
    }
}

impl Default for BuildTriggerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::client::TriggerError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Trigger client that replays scripted responses and records calls
    #[derive(Default)]
    struct ScriptedTrigger {
        responses: StdMutex<VecDeque<TriggerResponse>>,
        crumbs: StdMutex<VecDeque<Option<Crumb>>>,
        calls: StdMutex<Vec<(String, Option<Crumb>)>>,
        crumb_fetches: AtomicUsize,
    }

    impl ScriptedTrigger {
        fn with_responses(responses: Vec<TriggerResponse>) -> Arc<Self> {
            let scripted = Self::default();
            *scripted.responses.lock().unwrap() = responses.into();
            Arc::new(scripted)
        }

        fn push_crumb(&self, crumb: Option<Crumb>) {
            self.crumbs.lock().unwrap().push_back(crumb);
        }

        fn calls(&self) -> Vec<(String, Option<Crumb>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TriggerClient for ScriptedTrigger {
        async fn fetch_crumb(&self, _origin: &str) -> Result<Option<Crumb>, TriggerError> {
            self.crumb_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.crumbs.lock().unwrap().pop_front().unwrap_or(None))
        }

        async fn start_build(
            &self,
            url: &str,
            crumb: Option<&Crumb>,
        ) -> Result<TriggerResponse, TriggerError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), crumb.cloned()));
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TriggerResponse::Started))
        }
    }

    fn crumb(value: &str) -> Crumb {
        Crumb {
            field: "Jenkins-Crumb".to_string(),
            value: value.to_string(),
        }
    }

    const URL: &str = "http://ci.example.com/job/app/build";

    #[tokio::test]
    async fn test_duplicate_enqueue_keeps_earlier_time() {
        let queue = BuildTriggerQueue::new();
        let now = Instant::now();

        queue.enqueue_at(URL, now + Duration::from_secs(10)).await;
        queue.enqueue_at(URL, now + Duration::from_secs(1)).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.inner.lock().await.pending[0].not_before, now + Duration::from_secs(1));

        // The later request does not push the entry back.
        queue.enqueue_at(URL, now + Duration::from_secs(30)).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.inner.lock().await.pending[0].not_before, now + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_entries_ordered_by_time() {
        let queue = BuildTriggerQueue::new();
        let now = Instant::now();

        queue.enqueue_at("http://ci.example.com/job/b/build", now + Duration::from_secs(5)).await;
        queue.enqueue_at("http://ci.example.com/job/a/build", now + Duration::from_secs(1)).await;
        queue.enqueue_at("http://ci.example.com/job/c/build", now + Duration::from_secs(9)).await;

        assert_eq!(
            queue.pending_urls().await,
            vec![
                "http://ci.example.com/job/a/build".to_string(),
                "http://ci.example.com/job/b/build".to_string(),
                "http://ci.example.com/job/c/build".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_dispatches_and_idles() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = ScriptedTrigger::with_responses(vec![TriggerResponse::Started]);
        let cancel = CancellationToken::new();

        queue.enqueue(URL).await;
        let worker = tokio::spawn(queue.clone().run(client.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.calls().len(), 1);
        assert!(queue.is_empty().await);

        cancel.cancel();
        worker.await.expect("worker should stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_refreshes_crumb_and_retries() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = ScriptedTrigger::with_responses(vec![
            TriggerResponse::Forbidden,
            TriggerResponse::Started,
        ]);
        client.push_crumb(Some(crumb("stale")));
        client.push_crumb(Some(crumb("fresh")));
        let cancel = CancellationToken::new();

        queue.enqueue(URL).await;
        let worker = tokio::spawn(queue.clone().run(client.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, Some(crumb("stale")));
        assert_eq!(calls[1].1, Some(crumb("fresh")));
        assert_eq!(client.crumb_fetches.load(Ordering::SeqCst), 2);

        cancel.cancel();
        worker.await.expect("worker should stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_requeues_with_delay() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = ScriptedTrigger::with_responses(vec![
            TriggerResponse::Failed {
                status: 503,
                body: "overloaded".to_string(),
            },
            TriggerResponse::Started,
        ]);
        let cancel = CancellationToken::new();

        queue.enqueue(URL).await;
        let worker = tokio::spawn(queue.clone().run(client.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.calls().len(), 1);
        assert_eq!(queue.len().await, 1);

        // After the retry delay the worker tries again and succeeds.
        tokio::time::sleep(RETRY_DELAY + Duration::from_millis(10)).await;
        assert_eq!(client.calls().len(), 2);
        assert!(queue.is_empty().await);
        // Second dispatch reuses the cached crumb answer.
        assert_eq!(client.crumb_fetches.load(Ordering::SeqCst), 1);

        cancel.cancel();
        worker.await.expect("worker should stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_buildable_completes_without_retry() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = ScriptedTrigger::with_responses(vec![TriggerResponse::NotBuildable]);
        let cancel = CancellationToken::new();

        queue.enqueue(URL).await;
        let worker = tokio::spawn(queue.clone().run(client.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.calls().len(), 1);
        assert!(queue.is_empty().await);

        cancel.cancel();
        worker.await.expect("worker should stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparsable_url_is_dropped() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = Arc::new(ScriptedTrigger::default());
        let cancel = CancellationToken::new();

        queue.enqueue("not a url").await;
        let worker = tokio::spawn(queue.clone().run(client.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.calls().is_empty());
        assert!(queue.is_empty().await);

        cancel.cancel();
        worker.await.expect("worker should stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_worker_exits_without_draining_backlog() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = Arc::new(ScriptedTrigger::default());
        let cancel = CancellationToken::new();

        queue.enqueue("http://ci.example.com/job/a/build").await;
        queue.enqueue("http://ci.example.com/job/b/build").await;
        queue.enqueue("http://ci.example.com/job/c/build").await;
        cancel.cancel();

        queue.clone().run(client.clone(), cancel).await;
        assert!(client.calls().is_empty());
        assert_eq!(queue.len().await, 3);
    }

    /// Trigger client that rejects every crumb, pacing each call like a
    /// real round trip so the reject-and-requeue cycle moves through time
    struct ForbiddenServer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TriggerClient for ForbiddenServer {
        async fn fetch_crumb(&self, _origin: &str) -> Result<Option<Crumb>, TriggerError> {
            Ok(None)
        }

        async fn start_build(
            &self,
            _url: &str,
            _crumb: Option<&Crumb>,
        ) -> Result<TriggerResponse, TriggerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(TriggerResponse::Forbidden)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_forbidden_retry_loop() {
        let queue = Arc::new(BuildTriggerQueue::new());
        let client = Arc::new(ForbiddenServer {
            calls: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();

        queue.enqueue(URL).await;
        let worker = tokio::spawn(queue.clone().run(client.clone(), cancel.clone()));

        // A server that answers 403 forever keeps the entry due-now.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.calls.load(Ordering::SeqCst) >= 2);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker should stop promptly after cancellation")
            .expect("worker should not panic");
    }
}
