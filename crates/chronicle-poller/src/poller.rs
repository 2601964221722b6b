//! Poll loops over an event store's type index.
//!
//! Each event type gets its own task and its own cursor. A loop reads the
//! next page after its cursor, hands a non-empty page to the handler and
//! moves the cursor to the page's `latest` timestamp. A failed read or
//! handler call leaves the cursor where it was and waits an exponentially
//! growing delay before trying again.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::EventTypeTag;
use chronicle_core::store::EventStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::handler::EventHandler;

/// Records requested per poll.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Delay between successful polls, and the first retry delay.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
/// Upper bound on the retry delay.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);
/// How far behind "now" a fresh poller starts reading.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(1);

/// Tuning for every poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Records requested per poll.
    pub batch_size: usize,
    /// Delay after a successful poll; also the first retry delay.
    pub interval: Duration,
    /// Cap on the retry delay.
    pub max_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

impl PollerConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.interval)
            .with_max_delay(self.max_interval)
            .with_max_times(usize::MAX)
    }
}

/// Picks the sleep that follows each poll of one loop.
///
/// A success always yields the base interval and restarts the backoff, so
/// the first failure after a success waits the base interval again.
struct Pacer {
    config: PollerConfig,
    builder: ExponentialBuilder,
    backoff: ExponentialBackoff,
}

impl Pacer {
    fn new(config: PollerConfig) -> Self {
        let builder = config.backoff();
        Self {
            config,
            backoff: builder.build(),
            builder,
        }
    }

    fn after_success(&mut self) -> Duration {
        self.backoff = self.builder.build();
        self.config.interval
    }

    fn after_failure(&mut self) -> Duration {
        self.backoff.next().unwrap_or(self.config.max_interval)
    }
}

/// Cursor a poller starts from when it has no saved position: one lookback
/// period before now.
#[must_use]
pub fn default_start_cursor(clock: &dyn Clock) -> i64 {
    let lookback = i64::try_from(DEFAULT_LOOKBACK.as_millis()).unwrap_or(i64::MAX);
    clock.now_millis().saturating_sub(lookback).max(0)
}

/// Reads one page of `type_tag` after `cursor` and hands it to `handler`.
///
/// Returns the cursor to use next: the page's `latest` if it held records,
/// otherwise `cursor` unchanged.
///
/// # Errors
///
/// Returns the store's or the handler's error; the cursor is not advanced.
pub async fn poll_once(
    store: &dyn EventStore,
    handler: &dyn EventHandler,
    type_tag: EventTypeTag,
    cursor: i64,
    batch_size: usize,
) -> Result<i64, DomainError> {
    let batch = store
        .get_events_by_type(type_tag, cursor, batch_size)
        .await?;
    if batch.is_empty() {
        debug!(%type_tag, cursor, "no new events");
        return Ok(cursor);
    }
    handler.handle(type_tag, &batch.events).await?;
    info!(
        %type_tag,
        from = cursor,
        to = batch.latest,
        events = batch.events.len(),
        "cursor advanced"
    );
    Ok(batch.latest)
}

/// Spawns and supervises one poll loop per event type.
#[derive(Clone)]
pub struct ChangeFeedPoller {
    store: Arc<dyn EventStore>,
    handler: Arc<dyn EventHandler>,
    config: PollerConfig,
}

impl std::fmt::Debug for ChangeFeedPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeedPoller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChangeFeedPoller {
    /// Creates a poller reading from `store` and delivering to `handler`.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        handler: Arc<dyn EventHandler>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            handler,
            config,
        }
    }

    /// Starts one loop per tag in `tags`, each beginning at `start_cursor`.
    #[must_use]
    pub fn spawn(&self, tags: &[EventTypeTag], start_cursor: i64) -> PollerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let tasks = tags
            .iter()
            .map(|&type_tag| {
                let task = tokio::spawn(run_loop(
                    Arc::clone(&self.store),
                    Arc::clone(&self.handler),
                    self.config,
                    type_tag,
                    start_cursor,
                    cancel_rx.clone(),
                ));
                (type_tag, task)
            })
            .collect();
        PollerHandle {
            cancel: cancel_tx,
            tasks,
        }
    }
}

/// Handle to running poll loops.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    tasks: Vec<(EventTypeTag, JoinHandle<i64>)>,
}

impl PollerHandle {
    /// Signals every loop to stop. Loops exit at their next await point.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }

    /// Stops every loop and waits for it, returning each loop's final
    /// cursor. A loop that panicked is logged and left out.
    pub async fn shutdown(self) -> BTreeMap<EventTypeTag, i64> {
        self.stop();
        let mut cursors = BTreeMap::new();
        for (type_tag, task) in self.tasks {
            match task.await {
                Ok(cursor) => {
                    cursors.insert(type_tag, cursor);
                }
                Err(err) => error!(%type_tag, error = %err, "poll loop did not finish cleanly"),
            }
        }
        cursors
    }
}

async fn run_loop(
    store: Arc<dyn EventStore>,
    handler: Arc<dyn EventHandler>,
    config: PollerConfig,
    type_tag: EventTypeTag,
    mut cursor: i64,
    mut cancel: watch::Receiver<bool>,
) -> i64 {
    let mut pacer = Pacer::new(config);
    info!(%type_tag, cursor, "poll loop started");

    while !*cancel.borrow() {
        let outcome = tokio::select! {
            outcome = poll_once(&*store, &*handler, type_tag, cursor, config.batch_size) => outcome,
            _ = cancel.changed() => break,
        };

        let delay = match outcome {
            Ok(next) => {
                cursor = next;
                pacer.after_success()
            }
            Err(err) => {
                let delay = pacer.after_failure();
                error!(
                    %type_tag,
                    cursor,
                    error = %err,
                    transient = err.is_transient(),
                    backoff_ms = %delay.as_millis(),
                    "poll failed, retrying after backoff"
                );
                delay
            }
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => break,
        }
    }

    info!(%type_tag, cursor, "poll loop stopped");
    cursor
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chronicle_core::event::{AggregateId, EventRecord};
    use chronicle_event_store::memory_store::InMemoryEventStore;
    use chronicle_test_support::{FailingEventStore, FixedClock, FlakyEventStore};

    use super::*;

    const ADMITTED: EventTypeTag = EventTypeTag(1);
    const DISCHARGED: EventTypeTag = EventTypeTag(3);

    #[derive(Default)]
    struct RecordingHandler {
        batches: Mutex<Vec<(EventTypeTag, Vec<EventRecord>)>>,
    }

    impl RecordingHandler {
        fn delivered(&self, type_tag: EventTypeTag) -> usize {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .filter(|(tag, _)| *tag == type_tag)
                .map(|(_, events)| events.len())
                .sum()
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(
            &self,
            type_tag: EventTypeTag,
            events: &[EventRecord],
        ) -> Result<(), DomainError> {
            self.batches
                .lock()
                .unwrap()
                .push((type_tag, events.to_vec()));
            Ok(())
        }
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            batch_size: 10,
            interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(40),
        }
    }

    async fn seeded_store() -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        for n in 0..3 {
            let id = AggregateId::from(format!("p-{n}"));
            let record = EventRecord::new(id.clone(), ADMITTED, serde_json::json!({}));
            store.update(&id, 0, &[record]).await.unwrap();
        }
        store
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..300 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = PollerConfig::default();

        assert_eq!(config.batch_size, 100);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.max_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_default_start_cursor_is_one_second_in_the_past() {
        let now = chrono::DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let cursor = default_start_cursor(&FixedClock(now));

        assert_eq!(cursor, 1_699_999_999_000);
    }

    #[test]
    fn test_backoff_grows_from_interval_and_caps_at_max() {
        let delays: Vec<Duration> = fast_config().backoff().build().take(5).collect();

        assert_eq!(delays[0], Duration::from_millis(10));
        assert!(delays[1] > Duration::from_millis(19) && delays[1] < Duration::from_millis(21));
        assert_eq!(delays[3], Duration::from_millis(40));
        assert_eq!(delays[4], Duration::from_millis(40));
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(40)));
    }

    #[test]
    fn test_pacer_restarts_backoff_after_success() {
        let mut pacer = Pacer::new(fast_config());

        let first_failure = pacer.after_failure();
        let second_failure = pacer.after_failure();
        let success = pacer.after_success();
        let failure_after_success = pacer.after_failure();

        assert_eq!(first_failure, Duration::from_millis(10));
        assert!(second_failure > Duration::from_millis(19));
        assert_eq!(success, Duration::from_millis(10));
        assert_eq!(failure_after_success, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_loop_waits_base_interval_on_first_failure_after_success() {
        // Arrange: three failures grow the delay to 50, 100, 200 ms; a
        // success and one more failure must bring it back to 50 ms.
        let schedule = vec![true, true, true, false, true];
        let store = Arc::new(FlakyEventStore::with_schedule(seeded_store().await, schedule));
        let config = PollerConfig {
            batch_size: 10,
            interval: Duration::from_millis(50),
            max_interval: Duration::from_millis(800),
        };
        let poller = ChangeFeedPoller::new(
            store.clone(),
            Arc::new(RecordingHandler::default()),
            config,
        );

        // Act
        let handle = poller.spawn(&[ADMITTED], 0);
        wait_until(|| store.scan_times().len() >= 6).await;
        handle.shutdown().await;

        // Assert
        let times = store.scan_times();
        assert!(times.len() >= 6);
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[2] >= Duration::from_millis(200));
        assert!(gaps[3] >= Duration::from_millis(50));
        assert!(gaps[4] >= Duration::from_millis(50));
        assert!(gaps[4] < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_poll_once_advances_cursor_on_non_empty_batch() {
        // Arrange
        let store = seeded_store().await;
        let handler = RecordingHandler::default();

        // Act
        let cursor = poll_once(&store, &handler, ADMITTED, 0, 2).await.unwrap();

        // Assert
        let expected = store.get_events_by_type(ADMITTED, 0, 2).await.unwrap().latest;
        assert_eq!(cursor, expected);
        assert_eq!(handler.delivered(ADMITTED), 2);
    }

    #[tokio::test]
    async fn test_poll_once_leaves_cursor_on_empty_batch() {
        let store = seeded_store().await;
        let handler = RecordingHandler::default();

        let cursor = poll_once(&store, &handler, DISCHARGED, 42, 10).await.unwrap();

        assert_eq!(cursor, 42);
        assert_eq!(handler.delivered(DISCHARGED), 0);
    }

    #[tokio::test]
    async fn test_poll_once_propagates_store_failure() {
        let handler = RecordingHandler::default();

        let result = poll_once(&FailingEventStore, &handler, ADMITTED, 7, 10).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(handler.delivered(ADMITTED), 0);
    }

    #[tokio::test]
    async fn test_loop_retries_same_cursor_after_failures_then_recovers() {
        // Arrange
        let store = Arc::new(FlakyEventStore::new(seeded_store().await, 2));
        let handler = Arc::new(RecordingHandler::default());
        let poller = ChangeFeedPoller::new(store.clone(), handler.clone(), fast_config());

        // Act
        let handle = poller.spawn(&[ADMITTED], 0);
        wait_until(|| handler.delivered(ADMITTED) == 3).await;
        let cursors = handle.shutdown().await;

        // Assert
        assert_eq!(handler.delivered(ADMITTED), 3);
        let scans = store.scans();
        assert!(scans.len() >= 3);
        assert_eq!(&scans[..3], &[(ADMITTED, 0), (ADMITTED, 0), (ADMITTED, 0)]);
        assert!(cursors[&ADMITTED] > 0);
        assert!(scans[3..].iter().all(|&(_, since)| since == cursors[&ADMITTED]));
    }

    #[tokio::test]
    async fn test_each_tag_keeps_its_own_cursor() {
        // Arrange
        let store = seeded_store().await;
        let id = AggregateId::from("p-0");
        let record = EventRecord::new(id.clone(), DISCHARGED, serde_json::json!({}));
        store.update(&id, 1, &[record]).await.unwrap();
        let handler = Arc::new(RecordingHandler::default());
        let poller = ChangeFeedPoller::new(Arc::new(store), handler.clone(), fast_config());

        // Act
        let handle = poller.spawn(&[ADMITTED, DISCHARGED], 0);
        wait_until(|| handler.delivered(ADMITTED) == 3 && handler.delivered(DISCHARGED) == 1)
            .await;
        let cursors = handle.shutdown().await;

        // Assert
        assert_eq!(handler.delivered(ADMITTED), 3);
        assert_eq!(handler.delivered(DISCHARGED), 1);
        assert_eq!(cursors.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_sleeping_loop_promptly() {
        // Arrange
        let config = PollerConfig {
            interval: Duration::from_secs(60),
            max_interval: Duration::from_secs(60),
            ..PollerConfig::default()
        };
        let poller = ChangeFeedPoller::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(RecordingHandler::default()),
            config,
        );
        let handle = poller.spawn(&[ADMITTED], 1234);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Act
        let cursors = tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .unwrap();

        // Assert
        assert_eq!(cursors.get(&ADMITTED), Some(&1234));
    }
}
