//! The self-scheduling polling lifecycle.
//!
//! A [`PollingController`] owns one widget declaration.  [`start`] validates
//! it once and then runs cycles forever:
//!
//! ```text
//! Idle ─start─► Validating ─ok─► Fetching ─► Settling ─► Scheduled ─┐
//!                   │               ▲                                │
//!                   │ invalid       └──────────── timer fires ───────┘
//!                   ▼
//!                Stopped ◄──────────── stop() from any phase
//! ```
//!
//! Every cycle publishes exactly one [`DisplayState`] through the host
//! callback, whether the fetch worked or not, and then schedules the next
//! cycle `interval` later.  There is no backoff: a failing widget retries at
//! its normal pace and recovers on the first success.
//!
//! ## Cancellation
//!
//! The pending timer is an owned [`PollHandle`].  [`stop`] aborts it before
//! returning.  A fetch that is already in flight is left to finish, but its
//! result is dropped on the floor: publishing and scheduling both happen
//! under the same lock that [`stop`] takes, and both check the phase first.
//! Once [`stop`] returns the callback will not be called again.
//!
//! [`start`]: PollingController::start
//! [`stop`]: PollingController::stop

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{self, WidgetConfig};
use crate::source::DataSource;
use crate::state::{DisplayState, FailureCause};

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Constructed, not started.
    Idle,
    /// Checking the declaration.
    Validating,
    /// Waiting on the data source.
    Fetching,
    /// Turning a fetch outcome into a [`DisplayState`].
    Settling,
    /// Waiting for the next cycle's timer.
    Scheduled,
    /// Torn down; nothing further will happen.
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("controller can only be started once (currently {0})")]
    NotIdle(Phase),

    #[error("controller must be started from within a tokio runtime")]
    NoRuntime,
}

/// Receives every published state.
///
/// Runs while the controller's lock is held, so it must be quick and must
/// not call back into the controller that invoked it.
pub type Publish = Box<dyn Fn(DisplayState) + Send + Sync>;

/// The pending "run the next cycle" timer.
///
/// Exactly one exists while a controller is [`Phase::Scheduled`].  It is
/// consumed when the timer fires and aborted by
/// [`PollingController::stop`].
#[derive(Debug)]
pub struct PollHandle {
    task: AbortHandle,
    due: Instant,
}

impl PollHandle {
    /// When the next cycle is due to start.
    pub fn due(&self) -> Instant {
        self.due
    }

    fn cancel(self) {
        self.task.abort();
    }
}

/// Drives one widget: validate once, then fetch, settle, publish and
/// reschedule until stopped.
///
/// Dropping the controller stops it.
pub struct PollingController<S: DataSource> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    declaration: Value,
    config: OnceLock<WidgetConfig>,
    source: S,
    publish: Publish,
    shared: Mutex<Shared>,
}

struct Shared {
    phase: Phase,
    next_generation: u64,
    latest: DisplayState,
    timer: Option<PollHandle>,
}

impl<S: DataSource> PollingController<S> {
    /// Create an idle controller for `declaration`.
    ///
    /// Nothing is validated or fetched until [`start`](Self::start).
    pub fn new<F>(declaration: Value, source: S, publish: F) -> Self
    where
        F: Fn(DisplayState) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                declaration,
                config: OnceLock::new(),
                source,
                publish: Box::new(publish),
                shared: Mutex::new(Shared {
                    phase: Phase::Idle,
                    next_generation: 1,
                    latest: DisplayState::loading(),
                    timer: None,
                }),
            }),
        }
    }

    /// Validate the declaration and, if it is sound, begin polling.
    ///
    /// An invalid declaration is not an error here: it publishes a single
    /// failed state and leaves the controller stopped.  Outside a tokio
    /// runtime it fails with [`PollError::NoRuntime`] and stays idle.
    pub fn start(&self) -> Result<(), PollError> {
        let mut shared = self.inner.lock();
        if shared.phase != Phase::Idle {
            return Err(PollError::NotIdle(shared.phase));
        }
        let runtime = Handle::try_current().map_err(|_| PollError::NoRuntime)?;
        shared.phase = Phase::Validating;

        match config::validate(&self.inner.declaration) {
            Err(err) => {
                warn!(error = %err, "rejecting widget declaration");
                self.inner.emit(&mut shared, |generation| {
                    DisplayState::failed(generation, FailureCause::InvalidConfig)
                });
                shared.phase = Phase::Stopped;
            }
            Ok(config) => {
                info!(
                    title = %config.title,
                    source = self.inner.source.name(),
                    interval_ms = config.interval.as_millis() as u64,
                    "starting widget"
                );
                // `start` runs at most once per controller.
                let _ = self.inner.config.set(config);
                shared.phase = Phase::Fetching;
                runtime.spawn(Inner::run_cycle(Arc::clone(&self.inner)));
            }
        }
        Ok(())
    }

    /// Stop polling.
    ///
    /// Cancels the pending timer, if any, before returning.  Safe to call
    /// any number of times, from any phase.
    pub fn stop(&self) {
        let mut shared = self.inner.lock();
        if shared.phase == Phase::Stopped {
            return;
        }
        let was = shared.phase;
        shared.phase = Phase::Stopped;
        if let Some(timer) = shared.timer.take() {
            timer.cancel();
        }
        info!(from = %was, "widget stopped");
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Whether the controller will still publish.
    pub fn is_active(&self) -> bool {
        !matches!(self.phase(), Phase::Idle | Phase::Stopped)
    }

    /// The most recently published state ([`DisplayState::loading`] before
    /// the first publication).
    pub fn latest(&self) -> DisplayState {
        self.inner.lock().latest.clone()
    }

    /// The validated configuration, once [`start`](Self::start) accepted it.
    pub fn config(&self) -> Option<&WidgetConfig> {
        self.inner.config.get()
    }

    /// When the next cycle is due, if one is scheduled.
    pub fn next_due(&self) -> Option<Instant> {
        self.inner.lock().timer.as_ref().map(PollHandle::due)
    }
}

impl<S: DataSource> Drop for PollingController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S: DataSource> Inner<S> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue the next generation, record the state and hand it to the host.
    fn emit(&self, shared: &mut Shared, build: impl FnOnce(u64) -> DisplayState) {
        let state = build(shared.next_generation);
        shared.next_generation += 1;
        shared.latest = state.clone();
        (self.publish)(state);
    }

    /// Fetch → Settling → Scheduled.
    async fn run_cycle(self: Arc<Self>) {
        let Some(config) = self.config.get() else {
            return;
        };

        let outcome = self.source.fetch(config).await;

        let mut shared = self.lock();
        if shared.phase != Phase::Fetching {
            debug!(title = %config.title, "discarding result fetched after stop");
            return;
        }

        shared.phase = Phase::Settling;
        match outcome {
            Ok(value) => {
                debug!(title = %config.title, value, "cycle succeeded");
                self.emit(&mut shared, |generation| DisplayState::ready(generation, value));
            }
            Err(err) => {
                warn!(title = %config.title, error = %err, "cycle failed, retrying next interval");
                let cause = err.cause();
                self.emit(&mut shared, |generation| DisplayState::failed(generation, cause));
            }
        }

        shared.timer = Some(Self::schedule(&self, config.interval));
        shared.phase = Phase::Scheduled;
    }

    /// Arm the timer for the next cycle.
    fn schedule(this: &Arc<Self>, interval: Duration) -> PollHandle {
        let due = Instant::now() + interval;
        let inner = Arc::clone(this);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(due).await;
            {
                let mut shared = inner.lock();
                if shared.phase != Phase::Scheduled {
                    return;
                }
                // This task is the timer; firing consumes it.
                shared.timer = None;
                shared.phase = Phase::Fetching;
            }
            inner.run_cycle().await;
        });
        debug!(in_ms = interval.as_millis() as u64, "next cycle scheduled");
        PollHandle {
            task: task.abort_handle(),
            due,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::time::sleep;

    use super::*;
    use crate::source::TransportError;
    use crate::state::Status;

    /// Plays back a fixed list of outcomes, each after an optional delay.
    struct ScriptedSource {
        script: Mutex<VecDeque<(Duration, Result<u64, TransportError>)>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<(u64, Result<u64, TransportError>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(
                    steps
                        .into_iter()
                        .map(|(ms, outcome)| (Duration::from_millis(ms), outcome))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn immediate(outcomes: Vec<Result<u64, TransportError>>) -> Arc<Self> {
            Self::new(outcomes.into_iter().map(|o| (0, o)).collect())
        }
    }

    impl DataSource for Arc<ScriptedSource> {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(
            &self,
            _config: &WidgetConfig,
        ) -> impl Future<Output = Result<u64, TransportError>> + Send {
            let this = Arc::clone(self);
            async move {
                this.calls.fetch_add(1, Ordering::SeqCst);
                let now = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                this.max_in_flight.fetch_max(now, Ordering::SeqCst);

                let step = this.script.lock().unwrap().pop_front();
                let (delay, outcome) = step.unwrap_or((
                    Duration::ZERO,
                    Err(TransportError::Network("script exhausted".into())),
                ));
                if !delay.is_zero() {
                    sleep(delay).await;
                }

                this.in_flight.fetch_sub(1, Ordering::SeqCst);
                outcome
            }
        }
    }

    type Published = Arc<Mutex<Vec<DisplayState>>>;

    fn build(
        declaration: Value,
        source: &Arc<ScriptedSource>,
    ) -> (PollingController<Arc<ScriptedSource>>, Published) {
        let published = Published::default();
        let sink = Arc::clone(&published);
        let controller = PollingController::new(declaration, Arc::clone(source), move |state| {
            sink.lock().unwrap().push(state)
        });
        (controller, published)
    }

    fn declaration() -> Value {
        json!({
            "url": "https://es.example.com",
            "index": "logs",
            "query": "level:error",
            "interval": 1000,
        })
    }

    fn network() -> Result<u64, TransportError> {
        Err(TransportError::Network("connection refused".into()))
    }

    fn snapshot(published: &Published) -> Vec<(Status, Option<u64>, u64)> {
        published
            .lock()
            .unwrap()
            .iter()
            .map(|s| (s.status(), s.value(), s.generation()))
            .collect()
    }

    async fn ms(n: u64) {
        sleep(Duration::from_millis(n)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_each_cycle_at_interval() {
        let source = ScriptedSource::immediate(vec![Ok(42), Ok(57)]);
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(10).await;
        assert_eq!(snapshot(&published), vec![(Status::Ready, Some(42), 1)]);
        assert_eq!(controller.phase(), Phase::Scheduled);

        ms(500).await;
        assert_eq!(snapshot(&published).len(), 1, "nothing before the interval elapses");

        ms(500).await;
        assert_eq!(
            snapshot(&published),
            vec![(Status::Ready, Some(42), 1), (Status::Ready, Some(57), 2)]
        );
        assert_eq!(controller.latest(), DisplayState::ready(2, 57));

        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_indefinitely() {
        let source = ScriptedSource::immediate((0..20).map(Ok).collect());
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(10_500).await;
        controller.stop();

        let generations: Vec<u64> = snapshot(&published).iter().map(|s| s.2).collect();
        assert_eq!(generations, (1..=11).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_declaration_fails_once_and_stops() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let mut raw = declaration();
        raw["url"] = json!("not-a-url");
        let (controller, published) = build(raw, &source);

        controller.start().unwrap();
        assert_eq!(controller.phase(), Phase::Stopped);
        assert!(controller.next_due().is_none());
        assert!(controller.config().is_none());

        ms(5_000).await;
        assert_eq!(snapshot(&published), vec![(Status::Failed, None, 1)]);
        assert_eq!(
            published.lock().unwrap()[0].cause(),
            Some(FailureCause::InvalidConfig)
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0, "never fetched");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_rejected() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let mut raw = declaration();
        raw["interval"] = json!(0);
        let (controller, published) = build(raw, &source);

        controller.start().unwrap();
        ms(100).await;
        assert_eq!(snapshot(&published), vec![(Status::Failed, None, 1)]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_failed_cycle() {
        let source = ScriptedSource::immediate(vec![network(), Ok(10)]);
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(10).await;
        assert_eq!(snapshot(&published), vec![(Status::Failed, None, 1)]);
        assert_eq!(
            controller.latest().cause(),
            Some(FailureCause::Network)
        );
        assert_eq!(controller.phase(), Phase::Scheduled, "failure still reschedules");

        ms(1_000).await;
        assert_eq!(
            snapshot(&published),
            vec![(Status::Failed, None, 1), (Status::Ready, Some(10), 2)]
        );
        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_is_discarded_after_stop() {
        // Second fetch takes 500ms, so it is still running 200ms into the
        // second interval.
        let source = ScriptedSource::new(vec![(0, Ok(1)), (500, Ok(2)), (0, Ok(3))]);
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(1_200).await;
        assert_eq!(controller.phase(), Phase::Fetching);

        controller.stop();
        assert_eq!(controller.phase(), Phase::Stopped);

        ms(10_000).await;
        assert_eq!(snapshot(&published), vec![(Status::Ready, Some(1), 1)]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(controller.next_due().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_timer() {
        let source = ScriptedSource::immediate(vec![Ok(1), Ok(2)]);
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(200).await;
        assert!(controller.next_due().is_some());

        controller.stop();
        assert!(controller.next_due().is_none());

        ms(5_000).await;
        assert_eq!(snapshot(&published).len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(10).await;
        controller.stop();
        controller.stop();
        controller.stop();

        assert_eq!(controller.phase(), Phase::Stopped);
        assert!(!controller.is_active());
        assert_eq!(snapshot(&published).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_prevents_starting() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let (controller, published) = build(declaration(), &source);

        controller.stop();
        assert_eq!(controller.start(), Err(PollError::NotIdle(Phase::Stopped)));

        ms(2_000).await;
        assert!(snapshot(&published).is_empty());
        assert_eq!(controller.latest(), DisplayState::loading());
    }

    #[test]
    fn start_outside_runtime_is_rejected() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let (controller, published) = build(declaration(), &source);

        assert_eq!(controller.start(), Err(PollError::NoRuntime));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.config().is_none());
        assert!(snapshot(&published).is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let (controller, _published) = build(declaration(), &source);

        controller.start().unwrap();
        assert!(controller.is_active());
        assert!(matches!(controller.start(), Err(PollError::NotIdle(_))));
        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_never_overlap() {
        // Each fetch outlasts the interval.
        let source = ScriptedSource::new((0..10).map(|n| (1_500, Ok(n))).collect());
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(12_000).await;
        controller.stop();

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        // A cycle every 1500ms fetch + 1000ms interval.
        assert_eq!(snapshot(&published).len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_controller_stops_it() {
        let source = ScriptedSource::immediate(vec![Ok(1), Ok(2)]);
        let (controller, published) = build(declaration(), &source);

        controller.start().unwrap();
        ms(10).await;
        drop(controller);

        ms(5_000).await;
        assert_eq!(snapshot(&published).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn next_due_tracks_interval() {
        let source = ScriptedSource::immediate(vec![Ok(1)]);
        let (controller, _published) = build(declaration(), &source);

        let started = Instant::now();
        controller.start().unwrap();
        ms(10).await;

        let due = controller.next_due().unwrap();
        assert_eq!(due - started, Duration::from_millis(1_000));
        controller.stop();
    }
}
