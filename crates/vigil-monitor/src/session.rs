use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, Span, info_span};
use vigil_process::{
    Capability, Lifecycle, PermissionSet, ProcessMetrics, ProcessSnapshot, SessionId, TargetId,
};

use crate::api::{MonitorApi, StatusFetch};
use crate::config::{MAX_POLL_INTERVAL, MIN_POLL_INTERVAL, MonitorConfig};
use crate::error::ApiError;
use crate::events::{EventSender, LogResetReason, SessionEvent};
use crate::gateway::ActionGateway;
use crate::log_cursor::LogCursor;
use crate::reconcile::{UiDelta, reconcile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// The status fetch failed; nothing was published.
    Skipped,
    /// The target no longer exists and the session has halted.
    Gone,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) cursor: LogCursor,
    pub(crate) last_snapshot: Option<ProcessSnapshot>,
    last_delta: Option<UiDelta>,
    last_metrics: Option<ProcessMetrics>,
    metrics_stale: bool,
    pub(crate) port_editing: bool,
}

impl SessionState {
    pub(crate) fn status(&self) -> Lifecycle {
        self.last_snapshot
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(Lifecycle::Unknown)
    }
}

pub(crate) struct SessionCore {
    id: SessionId,
    pub(crate) target: TargetId,
    pub(crate) api: Arc<dyn MonitorApi>,
    can_view_logs: bool,
    period: Duration,
    events: EventSender,
    pub(crate) span: Span,
    /// Held for a whole cycle, so at most one cycle runs at a time.
    pub(crate) state: Mutex<SessionState>,
    active: AtomicBool,
    gone: AtomicBool,
    follow_logs: AtomicBool,
    pub(crate) action_in_flight: AtomicBool,
    timer: StdMutex<Option<watch::Sender<bool>>>,
}

impl SessionCore {
    pub(crate) fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.events.send(event);
    }

    pub(crate) fn is_gone(&self) -> bool {
        self.gone.load(Ordering::Acquire)
    }

    pub(crate) async fn run_cycle(&self) -> CycleOutcome {
        self.cycle().instrument(self.span.clone()).await
    }

    async fn cycle(&self) -> CycleOutcome {
        let mut state = self.state.lock().await;
        if self.is_gone() {
            return CycleOutcome::Gone;
        }

        let mut snapshot = match self.api.status(&self.target).await {
            Ok(StatusFetch::Found(s)) => s,
            Ok(StatusFetch::NotFound) => {
                *state = SessionState::default();
                drop(state);
                self.mark_gone();
                return CycleOutcome::Gone;
            }
            Err(e) => {
                tracing::warn!(error = %e, "status fetch failed; will retry next cycle");
                return CycleOutcome::Skipped;
            }
        };

        self.refresh_metrics(&mut state, &mut snapshot).await;
        let previous = state.last_snapshot.replace(snapshot);
        self.publish(&mut state, previous.as_ref());

        if self.follow_logs.load(Ordering::Acquire) && self.can_view_logs {
            self.pull_logs(&mut state).await;
        }

        CycleOutcome::Completed
    }

    /// Fetches lines after the cursor and emits any that survive sanitizing.
    /// Returns false when the fetch failed.
    async fn pull_logs(&self, state: &mut SessionState) -> bool {
        match state.cursor.pull(self.api.as_ref(), &self.target).await {
            Ok(lines) => {
                if !lines.is_empty() {
                    self.emit(SessionEvent::LogLines(lines));
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, cursor = state.cursor.position(), "log fetch failed");
                false
            }
        }
    }

    async fn reload_logs(&self) -> bool {
        if !self.can_view_logs {
            return false;
        }
        let mut state = self.state.lock().await;
        if self.is_gone() {
            return false;
        }
        self.pull_logs(&mut state).await
    }

    async fn refresh_metrics(&self, state: &mut SessionState, snapshot: &mut ProcessSnapshot) {
        if !snapshot.status.is_running() {
            state.last_metrics = None;
            state.metrics_stale = false;
            snapshot.metrics = ProcessMetrics::default();
            return;
        }

        match self.api.metrics(&self.target).await {
            Ok(metrics) => {
                snapshot.metrics = metrics;
                state.last_metrics = Some(metrics);
                state.metrics_stale = false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "metrics fetch failed; keeping last known values");
                if let Some(metrics) = state.last_metrics {
                    snapshot.metrics = metrics;
                }
                state.metrics_stale = true;
            }
        }
    }

    /// Emits a snapshot event when the visible state differs from the last
    /// one published.
    fn publish(&self, state: &mut SessionState, previous: Option<&ProcessSnapshot>) {
        let Some(current) = state.last_snapshot.clone() else {
            return;
        };

        let mut delta = reconcile(previous, &current);
        if state.port_editing {
            delta = delta.suppress_port();
        }
        if self.action_in_flight.load(Ordering::Acquire) {
            delta = delta.lock_actions();
        }
        if state.metrics_stale {
            delta = delta.mark_metrics_stale();
        }

        if state
            .last_delta
            .as_ref()
            .is_some_and(|last| last.same_view(&delta))
        {
            return;
        }
        state.last_delta = Some(delta.clone());
        self.emit(SessionEvent::Snapshot {
            snapshot: current,
            delta,
            observed_at: chrono::Utc::now(),
        });
    }

    /// Republishes the cached snapshot after an overlay changed.
    pub(crate) fn publish_current(&self, state: &mut SessionState) {
        let previous = state.last_snapshot.clone();
        self.publish(state, previous.as_ref());
    }

    pub(crate) fn reset_log(&self, state: &mut SessionState, reason: LogResetReason) {
        state.cursor.reset();
        self.emit(SessionEvent::LogReset { reason });
    }

    fn mark_gone(&self) {
        self.gone.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.stop_timer();
        tracing::warn!("target no longer exists; polling halted");
        self.emit(SessionEvent::TargetGone {
            target: self.target.clone(),
        });
    }

    fn stop_timer(&self) {
        let sender = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(tx) = sender {
            let _ = tx.send(true);
        }
    }
}

async fn poll_loop(core: Arc<SessionCore>, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + core.period, core.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            res = stop_rx.changed() => {
                if res.is_err() {
                    break;
                }
            }
        }

        if *stop_rx.borrow() || !core.active.load(Ordering::Acquire) {
            break;
        }
        if core.cycle().await == CycleOutcome::Gone {
            break;
        }
    }

    tracing::debug!("poll loop exited");
}

/// Periodic observation of one target.
///
/// Dropping the session stops its timer.
pub struct PollSession {
    core: Arc<SessionCore>,
}

impl PollSession {
    pub fn new(
        target: TargetId,
        api: Arc<dyn MonitorApi>,
        permissions: PermissionSet,
        config: &MonitorConfig,
        events: EventSender,
    ) -> Self {
        let id = SessionId::new();
        let span = info_span!("poll_session", session = %id, target_id = %target);
        let core = SessionCore {
            id,
            target,
            api,
            can_view_logs: permissions.allows(Capability::ViewLogs),
            period: config
                .poll_interval
                .clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
            events,
            span,
            state: Mutex::new(SessionState::default()),
            active: AtomicBool::new(false),
            gone: AtomicBool::new(false),
            follow_logs: AtomicBool::new(config.follow_logs),
            action_in_flight: AtomicBool::new(false),
            timer: StdMutex::new(None),
        };
        Self {
            core: Arc::new(core),
        }
    }

    /// Fetches the caller's permissions, then builds a session and the
    /// gateway bound to it.
    pub async fn open(
        target: TargetId,
        api: Arc<dyn MonitorApi>,
        config: &MonitorConfig,
        events: EventSender,
    ) -> Result<(Self, ActionGateway), ApiError> {
        let permissions = api.permissions(&target).await?;
        let session = Self::new(target, api, permissions, config, events);
        let gateway = ActionGateway::new(&session, permissions);
        Ok((session, gateway))
    }

    pub fn id(&self) -> &SessionId {
        &self.core.id
    }

    pub fn target(&self) -> &TargetId {
        &self.core.target
    }

    pub fn is_active(&self) -> bool {
        self.core.active.load(Ordering::Acquire)
    }

    pub fn is_gone(&self) -> bool {
        self.core.is_gone()
    }

    /// Runs one cycle immediately, then every period until stopped.
    ///
    /// Returns false when already running or when the target is gone.
    pub async fn start(&self) -> bool {
        let core = &self.core;
        if core.is_gone() {
            tracing::warn!(parent: &core.span, "target is gone; not restarting polling");
            return false;
        }
        if core
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        *core.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(stop_tx);
        tracing::info!(
            parent: &core.span,
            period_ms = core.period.as_millis() as u64,
            "polling started"
        );

        if core.run_cycle().await == CycleOutcome::Gone {
            return false;
        }
        if *stop_rx.borrow() {
            return true;
        }

        let span = core.span.clone();
        tokio::spawn(poll_loop(core.clone(), stop_rx).instrument(span));
        true
    }

    /// Cancels the timer. A cycle already in progress finishes but nothing
    /// further is scheduled.
    pub fn stop(&self) {
        if self.core.active.swap(false, Ordering::AcqRel) {
            tracing::info!(parent: &self.core.span, "polling stopped");
        }
        self.core.stop_timer();
    }

    /// Runs a cycle now, outside the schedule.
    pub async fn refresh(&self) -> CycleOutcome {
        self.core.run_cycle().await
    }

    /// Turning following back on fetches the backlog right away instead of
    /// waiting for the next cycle.
    pub async fn set_follow_logs(&self, follow: bool) {
        let was = self.core.follow_logs.swap(follow, Ordering::AcqRel);
        if follow && !was {
            self.core
                .reload_logs()
                .instrument(self.core.span.clone())
                .await;
        }
    }

    /// Fetches new log lines now, whether or not following is on.
    ///
    /// Returns false when logs may not be viewed, the target is gone or the
    /// fetch failed.
    pub async fn reload_logs(&self) -> bool {
        self.core
            .reload_logs()
            .instrument(self.core.span.clone())
            .await
    }

    pub fn follows_logs(&self) -> bool {
        self.core.follow_logs.load(Ordering::Acquire)
    }

    pub async fn cursor_position(&self) -> u64 {
        self.core.state.lock().await.cursor.position()
    }

    pub async fn last_snapshot(&self) -> Option<ProcessSnapshot> {
        self.core.state.lock().await.last_snapshot.clone()
    }

    pub(crate) fn core(&self) -> Arc<SessionCore> {
        self.core.clone()
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.stop();
    }
}
