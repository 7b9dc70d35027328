//! Scripted in-memory `MonitorApi` for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use vigil_process::{
    ActionKind, Lifecycle, Metric, PermissionSet, ProcessMetrics, ProcessSnapshot, TargetId,
};

use crate::api::{LogChunk, MonitorApi, StatusFetch};
use crate::error::ApiError;

pub(crate) fn snapshot(status: Lifecycle) -> ProcessSnapshot {
    ProcessSnapshot {
        id: TargetId::new("survival"),
        name: "survival".to_string(),
        status,
        port: Some(25565),
        version: Some("1.21.1".to_string()),
        server_type: Some("paper".to_string()),
        eula_accepted: true,
        metrics: ProcessMetrics::default(),
    }
}

pub(crate) fn metrics(cpu: f64, memory: f64) -> ProcessMetrics {
    ProcessMetrics {
        cpu_percent: Metric::Value(cpu),
        memory_mb: Metric::Value(memory),
        player_count: Metric::Value(1.0),
        max_capacity: Metric::Value(20.0),
        latency_ms: Metric::Value(12.0),
    }
}

pub(crate) fn log(lines: &[&str], line_count: u64) -> LogChunk {
    LogChunk {
        lines: lines.iter().map(|l| format!("{l}\n")).collect(),
        line_count,
        error: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Status,
    Metrics,
    Log { since: u64 },
    Action(ActionKind),
    Console(String),
    ClearLog,
    SetPort(u16),
    Permissions,
}

type Queue<T> = Mutex<VecDeque<Result<T, ApiError>>>;

/// Each endpoint pops its next scripted reply. An empty status queue falls
/// back to the current default snapshot; an empty log queue fails so the
/// cursor stays put.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    default_status: Mutex<Option<ProcessSnapshot>>,
    statuses: Queue<StatusFetch>,
    metrics: Queue<ProcessMetrics>,
    logs: Queue<LogChunk>,
    acks: Queue<String>,
    permissions: Mutex<PermissionSet>,
    action_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<Call>>,
}

fn pop<T>(queue: &Queue<T>) -> Option<Result<T, ApiError>> {
    queue.lock().unwrap().pop_front()
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_status(status: Lifecycle) -> Self {
        let api = Self::new();
        api.set_default_status(snapshot(status));
        api
    }

    pub(crate) fn set_default_status(&self, snapshot: ProcessSnapshot) {
        *self.default_status.lock().unwrap() = Some(snapshot);
    }

    pub(crate) fn push_status(&self, reply: Result<StatusFetch, ApiError>) {
        self.statuses.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_metrics(&self, reply: Result<ProcessMetrics, ApiError>) {
        self.metrics.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_log(&self, reply: Result<LogChunk, ApiError>) {
        self.logs.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_ack(&self, reply: Result<String, ApiError>) {
        self.acks.lock().unwrap().push_back(reply);
    }

    pub(crate) fn set_permissions(&self, permissions: PermissionSet) {
        *self.permissions.lock().unwrap() = permissions;
    }

    /// Lifecycle actions block until the returned handle is notified.
    pub(crate) fn hold_actions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.action_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub(crate) fn log_requests(&self) -> Vec<u64> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::Log { since } => Some(*since),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_ack(&self) -> Result<String, ApiError> {
        pop(&self.acks).unwrap_or_else(|| Ok("ok".to_string()))
    }
}

#[async_trait]
impl MonitorApi for ScriptedApi {
    async fn status(&self, _target: &TargetId) -> Result<StatusFetch, ApiError> {
        self.record(Call::Status);
        if let Some(reply) = pop(&self.statuses) {
            return reply;
        }
        match self.default_status.lock().unwrap().clone() {
            Some(s) => Ok(StatusFetch::Found(s)),
            None => Err(ApiError::Decode("no scripted status".to_string())),
        }
    }

    async fn metrics(&self, _target: &TargetId) -> Result<ProcessMetrics, ApiError> {
        self.record(Call::Metrics);
        pop(&self.metrics).unwrap_or_else(|| Ok(ProcessMetrics::default()))
    }

    async fn log(&self, _target: &TargetId, since: u64) -> Result<LogChunk, ApiError> {
        self.record(Call::Log { since });
        pop(&self.logs).unwrap_or_else(|| Err(ApiError::Decode("no scripted log".to_string())))
    }

    async fn action(&self, _target: &TargetId, kind: ActionKind) -> Result<String, ApiError> {
        self.record(Call::Action(kind));
        let gate = self.action_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.next_ack()
    }

    async fn send_console(&self, _target: &TargetId, command: &str) -> Result<String, ApiError> {
        self.record(Call::Console(command.to_string()));
        self.next_ack()
    }

    async fn clear_log(&self, _target: &TargetId) -> Result<String, ApiError> {
        self.record(Call::ClearLog);
        self.next_ack()
    }

    async fn set_port(&self, _target: &TargetId, port: u16) -> Result<String, ApiError> {
        self.record(Call::SetPort(port));
        self.next_ack()
    }

    async fn permissions(&self, _target: &TargetId) -> Result<PermissionSet, ApiError> {
        self.record(Call::Permissions);
        Ok(*self.permissions.lock().unwrap())
    }
}
