use async_trait::async_trait;
use serde::Deserialize;
use vigil_process::{ActionKind, PermissionSet, ProcessMetrics, ProcessSnapshot, TargetId};

use crate::error::ApiError;

/// Outcome of a status fetch that reached the remote.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusFetch {
    Found(ProcessSnapshot),
    /// The remote reports the target does not exist (HTTP 404).
    NotFound,
}

/// One page of the remote log, starting after the requested line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LogChunk {
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub line_count: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// The panel REST surface the engine consumes.
///
/// Imperative calls return the remote's success message.
#[async_trait]
pub trait MonitorApi: Send + Sync {
    async fn status(&self, target: &TargetId) -> Result<StatusFetch, ApiError>;

    async fn metrics(&self, target: &TargetId) -> Result<ProcessMetrics, ApiError>;

    async fn log(&self, target: &TargetId, since: u64) -> Result<LogChunk, ApiError>;

    async fn action(&self, target: &TargetId, kind: ActionKind) -> Result<String, ApiError>;

    async fn send_console(&self, target: &TargetId, command: &str) -> Result<String, ApiError>;

    async fn clear_log(&self, target: &TargetId) -> Result<String, ApiError>;

    async fn set_port(&self, target: &TargetId, port: u16) -> Result<String, ApiError>;

    async fn permissions(&self, target: &TargetId) -> Result<PermissionSet, ApiError>;
}
