use thiserror::Error;
use vigil_process::TargetId;

use crate::api::MonitorApi;
use crate::error::ApiError;
use crate::sanitize::sanitize_lines;

#[derive(Debug, Error)]
pub enum LogFetchError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The remote answered but could not read its log.
    #[error("remote log error: {0}")]
    Remote(String),
}

/// Sanitized lines from one fetch plus the remote's total line count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    pub lines: Vec<String>,
    pub cursor: u64,
}

/// Requests the lines after `cursor` and sanitizes them.
pub async fn fetch_new_lines(
    api: &dyn MonitorApi,
    target: &TargetId,
    cursor: u64,
) -> Result<LogBatch, LogFetchError> {
    let chunk = api.log(target, cursor).await?;
    if let Some(error) = chunk.error.filter(|e| !e.trim().is_empty()) {
        return Err(LogFetchError::Remote(error));
    }
    Ok(LogBatch {
        lines: sanitize_lines(&chunk.lines),
        cursor: chunk.line_count,
    })
}

/// How many lines of the current incarnation's log have been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogCursor {
    consumed: u64,
}

impl LogCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Start over at line 0; a new incarnation (or a cleared log) restarts
    /// the remote numbering.
    pub fn reset(&mut self) {
        self.consumed = 0;
    }

    /// Fetches and consumes new lines. On error the position is unchanged.
    pub async fn pull(
        &mut self,
        api: &dyn MonitorApi,
        target: &TargetId,
    ) -> Result<Vec<String>, LogFetchError> {
        let batch = fetch_new_lines(api, target, self.consumed).await?;
        if batch.cursor < self.consumed {
            tracing::warn!(
                target_id = %target,
                cursor = self.consumed,
                remote = batch.cursor,
                "remote log shrank; following remote line count"
            );
        }
        self.consumed = batch.cursor;
        Ok(batch.lines)
    }
}
