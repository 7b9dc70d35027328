//! Polling engine for one remotely managed process: status and metrics
//! reconciliation, incremental log following, and gated lifecycle actions.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod log_cursor;
pub mod reconcile;
pub mod sanitize;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{LogChunk, MonitorApi, StatusFetch};
pub use config::MonitorConfig;
pub use error::{ActionError, ApiError};
pub use events::{
    ActionResult, EventReceiver, EventSender, LogResetReason, Operation, SessionEvent,
};
pub use gateway::ActionGateway;
pub use http::HttpMonitorApi;
pub use log_cursor::{LogCursor, LogFetchError};
pub use reconcile::{Controls, MetricsView, StatusTransition, UiDelta, reconcile};
pub use session::{CycleOutcome, PollSession};
