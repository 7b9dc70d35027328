use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Instrument;
use vigil_process::{ActionKind, Capability, PermissionSet};

use crate::error::ActionError;
use crate::events::{ActionResult, LogResetReason, Operation, SessionEvent};
use crate::reconcile::Controls;
use crate::session::{PollSession, SessionCore};

pub const MIN_PORT: u16 = 1024;

/// Clears the in-flight flag however the call ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Admits or refuses imperative calls against one session's target.
///
/// Every call yields exactly one `ActionResult`, returned and also emitted
/// on the session's event channel. Calls that reach the remote are
/// followed by an immediate poll cycle.
#[derive(Clone)]
pub struct ActionGateway {
    core: Arc<SessionCore>,
    permissions: PermissionSet,
}

impl ActionGateway {
    pub fn new(session: &PollSession, permissions: PermissionSet) -> Self {
        Self {
            core: session.core(),
            permissions,
        }
    }

    pub async fn perform_action(&self, kind: ActionKind) -> ActionResult {
        let outcome = self
            .lifecycle(kind)
            .instrument(self.core.span.clone())
            .await;
        self.finish(Operation::Lifecycle(kind), outcome)
    }

    /// Sends one line to the target's console. Only a trailing line
    /// terminator is removed; the remote receives the rest as typed.
    pub async fn send_console(&self, line: &str) -> ActionResult {
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        let outcome = self
            .console(&command)
            .instrument(self.core.span.clone())
            .await;
        self.finish(Operation::Console(command), outcome)
    }

    pub async fn clear_log(&self) -> ActionResult {
        let outcome = self.clear().instrument(self.core.span.clone()).await;
        self.finish(Operation::ClearLog, outcome)
    }

    /// Stops polled values from overwriting the port while the caller edits it.
    pub async fn begin_port_edit(&self) -> Result<(), ActionError> {
        self.admit(Capability::EditConfig)?;
        let mut state = self.core.state.lock().await;
        state.port_editing = true;
        self.core.publish_current(&mut state);
        Ok(())
    }

    /// Leaves edit mode; the last polled port is shown again.
    pub async fn cancel_port_edit(&self) {
        let mut state = self.core.state.lock().await;
        if state.port_editing {
            state.port_editing = false;
            self.core.publish_current(&mut state);
        }
    }

    pub async fn commit_port_edit(&self, port: u16) -> ActionResult {
        let outcome = self
            .set_port(port)
            .instrument(self.core.span.clone())
            .await;
        self.finish(Operation::SetPort(port), outcome)
    }

    fn finish(&self, operation: Operation, outcome: Result<String, ActionError>) -> ActionResult {
        let result = ActionResult { operation, outcome };
        self.core.emit(SessionEvent::ActionResult(result.clone()));
        result
    }

    fn admit(&self, capability: Capability) -> Result<(), ActionError> {
        if self.core.is_gone() {
            return Err(ActionError::Gone);
        }
        if !self.permissions.allows(capability) {
            return Err(ActionError::Forbidden(capability));
        }
        Ok(())
    }

    async fn lifecycle(&self, kind: ActionKind) -> Result<String, ActionError> {
        self.admit(kind.capability())?;
        if self
            .core
            .action_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ActionError::Busy);
        }
        let guard = InFlight(&self.core.action_in_flight);

        {
            let mut state = self.core.state.lock().await;
            let status = state.status();
            if !Controls::for_status(status).allows(kind) {
                return Err(ActionError::Unavailable {
                    operation: kind.as_str(),
                    status,
                });
            }
            // The new incarnation numbers its log from zero.
            if kind == ActionKind::Start {
                self.core.reset_log(&mut state, LogResetReason::Started);
            }
            self.core.publish_current(&mut state);
        }

        tracing::info!(action = %kind, "requesting lifecycle action");
        let result = self
            .core
            .api
            .action(&self.core.target, kind)
            .await
            .map_err(ActionError::from);
        drop(guard);

        match &result {
            Ok(message) => tracing::info!(action = %kind, %message, "action accepted"),
            Err(e) => tracing::warn!(action = %kind, error = %e, "action failed"),
        }
        self.core.run_cycle().await;
        result
    }

    async fn console(&self, command: &str) -> Result<String, ActionError> {
        self.admit(Capability::Console)?;
        if command.trim().is_empty() {
            return Err(ActionError::Invalid(
                "console command must not be empty".to_string(),
            ));
        }
        let status = self.core.state.lock().await.status();
        if !Controls::for_status(status).console {
            return Err(ActionError::Unavailable {
                operation: "console",
                status,
            });
        }

        let result = self
            .core
            .api
            .send_console(&self.core.target, command)
            .await
            .map_err(ActionError::from);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "console command failed");
        }
        self.core.run_cycle().await;
        result
    }

    async fn clear(&self) -> Result<String, ActionError> {
        self.admit(Capability::EditConfig)?;

        let result = self
            .core
            .api
            .clear_log(&self.core.target)
            .await
            .map_err(ActionError::from);
        match &result {
            Ok(_) => {
                let mut state = self.core.state.lock().await;
                self.core.reset_log(&mut state, LogResetReason::Cleared);
            }
            Err(e) => tracing::warn!(error = %e, "clearing log failed"),
        }
        self.core.run_cycle().await;
        result
    }

    async fn set_port(&self, port: u16) -> Result<String, ActionError> {
        self.admit(Capability::EditConfig)?;
        if port < MIN_PORT {
            return Err(ActionError::Invalid(format!(
                "port must be between {MIN_PORT} and 65535"
            )));
        }

        let result = self
            .core
            .api
            .set_port(&self.core.target, port)
            .await
            .map_err(ActionError::from);

        {
            let mut state = self.core.state.lock().await;
            match &result {
                Ok(_) => {
                    if let Some(snapshot) = state.last_snapshot.as_mut() {
                        snapshot.port = Some(port);
                    }
                    state.port_editing = false;
                }
                // Edit mode stays on so the caller can correct the value.
                Err(e) => tracing::warn!(port, error = %e, "port change failed"),
            }
            self.core.publish_current(&mut state);
        }

        self.core.run_cycle().await;
        result
    }
}
