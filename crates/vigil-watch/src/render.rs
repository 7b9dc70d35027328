use vigil_monitor::{ActionResult, LogResetReason, SessionEvent, UiDelta};

fn status_line(delta: &UiDelta) -> String {
    let m = &delta.metrics;
    let mut line = format!(
        "[{}] {} | cpu {} | mem {} | players {} | ping {}",
        delta.status,
        delta.name,
        m.cpu(),
        m.memory(),
        m.players(),
        m.latency()
    );
    if m.stale {
        line.push_str(" (stale)");
    }
    match delta.port {
        Some(port) => line.push_str(&format!(" | port {port}")),
        None => line.push_str(" | port (editing)"),
    }
    if !delta.eula_accepted {
        line.push_str(" | eula not accepted");
    }
    line
}

fn action_line(result: &ActionResult) -> String {
    let verdict = match &result.outcome {
        Ok(_) => "ok",
        Err(e) if e.is_refusal() => "refused",
        Err(_) => "failed",
    };
    format!("{} {verdict}: {}", result.operation.name(), result.message())
}

/// Lines to print for one session event.
pub fn render(event: &SessionEvent) -> Vec<String> {
    match event {
        SessionEvent::Snapshot {
            delta, observed_at, ..
        } => {
            let mut out = Vec::new();
            if let Some(t) = delta.transition {
                match t.from {
                    Some(from) => out.push(format!("status {from} -> {}", t.to)),
                    None => out.push(format!("status {}", t.to)),
                }
            }
            out.push(format!("{} {}", observed_at.format("%H:%M:%S"), status_line(delta)));
            out
        }
        SessionEvent::LogLines(lines) => lines.iter().map(|l| format!("| {l}")).collect(),
        SessionEvent::LogReset { reason } => vec![match reason {
            LogResetReason::Started => "-- log restarted --".to_string(),
            LogResetReason::Cleared => "-- log cleared --".to_string(),
        }],
        SessionEvent::ActionResult(result) => vec![action_line(result)],
        SessionEvent::TargetGone { target } => {
            vec![format!("target {target} no longer exists; polling stopped")]
        }
    }
}
