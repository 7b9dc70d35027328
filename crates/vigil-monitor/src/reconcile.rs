use vigil_process::{ActionKind, Lifecycle, Metric, ProcessMetrics, ProcessSnapshot};

/// Which controls the presentation layer should enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
    pub console: bool,
}

impl Controls {
    /// Transitional and unrecognised states disable everything.
    pub fn for_status(status: Lifecycle) -> Self {
        match status {
            Lifecycle::Stopped => Self {
                start: true,
                stop: false,
                restart: false,
                console: false,
            },
            Lifecycle::Running => Self {
                start: false,
                stop: true,
                restart: true,
                console: true,
            },
            Lifecycle::Starting | Lifecycle::Stopping | Lifecycle::Unknown => Self::default(),
        }
    }

    pub fn allows(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Start => self.start,
            ActionKind::Stop => self.stop,
            ActionKind::Restart => self.restart,
        }
    }

    /// Disables the lifecycle actions; console availability is kept.
    pub fn with_actions_locked(self) -> Self {
        Self {
            start: false,
            stop: false,
            restart: false,
            ..self
        }
    }
}

const UNAVAILABLE: &str = "unavailable";

/// Metrics as the presentation layer renders them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsView {
    pub cpu_percent: Metric,
    pub memory_mb: Metric,
    pub player_count: Metric,
    pub max_capacity: Metric,
    pub latency_ms: Metric,
    /// The last metrics fetch failed and these are the previous values.
    pub stale: bool,
}

impl MetricsView {
    pub fn from_metrics(m: &ProcessMetrics) -> Self {
        Self {
            cpu_percent: m.cpu_percent,
            memory_mb: m.memory_mb,
            player_count: m.player_count,
            max_capacity: m.max_capacity,
            latency_ms: m.latency_ms,
            stale: false,
        }
    }

    pub fn cpu(&self) -> String {
        render(self.cpu_percent, |v| format!("{v:.1}%"))
    }

    pub fn memory(&self) -> String {
        render(self.memory_mb, |v| format!("{v:.0} MB"))
    }

    pub fn latency(&self) -> String {
        render(self.latency_ms, |v| format!("{v:.0} ms"))
    }

    pub fn players(&self) -> String {
        match (self.player_count, self.max_capacity) {
            (Metric::Value(n), Metric::Value(max)) => format!("{n:.0} / {max:.0}"),
            (Metric::Value(n), Metric::Unavailable) => format!("{n:.0}"),
            (Metric::Unavailable, _) => UNAVAILABLE.to_string(),
        }
    }
}

fn render(metric: Metric, f: impl Fn(f64) -> String) -> String {
    metric.value().map(f).unwrap_or_else(|| UNAVAILABLE.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: Option<Lifecycle>,
    pub to: Lifecycle,
}

/// UI-visible consequences of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct UiDelta {
    /// Set when the lifecycle differs from the previous snapshot.
    pub transition: Option<StatusTransition>,
    pub status: Lifecycle,
    pub controls: Controls,
    pub metrics: MetricsView,
    /// `None` while the caller is editing the port.
    pub port: Option<u16>,
    pub name: String,
    pub version: Option<String>,
    pub eula_accepted: bool,
    /// Anything in the snapshot differs from the previous one.
    pub changed: bool,
}

impl UiDelta {
    pub fn suppress_port(mut self) -> Self {
        self.port = None;
        self
    }

    pub fn lock_actions(mut self) -> Self {
        self.controls = self.controls.with_actions_locked();
        self
    }

    pub fn mark_metrics_stale(mut self) -> Self {
        self.metrics.stale = true;
        self
    }

    /// Compares what a viewer would see, ignoring how it was reached.
    pub fn same_view(&self, other: &UiDelta) -> bool {
        self.status == other.status
            && self.controls == other.controls
            && self.metrics == other.metrics
            && self.port == other.port
            && self.name == other.name
            && self.version == other.version
            && self.eula_accepted == other.eula_accepted
    }
}

pub fn reconcile(previous: Option<&ProcessSnapshot>, current: &ProcessSnapshot) -> UiDelta {
    let prev_status = previous.map(|p| p.status);
    let transition = (prev_status != Some(current.status)).then_some(StatusTransition {
        from: prev_status,
        to: current.status,
    });

    UiDelta {
        transition,
        status: current.status,
        controls: Controls::for_status(current.status),
        metrics: MetricsView::from_metrics(&current.metrics),
        port: current.port,
        name: current.name.clone(),
        version: current.version.clone(),
        eula_accepted: current.eula_accepted,
        changed: previous != Some(current),
    }
}
