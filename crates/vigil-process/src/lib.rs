use serde::{Deserialize, Deserializer, Serialize, Serializer, de::IgnoredAny};
use specta::Type;

/// Remote identity of an observed process (the panel's server name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one polling session in logs; never sent to the remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status as reported by the remote.
///
/// Any value the panel sends that is not one of the known states maps to
/// `Unknown` instead of failing the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
    Unknown,
}

impl Lifecycle {
    pub fn is_running(self) -> bool {
        matches!(self, Lifecycle::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Stopped => "Stopped",
            Lifecycle::Starting => "Starting",
            Lifecycle::Running => "Running",
            Lifecycle::Stopping => "Stopping",
            Lifecycle::Unknown => "Unknown",
        }
    }
}

impl From<&str> for Lifecycle {
    fn from(value: &str) -> Self {
        match value.trim() {
            "Stopped" => Lifecycle::Stopped,
            "Starting" => Lifecycle::Starting,
            "Running" => Lifecycle::Running,
            "Stopping" => Lifecycle::Stopping,
            _ => Lifecycle::Unknown,
        }
    }
}

impl From<String> for Lifecycle {
    fn from(value: String) -> Self {
        Lifecycle::from(value.as_str())
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single numeric reading that the remote may report as unavailable.
///
/// On the wire a metric is either a JSON number or a placeholder such as
/// `"N/A"`; anything non-numeric (including `null` or a missing field)
/// becomes `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Metric {
    Value(f64),
    #[default]
    Unavailable,
}

impl Metric {
    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Unavailable => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMetric {
    Number(f64),
    Other(IgnoredAny),
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawMetric::deserialize(deserializer)? {
            RawMetric::Number(v) if v.is_finite() => Metric::Value(v),
            _ => Metric::Unavailable,
        })
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => serializer.serialize_f64(*v),
            Metric::Unavailable => serializer.serialize_str("N/A"),
        }
    }
}

/// Resource and player metrics for a running target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessMetrics {
    #[serde(default, rename = "cpu_usage")]
    pub cpu_percent: Metric,
    #[serde(default, rename = "memory_usage")]
    pub memory_mb: Metric,
    #[serde(default, rename = "players_online")]
    pub player_count: Metric,
    #[serde(default, rename = "max_players")]
    pub max_capacity: Metric,
    #[serde(default, rename = "ping")]
    pub latency_ms: Metric,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u64),
    Text(String),
    Other(IgnoredAny),
}

// The panel reads the port from server.properties, so it may arrive as a
// string.
fn lenient_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Ok(match RawPort::deserialize(deserializer)? {
        RawPort::Number(n) => u16::try_from(n).ok(),
        RawPort::Text(s) => s.trim().parse::<u16>().ok(),
        RawPort::Other(_) => None,
    })
}

/// Latest known state of a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: TargetId,
    pub name: String,
    pub status: Lifecycle,
    #[serde(default, deserialize_with = "lenient_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server_type: Option<String>,
    #[serde(default)]
    pub eula_accepted: bool,
    #[serde(default)]
    pub metrics: ProcessMetrics,
}

/// Lifecycle command accepted by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Restart => "restart",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            ActionKind::Start => Capability::Start,
            ActionKind::Stop => Capability::Stop,
            ActionKind::Restart => Capability::Restart,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewLogs,
    Start,
    Stop,
    Restart,
    Console,
    EditConfig,
}

/// What the caller may observe and do on one target.
///
/// Accepts the panel's permission payload as-is: its `*_server` and
/// `can_change_settings` names are aliases of the fields below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[serde(default)]
pub struct PermissionSet {
    pub is_admin: bool,
    pub can_view_logs: bool,
    pub can_view_analytics: bool,
    #[serde(alias = "can_start_server")]
    pub can_start: bool,
    #[serde(alias = "can_stop_server")]
    pub can_stop: bool,
    #[serde(alias = "can_restart_server")]
    pub can_restart: bool,
    pub can_access_console: bool,
    #[serde(alias = "can_change_settings")]
    pub can_edit_config: bool,
    #[serde(alias = "can_delete_server")]
    pub can_delete: bool,
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            is_admin: true,
            can_view_logs: true,
            can_view_analytics: true,
            can_start: true,
            can_stop: true,
            can_restart: true,
            can_access_console: true,
            can_edit_config: true,
            can_delete: true,
        }
    }

    pub fn read_only() -> Self {
        Self {
            can_view_logs: true,
            can_view_analytics: true,
            ..Self::default()
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        if self.is_admin {
            return true;
        }
        match capability {
            Capability::ViewLogs => self.can_view_logs,
            Capability::Start => self.can_start,
            Capability::Stop => self.can_stop,
            Capability::Restart => self.can_restart,
            Capability::Console => self.can_access_console,
            Capability::EditConfig => self.can_edit_config,
        }
    }
}
