use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub(crate) const MAX_POLL_INTERVAL: Duration = Duration::from_millis(60_000);

fn parse_interval_ms(raw: Option<String>) -> Duration {
    let ms = raw
        .as_deref()
        .unwrap_or_default()
        .trim()
        .parse::<u64>()
        .ok()
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    Duration::from_millis(ms).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

fn parse_timeout_ms(raw: Option<String>) -> Option<Duration> {
    raw.as_deref()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(|v| Duration::from_millis(v.clamp(1000, 10 * 60_000)))
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_base_url(raw: Option<String>) -> String {
    raw.map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Session settings, normally read from `VIGIL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub follow_logs: bool,
    /// Per-request timeout; `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            follow_logs: true,
            request_timeout: None,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            base_url: parse_base_url(lookup("VIGIL_API_BASE_URL")),
            poll_interval: parse_interval_ms(lookup("VIGIL_POLL_INTERVAL_MS")),
            follow_logs: parse_flag(lookup("VIGIL_FOLLOW_LOGS"), true),
            request_timeout: parse_timeout_ms(lookup("VIGIL_REQUEST_TIMEOUT_MS")),
        }
    }
}
