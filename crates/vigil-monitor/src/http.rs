use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use vigil_process::{ActionKind, PermissionSet, ProcessMetrics, ProcessSnapshot, TargetId};

use crate::api::{LogChunk, MonitorApi, StatusFetch};
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
struct AckBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn remote_error(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<AckBody>(body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            format!(
                "remote returned {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error")
            )
        });
    ApiError::Remote {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(remote_error(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

// Success bodies are `{message}`; an `{error}` field wins even on 2xx.
async fn ack(res: Response) -> Result<String, ApiError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(remote_error(status, &body));
    }
    let parsed = serde_json::from_str::<AckBody>(&body).unwrap_or_default();
    if let Some(error) = parsed.error.filter(|e| !e.trim().is_empty()) {
        return Err(ApiError::Remote {
            status: status.as_u16(),
            message: error,
        });
    }
    Ok(parsed.message.unwrap_or_default())
}

/// `MonitorApi` over the panel's HTTP/JSON endpoints.
#[derive(Clone)]
pub struct HttpMonitorApi {
    http: Client,
    base_url: String,
}

impl HttpMonitorApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn server_url(&self, target: &TargetId, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/api/servers/{}", self.base_url, target)
        } else {
            format!("{}/api/servers/{}/{}", self.base_url, target, suffix)
        }
    }
}

#[async_trait]
impl MonitorApi for HttpMonitorApi {
    async fn status(&self, target: &TargetId) -> Result<StatusFetch, ApiError> {
        let res = self.http.get(self.server_url(target, "")).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(StatusFetch::NotFound);
        }
        let snapshot: ProcessSnapshot = decode(res).await?;
        Ok(StatusFetch::Found(snapshot))
    }

    async fn metrics(&self, target: &TargetId) -> Result<ProcessMetrics, ApiError> {
        let res = self.http.get(self.server_url(target, "status")).send().await?;
        decode(res).await
    }

    async fn log(&self, target: &TargetId, since: u64) -> Result<LogChunk, ApiError> {
        let url = self.server_url(target, &format!("log?since={since}"));
        let res = self.http.get(url).send().await?;
        decode(res).await
    }

    async fn action(&self, target: &TargetId, kind: ActionKind) -> Result<String, ApiError> {
        let res = self
            .http
            .post(self.server_url(target, kind.as_str()))
            .send()
            .await?;
        ack(res).await
    }

    async fn send_console(&self, target: &TargetId, command: &str) -> Result<String, ApiError> {
        let res = self
            .http
            .post(self.server_url(target, "console"))
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await?;
        ack(res).await
    }

    async fn clear_log(&self, target: &TargetId) -> Result<String, ApiError> {
        let res = self
            .http
            .post(self.server_url(target, "clear-logs"))
            .send()
            .await?;
        ack(res).await
    }

    async fn set_port(&self, target: &TargetId, port: u16) -> Result<String, ApiError> {
        let res = self
            .http
            .post(self.server_url(target, "port"))
            .json(&serde_json::json!({ "port": port }))
            .send()
            .await?;
        ack(res).await
    }

    async fn permissions(&self, target: &TargetId) -> Result<PermissionSet, ApiError> {
        let url = format!("{}/api/user/permissions/{}", self.base_url, target);
        let res = self.http.get(url).send().await?;
        decode(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slashes() {
        assert_eq!(normalize_base_url(" http://panel:5000// "), "http://panel:5000");
    }

    #[test]
    fn builds_server_urls() {
        let api = HttpMonitorApi::new("http://127.0.0.1:5000/", None).unwrap();
        let t = TargetId::new("survival");
        assert_eq!(api.server_url(&t, ""), "http://127.0.0.1:5000/api/servers/survival");
        assert_eq!(
            api.server_url(&t, "log?since=12"),
            "http://127.0.0.1:5000/api/servers/survival/log?since=12"
        );
    }

    #[test]
    fn remote_error_prefers_error_field() {
        let err = remote_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Server survival is not running."}"#,
        );
        assert_eq!(err.to_string(), "Server survival is not running.");
    }

    #[test]
    fn remote_error_falls_back_to_status_text() {
        let err = remote_error(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        match err {
            ApiError::Remote { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "remote returned 502 Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    mod stub {
        use std::collections::HashMap;

        use axum::extract::Query;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use reqwest::StatusCode;
        use serde_json::{Value, json};

        async fn survival() -> Json<Value> {
            Json(json!({
                "id": "survival",
                "name": "Survival",
                "status": "Running",
                "port": "25565",
                "version": "1.21.1",
                "eula_accepted": true
            }))
        }

        async fn missing() -> (StatusCode, Json<Value>) {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Server not found" })))
        }

        async fn log(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
            let since: u64 = q.get("since").and_then(|v| v.parse().ok()).unwrap_or(0);
            Json(json!({
                "lines": [format!("line {since}\n")],
                "line_count": since + 1
            }))
        }

        async fn broken_log() -> (StatusCode, Json<Value>) {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not read log file" })),
            )
        }

        async fn metrics() -> Json<Value> {
            Json(json!({ "cpu_usage": 12.5, "memory_usage": "N/A", "players_online": 3 }))
        }

        async fn start() -> Json<Value> {
            Json(json!({ "message": "Server survival is starting." }))
        }

        async fn stop() -> (StatusCode, Json<Value>) {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to stop server survival" })),
            )
        }

        async fn restart() -> Json<Value> {
            Json(json!({ "error": "Server survival is not running." }))
        }

        async fn console(Json(body): Json<Value>) -> Json<Value> {
            Json(json!({ "message": format!("sent {}", body["command"].as_str().unwrap_or("")) }))
        }

        async fn permissions() -> Json<Value> {
            Json(json!({ "can_view_logs": true, "can_start_server": true }))
        }

        /// Serves a fake panel on an ephemeral port and returns its base URL.
        pub(super) async fn spawn() -> String {
            let app = Router::new()
                .route("/api/servers/survival", get(survival))
                .route("/api/servers/gone", get(missing))
                .route("/api/servers/survival/log", get(log))
                .route("/api/servers/broken/log", get(broken_log))
                .route("/api/servers/survival/status", get(metrics))
                .route("/api/servers/survival/start", post(start))
                .route("/api/servers/survival/stop", post(stop))
                .route("/api/servers/survival/restart", post(restart))
                .route("/api/servers/survival/console", post(console))
                .route("/api/user/permissions/survival", get(permissions));

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}/")
        }
    }

    async fn client() -> HttpMonitorApi {
        HttpMonitorApi::new(&stub::spawn().await, None).unwrap()
    }

    #[tokio::test]
    async fn not_found_status_means_target_gone() {
        let api = client().await;
        let fetch = api.status(&TargetId::new("gone")).await.unwrap();
        assert_eq!(fetch, StatusFetch::NotFound);
    }

    #[tokio::test]
    async fn status_decodes_string_port() {
        let api = client().await;
        let StatusFetch::Found(snapshot) = api.status(&TargetId::new("survival")).await.unwrap()
        else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.name, "Survival");
        assert!(snapshot.status.is_running());
        assert_eq!(snapshot.port, Some(25565));
    }

    #[tokio::test]
    async fn metrics_tolerate_placeholders() {
        let api = client().await;
        let m = api.metrics(&TargetId::new("survival")).await.unwrap();
        assert_eq!(m.cpu_percent.value(), Some(12.5));
        assert_eq!(m.memory_mb.value(), None);
        assert_eq!(m.player_count.value(), Some(3.0));
        assert_eq!(m.latency_ms.value(), None);
    }

    #[tokio::test]
    async fn log_requests_carry_the_cursor() {
        let api = client().await;
        let chunk = api.log(&TargetId::new("survival"), 7).await.unwrap();
        assert_eq!(chunk.lines, vec!["line 7\n"]);
        assert_eq!(chunk.line_count, 8);
        assert_eq!(chunk.error, None);
    }

    #[tokio::test]
    async fn failed_log_response_leaves_cursor_alone() {
        let api = client().await;
        let err = api.log(&TargetId::new("broken"), 4).await.unwrap_err();
        assert!(matches!(err, ApiError::Remote { status: 500, .. }));
        assert_eq!(err.to_string(), "Could not read log file");

        let mut cursor = crate::log_cursor::LogCursor::new();
        assert!(cursor.pull(&api, &TargetId::new("broken")).await.is_err());
        assert_eq!(cursor.position(), 0);
    }

    #[tokio::test]
    async fn action_messages_and_errors() {
        let api = client().await;
        let t = TargetId::new("survival");

        assert_eq!(
            api.action(&t, ActionKind::Start).await.unwrap(),
            "Server survival is starting."
        );

        let err = api.action(&t, ActionKind::Stop).await.unwrap_err();
        assert!(matches!(err, ApiError::Remote { status: 500, .. }));
        assert_eq!(err.to_string(), "Failed to stop server survival");

        let err = api.action(&t, ActionKind::Restart).await.unwrap_err();
        assert!(
            matches!(err, ApiError::Remote { status: 200, .. }),
            "an error body wins over a 2xx status"
        );
        assert_eq!(err.to_string(), "Server survival is not running.");
    }

    #[tokio::test]
    async fn console_posts_command_body() {
        let api = client().await;
        let reply = api
            .send_console(&TargetId::new("survival"), "say hi")
            .await
            .unwrap();
        assert_eq!(reply, "sent say hi");
    }

    #[tokio::test]
    async fn permissions_accept_panel_names() {
        let api = client().await;
        let p = api.permissions(&TargetId::new("survival")).await.unwrap();
        assert!(p.can_view_logs);
        assert!(p.can_start);
        assert!(!p.can_stop);
    }
}
