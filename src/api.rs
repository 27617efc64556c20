use crate::config::Config;
use crate::error::{ExchangeError, ValidationError};
use crate::session::{ConversationId, MessageId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::Duration;

pub const MESSAGES_PATH: &str = "/api/chat/messages";
pub const HEALTH_PATH: &str = "/api/health";
pub const AGENTS_PATH: &str = "/api/agents/";

/// Longest message the service accepts, in characters
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Check a message before it is logged or sent: it must have non-blank
/// content and fit within [`MAX_MESSAGE_CHARS`]
pub fn validate_message(text: &str) -> std::result::Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = text.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong { len, max: MAX_MESSAGE_CHARS });
    }
    Ok(())
}

/// Body of `POST /api/chat/messages`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
    /// Always serialized; `null` until the server has issued one
    pub conversation_id: Option<&'a str>,
}

/// Reply to a chat message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub conversation_id: ConversationId,
    #[serde(deserialize_with = "string_or_number")]
    pub message_id: MessageId,
    pub content: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub routing: Option<serde_json::Value>,
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<MessageId, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(MessageId::from(s)),
        serde_json::Value::Number(n) => Ok(MessageId::from(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "message_id must be a string or number, got {}",
            other
        ))),
    }
}

/// One request/response cycle with the chat service
#[async_trait]
pub trait MessageExchange: Send + Sync {
    async fn send_message(
        &self,
        text: &str,
        conversation_id: Option<&ConversationId>,
    ) -> std::result::Result<ChatReply, ExchangeError>;
}

/// HTTP client for the chat service
#[derive(Clone)]
pub struct ChatClient {
    config: Config,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check that the service is up
    pub async fn health(&self) -> std::result::Result<HealthStatus, ExchangeError> {
        let response = self.client.get(self.config.endpoint(HEALTH_PATH)).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// The service's agent catalogue, passed through as JSON
    pub async fn list_agents(&self) -> std::result::Result<serde_json::Value, ExchangeError> {
        let response = self.client.get(self.config.endpoint(AGENTS_PATH)).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Turn a non-2xx response into an error, unwrapping the service's
    /// error envelope when there is one
    async fn check_status(
        response: reqwest::Response,
    ) -> std::result::Result<reqwest::Response, ExchangeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let cause = error_cause(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        Err(ExchangeError::Status { status: status.as_u16(), cause })
    }
}

/// Best human-readable cause in an error body: `error`, then `detail`, then
/// the raw text
fn error_cause(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Some(body.to_string());
    };

    ["error", "detail"]
        .iter()
        .filter_map(|key| value.get(key))
        .find(|v| !v.is_null())
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
        .or_else(|| Some(body.to_string()))
}

#[async_trait]
impl MessageExchange for ChatClient {
    async fn send_message(
        &self,
        text: &str,
        conversation_id: Option<&ConversationId>,
    ) -> std::result::Result<ChatReply, ExchangeError> {
        let url = self.config.endpoint(MESSAGES_PATH);
        let payload = SendMessageRequest {
            message: text,
            conversation_id: conversation_id.map(|c| c.as_str()),
        };

        tracing::info!(
            url = %url,
            conversation_id = payload.conversation_id.unwrap_or("-"),
            "Sending message"
        );

        let response = self.client.post(&url).json(&payload).send().await?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        let reply: ChatReply = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::Decode { cause: e.to_string() })?;

        if reply.tool_calls.is_some() || reply.routing.is_some() {
            tracing::debug!(
                tool_calls = ?reply.tool_calls,
                routing = ?reply.routing,
                "Reply carried routing details"
            );
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer it with `status_line` and `body`, and
    /// hand back the raw request that was received
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn client_for(base_url: &str) -> ChatClient {
        let config = Config::default().with_base_url(base_url).unwrap();
        ChatClient::new(config).unwrap()
    }

    fn request_body(raw: &str) -> serde_json::Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn request_without_conversation_sends_null() {
        let body = SendMessageRequest { message: "Hello", conversation_id: None };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"message":"Hello","conversation_id":null}"#
        );
    }

    #[test]
    fn reply_accepts_numeric_message_id_and_extras() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"conversation_id":"c1","message_id":42,"content":"ok","agent":null,
                "tool_calls":[{"name":"lookup_order"}],"routing":{"confidence":0.9}}"#,
        )
        .unwrap();
        assert_eq!(reply.message_id.as_str(), "42");
        assert_eq!(reply.agent, None);
        assert_eq!(reply.tool_calls.as_ref().map(|t| t.len()), Some(1));
    }

    #[test]
    fn reply_rejects_object_message_id() {
        let result = serde_json::from_str::<ChatReply>(
            r#"{"conversation_id":"c1","message_id":{},"content":"ok"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn error_cause_prefers_envelope_fields() {
        assert_eq!(
            error_cause(r#"{"success":false,"error":"Internal server error","details":null}"#)
                .as_deref(),
            Some("Internal server error")
        );
        assert_eq!(
            error_cause(r#"{"detail":"Failed to process message: boom"}"#).as_deref(),
            Some("Failed to process message: boom")
        );
        assert_eq!(
            error_cause(r#"{"error":null,"detail":[{"loc":["body"]}]}"#).as_deref(),
            Some(r#"[{"loc":["body"]}]"#)
        );
        assert_eq!(error_cause("Bad Gateway").as_deref(), Some("Bad Gateway"));
        assert_eq!(error_cause("  "), None);
    }

    #[tokio::test]
    async fn send_message_posts_and_decodes_reply() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"conversation_id":"c1","message_id":"m1","content":"Hi there","agent":"billing"}"#,
        )
        .await;

        let reply = client_for(&base_url).send_message("Hello", None).await.unwrap();
        assert_eq!(reply.conversation_id.as_str(), "c1");
        assert_eq!(reply.message_id.as_str(), "m1");
        assert_eq!(reply.content, "Hi there");
        assert_eq!(reply.agent.as_deref(), Some("billing"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/chat/messages HTTP/1.1"));
        assert_eq!(
            request_body(&raw),
            serde_json::json!({"message": "Hello", "conversation_id": null})
        );
    }

    #[tokio::test]
    async fn send_message_carries_conversation_id() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"conversation_id":"c1","message_id":"m2","content":"All good","agent":"order"}"#,
        )
        .await;

        let conversation = ConversationId::from("c1");
        client_for(&base_url).send_message("Status?", Some(&conversation)).await.unwrap();

        let raw = server.await.unwrap();
        assert_eq!(
            request_body(&raw),
            serde_json::json!({"message": "Status?", "conversation_id": "c1"})
        );
    }

    #[tokio::test]
    async fn server_error_becomes_status_error() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 500 Internal Server Error",
            r#"{"success":false,"error":"Failed to process message: db down"}"#,
        )
        .await;

        let err = client_for(&base_url).send_message("Hello", None).await.unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Status {
                status: 500,
                cause: "Failed to process message: db down".into()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unexpected_body_becomes_decode_error() {
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", r#"{"hello":"world"}"#).await;

        let err = client_for(&base_url).send_message("Hello", None).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Decode { .. }), "got {err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_becomes_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(&format!("http://{}", addr))
            .send_message("Hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Transport { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn health_decodes_status() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"status":"healthy","app":"AI Customer Support","version":"1.0.0",
                "environment":"development"}"#,
        )
        .await;

        let health = client_for(&base_url).health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version.as_deref(), Some("1.0.0"));
        assert!(server.await.unwrap().starts_with("GET /api/health HTTP/1.1"));
    }

    #[tokio::test]
    async fn list_agents_passes_json_through() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"agents":[{"name":"billing","capabilities":["refunds","invoices"]},
                {"name":"order","capabilities":["tracking"]}]}"#,
        )
        .await;

        let agents = client_for(&base_url).list_agents().await.unwrap();
        assert_eq!(agents["agents"][0]["name"], "billing");
        assert_eq!(agents["agents"][1]["capabilities"], serde_json::json!(["tracking"]));
        assert!(server.await.unwrap().starts_with("GET /api/agents/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn list_agents_surfaces_service_errors() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable",
            r#"{"detail":"agent registry not loaded"}"#,
        )
        .await;

        let err = client_for(&base_url).list_agents().await.unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Status { status: 503, cause: "agent registry not loaded".into() }
        );
        server.await.unwrap();
    }

    #[test]
    fn validate_message_limits() {
        assert_eq!(validate_message(""), Err(ValidationError::Empty));
        assert_eq!(validate_message(" \n\t"), Err(ValidationError::Empty));
        assert_eq!(validate_message("Hello"), Ok(()));

        // Counted in chars, not bytes
        assert_eq!(validate_message(&"é".repeat(MAX_MESSAGE_CHARS)), Ok(()));
        assert_eq!(
            validate_message(&"x".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(ValidationError::TooLong { len: MAX_MESSAGE_CHARS + 1, max: MAX_MESSAGE_CHARS })
        );
    }
}
