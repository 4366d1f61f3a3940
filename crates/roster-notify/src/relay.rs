use std::time::Duration;

use async_trait::async_trait;
use roster_core::config::RelayConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RelayError;

/// A message addressed to the external messaging group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Provider-native recipient (group id).
    pub recipient_id: String,
    pub content: String,
}

/// Provider-assigned id of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Connected,
    Disconnected,
    Error(String),
}

/// Outbound delivery to a third-party chat service.
///
/// Implementations must be `Send + Sync`; the gateway shares one relay
/// between all request tasks.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Stable lowercase identifier used in logs.
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), RelayError>;

    async fn disconnect(&mut self) -> Result<(), RelayError>;

    /// Deliver one message. `&self` so concurrent requests can send.
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, RelayError>;

    fn status(&self) -> RelayStatus;
}

/// Relay used when no provider is configured. Messages are only logged.
#[derive(Debug, Default)]
pub struct NullRelay;

#[async_trait]
impl Relay for NullRelay {
    fn name(&self) -> &str {
        "null"
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, RelayError> {
        debug!(bytes = msg.content.len(), "relay not configured, message dropped");
        Ok(MessageId(String::new()))
    }

    fn status(&self) -> RelayStatus {
        RelayStatus::Disconnected
    }
}

/// JSON-over-HTTP chat gateway.
///
/// `POST {base_url}/sendMessage` with the API key header and
/// `{ "to_number": <group>, "type": "text", "message": <text> }`.
/// Replies `{ "success": true, "data": { "msgId": .. } }` or
/// `{ "success": false, "message": .. }`.
pub struct HttpRelay {
    client: reqwest::Client,
    config: RelayConfig,
    status: RelayStatus,
}

impl HttpRelay {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?;
        Ok(Self {
            client,
            config,
            status: RelayStatus::Disconnected,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/sendMessage", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct SendBody<'a> {
    to_number: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SentData {
    msg_id: String,
}

#[derive(Deserialize)]
struct SendReply {
    success: bool,
    #[serde(default)]
    data: Option<SentData>,
    #[serde(default)]
    message: Option<String>,
}

fn parse_reply(reply: SendReply) -> Result<MessageId, RelayError> {
    if !reply.success {
        return Err(RelayError::Rejected(
            reply.message.unwrap_or_else(|| "no reason given".to_string()),
        ));
    }
    reply
        .data
        .map(|d| MessageId(d.msg_id))
        .ok_or_else(|| RelayError::Parse("success reply without data".to_string()))
}

#[async_trait]
impl Relay for HttpRelay {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        if self.config.base_url.is_empty() || self.config.group_id.is_empty() {
            let reason = "base_url and group_id are required".to_string();
            self.status = RelayStatus::Error(reason.clone());
            return Err(RelayError::Config(reason));
        }
        reqwest::Url::parse(&self.endpoint()).map_err(|e| {
            self.status = RelayStatus::Error(e.to_string());
            RelayError::Config(e.to_string())
        })?;
        self.status = RelayStatus::Connected;
        info!(endpoint = %self.endpoint(), "relay ready");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RelayError> {
        self.status = RelayStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, RelayError> {
        let body = SendBody {
            to_number: &msg.recipient_id,
            kind: "text",
            message: &msg.content,
        };

        debug!(recipient = %msg.recipient_id, "sending group notification");

        let resp = self
            .client
            .post(self.endpoint())
            .header(self.config.api_key_header.as_str(), self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout {
                        ms: self.config.timeout_ms,
                    }
                } else if e.is_connect() {
                    RelayError::Unavailable(e.to_string())
                } else {
                    RelayError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "relay API error");
            return Err(RelayError::Api {
                status,
                message: text,
            });
        }

        let reply: SendReply = resp
            .json()
            .await
            .map_err(|e| RelayError::Parse(e.to_string()))?;
        parse_reply(reply)
    }

    fn status(&self) -> RelayStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> SendReply {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn success_reply_yields_message_id() {
        let id = parse_reply(reply(r#"{"success":true,"data":{"chatId":"g","msgId":"m-1"}}"#));
        assert_eq!(id.unwrap(), MessageId("m-1".to_string()));
    }

    #[test]
    fn failure_reply_carries_provider_message() {
        let err = parse_reply(reply(r#"{"success":false,"message":"phone offline"}"#)).unwrap_err();
        assert!(matches!(err, RelayError::Rejected(m) if m == "phone offline"));
    }

    #[test]
    fn body_matches_provider_shape() {
        let body = SendBody {
            to_number: "123@g.us",
            kind: "text",
            message: "hola",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "to_number": "123@g.us", "type": "text", "message": "hola" })
        );
    }

    #[tokio::test]
    async fn connect_rejects_missing_group() {
        let mut relay = HttpRelay::new(RelayConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "k".to_string(),
            api_key_header: "x-api-key".to_string(),
            group_id: String::new(),
            timeout_ms: 100,
        })
        .unwrap();
        assert!(matches!(relay.connect().await, Err(RelayError::Config(_))));
        assert!(matches!(relay.status(), RelayStatus::Error(_)));
    }
}
