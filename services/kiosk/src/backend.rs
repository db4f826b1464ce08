//! Auth service client

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// `{success, message}` reply of the code endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ServerReply {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// HTTP status the reply came with
    #[serde(skip)]
    pub status: u16,
}

impl ServerReply {
    /// The phone is locked out after too many attempts
    pub fn is_locked_out(&self) -> bool {
        self.status == 429
    }

    /// The service failed rather than judged the request
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Code delivery and verification as seen from the kiosk
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn send_code(&self, phone: &str) -> Result<ServerReply>;

    async fn verify_code(&self, user_id: i64, phone: &str, code: &str) -> Result<ServerReply>;
}

/// Auth backend talking to the auth service over HTTP
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<ServerReply> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        // Rejections come back as 4xx with the same body shape
        let status = response.status();
        let mut reply = response
            .json::<ServerReply>()
            .await
            .with_context(|| format!("Unexpected reply from {} ({})", url, status))?;
        reply.status = status.as_u16();
        Ok(reply)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn send_code(&self, phone: &str) -> Result<ServerReply> {
        self.post("/send-otp", json!({ "phone": phone })).await
    }

    async fn verify_code(&self, user_id: i64, phone: &str, code: &str) -> Result<ServerReply> {
        self.post(
            "/verify-otp",
            json!({ "id": user_id, "phone": phone, "otp": code }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16) -> ServerReply {
        let mut reply: ServerReply =
            serde_json::from_value(json!({ "success": false, "message": "nope" })).unwrap();
        reply.status = status;
        reply
    }

    #[test]
    fn test_reply_classification() {
        assert!(reply(429).is_locked_out());
        assert!(!reply(429).is_server_error());
        assert!(reply(500).is_server_error());
        assert!(reply(502).is_server_error());
        assert!(!reply(400).is_locked_out());
        assert!(!reply(400).is_server_error());
    }

    #[test]
    fn test_status_is_not_read_from_body() {
        let reply: ServerReply =
            serde_json::from_value(json!({ "success": true, "status": 429 })).unwrap();
        assert_eq!(reply.status, 0);
        assert!(reply.message.is_empty());
    }
}
