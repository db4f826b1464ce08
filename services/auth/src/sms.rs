//! Text-message delivery for one-time codes

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Delivers a text message to a phone number
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, body: &str) -> Result<()>;
}

/// Twilio configuration
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioConfig {
    /// Create a new TwilioConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TWILIO_SID`: account SID
    /// - `TWILIO_AUTH_TOKEN`: account auth token
    /// - `TWILIO_PHONE_NUMBER`: sending number
    pub fn from_env() -> Result<Self> {
        let var = |key: &str| {
            std::env::var(key)
                .map_err(|_| anyhow::anyhow!("{} environment variable not set", key))
        };

        Ok(TwilioConfig {
            account_sid: var("TWILIO_SID")?,
            auth_token: var("TWILIO_AUTH_TOKEN")?,
            from_number: var("TWILIO_PHONE_NUMBER")?,
        })
    }
}

/// Sends codes through the Twilio Messages API
#[derive(Clone)]
pub struct TwilioSender {
    client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SmsSender for TwilioSender {
    async fn send(&self, phone: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.config.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", phone),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Twilio rejected message to {}: {} {}", phone, status, detail);
            anyhow::bail!("SMS provider returned {}", status);
        }

        info!("Delivered text message to {}", phone);
        Ok(())
    }
}

/// Writes messages to the service log instead of a phone
#[derive(Clone, Default)]
pub struct LogSender;

#[async_trait]
impl SmsSender for LogSender {
    async fn send(&self, phone: &str, body: &str) -> Result<()> {
        info!("SMS to {}: {}", phone, body);
        Ok(())
    }
}
