//! Slack incoming webhook 投递端

use crate::notification::channel::{DeliverySink, Destination, SendResult};
use crate::notification::payload::{Attachment, Payload};
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

fn default_username() -> String {
    "Gerrit".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Slack 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook_url: String,
    /// 发送者显示名
    #[serde(default = "default_username")]
    pub username: String,
    /// 超时时间 (秒)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            username: default_username(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Webhook 请求载荷
#[derive(Debug, Serialize)]
pub struct SlackMessage<'a> {
    pub channel: String,
    pub username: &'a str,
    pub link_names: u8,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<&'a Attachment>,
}

impl<'a> SlackMessage<'a> {
    pub fn new(username: &'a str, destination: &Destination, payload: &'a Payload) -> Self {
        let (text, attachments) = match payload {
            Payload::Plain(text) => (text.as_str(), Vec::new()),
            Payload::Attachment(attachment) => ("", vec![attachment]),
        };

        Self {
            channel: destination.to_string(),
            username,
            link_names: 1,
            text,
            attachments,
        }
    }
}

/// Slack 渠道
#[derive(Debug)]
pub struct SlackChannel {
    client: Client,
    config: SlackConfig,
}

impl SlackChannel {
    /// 创建新的 Slack 渠道
    pub fn new(config: SlackConfig) -> Result<Self> {
        if config.webhook_url.is_empty() {
            return Err(anyhow!("slack.webhook_url is required"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }
}

impl DeliverySink for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn send(&self, destination: &Destination, payload: &Payload) -> Result<SendResult> {
        let message = SlackMessage::new(&self.config.username, destination, payload);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&message)
            .send()
            .context("HTTP request failed")?;

        let status = response.status();
        if status.is_success() {
            debug!(destination = %destination, "Message sent successfully");
            Ok(SendResult::Sent)
        } else {
            let body = response.text().unwrap_or_default();
            error!(
                destination = %destination,
                status = %status,
                error = %body,
                "Failed to send message"
            );
            Ok(SendResult::Failed(format!("{}: {}", status, body)))
        }
    }
}
