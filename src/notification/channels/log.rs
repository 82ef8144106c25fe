//! 日志渠道 - 只把通知写入日志，不对外发送

use anyhow::Result;
use tracing::info;

use crate::notification::channel::{DeliverySink, Destination, SendResult};
use crate::notification::payload::Payload;

/// 日志渠道（未配置 Slack 时的 dry-run 投递端）
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverySink for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, destination: &Destination, payload: &Payload) -> Result<SendResult> {
        info!(
            channel = "log",
            destination = %destination,
            payload = %serde_json::to_string(payload)?,
            "Notification"
        );
        Ok(SendResult::Sent)
    }
}
