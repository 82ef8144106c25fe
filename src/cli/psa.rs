//! Psa 命令 - 向所有频道广播一条公告并立即发送

use crate::config::AppConfig;
use crate::notification::{DispatchLoop, NotificationBuffer, TickReport};
use crate::relay::Relay;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use super::build_sink;

/// 处理 psa 命令
pub async fn handle_psa(config: AppConfig, message: String, dry_run: bool) -> Result<TickReport> {
    if message.trim().is_empty() {
        return Err(anyhow!("公告内容不能为空"));
    }

    tokio::task::spawn_blocking(move || -> Result<TickReport> {
        let buffer = Arc::new(NotificationBuffer::new());
        let relay = Relay::from_config(&config, buffer.clone());
        relay.announce(&message);

        let sink = build_sink(config.slack.clone(), dry_run)?;
        Ok(DispatchLoop::new(buffer, sink).with_dry_run(dry_run).tick())
    })
    .await
    .context("Announcement task panicked")?
}
