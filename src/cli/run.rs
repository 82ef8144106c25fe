//! Run 命令 - 监听事件流并定时发送通知

use crate::config::AppConfig;
use crate::notification::{DispatchLoop, NotificationBuffer};
use crate::relay::Relay;
use crate::stream::{CommandSource, FixedDelay, StreamConsumer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::build_sink;

/// 处理 run 命令，正常情况下不会返回
pub async fn handle_run(config: AppConfig, dry_run: bool) -> Result<()> {
    let stream = config.stream_command()?.to_string();

    let slack = config.slack.clone();
    let sink = tokio::task::spawn_blocking(move || build_sink(slack, dry_run))
        .await
        .context("Sink construction panicked")??;

    let buffer = Arc::new(NotificationBuffer::new());

    DispatchLoop::new(buffer.clone(), sink)
        .with_interval(config.dispatch.interval())
        .with_dry_run(dry_run)
        .spawn()
        .context("Failed to start dispatch thread")?;

    let relay = Relay::from_config(&config, buffer).with_raw_logging(dry_run);
    info!(
        channels = relay.routing().len(),
        dry_run,
        "Gerrit notifier started"
    );

    let mut consumer = StreamConsumer::new(CommandSource::new(stream), relay)
        .with_policy(FixedDelay(config.dispatch.reconnect_delay()));
    consumer.run().await;

    Ok(())
}
