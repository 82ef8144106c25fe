//! CLI command handling

pub mod inspect;
pub mod psa;
pub mod run;

pub use inspect::*;
pub use psa::*;
pub use run::*;

use crate::notification::{DeliverySink, LogChannel, SlackChannel, SlackConfig};
use anyhow::{anyhow, Result};
use std::sync::Arc;

/// 构建投递端：有 Slack 配置时用 Slack，dry-run 且未配置时退回日志渠道
///
/// 内部使用 blocking HTTP client，不要在 async 上下文中直接调用
pub fn build_sink(slack: Option<SlackConfig>, dry_run: bool) -> Result<Arc<dyn DeliverySink>> {
    match slack {
        Some(config) if !config.webhook_url.is_empty() => Ok(Arc::new(SlackChannel::new(config)?)),
        _ if dry_run => Ok(Arc::new(LogChannel::new())),
        _ => Err(anyhow!(
            "slack.webhook_url is not configured (use --dry-run or set DEVELOPMENT to run without it)"
        )),
    }
}
