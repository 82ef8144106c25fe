//! 配置加载
//!
//! 默认读取 `~/.config/gerrit-notifier/config.json`：
//! ```json
//! {
//!   "gerrit": { "stream": "ssh -p 29418 review.example.com gerrit stream-events", "bots": ["jenkins"] },
//!   "slack": { "webhook_url": "https://hooks.slack.com/services/..." },
//!   "channels": { "team": { "project": ["svc", "lib*"], "owner": ["bob"] } },
//!   "aliases": { "bob": "bobby" },
//!   "dispatch": { "interval_secs": 15, "reconnect_delay_secs": 3 }
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::identity::AliasMap;
use crate::notification::SlackConfig;
use crate::routing::RoutingTable;

/// 设置后强制 dry-run
pub const DEVELOPMENT_ENV: &str = "DEVELOPMENT";

fn default_bots() -> Vec<String> {
    vec!["jenkins".to_string()]
}

/// Gerrit 事件流配置
#[derive(Debug, Clone, Deserialize)]
pub struct GerritConfig {
    /// 输出 stream-events 的 shell 命令
    #[serde(default)]
    pub stream: String,
    /// 视为 bot 的账户
    #[serde(default = "default_bots")]
    pub bots: Vec<String>,
}

impl Default for GerritConfig {
    fn default() -> Self {
        Self {
            stream: String::new(),
            bots: default_bots(),
        }
    }
}

/// 发送周期与重连配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub interval_secs: u64,
    pub reconnect_delay_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            reconnect_delay_secs: 3,
        }
    }
}

impl DispatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    gerrit: GerritConfig,
    #[serde(default)]
    slack: Option<SlackConfig>,
    channels: serde_json::Value,
    #[serde(default)]
    aliases: HashMap<String, String>,
    #[serde(default)]
    dispatch: DispatchConfig,
}

/// 完整配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gerrit: GerritConfig,
    pub slack: Option<SlackConfig>,
    pub routing: RoutingTable,
    pub aliases: AliasMap,
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("gerrit-notifier")
            .join("config.json")
    }

    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(
            path = %path.display(),
            channels = config.routing.len(),
            aliases = config.aliases.len(),
            "Loaded config"
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;
        let routing = RoutingTable::from_json(&raw.channels)?;

        Ok(Self {
            gerrit: raw.gerrit,
            slack: raw.slack,
            routing,
            aliases: AliasMap::new(raw.aliases),
            dispatch: raw.dispatch,
        })
    }

    /// 事件流命令，未配置时报错
    pub fn stream_command(&self) -> Result<&str> {
        if self.gerrit.stream.trim().is_empty() {
            return Err(anyhow!("gerrit.stream is not configured"));
        }
        Ok(&self.gerrit.stream)
    }
}

/// `DEVELOPMENT` 环境变量是否设置
pub fn development_mode() -> bool {
    std::env::var_os(DEVELOPMENT_ENV).is_some()
}
