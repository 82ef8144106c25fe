//! 诊断命令 - 查看路由结果、离线分类事件

use crate::config::AppConfig;
use crate::notification::{BufferSnapshot, NotificationBuffer};
use crate::relay::Relay;
use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Classify 命令参数
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// 事件文件（每行一条 stream-events JSON），默认读取 stdin
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

/// 处理 route 命令：返回匹配的频道
pub fn handle_route(config: &AppConfig, project: &str, owner: &str) -> Vec<String> {
    config
        .routing
        .destinations_for(project, owner)
        .into_iter()
        .collect()
}

/// 处理 classify 命令：只分类、缓冲，不发送
pub fn handle_classify(config: &AppConfig, args: &ClassifyArgs) -> Result<BufferSnapshot> {
    let reader: Box<dyn BufRead> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    classify_lines(config, reader)
}

/// 逐行分类，坏行记录后跳过
pub fn classify_lines(config: &AppConfig, reader: impl BufRead) -> Result<BufferSnapshot> {
    let buffer = Arc::new(NotificationBuffer::new());
    let relay = Relay::from_config(config, buffer.clone());

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read event line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = relay.process_line(line) {
            warn!(line = index + 1, error = %format!("{:#}", e), "Skipping malformed event");
        }
    }

    Ok(buffer.drain())
}
