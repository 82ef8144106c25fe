//! Gerrit Notifier CLI
//!
//! 监听 Gerrit stream-events，把代码评审事件转发到 Slack

use anyhow::Result;
use clap::{Parser, Subcommand};
use gerrit_notifier::cli::{self as commands, ClassifyArgs};
use gerrit_notifier::config::{development_mode, AppConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "gerrit-notifier")]
#[command(about = "Gerrit Notifier - 把 Gerrit 代码评审事件转发到 Slack")]
#[command(version)]
struct Cli {
    /// 配置文件路径 (默认: ~/.config/gerrit-notifier/config.json)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// 只记录日志，不发送任何消息（也可设置 DEVELOPMENT 环境变量）
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 监听事件流并定时发送通知
    Run,
    /// 查看某个 project/owner 会路由到哪些频道
    Route {
        /// Gerrit project
        project: String,
        /// change owner 用户名
        owner: String,
    },
    /// 离线分类事件，输出缓冲区快照，不发送
    Classify(ClassifyArgs),
    /// 向所有频道广播一条公告
    Psa {
        /// 公告内容
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=gerrit_notifier=debug gerrit-notifier run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gerrit_notifier=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)?;

    let dry_run = cli.dry_run || development_mode();
    if dry_run {
        warn!("Dry-run mode: notifications will be logged, not sent");
    }

    match cli.command {
        Commands::Run => {
            commands::handle_run(config, dry_run).await?;
        }
        Commands::Route { project, owner } => {
            let channels = commands::handle_route(&config, &project, &owner);
            if channels.is_empty() {
                println!("没有频道订阅 {} / {}", project, owner);
            } else {
                for channel in channels {
                    println!("{}", channel);
                }
            }
        }
        Commands::Classify(args) => {
            let snapshot = commands::handle_classify(&config, &args)?;
            println!("{}", serde_json::to_string_pretty(&snapshot.to_json())?);
        }
        Commands::Psa { message } => {
            let report = commands::handle_psa(config, message, dry_run).await?;
            info!(sent = report.sent, failed = report.failed, "Announcement delivered");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
