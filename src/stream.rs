//! 事件流消费者 - 读取 Gerrit stream-events 并在断开后重连
//!
//! 状态机：`Connecting -> Streaming -> ReconnectWait -> Connecting ...`
//! 没有重试上限，进程存活期间一直运行。

use anyhow::{Context, Result};
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::relay::Relay;

/// 默认重连等待
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// 行式事件源
pub trait EventSource {
    type Reader: AsyncBufRead + Unpin;

    /// 建立连接（如启动子进程），返回逐行读取的 reader
    fn connect(&mut self) -> impl Future<Output = Result<Self::Reader>>;

    /// 日志中显示的描述
    fn describe(&self) -> String;
}

/// 通过 shell 命令（通常是 `ssh ... gerrit stream-events`）获取事件
pub struct CommandSource {
    command: String,
    child: Option<Child>,
}

impl CommandSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            child: None,
        }
    }
}

impl EventSource for CommandSource {
    type Reader = BufReader<ChildStdout>;

    async fn connect(&mut self) -> Result<Self::Reader> {
        // 上一个子进程随 drop 被 kill
        self.child = None;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn `{}`", self.command))?;

        let stdout = child
            .stdout
            .take()
            .context("Child process has no stdout")?;
        self.child = Some(child);

        Ok(BufReader::new(stdout))
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}

/// 重连策略
pub trait ReconnectPolicy: Send {
    /// 第 `attempt` 次（从 1 开始）重连前等待多久
    fn next_delay(&mut self, attempt: u32) -> Duration;
}

/// 固定间隔，无上限
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.0
    }
}

/// 消费者状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Connecting,
    Streaming,
    ReconnectWait,
}

/// 单次连接的读取统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub lines: usize,
    pub skipped: usize,
    pub buffered: usize,
}

/// 事件流消费者
pub struct StreamConsumer<S: EventSource> {
    source: S,
    policy: Box<dyn ReconnectPolicy>,
    relay: Relay,
    state: ConsumerState,
    reader: Option<S::Reader>,
    attempt: u32,
}

impl<S: EventSource> StreamConsumer<S> {
    pub fn new(source: S, relay: Relay) -> Self {
        Self {
            source,
            policy: Box::new(FixedDelay::default()),
            relay,
            state: ConsumerState::Connecting,
            reader: None,
            attempt: 0,
        }
    }

    /// 设置重连策略
    pub fn with_policy(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// 永久运行
    pub async fn run(&mut self) {
        info!(source = %self.source.describe(), "Listening to stream");
        loop {
            self.step().await;
        }
    }

    /// 推进一次状态机
    pub async fn step(&mut self) {
        self.state = match self.state {
            ConsumerState::Connecting => match self.source.connect().await {
                Ok(reader) => {
                    info!(source = %self.source.describe(), "Connected to stream");
                    self.reader = Some(reader);
                    self.attempt = 0;
                    ConsumerState::Streaming
                }
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Failed to start stream");
                    ConsumerState::ReconnectWait
                }
            },
            ConsumerState::Streaming => {
                if let Some(reader) = self.reader.take() {
                    let stats = self.consume(reader).await;
                    info!(
                        lines = stats.lines,
                        skipped = stats.skipped,
                        buffered = stats.buffered,
                        "Stream ended"
                    );
                }
                warn!("Connection to Gerrit server failed, trying to reconnect");
                ConsumerState::ReconnectWait
            }
            ConsumerState::ReconnectWait => {
                self.attempt = self.attempt.saturating_add(1);
                let delay = self.policy.next_delay(self.attempt);
                let delay_ms = delay.as_millis() as u64;
                warn!(attempt = self.attempt, delay_ms, "Reconnecting");
                sleep(delay).await;
                ConsumerState::Connecting
            }
        };
    }

    /// 读到 EOF 或 I/O 出错为止；每行同步完成分类和缓冲后再读下一行
    ///
    /// 非 UTF-8 的行与解析失败的行一样记录后跳过，不会结束本次连接
    pub async fn consume(&self, mut reader: S::Reader) -> StreamStats {
        let mut stats = StreamStats::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Stream read failed");
                    break;
                }
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    stats.lines += 1;
                    stats.skipped += 1;
                    warn!(error = %e, "Skipping non UTF-8 event line");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;

            match self.relay.process_line(line) {
                Ok(n) => stats.buffered += n,
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Skipping malformed event");
                    stats.skipped += 1;
                }
            }
        }

        stats
    }
}
