//! 分发循环 - 定时取走缓冲区并交给投递端
//!
//! 每个周期 drain 一次缓冲区；为空时只记日志，否则按目标逐条发送。
//! 单条发送失败只记日志，不重试，也不影响其余通知。

use super::buffer::{BufferSnapshot, NotificationBuffer};
use super::channel::{DeliverySink, SendResult};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 默认发送周期
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

/// 单个周期的发送统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub destinations: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn total(&self) -> usize {
        self.sent + self.skipped + self.failed
    }
}

/// 分发循环
pub struct DispatchLoop {
    buffer: Arc<NotificationBuffer>,
    sink: Arc<dyn DeliverySink>,
    interval: Duration,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl DispatchLoop {
    pub fn new(buffer: Arc<NotificationBuffer>, sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            buffer,
            sink,
            interval: DEFAULT_INTERVAL,
            dry_run: false,
        }
    }

    /// 设置发送周期
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 执行一个周期：drain 并发送
    pub fn tick(&self) -> TickReport {
        let snapshot = self.buffer.drain();

        if snapshot.is_empty() {
            info!("Buffer is empty");
            return TickReport::default();
        }

        info!(
            destinations = snapshot.destination_count(),
            notifications = snapshot.len(),
            "Current buffer:\n{}",
            serde_json::to_string_pretty(&snapshot.to_json()).unwrap_or_default()
        );

        self.deliver(&snapshot)
    }

    /// 按目标逐条发送快照中的通知
    pub fn deliver(&self, snapshot: &BufferSnapshot) -> TickReport {
        let mut report = TickReport {
            destinations: snapshot.destination_count(),
            ..Default::default()
        };

        for (destination, notifications) in snapshot.iter() {
            for notification in notifications {
                if self.dry_run {
                    debug!(destination = %destination, kind = %notification.kind, "[DRY-RUN] Would send notification");
                    report.skipped += 1;
                    continue;
                }

                let result = match self.sink.send(destination, &notification.payload) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(sink = self.sink.name(), destination = %destination, error = %e, "Delivery failed");
                        SendResult::Failed(e.to_string())
                    }
                };

                match result {
                    SendResult::Sent => report.sent += 1,
                    SendResult::Skipped(reason) => {
                        debug!(destination = %destination, reason = %reason, "Notification skipped");
                        report.skipped += 1;
                    }
                    SendResult::Failed(reason) => {
                        warn!(destination = %destination, kind = %notification.kind, reason = %reason, "Notification dropped");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Buffer flushed"
        );

        report
    }

    /// 永久运行：先发送再等待一个周期
    pub fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            sink = self.sink.name(),
            dry_run = self.dry_run,
            "Dispatch loop started"
        );
        loop {
            self.tick();
            thread::sleep(self.interval);
        }
    }

    /// 在独立线程中运行
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("dispatch".to_string())
            .spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::channel::{Destination, Notification, NotificationKind};
    use crate::notification::payload::Payload;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 测试用的 mock 投递端："boom" 返回错误，"rejected" 返回 Failed
    struct MockSink {
        sent: Mutex<Vec<(Destination, Payload)>>,
        attempts: AtomicUsize,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
            }
        }

        fn sent(&self) -> Vec<(Destination, Payload)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl DeliverySink for MockSink {
        fn name(&self) -> &str {
            "mock"
        }

        fn send(&self, destination: &Destination, payload: &Payload) -> Result<SendResult> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match payload {
                Payload::Plain(text) if text == "boom" => Err(anyhow!("connection reset")),
                Payload::Plain(text) if text == "rejected" => {
                    Ok(SendResult::Failed("channel_not_found".to_string()))
                }
                _ => {
                    self.sent
                        .lock()
                        .unwrap()
                        .push((destination.clone(), payload.clone()));
                    Ok(SendResult::Sent)
                }
            }
        }
    }

    fn note(text: &str) -> Notification {
        Notification::new(NotificationKind::Announcement, Payload::Plain(text.to_string()))
    }

    #[test]
    fn test_empty_tick() {
        let buffer = Arc::new(NotificationBuffer::new());
        let sink = Arc::new(MockSink::new());
        let dispatcher = DispatchLoop::new(buffer, sink.clone());

        assert_eq!(dispatcher.tick(), TickReport::default());
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tick_sends_in_insertion_order() {
        let buffer = Arc::new(NotificationBuffer::new());
        let sink = Arc::new(MockSink::new());
        let dispatcher = DispatchLoop::new(buffer.clone(), sink.clone());

        buffer.append(Destination::channel("team"), note("1"));
        buffer.append(Destination::channel("team"), note("2"));
        buffer.append(Destination::user("bob"), note("dm"));

        let report = dispatcher.tick();
        assert_eq!(report.destinations, 2);
        assert_eq!(report.sent, 3);

        let team: Vec<_> = sink
            .sent()
            .into_iter()
            .filter(|(d, _)| *d == Destination::channel("team"))
            .map(|(_, p)| p)
            .collect();
        assert_eq!(team, vec![Payload::Plain("1".into()), Payload::Plain("2".into())]);

        // 已经清空
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_failure_does_not_stop_remaining() {
        let buffer = Arc::new(NotificationBuffer::new());
        let sink = Arc::new(MockSink::new());
        let dispatcher = DispatchLoop::new(buffer.clone(), sink.clone());

        buffer.append(Destination::channel("team"), note("boom"));
        buffer.append(Destination::channel("team"), note("rejected"));
        buffer.append(Destination::channel("team"), note("ok"));

        let report = dispatcher.tick();
        assert_eq!(report.failed, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);

        // 失败的通知不会重试
        assert_eq!(dispatcher.tick(), TickReport::default());
    }

    #[test]
    fn test_dry_run_does_not_send() {
        let buffer = Arc::new(NotificationBuffer::new());
        let sink = Arc::new(MockSink::new());
        let dispatcher = DispatchLoop::new(buffer.clone(), sink.clone()).with_dry_run(true);

        buffer.append(Destination::channel("team"), note("hello"));

        let report = dispatcher.tick();
        assert_eq!(report.skipped, 1);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_spawned_loop_flushes_periodically() {
        let buffer = Arc::new(NotificationBuffer::new());
        let sink = Arc::new(MockSink::new());
        buffer.append(Destination::channel("team"), note("hello"));

        DispatchLoop::new(buffer.clone(), sink.clone())
            .with_interval(Duration::from_millis(10))
            .spawn()
            .unwrap();

        for _ in 0..200 {
            if !sink.sent().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sink.sent().len(), 1);
    }
}
