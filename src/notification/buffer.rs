//! 通知缓冲区 - 按目标累积待发送通知，由分发循环定期整体取走
//!
//! 所有读写都在同一把锁内完成；`drain` 在锁内取走全部内容并清空，
//! 生产者不会看到取到一半的缓冲区。

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::channel::{Destination, Notification, Outbound};

type Entries = BTreeMap<Destination, Vec<Notification>>;

/// 并发安全的通知缓冲区
#[derive(Debug, Default)]
pub struct NotificationBuffer {
    entries: Mutex<Entries>,
}

impl NotificationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // 锁中毒时直接接管数据
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 追加一条通知
    pub fn append(&self, destination: Destination, notification: Notification) {
        self.lock().entry(destination).or_default().push(notification);
    }

    /// 把一条分类结果追加到它的所有目标，整体在一次加锁内完成
    ///
    /// 返回追加的条数
    pub fn append_outbound(&self, outbound: Outbound) -> usize {
        let Outbound {
            destinations,
            notification,
        } = outbound;
        let count = destinations.len();

        let mut entries = self.lock();
        for destination in destinations {
            entries
                .entry(destination)
                .or_default()
                .push(notification.clone());
        }

        count
    }

    /// 取走全部内容并清空
    pub fn drain(&self) -> BufferSnapshot {
        let entries = std::mem::take(&mut *self.lock());
        BufferSnapshot {
            taken_at: Utc::now(),
            entries,
        }
    }

    /// 当前缓冲的通知总数
    pub fn pending(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}

/// 一次 drain 的结果
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    pub taken_at: DateTime<Utc>,
    entries: Entries,
}

impl BufferSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 通知总数
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn destination_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, destination: &Destination) -> Option<&[Notification]> {
        self.entries.get(destination).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Destination, &[Notification])> {
        self.entries.iter().map(|(d, n)| (d, n.as_slice()))
    }

    /// 诊断输出用的 JSON
    pub fn to_json(&self) -> serde_json::Value {
        let entries: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(destination, notifications)| {
                (
                    destination.to_string(),
                    serde_json::to_value(notifications).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();

        serde_json::json!({
            "taken_at": self.taken_at.to_rfc3339(),
            "entries": entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::channel::NotificationKind;
    use crate::notification::payload::Payload;
    use std::sync::Arc;
    use std::thread;

    fn note(text: &str) -> Notification {
        Notification::new(NotificationKind::Announcement, Payload::Plain(text.to_string()))
    }

    #[test]
    fn test_append_then_drain() {
        let buffer = NotificationBuffer::new();
        buffer.append(Destination::channel("team"), note("hello"));

        let snapshot = buffer.drain();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&Destination::channel("team")).unwrap(), &[note("hello")]);

        // drain 是破坏性的
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_insertion_order_per_destination() {
        let buffer = NotificationBuffer::new();
        buffer.append(Destination::channel("a"), note("1"));
        buffer.append(Destination::channel("b"), note("x"));
        buffer.append(Destination::channel("a"), note("2"));

        let snapshot = buffer.drain();
        assert_eq!(snapshot.destination_count(), 2);
        assert_eq!(snapshot.get(&Destination::channel("a")).unwrap(), &[note("1"), note("2")]);
    }

    #[test]
    fn test_append_outbound_fans_out() {
        let buffer = NotificationBuffer::new();
        let added = buffer.append_outbound(Outbound {
            destinations: vec![Destination::channel("a"), Destination::channel("b")],
            notification: note("hi"),
        });

        assert_eq!(added, 2);
        assert_eq!(buffer.pending(), 2);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let buffer = Arc::new(NotificationBuffer::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..100 {
                        buffer.append(Destination::channel(format!("c{}", t)), note(&i.to_string()));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = buffer.drain();
        assert_eq!(snapshot.len(), 800);
        for t in 0..8 {
            let notes = snapshot.get(&Destination::channel(format!("c{}", t))).unwrap();
            let expected: Vec<_> = (0..100).map(|i| note(&i.to_string())).collect();
            assert_eq!(notes, expected.as_slice());
        }
    }

    #[test]
    fn test_drain_during_appends_neither_loses_nor_duplicates() {
        let buffer = Arc::new(NotificationBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..1000 {
                    buffer.append(Destination::channel("team"), note(&i.to_string()));
                }
            })
        };

        let mut seen = Vec::new();
        while !producer.is_finished() {
            let snapshot = buffer.drain();
            if let Some(notes) = snapshot.get(&Destination::channel("team")) {
                seen.extend_from_slice(notes);
            }
        }
        producer.join().unwrap();
        if let Some(notes) = buffer.drain().get(&Destination::channel("team")) {
            seen.extend_from_slice(notes);
        }

        let expected: Vec<_> = (0..1000).map(|i| note(&i.to_string())).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_snapshot_json() {
        let buffer = NotificationBuffer::new();
        buffer.append(Destination::user("bob"), note("failed"));
        let json = buffer.drain().to_json();
        assert_eq!(json["entries"]["@bob"][0]["kind"], "announcement");
        assert_eq!(json["entries"]["@bob"][0]["payload"]["plain"], "failed");
    }
}
