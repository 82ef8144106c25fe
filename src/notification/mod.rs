//! 通知层 - 分类、缓冲、定时分发
//!
//! # 数据流
//! 1. `EventClassifier` 根据事件字段生成通知（可能多条）
//! 2. `NotificationBuffer` 按目标累积通知
//! 3. `DispatchLoop` 定时 drain 缓冲区，交给 `DeliverySink` 发送
//!
//! # 使用示例
//! ```ignore
//! use gerrit_notifier::notification::{DispatchLoop, NotificationBuffer, SlackChannel};
//!
//! let buffer = Arc::new(NotificationBuffer::new());
//! let sink = Arc::new(SlackChannel::new(config.slack)?);
//! DispatchLoop::new(buffer.clone(), sink).spawn()?;
//! ```

pub mod buffer;
pub mod channel;
pub mod channels;
pub mod classifier;
pub mod dispatcher;
pub mod payload;

pub use buffer::{BufferSnapshot, NotificationBuffer};
pub use channel::{DeliverySink, Destination, Notification, NotificationKind, Outbound, SendResult};
pub use channels::{LogChannel, SlackChannel, SlackConfig};
pub use classifier::{Audience, EventClassifier, Renderer, Rule};
pub use dispatcher::{DispatchLoop, TickReport, DEFAULT_INTERVAL};
pub use payload::{Attachment, Color, Field, Markdown, Payload};
