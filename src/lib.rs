//! Gerrit Notifier - 把 Gerrit 代码评审事件转发到 Slack

pub mod cli;
pub mod config;
pub mod gerrit;
pub mod identity;
pub mod notification;
pub mod relay;
pub mod routing;
pub mod stream;

pub use config::AppConfig;
pub use gerrit::{Event, EventKind, EventParser};
pub use identity::{AliasMap, IdentityLookup};
pub use notification::{
    BufferSnapshot, DeliverySink, Destination, DispatchLoop, EventClassifier, Notification,
    NotificationBuffer, NotificationKind, Payload, SendResult, TickReport,
};
pub use relay::Relay;
pub use routing::{RoutingRule, RoutingTable};
pub use stream::{CommandSource, EventSource, FixedDelay, ReconnectPolicy, StreamConsumer};
