//! 事件中继 - 把一行事件变成缓冲区中的通知

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::gerrit::{Event, EventParser};
use crate::identity::IdentityLookup;
use crate::notification::{
    Destination, EventClassifier, Notification, NotificationBuffer, NotificationKind, Outbound,
    Payload,
};
use crate::routing::RoutingTable;

/// 事件中继
pub struct Relay {
    parser: EventParser,
    routing: RoutingTable,
    classifier: EventClassifier,
    buffer: Arc<NotificationBuffer>,
    /// 记录每一行原始事件（dry-run 时开启）
    log_raw: bool,
}

impl Relay {
    pub fn new(
        parser: EventParser,
        routing: RoutingTable,
        identities: Arc<dyn IdentityLookup>,
        buffer: Arc<NotificationBuffer>,
    ) -> Self {
        Self {
            parser,
            routing,
            classifier: EventClassifier::new(identities),
            buffer,
            log_raw: false,
        }
    }

    /// 从配置构建
    pub fn from_config(config: &AppConfig, buffer: Arc<NotificationBuffer>) -> Self {
        Self::new(
            EventParser::new(config.gerrit.bots.iter().cloned()),
            config.routing.clone(),
            Arc::new(config.aliases.clone()),
            buffer,
        )
    }

    pub fn with_raw_logging(mut self, log_raw: bool) -> Self {
        self.log_raw = log_raw;
        self
    }

    pub fn buffer(&self) -> &Arc<NotificationBuffer> {
        &self.buffer
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// 处理一行原始事件，返回写入缓冲区的通知条数
    ///
    /// 解析失败返回错误，由调用方记录并跳过
    pub fn process_line(&self, line: &str) -> Result<usize> {
        if self.log_raw {
            debug!(line = %line, "Raw event");
        }

        match self.parser.parse(line)? {
            Some(event) => Ok(self.process_event(&event)),
            None => {
                debug!("Event without change, ignored");
                Ok(0)
            }
        }
    }

    /// 路由 + 分类 + 写入缓冲区
    pub fn process_event(&self, event: &Event) -> usize {
        if event.build_passed() {
            debug!(
                change = event.change_number,
                builder = event.build.as_ref().map(|b| b.builder.as_str()).unwrap_or_default(),
                "Build passed"
            );
        }

        let channels = self.routing.destinations_for(&event.project, &event.owner);
        if channels.is_empty() {
            debug!(
                project = %event.project,
                owner = %event.owner,
                kind = event.kind.as_str(),
                "No channel subscribed to event"
            );
            return 0;
        }

        self.classifier
            .classify(event, &channels)
            .into_iter()
            .map(|outbound| self.buffer.append_outbound(outbound))
            .sum()
    }

    /// 向所有频道广播一条公告
    pub fn announce(&self, text: &str) -> usize {
        self.buffer.append_outbound(Outbound {
            destinations: self
                .routing
                .all_channels()
                .into_iter()
                .map(|name| Destination::channel(name))
                .collect(),
            notification: Notification::new(
                NotificationKind::Announcement,
                Payload::Plain(text.to_string()),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AliasMap;
    use crate::notification::Color;
    use crate::routing::RoutingRule;
    use std::collections::BTreeMap;

    fn relay() -> Relay {
        let mut channels = BTreeMap::new();
        channels.insert(
            "team".to_string(),
            RoutingRule {
                project: ["svc".to_string()].into(),
                owner: ["bob".to_string()].into(),
            },
        );
        channels.insert(
            "infra".to_string(),
            RoutingRule {
                project: ["ops*".to_string()].into(),
                owner: Default::default(),
            },
        );
        Relay::new(
            EventParser::default(),
            RoutingTable::new(channels),
            Arc::new(AliasMap::default()),
            Arc::new(NotificationBuffer::new()),
        )
    }

    #[test]
    fn test_new_commit_end_to_end() {
        let relay = relay();
        let line = r#"{"type":"patchset-created","change":{"project":"svc","branch":"master","number":"1","subject":"fix","url":"https://review/1","owner":{"username":"bob"}},"patchSet":{"number":"1"},"uploader":{"username":"bob"}}"#;

        assert_eq!(relay.process_line(line).unwrap(), 1);

        let snapshot = relay.buffer().drain();
        let notes = snapshot.get(&Destination::channel("team")).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::NewCommit);
        assert_eq!(notes[0].kind.as_str(), "new commit");
        assert_eq!(notes[0].color(), Some(Color::Yellow));
    }

    #[test]
    fn test_unrouted_event_is_dropped() {
        let relay = relay();
        let line = r#"{"type":"change-merged","change":{"project":"svc","number":2,"owner":{"username":"carol"}},"submitter":{"username":"carol"}}"#;

        assert_eq!(relay.process_line(line).unwrap(), 0);
        assert!(relay.buffer().drain().is_empty());
    }

    #[test]
    fn test_malformed_line_is_error_and_buffer_untouched() {
        let relay = relay();
        assert!(relay.process_line("{not json").is_err());
        assert_eq!(relay.buffer().pending(), 0);
    }

    #[test]
    fn test_successful_build_is_not_announced() {
        let relay = relay();
        let line = r#"{"type":"comment-added","change":{"project":"svc","number":3,"owner":{"username":"bob"}},"author":{"username":"jenkins"},"comment":"Build Successful"}"#;

        assert_eq!(relay.process_line(line).unwrap(), 0);
        assert_eq!(relay.buffer().pending(), 0);
    }

    #[test]
    fn test_announce_reaches_every_channel() {
        let relay = relay();
        assert_eq!(relay.announce("deploy freeze"), 2);

        let snapshot = relay.buffer().drain();
        assert_eq!(snapshot.destination_count(), 2);
        assert_eq!(
            snapshot.get(&Destination::channel("infra")).unwrap()[0].payload,
            Payload::Plain("deploy freeze".to_string())
        );
    }
}
