//! 事件分类器 - 根据事件字段决定发送哪些通知
//!
//! 规则按固定顺序逐条评估，彼此独立，可以同时命中；
//! 同一个事件可能产生多条通知（例如新 patchset 和 CI 失败）。

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::channel::{Destination, Notification, NotificationKind, Outbound};
use super::payload::{Attachment, Color, Field, Payload};
use crate::gerrit::Event;
use crate::identity::IdentityLookup;

/// 通知受众
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// 广播到所有匹配的频道
    Broadcast,
    /// 私信给指定聊天用户
    Direct(String),
}

/// 渲染辅助：链接、字段、用户名
pub struct Renderer<'a> {
    identities: &'a dyn IdentityLookup,
}

impl<'a> Renderer<'a> {
    pub fn new(identities: &'a dyn IdentityLookup) -> Self {
        Self { identities }
    }

    pub fn handle(&self, username: &str) -> String {
        self.identities.chat_handle_for(username)
    }

    pub fn owner_handle(&self, event: &Event) -> String {
        self.handle(&event.owner)
    }

    pub fn author_handle(&self, event: &Event) -> String {
        event
            .author
            .as_deref()
            .map(|a| self.handle(a))
            .unwrap_or_else(|| "someone".to_string())
    }

    pub fn commit_without_owner(&self, event: &Event) -> String {
        format!("<{}|{}: {}>", event.url, event.project, event.subject)
    }

    pub fn commit(&self, event: &Event) -> String {
        format!("{} ({})", self.commit_without_owner(event), self.owner_handle(event))
    }

    /// 所有广播通知共用的 attachment 骨架
    pub fn attachment(&self, event: &Event) -> Attachment {
        let mut attachment = Attachment::new(format!(
            "<{}|Change {}>: {}",
            event.url, event.change_number, event.subject
        ))
        .with_field(Field::separated(format!("*{}* | {}", event.project, event.branch)));

        // 触发者未知时只省略 Author 字段，通知照发
        if event.author.is_some() {
            attachment = attachment.with_field(Field::new("Author", self.owner_handle(event)));
        }

        attachment
    }
}

type Predicate = fn(&Event) -> bool;
type Render = fn(&Event, &Renderer<'_>) -> (Audience, Notification);

/// 单条分类规则
pub struct Rule {
    pub name: &'static str,
    applies: Predicate,
    render: Render,
}

impl Rule {
    pub fn new(name: &'static str, applies: Predicate, render: Render) -> Self {
        Self {
            name,
            applies,
            render,
        }
    }

    pub fn applies(&self, event: &Event) -> bool {
        (self.applies)(event)
    }
}

fn broadcast(kind: NotificationKind, attachment: Attachment) -> (Audience, Notification) {
    (
        Audience::Broadcast,
        Notification::new(kind, Payload::Attachment(attachment)),
    )
}

/// 默认规则，顺序即评估顺序
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "ci_failure",
            |e| e.build_failed() && !e.owner.is_empty(),
            |e, r| {
                let builder = e.build.as_ref().map(|b| b.builder.as_str()).unwrap_or("CI");
                (
                    Audience::Direct(r.owner_handle(e)),
                    Notification::new(
                        NotificationKind::BuildFailed,
                        Payload::Plain(format!(
                            "{} *failed* on {}",
                            r.commit_without_owner(e),
                            builder
                        )),
                    ),
                )
            },
        ),
        Rule::new("patchset_created", Event::is_patchset_created, |e, r| {
            if e.is_new_patchset() {
                broadcast(
                    NotificationKind::NewCommit,
                    r.attachment(e)
                        .with_pretext("There is a new commit")
                        .with_fallback(format!(
                            "There is a new commit: {}. Feel free to do the code review.",
                            r.commit(e)
                        ))
                        .with_color(Color::Yellow),
                )
            } else {
                broadcast(
                    NotificationKind::AmendedCommit,
                    r.attachment(e)
                        .with_pretext("There has been an amend to commit")
                        .with_fallback(format!(
                            "There has been an amend to commit: {}. Feel free to do the code review.",
                            r.commit(e)
                        ))
                        .with_color(Color::Orange),
                )
            }
        }),
        Rule::new(
            "code_review_approved",
            |e| e.code_review_score() == Some(2),
            |e, r| {
                let author = r.author_handle(e);
                broadcast(
                    NotificationKind::Approved,
                    r.attachment(e)
                        .with_pretext(format!("Change *+2'd* by {}", author))
                        .with_fallback(format!(
                            "{} has *+2'd* {}: ready for *merge*",
                            author,
                            r.commit(e)
                        ))
                        .with_color(Color::Green),
                )
            },
        ),
        // bot 的 +1 不通知
        Rule::new(
            "code_review_tentatively_approved",
            |e| e.code_review_score() == Some(1) && e.is_human,
            |e, r| {
                let author = r.author_handle(e);
                broadcast(
                    NotificationKind::TentativelyApproved,
                    r.attachment(e)
                        .with_pretext(format!("Change *+1'd* by {}", author))
                        .with_fallback(format!(
                            "{} has *+1'd* {}: needs another set of eyes for *code review*",
                            author,
                            r.commit(e)
                        ))
                        .with_color(Color::LightGreen),
                )
            },
        ),
        Rule::new(
            "minus",
            |e| e.has_vote(-1) || e.has_vote(-2),
            |e, r| {
                let verb = if e.has_vote(-1) { "-1'd" } else { "-2'd" };
                let author = r.author_handle(e);
                broadcast(
                    NotificationKind::Rejected,
                    r.attachment(e)
                        .with_pretext(format!("Change *{}* by {}", verb, author))
                        .with_fallback(format!("{} has *{}* {}", author, verb, r.commit(e)))
                        .with_color(Color::Red),
                )
            },
        ),
        Rule::new(
            "comment_added",
            |e| e.is_comment_added() && e.is_human && !e.comment.is_empty(),
            |e, r| {
                let author = r.author_handle(e);
                broadcast(
                    NotificationKind::Commented,
                    r.attachment(e)
                        .with_pretext(format!("{} has left comments on change", author))
                        .with_fallback(format!(
                            "{} has left *comments* on {}: \"{}\"",
                            author,
                            r.commit(e),
                            e.comment
                        ))
                        .with_color(Color::Blue),
                )
            },
        ),
        Rule::new("merged", Event::is_merged, |e, r| {
            broadcast(
                NotificationKind::Merged,
                r.attachment(e)
                    .with_pretext("Change was *merged*!")
                    .with_fallback(format!("{} was *merged*!", r.commit(e))),
            )
        }),
    ]
}

/// 事件分类器
pub struct EventClassifier {
    rules: Vec<Rule>,
    identities: Arc<dyn IdentityLookup>,
}

impl EventClassifier {
    pub fn new(identities: Arc<dyn IdentityLookup>) -> Self {
        Self::with_rules(identities, default_rules())
    }

    pub fn with_rules(identities: Arc<dyn IdentityLookup>, rules: Vec<Rule>) -> Self {
        Self { rules, identities }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// 对事件求值所有规则
    ///
    /// `channels` 为空时直接返回空（事件没有订阅者）
    pub fn classify(&self, event: &Event, channels: &BTreeSet<String>) -> Vec<Outbound> {
        if channels.is_empty() {
            return Vec::new();
        }

        let renderer = Renderer::new(self.identities.as_ref());

        self.rules
            .iter()
            .filter(|rule| rule.applies(event))
            .map(|rule| {
                let (audience, notification) = (rule.render)(event, &renderer);
                let destinations = match audience {
                    Audience::Broadcast => channels
                        .iter()
                        .map(|name| Destination::channel(name.as_str()))
                        .collect(),
                    Audience::Direct(handle) => vec![Destination::user(handle)],
                };
                debug!(
                    rule = rule.name,
                    change = event.change_number,
                    kind = %notification.kind,
                    destinations = destinations.len(),
                    "Rule matched"
                );
                Outbound {
                    destinations,
                    notification,
                }
            })
            .collect()
    }
}
