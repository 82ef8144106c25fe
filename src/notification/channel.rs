//! 通知与投递 trait 定义

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use super::payload::{Color, Payload};

/// 通知目标
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    /// 配置中的频道
    Channel(String),
    /// 私信（聊天用户名）
    User(String),
}

impl Destination {
    pub fn channel(name: impl Into<String>) -> Self {
        Destination::Channel(name.into())
    }

    pub fn user(handle: impl Into<String>) -> Self {
        Destination::User(handle.into())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Channel(name) => write!(f, "{}", name),
            Destination::User(handle) => write!(f, "@{}", handle),
        }
    }
}

/// 通知种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BuildFailed,
    NewCommit,
    AmendedCommit,
    Approved,
    TentativelyApproved,
    Rejected,
    Commented,
    Merged,
    Announcement,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BuildFailed => "build failed",
            NotificationKind::NewCommit => "new commit",
            NotificationKind::AmendedCommit => "amended commit",
            NotificationKind::Approved => "approved",
            NotificationKind::TentativelyApproved => "tentatively approved",
            NotificationKind::Rejected => "rejected",
            NotificationKind::Commented => "commented",
            NotificationKind::Merged => "merged",
            NotificationKind::Announcement => "announcement",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 一条待发送的通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub payload: Payload,
}

impl Notification {
    pub fn new(kind: NotificationKind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    pub fn color(&self) -> Option<Color> {
        self.payload.color()
    }
}

/// 分类结果：通知及其目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub destinations: Vec<Destination>,
    pub notification: Notification,
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（dry-run 等）
    Skipped(String),
    /// 发送失败
    Failed(String),
}

/// 投递端 trait（如 Slack webhook）
pub trait DeliverySink: Send + Sync {
    /// 名称（用于日志）
    fn name(&self) -> &str;

    /// 同步发送一条通知，不重试
    fn send(&self, destination: &Destination, payload: &Payload) -> Result<SendResult>;
}
