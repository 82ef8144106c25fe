//! Gerrit stream-events 事件模型
//!
//! `gerrit stream-events` 每行输出一条 JSON 记录。这里先把原始记录解析为
//! [`RawEvent`]，再归一化为分类器使用的 [`Event`]。

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;

/// Gerrit 账户
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAccount {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl RawAccount {
    /// 账户标识：优先 username，其次 name
    fn identity(&self) -> Option<String> {
        self.username
            .as_deref()
            .or(self.name.as_deref())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// 变更信息
#[derive(Debug, Clone, Deserialize)]
pub struct RawChange {
    pub project: String,
    #[serde(default)]
    pub branch: String,
    #[serde(deserialize_with = "int_or_string")]
    pub number: i64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub owner: Option<RawAccount>,
}

/// Patchset 信息
#[derive(Debug, Clone, Deserialize)]
pub struct RawPatchSet {
    #[serde(deserialize_with = "int_or_string")]
    pub number: i64,
}

/// 审核打分
#[derive(Debug, Clone, Deserialize)]
pub struct RawApproval {
    #[serde(rename = "type")]
    pub label: String,
    #[serde(deserialize_with = "int_or_string")]
    pub value: i64,
    #[serde(rename = "oldValue", default, deserialize_with = "optional_int_or_string")]
    pub old_value: Option<i64>,
}

/// stream-events 原始记录
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub change: Option<RawChange>,
    #[serde(rename = "patchSet", default)]
    pub patch_set: Option<RawPatchSet>,
    #[serde(default)]
    pub author: Option<RawAccount>,
    #[serde(default)]
    pub uploader: Option<RawAccount>,
    #[serde(default)]
    pub submitter: Option<RawAccount>,
    #[serde(default)]
    pub approvals: Vec<RawApproval>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn into_int<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            IntOrString::Int(n) => Ok(n),
            IntOrString::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected integer, got {:?}", s))),
        }
    }
}

/// Gerrit 旧版本把数字编码为字符串，两种都接受
fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    IntOrString::deserialize(deserializer)?.into_int()
}

fn optional_int_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<IntOrString>::deserialize(deserializer)?
        .map(IntOrString::into_int)
        .transpose()
}

/// 事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PatchsetCreated,
    CommentAdded,
    ChangeMerged,
    Other(String),
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "patchset-created" => EventKind::PatchsetCreated,
            "comment-added" => EventKind::CommentAdded,
            "change-merged" => EventKind::ChangeMerged,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::PatchsetCreated => "patchset-created",
            EventKind::CommentAdded => "comment-added",
            EventKind::ChangeMerged => "change-merged",
            EventKind::Other(t) => t,
        }
    }
}

/// CI 构建结果（由 bot 的评论推导）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// 发布结果的 bot 账户
    pub builder: String,
    pub succeeded: bool,
    pub failed: bool,
    pub aborted: bool,
}

/// 本次事件带来的打分变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub label: String,
    pub value: i64,
}

/// 归一化后的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub change_number: i64,
    pub project: String,
    pub branch: String,
    pub subject: String,
    pub url: String,
    /// 变更提交者
    pub owner: String,
    /// 触发本次事件的账户
    pub author: Option<String>,
    pub patchset_number: Option<i64>,
    pub votes: Vec<Vote>,
    /// 去掉 "Patch Set N:" 头之后的评论
    pub comment: String,
    pub build: Option<BuildResult>,
    /// 触发者是人（而不是 bot）
    pub is_human: bool,
}

pub const CODE_REVIEW_LABEL: &str = "Code-Review";

impl Event {
    pub fn is_patchset_created(&self) -> bool {
        self.kind == EventKind::PatchsetCreated
    }

    /// 第一个 patchset 视为新提交，之后的都是修改
    pub fn is_new_patchset(&self) -> bool {
        self.patchset_number == Some(1)
    }

    pub fn is_comment_added(&self) -> bool {
        self.kind == EventKind::CommentAdded
    }

    pub fn is_merged(&self) -> bool {
        self.kind == EventKind::ChangeMerged
    }

    pub fn code_review_score(&self) -> Option<i64> {
        self.votes
            .iter()
            .find(|v| v.label == CODE_REVIEW_LABEL)
            .map(|v| v.value)
    }

    /// 任意 label 上是否有给定分数
    pub fn has_vote(&self, value: i64) -> bool {
        self.votes.iter().any(|v| v.value == value)
    }

    pub fn build_failed(&self) -> bool {
        self.build.as_ref().is_some_and(|b| b.failed && !b.aborted)
    }

    pub fn build_passed(&self) -> bool {
        self.build.as_ref().is_some_and(|b| b.succeeded && !b.failed)
    }
}

/// 把一行 stream-events 输出解析为 [`Event`]
pub struct EventParser {
    bots: HashSet<String>,
    patch_set_header: Regex,
    build_successful: Regex,
    build_failed: Regex,
    build_aborted: Regex,
}

impl EventParser {
    pub fn new<I, S>(bots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bots: bots.into_iter().map(Into::into).collect(),
            patch_set_header: Regex::new(r"^\s*Patch Set \d+:[^\n]*").unwrap(),
            build_successful: Regex::new(r"Build Successful").unwrap(),
            build_failed: Regex::new(r"Build Failed").unwrap(),
            build_aborted: Regex::new(r"ABORTED").unwrap(),
        }
    }

    pub fn is_bot(&self, username: &str) -> bool {
        self.bots.contains(username)
    }

    /// 解析一行
    ///
    /// 不涉及变更的记录（ref-updated 等）返回 `Ok(None)`
    pub fn parse(&self, line: &str) -> Result<Option<Event>> {
        let raw: RawEvent =
            serde_json::from_str(line).context("Failed to parse stream-events record")?;
        Ok(self.normalize(raw))
    }

    pub fn normalize(&self, raw: RawEvent) -> Option<Event> {
        let change = raw.change?;
        let kind = EventKind::from_type(&raw.event_type);

        let author = raw
            .author
            .as_ref()
            .and_then(RawAccount::identity)
            .or_else(|| raw.uploader.as_ref().and_then(RawAccount::identity))
            .or_else(|| raw.submitter.as_ref().and_then(RawAccount::identity));

        let is_human = author.as_deref().is_some_and(|a| !self.is_bot(a));

        let raw_comment = raw.comment.unwrap_or_default();

        let build = match (&kind, &author) {
            (EventKind::CommentAdded, Some(a)) if self.is_bot(a) => Some(BuildResult {
                builder: a.clone(),
                succeeded: self.build_successful.is_match(&raw_comment),
                failed: self.build_failed.is_match(&raw_comment),
                aborted: self.build_aborted.is_match(&raw_comment),
            }),
            _ => None,
        };

        let votes = raw
            .approvals
            .into_iter()
            .filter(|a| a.old_value != Some(a.value))
            .map(|a| Vote {
                label: a.label,
                value: a.value,
            })
            .collect();

        let comment = self
            .patch_set_header
            .replace(&raw_comment, "")
            .trim()
            .to_string();

        Some(Event {
            kind,
            change_number: change.number,
            project: change.project,
            branch: change.branch,
            subject: change.subject,
            url: change.url,
            owner: change
                .owner
                .as_ref()
                .and_then(RawAccount::identity)
                .unwrap_or_default(),
            author,
            patchset_number: raw.patch_set.map(|p| p.number),
            votes,
            comment,
            build,
            is_human,
        })
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new(["jenkins"])
    }
}
