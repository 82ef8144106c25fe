//! Payload 模块 - 通知的渲染结果
//!
//! 通知要么是一行纯文本（私信），要么是一个 Slack attachment：
//! ```json
//! {
//!   "text": "<https://review/42|Change 42>: fix",
//!   "pretext": "There is a new commit",
//!   "fallback": "There is a new commit: ...",
//!   "color": "#FFFF00",
//!   "fields": [{ "title": "____", "value": "*svc* | master", "short": true }],
//!   "mrkdwn_in": ["fields", "pretext", "text"]
//! }
//! ```

use serde::{Serialize, Serializer};
use std::fmt;

/// 通知颜色（仅用于渲染）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Yellow,
    Orange,
    Green,
    LightGreen,
    Red,
    Blue,
}

impl Color {
    pub fn hex(&self) -> &'static str {
        match self {
            Color::Yellow => "#FFFF00",
            Color::Orange => "#FFA500",
            Color::Green => "#00FF00",
            Color::LightGreen => "#B2FFB2",
            Color::Red => "#FF0000",
            Color::Blue => "#0000FF",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.hex())
    }
}

/// attachment 字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Field {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: true,
        }
    }

    /// 标题为一排下划线、宽度与内容一致的分隔字段
    pub fn separated(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            title: "_".repeat(value.chars().count()),
            value,
            short: true,
        }
    }
}

/// 允许 Slack markdown 渲染的部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Markdown {
    Fields,
    Pretext,
    Text,
}

/// 结构化 attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    pub mrkdwn_in: Vec<Markdown>,
}

impl Attachment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: Vec::new(),
            color: None,
            pretext: None,
            fallback: None,
            mrkdwn_in: vec![Markdown::Fields, Markdown::Pretext, Markdown::Text],
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_pretext(mut self, pretext: impl Into<String>) -> Self {
        self.pretext = Some(pretext.into());
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

/// 通知内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// 纯文本消息
    Plain(String),
    /// 结构化 attachment
    Attachment(Attachment),
}

impl Payload {
    pub fn color(&self) -> Option<Color> {
        match self {
            Payload::Plain(_) => None,
            Payload::Attachment(a) => a.color,
        }
    }
}
