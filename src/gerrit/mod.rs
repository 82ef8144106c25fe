//! Gerrit 事件源相关类型

pub mod event;

pub use event::{BuildResult, Event, EventKind, EventParser, RawEvent, Vote};
