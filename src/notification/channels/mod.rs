//! 具体投递端实现

pub mod log;
pub mod slack;

pub use self::log::LogChannel;
pub use slack::{SlackChannel, SlackConfig};
