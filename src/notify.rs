//! Transient user-facing notices.
//!
//! The queue never fails hard on background errors; it reports them here
//! and keeps going. Embedders pick a sink: the channel sink feeds a toast
//! UI, the log sink is the headless default.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// One toast-sized message for the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message.into())
    }

    fn new(level: NoticeLevel, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message,
            at: Utc::now(),
        }
    }
}

pub trait NoticeSink: Send + Sync {
    fn notice(&self, notice: Notice);
}

/// Default sink: forwards notices to the log facade.
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notice(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => log::info!("Notice: {}", notice.message),
            NoticeLevel::Error => log::warn!("Notice: {}", notice.message),
        }
    }
}

/// Sink that hands notices to a channel, e.g. for a toast component.
/// A disconnected receiver drops the notice rather than erroring.
pub struct ChannelNoticeSink {
    tx: std::sync::mpsc::Sender<Notice>,
}

impl ChannelNoticeSink {
    pub fn new(tx: std::sync::mpsc::Sender<Notice>) -> Self {
        Self { tx }
    }
}

impl NoticeSink for ChannelNoticeSink {
    fn notice(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}
