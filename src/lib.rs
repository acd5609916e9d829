//! Follow-up queue engine for the lead dashboard.
//!
//! Agents work through their pending leads and mark them `done` or
//! forward them to the admin archive. Both actions are staged with an
//! undo window instead of firing immediately; the staged action is
//! durable, so closing the dashboard mid-window neither loses nor
//! prematurely commits it. [`FollowUpQueue`] is the engine; the UI layer
//! renders [`FollowUpQueue::visible_leads`] and the notices, nothing
//! more.

mod api;
mod config;
mod notify;
mod queue;
mod store;
mod types;

pub use api::{ApiError, ApiSettings, HttpLeadApi, LeadApi};
pub use config::{config_path, Config, ConfigError};
pub use notify::{ChannelNoticeSink, LogNoticeSink, Notice, NoticeLevel, NoticeSink};
pub use queue::{FollowUpQueue, QueueError, QueueSettings};
pub use store::{PendingStore, StoreError};
pub use types::{ActionKind, Lead, LeadStatus, PendingAction};
