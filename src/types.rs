//! Domain records shared across the crate: leads as the server returns
//! them, the staged (undoable) action, and the status vocabulary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lead lifecycle status as stored by the server.
///
/// `pending` marks a lead routed to the follow-up queue; `done` and
/// `archived` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Active,
    Pending,
    Done,
    Rejected,
    Archived,
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::Active
    }
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Active => "active",
            LeadStatus::Pending => "pending",
            LeadStatus::Done => "done",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Archived => "archived",
        }
    }
}

/// What a staged action does to its leads when it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// One status update per lead, sent in parallel.
    Done,
    /// Single batched forward-to-archive request.
    Forward,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Done => "done",
            ActionKind::Forward => "forward",
        }
    }
}

/// A lead record owned by an agent.
///
/// The payload map is free-form: uploaded files decide the keys, so the
/// same logical field shows up under several spellings (`full name`,
/// `full_name`, `Full_Name`). Accessors below do the fallback dance so
/// callers never touch the raw keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub status: LeadStatus,
    /// Agent the lead is assigned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Upload batch the lead came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Lead {
    /// Contact name from the payload, whichever spelling the upload used.
    pub fn display_name(&self) -> Option<&str> {
        self.payload_str(&["full name", "full_name", "Full_Name"])
    }

    /// Phone number from the payload. Spreadsheet exports prefix numbers
    /// with `p:` to force text cells; that artifact is stripped here.
    pub fn display_phone(&self) -> Option<String> {
        let raw = ["phone number", "phone_number", "Phone"]
            .iter()
            .find_map(|k| self.data.get(*k).filter(|v| !v.is_null()))?;
        let text = match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let text = text.trim();
        let text = text.strip_prefix("p:").unwrap_or(text).trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    pub fn city(&self) -> Option<&str> {
        self.payload_str(&["city", "City"])
    }

    /// Case-insensitive search across payload values and the source file
    /// name. An empty term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        let value_matches = |v: &Value| match v {
            Value::String(s) => s.to_lowercase().contains(&needle),
            other => other.to_string().to_lowercase().contains(&needle),
        };
        self.data.values().any(value_matches)
            || self
                .file_name
                .as_deref()
                .map_or(false, |f| f.to_lowercase().contains(&needle))
    }

    fn payload_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.data.get(*k).and_then(Value::as_str))
    }
}

/// The staged status change: hidden from the visible list, not yet sent
/// to the server, reversible until the undo window elapses.
///
/// Persisted as `{ids, type, timestamp}` with an epoch-millisecond
/// timestamp so the stored record survives restarts and the remaining
/// window can be recomputed on reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub ids: Vec<String>,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(ids: Vec<String>, kind: ActionKind) -> Self {
        Self {
            ids,
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn covers(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    /// Time left in the undo window, `None` once it has elapsed.
    ///
    /// A timestamp in the future (clock moved backwards) counts as just
    /// created rather than expired.
    pub fn remaining(&self, window: Duration) -> Option<Duration> {
        let elapsed = (Utc::now() - self.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lead_from_json(json: &str) -> Lead {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_lead_wire_parse() {
        // Shape the server returns from /files/my-pending
        let lead = lead_from_json(
            r#"{
                "_id": "665f1a2b3c4d5e6f70818283",
                "status": "pending",
                "assignedTo": "664a0b1c2d3e4f5061728394",
                "fileName": "may-batch.xlsx",
                "data": {
                    "full name": "Dana Cohen",
                    "phone number": "p:054-1234567",
                    "city": "Haifa"
                }
            }"#,
        );

        assert_eq!(lead.id, "665f1a2b3c4d5e6f70818283");
        assert_eq!(lead.status, LeadStatus::Pending);
        assert_eq!(lead.file_name.as_deref(), Some("may-batch.xlsx"));
        assert_eq!(lead.display_name(), Some("Dana Cohen"));
        assert_eq!(lead.display_phone().as_deref(), Some("054-1234567"));
        assert_eq!(lead.city(), Some("Haifa"));
    }

    #[test]
    fn test_lead_payload_fallback_spellings() {
        let lead = lead_from_json(
            r#"{
                "_id": "l1",
                "data": { "Full_Name": "Avi Levi", "Phone": 543219876 }
            }"#,
        );

        assert_eq!(lead.status, LeadStatus::Active);
        assert_eq!(lead.display_name(), Some("Avi Levi"));
        // Numeric phone cells come back as JSON numbers
        assert_eq!(lead.display_phone().as_deref(), Some("543219876"));
        assert_eq!(lead.city(), None);
    }

    #[test]
    fn test_lead_search_matches_payload_and_file() {
        let lead = lead_from_json(
            r#"{
                "_id": "l2",
                "fileName": "expo-leads.csv",
                "data": { "full_name": "Noa Barak", "city": "Tel Aviv" }
            }"#,
        );

        assert!(lead.matches(""));
        assert!(lead.matches("noa"));
        assert!(lead.matches("TEL aviv"));
        assert!(lead.matches("expo"));
        assert!(!lead.matches("jerusalem"));
    }

    #[test]
    fn test_pending_action_wire_format() {
        let action = PendingAction {
            ids: vec!["a".to_string(), "b".to_string()],
            kind: ActionKind::Forward,
            timestamp: Utc.timestamp_millis_opt(1_716_200_000_000).unwrap(),
        };

        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains(r#""type":"forward""#));
        assert!(json.contains("1716200000000"));

        let parsed: PendingAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn test_pending_action_remaining_window() {
        let window = Duration::from_secs(60);

        let fresh = PendingAction::new(vec!["a".to_string()], ActionKind::Done);
        let left = fresh.remaining(window).unwrap();
        assert!(left > Duration::from_secs(59));

        let mut stale = fresh.clone();
        stale.timestamp = Utc::now() - chrono::Duration::seconds(65);
        assert_eq!(stale.remaining(window), None);

        let mut midway = fresh;
        midway.timestamp = Utc::now() - chrono::Duration::seconds(10);
        let left = midway.remaining(window).unwrap();
        assert!(left > Duration::from_secs(49) && left <= Duration::from_secs(50));
    }
}
