// ── Activity log entry ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub device_name: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(device_name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_name: device_name.into(),
            action: action.into(),
            timestamp: Utc::now(),
        }
    }
}
