// Group Domain Model (curriculum units and similar job groupings)

use serde::{Deserialize, Serialize};

/// Group identifier
pub type GroupKey = String;

/// Group metadata supplied by the caller at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub key: GroupKey,
    #[serde(default)]
    pub title: String,
}

impl GroupMeta {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
        }
    }
}

/// Aggregate status of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Every job settled, none failed, at least one skipped
    Cancelled,
}

impl std::fmt::Display for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupState::Pending => write!(f, "pending"),
            GroupState::Running => write!(f, "running"),
            GroupState::Succeeded => write!(f, "succeeded"),
            GroupState::Failed => write!(f, "failed"),
            GroupState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Derived progress of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub key: GroupKey,
    pub title: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub status: GroupState,
}
