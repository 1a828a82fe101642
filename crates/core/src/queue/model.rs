//! Domain models for the offline mutation queue.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::{DEFAULT_MAX_RETRIES, MUTATION_RETENTION_DAYS};

/// Recorded user intents that may be replayed against the remote service.
/// Each type maps to exactly one remote executor capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    CreateTasting,
    UpdateTasting,
    DeleteTasting,
    ToggleToast,
    AddComment,
    FollowUser,
    UnfollowUser,
    UpdateProfile,
    UploadImage,
}

impl MutationType {
    /// Types whose success carries a server-assigned id for a new entity.
    pub fn creates_entity(&self) -> bool {
        matches!(self, Self::CreateTasting | Self::AddComment)
    }

    /// Retry budget per type. Image uploads get extra headroom because large
    /// bodies fail more often on flaky links.
    pub fn default_max_retries(&self) -> i32 {
        match self {
            Self::UploadImage => 5,
            _ => DEFAULT_MAX_RETRIES,
        }
    }

    /// Human-readable label used in notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateTasting => "tasting",
            Self::UpdateTasting => "tasting update",
            Self::DeleteTasting => "tasting deletion",
            Self::ToggleToast => "toast",
            Self::AddComment => "comment",
            Self::FollowUser => "follow",
            Self::UnfollowUser => "unfollow",
            Self::UpdateProfile => "profile update",
            Self::UploadImage => "image upload",
        }
    }
}

/// Drain priority. Higher priorities drain first; FIFO within a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl MutationPriority {
    /// Stable ordinal persisted to storage.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    pub fn from_rank(rank: i32) -> Self {
        match rank {
            i32::MIN..=0 => Self::Low,
            1 => Self::Normal,
            2 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Queued mutation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A durable record of a user action awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: String,
    pub mutation_type: MutationType,
    /// Target entity. May be a locally-generated placeholder id pending
    /// reconciliation with a server-assigned id.
    pub entity_id: String,
    /// Opaque serialized request body. The engine routes it, never reads it.
    pub payload: String,
    pub priority: MutationPriority,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub status: MutationStatus,
    pub last_error: Option<String>,
}

impl QueuedMutation {
    pub fn new(
        mutation_type: MutationType,
        entity_id: impl Into<String>,
        payload: impl Into<String>,
        priority: MutationPriority,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            mutation_type,
            entity_id: entity_id.into(),
            payload: payload.into(),
            priority,
            created_at: Utc::now(),
            last_attempt_at: None,
            retry_count: 0,
            max_retries: mutation_type.default_max_retries(),
            next_retry_at: None,
            status: MutationStatus::Pending,
            last_error: None,
        }
    }

    /// Retry budget exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Older than the retention window relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at < now - Duration::days(MUTATION_RETENTION_DAYS)
    }
}

/// Count of queued mutations for one (type, status) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationCount {
    pub mutation_type: MutationType,
    pub status: MutationStatus,
    pub count: i64,
}

/// Read-only queue introspection for UI badges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub pending: i64,
    pub in_progress: i64,
    pub failed: i64,
    pub by_type: Vec<MutationCount>,
}
