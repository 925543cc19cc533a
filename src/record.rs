//! Outbox record data structures.
//!
//! A [`MutationRecord`] is one durable queue entry: the exact input a write was
//! invoked with, plus the bookkeeping the drain loop needs (status, attempt
//! count, not-before timestamp). Records survive process restarts and are only
//! mutated by the sync coordinator in response to attempt outcomes.

use serde::{Deserialize, Serialize};

/// Typed identifier for a mutation.
///
/// Matches the identifier of the corresponding live [`MutationHandle`] when one
/// exists in the registry.
///
/// [`MutationHandle`]: crate::handles::MutationHandle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(pub String);

impl MutationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MutationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Ordered sequence of opaque segments identifying a mutation's logical type,
/// e.g. `["create-prop", "workspace-7"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct MutationKey(pub Vec<String>);

impl MutationKey {
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for MutationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Sync status of a queued mutation.
///
/// Moves forward only: `Pending → Syncing → {Synced | Failed}`. `Syncing` is
/// transient and never persisted mid-attempt; an attempt either completes or
/// the record stays `Pending` with an updated not-before timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Queued, eligible once its timestamp passes
    Pending,
    /// An attempt is in flight (transient, in-memory only)
    Syncing,
    /// Confirmed by the server
    Synced,
    /// Retry budget exhausted; terminal until externally cleared
    Failed,
}

impl SyncStatus {
    /// Stable string form, matching the persisted column values.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    /// Parse the persisted column value back.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "syncing" => Some(Self::Syncing),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One durable outbox entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Unique within the store; matches the live handle's id when one exists
    pub id: MutationId,
    /// Logical operation type and scope
    pub mutation_key: MutationKey,
    /// Opaque serialized payload: the exact input the operation was invoked with
    pub variables: Vec<u8>,
    /// Current sync status
    pub status: SyncStatus,
    /// Attempts already made; only increases, only on a failed attempt
    pub retry_count: u32,
    /// Epoch millis. Creation time, and the earliest time the record becomes
    /// eligible for a retry (not-before gate).
    pub timestamp: i64,
}

impl MutationRecord {
    /// Create a fresh pending record stamped with the current time.
    #[must_use]
    pub fn new(id: MutationId, mutation_key: MutationKey, variables: Vec<u8>) -> Self {
        Self {
            id,
            mutation_key,
            variables,
            status: SyncStatus::Pending,
            retry_count: 0,
            timestamp: now_ms(),
        }
    }

    /// Whether the drain loop may select this record at time `now` (ms).
    #[must_use]
    pub fn is_eligible_at(&self, now: i64) -> bool {
        self.status == SyncStatus::Pending && self.timestamp <= now
    }

    /// Shape check for the smart-sync gate: a record is resumable when it still
    /// carries enough to build a replay handle.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        !self.id.as_str().is_empty() && !self.mutation_key.is_empty()
    }
}

/// Current wall-clock time as epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
