//! `ProfileStore` trait — the single async interface to the profile backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{Profile, ProfileUpdate};

/// Aggregate activity counts for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub activity_count: u64,
    pub weekly_summary_count: u64,
    /// Weekly summaries whose target was met.
    pub weeks_target_met: u64,
}

/// Backend-agnostic profile store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Fetch a profile by user id. `None` if the user has no profile yet.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    /// Apply a partial update, creating the profile if needed. Returns the
    /// profile as stored.
    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, DatabaseError>;

    // ── Activity ────────────────────────────────────────────────────

    /// Record a logged activity. Returns the new row id.
    async fn record_activity(
        &self,
        user_id: &str,
        kind: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Uuid, DatabaseError>;

    /// Record a closed-out week. Returns the new row id.
    async fn record_weekly_summary(
        &self,
        user_id: &str,
        week_start: NaiveDate,
        activity_count: u32,
        target_met: bool,
    ) -> Result<Uuid, DatabaseError>;

    /// Aggregate counts for a user.
    async fn activity_stats(&self, user_id: &str) -> Result<ActivityStats, DatabaseError>;
}
