//! libSQL backend — async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases. The set/map profile fields
//! are stored as JSON text and decoded through [`RawProfile`], so a corrupt
//! column degrades to an empty value instead of failing the read.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{Encoded, Profile, ProfileUpdate, RawProfile};
use crate::store::migrations;
use crate::store::traits::{ActivityStats, ProfileStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql Row to a Profile.
///
/// Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<Profile, libsql::Error> {
    let updated_str: String = row.get(9)?;

    let raw = RawProfile {
        user_id: row.get(0)?,
        first_name: row.get(1).ok(),
        last_name: row.get(2).ok(),
        onboarding_step: row.get::<i64>(3).ok().map(Encoded::Structured),
        onboarding_completed: row.get::<i64>(4).ok().map(|v| Encoded::Structured(v != 0)),
        fitness_goals: row.get::<String>(5).ok().map(Encoded::Text),
        movement_activities: row.get::<String>(6).ok().map(Encoded::Text),
        equipment_access: row.get::<String>(7).ok().map(Encoded::Text),
        first_week_commitment_set: row
            .get::<i64>(8)
            .ok()
            .map(|v| Encoded::Structured(v != 0)),
        updated_at: Some(parse_datetime(&updated_str)),
    };

    Ok(Profile::from(raw))
}

fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Bind an optional value, `NULL` when absent.
fn nullable<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

async fn count(conn: &Connection, sql: &str, user_id: &str) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(sql, params![user_id])
        .await
        .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;
    match rows.next().await {
        Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0).max(0) as u64),
        Ok(None) => Ok(0),
        Err(e) => Err(DatabaseError::Query(format!("count: {e}"))),
    }
}

// ── Trait implementation ────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "user_id, first_name, last_name, onboarding_step, onboarding_completed, fitness_goals, movement_activities, equipment_access, first_week_commitment_set, updated_at";

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_profile(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_profile row: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, DatabaseError> {
        // Only the columns present in `update` are written, so concurrent
        // partial updates for one user do not clobber each other.
        let now_str = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO profiles (user_id, first_name, last_name, onboarding_step, onboarding_completed,
                    fitness_goals, movement_activities, equipment_access, first_week_commitment_set,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, COALESCE(?4, 1), COALESCE(?5, 0), ?6, ?7, ?8, COALESCE(?9, 0), ?10, ?10)
                 ON CONFLICT (user_id) DO UPDATE SET
                    first_name = COALESCE(?2, first_name),
                    last_name = COALESCE(?3, last_name),
                    onboarding_step = COALESCE(?4, onboarding_step),
                    onboarding_completed = COALESCE(?5, onboarding_completed),
                    fitness_goals = COALESCE(?6, fitness_goals),
                    movement_activities = COALESCE(?7, movement_activities),
                    equipment_access = COALESCE(?8, equipment_access),
                    first_week_commitment_set = COALESCE(?9, first_week_commitment_set),
                    updated_at = ?10",
                params![
                    user_id,
                    nullable(update.first_name.clone()),
                    nullable(update.last_name.clone()),
                    nullable(update.onboarding_step),
                    nullable(update.onboarding_completed.map(i64::from)),
                    nullable(update.fitness_goals.as_ref().map(to_json_text).transpose()?),
                    nullable(update.movement_activities.as_ref().map(to_json_text).transpose()?),
                    nullable(update.equipment_access.as_ref().map(to_json_text).transpose()?),
                    nullable(update.first_week_commitment_set.map(i64::from)),
                    now_str,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_profile: {e}")))?;

        let profile = self
            .get_profile(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "profile".to_string(),
                id: user_id.to_string(),
            })?;
        debug!(user_id, step = profile.onboarding_step, "Profile updated");
        Ok(profile)
    }

    // ── Activity ────────────────────────────────────────────────────

    async fn record_activity(
        &self,
        user_id: &str,
        kind: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO activities (id, user_id, kind, occurred_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), user_id, kind, occurred_at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_activity: {e}")))?;
        debug!(user_id, kind, activity_id = %id, "Activity recorded");
        Ok(id)
    }

    async fn record_weekly_summary(
        &self,
        user_id: &str,
        week_start: NaiveDate,
        activity_count: u32,
        target_met: bool,
    ) -> Result<Uuid, DatabaseError> {
        let conn = self.conn();
        let week = week_start.format("%Y-%m-%d").to_string();
        conn.execute(
            "INSERT INTO weekly_summaries (id, user_id, week_start, activity_count, target_met)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, week_start) DO UPDATE SET
                activity_count = ?4, target_met = ?5",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                week.clone(),
                i64::from(activity_count),
                i64::from(target_met),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_weekly_summary: {e}")))?;

        let mut rows = conn
            .query(
                "SELECT id FROM weekly_summaries WHERE user_id = ?1 AND week_start = ?2",
                params![user_id, week],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_weekly_summary: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("record_weekly_summary: {e}")))?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "weekly_summary".to_string(),
                id: format!("{user_id}/{week_start}"),
            })?;
        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("record_weekly_summary: {e}")))?;
        Uuid::parse_str(&id_str).map_err(|e| DatabaseError::Serialization(e.to_string()))
    }

    async fn activity_stats(&self, user_id: &str) -> Result<ActivityStats, DatabaseError> {
        let conn = self.conn();
        Ok(ActivityStats {
            activity_count: count(
                conn,
                "SELECT COUNT(*) FROM activities WHERE user_id = ?1",
                user_id,
            )
            .await?,
            weekly_summary_count: count(
                conn,
                "SELECT COUNT(*) FROM weekly_summaries WHERE user_id = ?1",
                user_id,
            )
            .await?,
            weeks_target_met: count(
                conn,
                "SELECT COUNT(*) FROM weekly_summaries WHERE user_id = ?1 AND target_met = 1",
                user_id,
            )
            .await?,
        })
    }
}
