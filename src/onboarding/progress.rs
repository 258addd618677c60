//! OnboardingProgress — coordinates the profile fetch, step evaluation and
//! checkpoint gating for one user.
//!
//! The controller owns no authoritative state: every successful write is
//! followed by a re-fetch, and a failed fetch resolves to "not complete"
//! rather than blocking the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{OnboardingError, Result};
use crate::store::ProfileStore;

use super::gate::{CheckpointGate, CheckpointStatus};
use super::model::{Profile, ProfileUpdate};
use super::state::Checkpoint;

/// Authentication status supplied by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl AuthState {
    pub fn authenticated() -> Self {
        Self {
            is_authenticated: true,
            is_loading: false,
        }
    }
}

/// Lifecycle of the profile fetch.
#[derive(Debug, Clone, Default)]
struct FetchState {
    profile: Option<Profile>,
    in_flight: bool,
    /// Whether at least one fetch has finished (successfully or not).
    resolved: bool,
    error: Option<String>,
}

/// One row of the checkpoint list in a [`ProgressSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointView {
    pub step: u8,
    pub name: Checkpoint,
    pub title: &'static str,
    #[serde(flatten)]
    pub status: CheckpointStatus,
}

/// Everything a screen or route guard needs, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub user_id: String,
    pub current_checkpoint: u8,
    pub current_step: Checkpoint,
    pub checkpoints: Vec<CheckpointView>,
    pub is_complete: bool,
    pub should_show_onboarding: bool,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gate decisions with the terminal completed flag applied on top.
///
/// Once `onboarding_completed` is set, the user sits on the last step and
/// every step is open, whatever the evaluated answers say.
struct Routing<'a> {
    gate: CheckpointGate<'a>,
    finished: bool,
}

impl<'a> Routing<'a> {
    fn new(profile: Option<&'a Profile>) -> Self {
        let gate = CheckpointGate::new(profile);
        Self {
            finished: gate.is_onboarding_complete(),
            gate,
        }
    }

    fn can_access(&self, step: Checkpoint) -> bool {
        self.finished || self.gate.can_access(step)
    }

    fn status(&self, step: Checkpoint) -> CheckpointStatus {
        CheckpointStatus {
            completed: self.gate.status(step).completed,
            can_access: self.can_access(step),
        }
    }

    fn current_checkpoint(&self) -> Checkpoint {
        if self.finished {
            Checkpoint::LAST
        } else {
            self.gate.current_checkpoint()
        }
    }
}

/// Per-user onboarding progress controller.
pub struct OnboardingProgress {
    user_id: String,
    store: Arc<dyn ProfileStore>,
    auth: RwLock<AuthState>,
    fetch: RwLock<FetchState>,
}

impl OnboardingProgress {
    pub fn new(user_id: impl Into<String>, store: Arc<dyn ProfileStore>, auth: AuthState) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            auth: RwLock::new(auth),
            fetch: RwLock::new(FetchState::default()),
        }
    }

    /// Controller for a caller that is already authenticated.
    pub fn authenticated(user_id: impl Into<String>, store: Arc<dyn ProfileStore>) -> Self {
        Self::new(user_id, store, AuthState::authenticated())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Update the auth status supplied by the host.
    pub async fn set_auth(&self, auth: AuthState) {
        *self.auth.write().await = auth;
    }

    /// Fetch the profile from the store.
    ///
    /// Skipped while unauthenticated. A failure is logged, recorded in the
    /// snapshot and returned; the progress then reads as not complete.
    pub async fn refresh(&self) -> std::result::Result<Option<Profile>, OnboardingError> {
        if !self.auth.read().await.is_authenticated {
            debug!(user_id = %self.user_id, "Skipping profile fetch, not authenticated");
            return Ok(None);
        }

        self.fetch.write().await.in_flight = true;
        let result = self.store.get_profile(&self.user_id).await;

        let mut fetch = self.fetch.write().await;
        fetch.in_flight = false;
        fetch.resolved = true;
        match result {
            Ok(profile) => {
                debug!(user_id = %self.user_id, found = profile.is_some(), "Profile fetched");
                fetch.profile = profile.clone();
                fetch.error = None;
                Ok(profile)
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Profile fetch failed");
                fetch.profile = None;
                fetch.error = Some(e.to_string());
                Err(OnboardingError::FetchFailed(e.to_string()))
            }
        }
    }

    /// Most recently fetched profile.
    pub async fn profile(&self) -> Option<Profile> {
        self.fetch.read().await.profile.clone()
    }

    /// Run `f` against the routing over the current profile snapshot.
    async fn with_routing<R>(&self, f: impl FnOnce(&Routing<'_>) -> R) -> R {
        let fetch = self.fetch.read().await;
        f(&Routing::new(fetch.profile.as_ref()))
    }

    /// Where the user should be. Step 6 once onboarding is completed.
    pub async fn current_checkpoint(&self) -> Checkpoint {
        self.with_routing(|routing| routing.current_checkpoint()).await
    }

    pub async fn checkpoint_status(
        &self,
        n: i64,
    ) -> std::result::Result<CheckpointStatus, OnboardingError> {
        let step = Checkpoint::from_number(n).ok_or(OnboardingError::InvalidStep(n))?;
        Ok(self.with_routing(|routing| routing.status(step)).await)
    }

    /// Every valid step is open once onboarding is completed.
    pub async fn can_proceed_to_step(&self, n: i64) -> bool {
        match Checkpoint::from_number(n) {
            Some(step) => self.with_routing(|routing| routing.can_access(step)).await,
            None => false,
        }
    }

    pub async fn is_onboarding_complete(&self) -> bool {
        self.with_routing(|routing| routing.finished).await
    }

    /// True while auth is resolving, or the fetch is in flight / never finished.
    pub async fn is_loading(&self) -> bool {
        let auth = *self.auth.read().await;
        let fetch = self.fetch.read().await;
        auth.is_loading || (auth.is_authenticated && (fetch.in_flight || !fetch.resolved))
    }

    pub async fn should_show_onboarding(&self) -> bool {
        let authenticated = self.auth.read().await.is_authenticated;
        authenticated && !self.is_onboarding_complete().await
    }

    /// Consistent view of the whole progress state.
    pub async fn snapshot(&self) -> ProgressSnapshot {
        let auth = *self.auth.read().await;
        let fetch = self.fetch.read().await;
        let routing = Routing::new(fetch.profile.as_ref());
        let current = routing.current_checkpoint();
        let is_complete = routing.finished;

        ProgressSnapshot {
            user_id: self.user_id.clone(),
            current_checkpoint: current.number(),
            current_step: current,
            checkpoints: Checkpoint::ALL
                .into_iter()
                .map(|step| CheckpointView {
                    step: step.number(),
                    name: step,
                    title: step.title(),
                    status: routing.status(step),
                })
                .collect(),
            is_complete,
            should_show_onboarding: auth.is_authenticated && !is_complete,
            is_loading: auth.is_loading
                || (auth.is_authenticated && (fetch.in_flight || !fetch.resolved)),
            error: fetch.error.clone(),
        }
    }

    // ── Writes ──────────────────────────────────────────────────────

    pub async fn save_identity(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Result<ProgressSnapshot> {
        let update = ProfileUpdate {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            ..Default::default()
        };
        self.save_answers(Checkpoint::Identity, update).await
    }

    pub async fn save_goals(&self, goals: BTreeSet<String>) -> Result<ProgressSnapshot> {
        let update = ProfileUpdate {
            fitness_goals: Some(goals),
            ..Default::default()
        };
        self.save_answers(Checkpoint::Goals, update).await
    }

    pub async fn save_movement(
        &self,
        activities: BTreeMap<String, serde_json::Value>,
    ) -> Result<ProgressSnapshot> {
        let update = ProfileUpdate {
            movement_activities: Some(activities),
            ..Default::default()
        };
        self.save_answers(Checkpoint::Movement, update).await
    }

    pub async fn save_equipment(&self, equipment: BTreeSet<String>) -> Result<ProgressSnapshot> {
        let update = ProfileUpdate {
            equipment_access: Some(equipment),
            ..Default::default()
        };
        self.save_answers(Checkpoint::Access, update).await
    }

    pub async fn set_commitment(&self) -> Result<ProgressSnapshot> {
        let update = ProfileUpdate {
            first_week_commitment_set: Some(true),
            ..Default::default()
        };
        self.save_answers(Checkpoint::Commitment, update).await
    }

    /// Move the stored step pointer. Rejected when `step` is locked.
    pub async fn advance_to(&self, step: Checkpoint) -> Result<ProgressSnapshot> {
        self.ensure_accessible(step).await?;
        let update = ProfileUpdate {
            onboarding_step: Some(i64::from(step.number())),
            ..Default::default()
        };
        self.persist(update).await?;
        info!(user_id = %self.user_id, step = %step, "Onboarding step advanced");
        Ok(self.snapshot().await)
    }

    /// Mark onboarding finished. Requires steps 1-5 complete.
    pub async fn complete_onboarding(&self) -> Result<ProgressSnapshot> {
        self.ensure_accessible(Checkpoint::MoaiSetup).await?;
        let update = ProfileUpdate {
            onboarding_step: Some(i64::from(Checkpoint::MoaiSetup.number())),
            onboarding_completed: Some(true),
            ..Default::default()
        };
        self.persist(update).await?;
        info!(user_id = %self.user_id, "Onboarding completed");
        Ok(self.snapshot().await)
    }

    /// Write the answers for `step` and move the pointer past it.
    async fn save_answers(
        &self,
        step: Checkpoint,
        mut update: ProfileUpdate,
    ) -> Result<ProgressSnapshot> {
        self.ensure_accessible(step).await?;

        let current = self.current_checkpoint().await;
        if let Some(next) = step.next().filter(|next| *next > current) {
            update.onboarding_step = Some(i64::from(next.number()));
        }

        self.persist(update).await?;
        info!(user_id = %self.user_id, step = %step, "Onboarding answers saved");
        Ok(self.snapshot().await)
    }

    async fn ensure_accessible(&self, step: Checkpoint) -> Result<()> {
        if !self.fetch.read().await.resolved {
            self.refresh().await?;
        }
        if self.with_routing(|routing| routing.can_access(step)).await {
            Ok(())
        } else {
            Err(OnboardingError::StepLocked { step }.into())
        }
    }

    async fn persist(&self, update: ProfileUpdate) -> Result<()> {
        self.store.update_profile(&self.user_id, &update).await?;
        self.refresh().await?;
        Ok(())
    }
}
