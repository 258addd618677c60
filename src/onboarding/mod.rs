//! Onboarding checkpoints — six ordered steps a new user completes before
//! joining a Moai.
//!
//! Completion of each step is derived from the stored profile answers
//! (`steps`), access is gated by strict linear progression (`gate`), and a
//! per-user controller (`progress`) ties both to the profile store.

pub mod gate;
pub mod model;
pub mod progress;
pub mod routes;
pub mod state;
pub mod steps;

pub use gate::{CheckpointGate, CheckpointStatus};
pub use model::{Encoded, Profile, ProfileUpdate};
pub use progress::{AuthState, CheckpointView, OnboardingProgress, ProgressSnapshot};
pub use routes::{AppState, onboarding_routes};
pub use state::Checkpoint;
pub use steps::{StepCompletion, evaluate, is_step_complete};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Checkpoint, Profile};

    /// Profile with every step up to and including `last` answered.
    pub(crate) fn complete_through(last: Checkpoint) -> Profile {
        let mut p = Profile::new(format!("user-through-{last}"));
        p.onboarding_step = i64::from(last.number());

        if last >= Checkpoint::Identity {
            p.first_name = "Ada".into();
            p.last_name = "Lovelace".into();
        }
        if last >= Checkpoint::Goals {
            p.fitness_goals.insert("strength".into());
        }
        if last >= Checkpoint::Movement {
            p.movement_activities
                .insert("running".into(), serde_json::json!({"frequency": 2}));
        }
        if last >= Checkpoint::Access {
            p.equipment_access.insert("gym".into());
        }
        if last >= Checkpoint::Commitment {
            p.first_week_commitment_set = true;
        }
        if last >= Checkpoint::MoaiSetup {
            p.onboarding_completed = true;
        }
        p
    }
}
