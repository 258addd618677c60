//! Step evaluator — pure mapping from a profile snapshot to per-step completion.

use serde::Serialize;

use super::model::Profile;
use super::state::Checkpoint;

/// Completion flag for each of the six checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepCompletion {
    steps: [bool; 6],
}

impl StepCompletion {
    /// Whether `step` is complete.
    pub fn is_complete(&self, step: Checkpoint) -> bool {
        self.steps[usize::from(step.number() - 1)]
    }

    /// Whether every checkpoint in `steps` is complete.
    pub fn all(&self, mut steps: impl Iterator<Item = Checkpoint>) -> bool {
        steps.all(|step| self.is_complete(step))
    }

    /// `(checkpoint, completed)` pairs in step order.
    pub fn iter(&self) -> impl Iterator<Item = (Checkpoint, bool)> + '_ {
        Checkpoint::ALL
            .into_iter()
            .map(|step| (step, self.is_complete(step)))
    }
}

/// Completion predicate for a single checkpoint.
pub fn is_step_complete(profile: &Profile, step: Checkpoint) -> bool {
    match step {
        Checkpoint::Identity => !profile.first_name.is_empty() && !profile.last_name.is_empty(),
        Checkpoint::Goals => !profile.fitness_goals.is_empty(),
        Checkpoint::Movement => !profile.movement_activities.is_empty(),
        Checkpoint::Access => !profile.equipment_access.is_empty(),
        Checkpoint::Commitment => profile.first_week_commitment_set,
        Checkpoint::MoaiSetup => profile.onboarding_completed,
    }
}

/// Evaluate all checkpoints. A missing profile reports every step incomplete.
pub fn evaluate(profile: Option<&Profile>) -> StepCompletion {
    let mut completion = StepCompletion::default();
    if let Some(profile) = profile {
        for step in Checkpoint::ALL {
            completion.steps[usize::from(step.number() - 1)] = is_step_complete(profile, step);
        }
    }
    completion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::fixtures::complete_through;

    #[test]
    fn missing_profile_is_all_incomplete() {
        let completion = evaluate(None);
        assert!(completion.iter().all(|(_, done)| !done));
    }

    #[test]
    fn identity_needs_both_names() {
        let mut p = Profile::new("u1");
        assert!(!is_step_complete(&p, Checkpoint::Identity));

        p.first_name = "Ada".into();
        assert!(!is_step_complete(&p, Checkpoint::Identity));

        p.first_name.clear();
        p.last_name = "Lovelace".into();
        assert!(!is_step_complete(&p, Checkpoint::Identity));

        p.first_name = "Ada".into();
        assert!(is_step_complete(&p, Checkpoint::Identity));
    }

    #[test]
    fn identity_name_grid() {
        let names = ["", "A", " ", "Zoë"];
        for first in names {
            for last in names {
                let mut p = Profile::new("u");
                p.first_name = first.into();
                p.last_name = last.into();
                let expected = !first.is_empty() && !last.is_empty();
                assert_eq!(
                    is_step_complete(&p, Checkpoint::Identity),
                    expected,
                    "first={first:?} last={last:?}"
                );
            }
        }
    }

    #[test]
    fn each_step_tracks_its_own_field() {
        for (i, step) in Checkpoint::ALL.into_iter().enumerate() {
            let completion = evaluate(Some(&complete_through(step)));
            for (j, other) in Checkpoint::ALL.into_iter().enumerate() {
                assert_eq!(
                    completion.is_complete(other),
                    j <= i,
                    "profile complete through {step}, checking {other}"
                );
            }
        }
    }

    #[test]
    fn string_null_goals_are_incomplete() {
        let p: Profile = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "fitness_goals": "null"
        }))
        .unwrap();
        let completion = evaluate(Some(&p));
        assert!(completion.is_complete(Checkpoint::Identity));
        assert!(!completion.is_complete(Checkpoint::Goals));
    }
}
