//! Checkpoint gate — strict linear progression over the six onboarding steps.
//!
//! A step is accessible only when every earlier step is complete. The stored
//! `onboarding_step` pointer is honoured when it names an accessible step;
//! otherwise the user is routed to the lowest accessible incomplete step.

use serde::Serialize;

use super::model::Profile;
use super::state::Checkpoint;
use super::steps::{StepCompletion, evaluate};

/// Completion and accessibility of a single checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointStatus {
    pub completed: bool,
    pub can_access: bool,
}

/// Gate over one profile snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointGate<'a> {
    profile: Option<&'a Profile>,
    completion: StepCompletion,
}

impl<'a> CheckpointGate<'a> {
    pub fn new(profile: Option<&'a Profile>) -> Self {
        Self {
            profile,
            completion: evaluate(profile),
        }
    }

    /// Per-step completion backing this gate.
    pub fn completion(&self) -> &StepCompletion {
        &self.completion
    }

    /// Whether `step` may be entered: all earlier steps are complete.
    pub fn can_access(&self, step: Checkpoint) -> bool {
        self.completion.all(step.prerequisites())
    }

    /// Numeric form of [`can_access`](Self::can_access). Numbers outside 1..=6
    /// are never accessible.
    pub fn can_access_step(&self, n: i64) -> bool {
        Checkpoint::from_number(n).is_some_and(|step| self.can_access(step))
    }

    pub fn status(&self, step: Checkpoint) -> CheckpointStatus {
        CheckpointStatus {
            completed: self.completion.is_complete(step),
            can_access: self.can_access(step),
        }
    }

    /// Numeric form of [`status`](Self::status).
    pub fn status_of(&self, n: i64) -> Option<CheckpointStatus> {
        Checkpoint::from_number(n).map(|step| self.status(step))
    }

    /// The furthest step the user may currently enter.
    pub fn furthest_accessible(&self) -> Checkpoint {
        Checkpoint::ALL
            .into_iter()
            .take_while(|step| self.can_access(*step))
            .last()
            .unwrap_or(Checkpoint::FIRST)
    }

    /// Where the user should be right now.
    ///
    /// No profile → step 1. A stored pointer naming an accessible step wins.
    /// Otherwise the lowest step that is accessible but incomplete; step 6 if
    /// everything is complete.
    pub fn current_checkpoint(&self) -> Checkpoint {
        let Some(profile) = self.profile else {
            return Checkpoint::FIRST;
        };

        if let Some(pointer) = Checkpoint::from_number(profile.onboarding_step)
            .filter(|step| self.can_access(*step))
        {
            return pointer;
        }

        let fallback = Checkpoint::ALL
            .into_iter()
            .find(|step| self.can_access(*step) && !self.completion.is_complete(*step))
            .unwrap_or(Checkpoint::LAST);

        tracing::debug!(
            user_id = %profile.user_id,
            stored_step = profile.onboarding_step,
            routed_to = %fallback,
            "Stored onboarding step not accessible, overriding"
        );
        fallback
    }

    /// The profile's terminal completion flag.
    pub fn is_onboarding_complete(&self) -> bool {
        self.profile.is_some_and(|p| p.onboarding_completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::fixtures::complete_through;

    fn profiles() -> Vec<Profile> {
        let mut all = vec![Profile::new("empty")];
        for step in Checkpoint::ALL {
            for pointer in [-1, 0, 1, 3, 4, 6, 7] {
                let mut p = complete_through(step);
                p.onboarding_step = pointer;
                all.push(p);
            }
        }
        // Holes: later answers present, earlier missing.
        let mut holey = complete_through(Checkpoint::Commitment);
        holey.fitness_goals.clear();
        holey.onboarding_step = 5;
        all.push(holey);
        let mut nameless = complete_through(Checkpoint::MoaiSetup);
        nameless.last_name.clear();
        all.push(nameless);
        all
    }

    #[test]
    fn step_one_is_always_accessible() {
        assert!(CheckpointGate::new(None).can_access_step(1));
        for p in profiles() {
            assert!(CheckpointGate::new(Some(&p)).can_access_step(1));
        }
    }

    #[test]
    fn access_requires_all_prior_steps() {
        for p in profiles() {
            let gate = CheckpointGate::new(Some(&p));
            for n in 2..=6 {
                let expected = (1..n).all(|k| gate.status_of(k).unwrap().completed);
                assert_eq!(gate.can_access_step(n), expected, "profile {p:?} step {n}");
            }
        }
    }

    #[test]
    fn out_of_range_steps_are_inaccessible() {
        let p = complete_through(Checkpoint::MoaiSetup);
        let gate = CheckpointGate::new(Some(&p));
        assert!(!gate.can_access_step(0));
        assert!(!gate.can_access_step(7));
        assert!(gate.status_of(7).is_none());
    }

    #[test]
    fn current_checkpoint_is_always_accessible_and_stable() {
        for p in profiles() {
            let gate = CheckpointGate::new(Some(&p));
            let current = gate.current_checkpoint();
            assert!(gate.can_access(current), "profile {p:?} routed to {current}");
            assert_eq!(current, gate.current_checkpoint());
        }
    }

    #[test]
    fn no_profile_starts_at_identity() {
        let gate = CheckpointGate::new(None);
        assert_eq!(gate.current_checkpoint(), Checkpoint::Identity);
        assert!(!gate.is_onboarding_complete());
        assert_eq!(gate.furthest_accessible(), Checkpoint::Identity);
    }

    #[test]
    fn stale_pointer_ahead_of_progress_is_overridden() {
        let mut p = complete_through(Checkpoint::Identity);
        p.onboarding_step = 4;
        let gate = CheckpointGate::new(Some(&p));
        assert_eq!(gate.current_checkpoint(), Checkpoint::Goals);
    }

    #[test]
    fn accessible_pointer_is_trusted() {
        // Pointer behind the furthest step is still honoured (user went back).
        let mut p = complete_through(Checkpoint::Access);
        p.onboarding_step = 2;
        let gate = CheckpointGate::new(Some(&p));
        assert_eq!(gate.current_checkpoint(), Checkpoint::Goals);
        assert_eq!(gate.furthest_accessible(), Checkpoint::Commitment);
    }

    #[test]
    fn fully_complete_profile_lands_on_last_step() {
        let mut p = complete_through(Checkpoint::MoaiSetup);
        p.onboarding_step = 42;
        let gate = CheckpointGate::new(Some(&p));
        assert_eq!(gate.current_checkpoint(), Checkpoint::MoaiSetup);
        assert!(gate.is_onboarding_complete());
    }

    #[test]
    fn lowest_incomplete_step_wins() {
        let mut p = complete_through(Checkpoint::Commitment);
        p.fitness_goals.clear();
        p.onboarding_step = 5;
        let gate = CheckpointGate::new(Some(&p));
        assert_eq!(gate.current_checkpoint(), Checkpoint::Goals);
        assert!(!gate.can_access(Checkpoint::Movement));
    }

    #[test]
    fn status_pairs() {
        let p = complete_through(Checkpoint::Goals);
        let gate = CheckpointGate::new(Some(&p));
        assert_eq!(
            gate.status(Checkpoint::Goals),
            CheckpointStatus { completed: true, can_access: true }
        );
        assert_eq!(
            gate.status(Checkpoint::Movement),
            CheckpointStatus { completed: false, can_access: true }
        );
        assert_eq!(
            gate.status(Checkpoint::Access),
            CheckpointStatus { completed: false, can_access: false }
        );
    }
}
