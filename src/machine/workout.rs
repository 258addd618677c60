//! Workout logging machine.
//!
//! ```text
//! selecting_type → planning → active.exercising ⇄ active.paused
//!                                   ↓
//!              completed ← saving ← reviewing
//! ```
//!
//! `completed` returns to `selecting_type` on its own after
//! `workout_complete_dismiss`. Saving is performed by the host in response
//! to [`WorkoutAction::PersistWorkout`] and reported back as an event.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Delayed, StateMachine, Transition};
use crate::config::MachineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutKind {
    Strength,
    Cardio,
    Hiit,
    Mobility,
    Other,
}

/// Sub-state of `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePhase {
    Exercising,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutState {
    SelectingType,
    Planning,
    Active(ActivePhase),
    Reviewing,
    Saving,
    Completed,
    Error,
}

impl WorkoutState {
    pub fn exercising() -> Self {
        Self::Active(ActivePhase::Exercising)
    }

    pub fn paused() -> Self {
        Self::Active(ActivePhase::Paused)
    }

    pub fn is_selecting_type(&self) -> bool {
        *self == Self::SelectingType
    }

    pub fn is_planning(&self) -> bool {
        *self == Self::Planning
    }

    /// Exercising or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_exercising(&self) -> bool {
        *self == Self::exercising()
    }

    pub fn is_paused(&self) -> bool {
        *self == Self::paused()
    }

    pub fn is_reviewing(&self) -> bool {
        *self == Self::Reviewing
    }

    pub fn is_saving(&self) -> bool {
        *self == Self::Saving
    }

    pub fn is_completed(&self) -> bool {
        *self == Self::Completed
    }

    pub fn is_error(&self) -> bool {
        *self == Self::Error
    }
}

impl fmt::Display for WorkoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SelectingType => "selecting_type",
            Self::Planning => "planning",
            Self::Active(ActivePhase::Exercising) => "active.exercising",
            Self::Active(ActivePhase::Paused) => "active.paused",
            Self::Reviewing => "reviewing",
            Self::Saving => "saving",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub sets: Vec<SetEntry>,
}

impl Exercise {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutContext {
    pub kind: Option<WorkoutKind>,
    pub exercises: Vec<Exercise>,
    pub notes: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Id assigned by the store once saved.
    pub workout_id: Option<Uuid>,
    pub error: Option<String>,
}

impl WorkoutContext {
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Wall time between start and finish.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    fn summary(&self) -> Option<WorkoutSummary> {
        Some(WorkoutSummary {
            kind: self.kind?,
            exercises: self.exercises.clone(),
            notes: self.notes.clone(),
            started_at: self.started_at?,
            finished_at: self.finished_at?,
            total_sets: self.total_sets(),
        })
    }
}

/// Finished workout handed to the host for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutSummary {
    pub kind: WorkoutKind,
    pub exercises: Vec<Exercise>,
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_sets: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkoutEvent {
    SelectType { kind: WorkoutKind },
    AddExercise { name: String },
    RemoveExercise { index: usize },
    LogSet {
        exercise_index: usize,
        reps: u32,
        weight_kg: Option<f64>,
    },
    StartWorkout { at: DateTime<Utc> },
    PauseWorkout,
    ResumeWorkout,
    FinishWorkout { at: DateTime<Utc> },
    /// Back from review into the active workout.
    EditWorkout,
    UpdateNotes { notes: String },
    SaveWorkout,
    SaveSucceeded { workout_id: Uuid },
    SaveFailed { reason: String },
    RetrySave,
    /// Planning back to type selection.
    Back,
    /// Abandon the draft.
    Cancel,
    Fail { reason: String },
    Reset,
    DismissSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkoutAction {
    PersistWorkout(WorkoutSummary),
}

pub struct WorkoutMachine {
    complete_dismiss: Duration,
}

impl WorkoutMachine {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            complete_dismiss: config.workout_complete_dismiss,
        }
    }

    fn save(ctx: &mut WorkoutContext) -> WorkoutTransition {
        match ctx.summary() {
            Some(summary) => {
                ctx.error = None;
                Transition::goto(WorkoutState::Saving)
                    .with_action(WorkoutAction::PersistWorkout(summary))
            }
            None => Transition::Ignored,
        }
    }
}

type WorkoutTransition = Transition<WorkoutState, WorkoutAction>;

fn add_exercise(ctx: &mut WorkoutContext, name: &str) -> WorkoutTransition {
    let name = name.trim();
    if name.is_empty() {
        return Transition::Ignored;
    }
    ctx.exercises.push(Exercise::new(name));
    Transition::stay()
}

fn remove_exercise(ctx: &mut WorkoutContext, index: usize) -> WorkoutTransition {
    if index >= ctx.exercises.len() {
        return Transition::Ignored;
    }
    ctx.exercises.remove(index);
    Transition::stay()
}

impl StateMachine for WorkoutMachine {
    type State = WorkoutState;
    type Context = WorkoutContext;
    type Event = WorkoutEvent;
    type Action = WorkoutAction;

    const NAME: &'static str = "workout";

    fn initial_state(&self) -> WorkoutState {
        WorkoutState::SelectingType
    }

    fn initial_context(&self) -> WorkoutContext {
        WorkoutContext::default()
    }

    fn transition(
        &self,
        state: &WorkoutState,
        ctx: &mut WorkoutContext,
        event: &WorkoutEvent,
    ) -> WorkoutTransition {
        use ActivePhase::*;
        use WorkoutEvent as E;
        use WorkoutState as S;

        match (state, event) {
            (_, E::Reset) => {
                *ctx = WorkoutContext::default();
                Transition::goto(S::SelectingType)
            }
            (S::Error, E::Fail { .. }) => Transition::Ignored,
            (_, E::Fail { reason }) => {
                ctx.error = Some(reason.clone());
                Transition::goto(S::Error)
            }

            (S::SelectingType, E::SelectType { kind }) => {
                ctx.kind = Some(*kind);
                Transition::goto(S::Planning)
            }

            (S::Planning, E::AddExercise { name }) => add_exercise(ctx, name),
            (S::Planning, E::RemoveExercise { index }) => remove_exercise(ctx, *index),
            (S::Planning, E::StartWorkout { at }) if !ctx.exercises.is_empty() => {
                ctx.started_at = Some(*at);
                Transition::goto(S::exercising())
            }
            (S::Planning, E::Back) => {
                ctx.kind = None;
                Transition::goto(S::SelectingType)
            }

            (S::Active(Exercising), E::AddExercise { name }) => add_exercise(ctx, name),
            (S::Active(Exercising), E::RemoveExercise { index }) => remove_exercise(ctx, *index),
            (
                S::Active(Exercising),
                E::LogSet {
                    exercise_index,
                    reps,
                    weight_kg,
                },
            ) if *reps > 0 => match ctx.exercises.get_mut(*exercise_index) {
                Some(exercise) => {
                    exercise.sets.push(SetEntry {
                        reps: *reps,
                        weight_kg: *weight_kg,
                    });
                    Transition::stay()
                }
                None => Transition::Ignored,
            },
            (S::Active(Exercising), E::PauseWorkout) => Transition::goto(S::paused()),
            (S::Active(Paused), E::ResumeWorkout) => Transition::goto(S::exercising()),
            (S::Active(_), E::FinishWorkout { at }) => {
                ctx.finished_at = Some(*at);
                Transition::goto(S::Reviewing)
            }

            (S::Reviewing, E::EditWorkout) => {
                ctx.finished_at = None;
                Transition::goto(S::exercising())
            }
            (S::Reviewing, E::UpdateNotes { notes }) => {
                ctx.notes = notes.clone();
                Transition::stay()
            }
            (S::Reviewing, E::SaveWorkout) => Self::save(ctx),

            (S::Saving, E::SaveSucceeded { workout_id }) => {
                ctx.workout_id = Some(*workout_id);
                Transition::goto(S::Completed)
            }
            (S::Saving, E::SaveFailed { reason }) => {
                ctx.error = Some(reason.clone());
                Transition::goto(S::Error)
            }
            (S::Error, E::RetrySave) => Self::save(ctx),

            (S::Planning | S::Active(_) | S::Reviewing, E::Cancel) => {
                *ctx = WorkoutContext::default();
                Transition::goto(S::SelectingType)
            }

            (S::Completed, E::DismissSummary) => {
                *ctx = WorkoutContext::default();
                Transition::goto(S::SelectingType)
            }

            _ => Transition::Ignored,
        }
    }

    fn after(&self, state: &WorkoutState) -> Option<Delayed<WorkoutEvent>> {
        match state {
            WorkoutState::Completed => {
                Some(Delayed::new(self.complete_dismiss, WorkoutEvent::DismissSummary))
            }
            _ => None,
        }
    }
}
