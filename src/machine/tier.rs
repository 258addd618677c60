//! Tier progression machine.
//!
//! Users climb tiers by stringing together weeks in which they hit their
//! activity target. Each logged activity passes through `evaluating`, which
//! routes to `week_completed` when the weekly target is first reached, or to
//! `promoting` when that week also earns the next tier.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Delayed, StateMachine, Transition};
use crate::config::MachineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Starter,
    Bronze,
    Silver,
    Gold,
    Diamond,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Starter,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Diamond,
    ];

    /// Consecutive completed weeks needed to hold this tier.
    pub fn required_weeks(self) -> u32 {
        match self {
            Tier::Starter => 0,
            Tier::Bronze => 2,
            Tier::Silver => 4,
            Tier::Gold => 8,
            Tier::Diamond => 12,
        }
    }

    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Starter => Some(Tier::Bronze),
            Tier::Bronze => Some(Tier::Silver),
            Tier::Silver => Some(Tier::Gold),
            Tier::Gold => Some(Tier::Diamond),
            Tier::Diamond => None,
        }
    }

    /// Highest tier a streak of `weeks` qualifies for.
    pub fn for_weeks(weeks: u32) -> Tier {
        Tier::ALL
            .into_iter()
            .rev()
            .find(|tier| weeks >= tier.required_weeks())
            .unwrap_or(Tier::Starter)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Starter => "starter",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Diamond => "diamond",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierState {
    Tracking,
    /// Pass-through.
    Evaluating,
    WeekCompleted,
    /// Pass-through.
    Promoting,
    Celebrating,
    Error,
}

impl TierState {
    pub fn is_tracking(&self) -> bool {
        *self == Self::Tracking
    }

    pub fn is_week_completed(&self) -> bool {
        *self == Self::WeekCompleted
    }

    pub fn is_celebrating(&self) -> bool {
        *self == Self::Celebrating
    }

    pub fn is_error(&self) -> bool {
        *self == Self::Error
    }
}

impl fmt::Display for TierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tracking => "tracking",
            Self::Evaluating => "evaluating",
            Self::WeekCompleted => "week_completed",
            Self::Promoting => "promoting",
            Self::Celebrating => "celebrating",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierContext {
    pub current_tier: Tier,
    pub consecutive_weeks: u32,
    pub current_week_progress: u32,
    pub weekly_target: u32,
    /// Whether this week's target has been reached (and counted).
    pub week_goal_met: bool,
    /// Tier being celebrated. Cleared when the celebration ends.
    pub new_tier: Option<Tier>,
    pub error: Option<String>,
}

impl TierContext {
    fn new(weekly_target: u32) -> Self {
        Self {
            current_tier: Tier::Starter,
            consecutive_weeks: 0,
            current_week_progress: 0,
            weekly_target,
            week_goal_met: false,
            new_tier: None,
            error: None,
        }
    }

    /// Completed weeks still needed for the next tier. `None` at the top.
    pub fn weeks_to_next_tier(&self) -> Option<u32> {
        self.current_tier
            .next()
            .map(|next| next.required_weeks().saturating_sub(self.consecutive_weeks))
    }

    fn target_reached(&self) -> bool {
        self.current_week_progress >= self.weekly_target
    }

    fn persist(&self) -> TierAction {
        TierAction::PersistProgress {
            tier: self.current_tier,
            consecutive_weeks: self.consecutive_weeks,
            current_week_progress: self.current_week_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierEvent {
    ActivityLogged,
    /// Close the current week and start a new one.
    NewWeek,
    /// Re-sync counters from the store.
    UpdateStatus {
        tier: Tier,
        consecutive_weeks: u32,
        current_week_progress: u32,
        weekly_target: Option<u32>,
    },
    /// Promotion decided outside the machine.
    Promote { tier: Tier },
    CelebrationViewed,
    CelebrationTimedOut,
    WeekAcknowledged,
    Fail { reason: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierAction {
    PersistProgress {
        tier: Tier,
        consecutive_weeks: u32,
        current_week_progress: u32,
    },
    AnnouncePromotion { tier: Tier },
}

pub struct TierMachine {
    celebration_timeout: Duration,
    week_complete_dismiss: Duration,
    weekly_target: u32,
}

impl TierMachine {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            celebration_timeout: config.celebration_timeout,
            week_complete_dismiss: config.week_complete_dismiss,
            weekly_target: config.weekly_target,
        }
    }
}

type TierTransition = Transition<TierState, TierAction>;

fn end_celebration(ctx: &mut TierContext) -> TierTransition {
    ctx.new_tier = None;
    Transition::goto(TierState::Tracking)
}

fn roll_week(ctx: &mut TierContext) -> TierAction {
    if !ctx.week_goal_met {
        ctx.consecutive_weeks = 0;
    }
    ctx.current_week_progress = 0;
    ctx.week_goal_met = false;
    ctx.persist()
}

impl StateMachine for TierMachine {
    type State = TierState;
    type Context = TierContext;
    type Event = TierEvent;
    type Action = TierAction;

    const NAME: &'static str = "tier";

    fn initial_state(&self) -> TierState {
        TierState::Tracking
    }

    fn initial_context(&self) -> TierContext {
        TierContext::new(self.weekly_target)
    }

    fn transition(
        &self,
        state: &TierState,
        ctx: &mut TierContext,
        event: &TierEvent,
    ) -> TierTransition {
        use TierEvent as E;
        use TierState as S;

        match (state, event) {
            (_, E::Reset) => {
                *ctx = self.initial_context();
                Transition::goto(S::Tracking)
            }
            (S::Error, E::Fail { .. }) => Transition::Ignored,
            (_, E::Fail { reason }) => {
                ctx.error = Some(reason.clone());
                Transition::goto(S::Error)
            }

            (S::Tracking, E::ActivityLogged) => {
                ctx.current_week_progress += 1;
                Transition::goto(S::Evaluating)
            }
            (S::WeekCompleted, E::ActivityLogged) => {
                ctx.current_week_progress += 1;
                Transition::stay().with_action(ctx.persist())
            }

            (S::Tracking, E::NewWeek) => {
                let persist = roll_week(ctx);
                Transition::stay().with_action(persist)
            }
            (S::WeekCompleted | S::Celebrating, E::NewWeek) => {
                ctx.new_tier = None;
                let persist = roll_week(ctx);
                Transition::goto(S::Tracking).with_action(persist)
            }

            (
                S::Tracking,
                E::UpdateStatus {
                    tier,
                    consecutive_weeks,
                    current_week_progress,
                    weekly_target,
                },
            ) => {
                ctx.current_tier = *tier;
                ctx.consecutive_weeks = *consecutive_weeks;
                ctx.current_week_progress = *current_week_progress;
                if let Some(target) = weekly_target {
                    ctx.weekly_target = *target;
                }
                ctx.week_goal_met = ctx.target_reached();
                Transition::stay()
            }

            (S::Tracking | S::WeekCompleted, E::Promote { tier }) if *tier > ctx.current_tier => {
                ctx.new_tier = Some(*tier);
                Transition::goto(S::Promoting)
            }

            (S::Celebrating, E::CelebrationViewed | E::CelebrationTimedOut) => {
                end_celebration(ctx)
            }
            (S::WeekCompleted, E::WeekAcknowledged) => Transition::goto(S::Tracking),

            _ => Transition::Ignored,
        }
    }

    fn resolve(&self, state: &TierState, ctx: &mut TierContext) -> Option<TierTransition> {
        match state {
            TierState::Evaluating => {
                if ctx.week_goal_met || !ctx.target_reached() {
                    return Some(Transition::goto(TierState::Tracking));
                }
                ctx.week_goal_met = true;
                ctx.consecutive_weeks += 1;

                match ctx
                    .current_tier
                    .next()
                    .filter(|next| ctx.consecutive_weeks >= next.required_weeks())
                {
                    Some(next) => {
                        ctx.new_tier = Some(next);
                        Some(Transition::goto(TierState::Promoting))
                    }
                    None => Some(
                        Transition::goto(TierState::WeekCompleted).with_action(ctx.persist()),
                    ),
                }
            }
            TierState::Promoting => {
                let Some(tier) = ctx.new_tier else {
                    return Some(Transition::goto(TierState::Tracking));
                };
                ctx.current_tier = tier;
                tracing::info!(tier = %tier, weeks = ctx.consecutive_weeks, "Tier promotion");
                Some(
                    Transition::goto(TierState::Celebrating)
                        .with_action(TierAction::AnnouncePromotion { tier })
                        .with_action(ctx.persist()),
                )
            }
            _ => None,
        }
    }

    fn after(&self, state: &TierState) -> Option<Delayed<TierEvent>> {
        match state {
            TierState::Celebrating => Some(Delayed::new(
                self.celebration_timeout,
                TierEvent::CelebrationTimedOut,
            )),
            TierState::WeekCompleted => Some(Delayed::new(
                self.week_complete_dismiss,
                TierEvent::WeekAcknowledged,
            )),
            _ => None,
        }
    }
}
