//! Buddy matching machine: search, browse candidates one at a time, pick a
//! match.
//!
//! Searching and match creation are host I/O, requested through
//! [`BuddyAction`] and answered with result events.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Delayed, Guard, StateMachine, Transition, first_match};
use crate::config::MachineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuddyState {
    Idle,
    Searching,
    Browsing,
    /// Waiting for the host to confirm the match.
    Matching,
    Matched,
    Error,
}

impl BuddyState {
    pub fn is_idle(&self) -> bool {
        *self == Self::Idle
    }

    pub fn is_searching(&self) -> bool {
        *self == Self::Searching
    }

    pub fn is_browsing(&self) -> bool {
        *self == Self::Browsing
    }

    pub fn is_matching(&self) -> bool {
        *self == Self::Matching
    }

    pub fn is_matched(&self) -> bool {
        *self == Self::Matched
    }

    pub fn is_error(&self) -> bool {
        *self == Self::Error
    }
}

impl fmt::Display for BuddyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Browsing => "browsing",
            Self::Matching => "matching",
            Self::Matched => "matched",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuddyPreferences {
    pub activities: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance_km: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuddyCandidate {
    pub user_id: String,
    pub display_name: String,
    /// 0.0 to 1.0.
    pub compatibility: f64,
    #[serde(default)]
    pub shared_activities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuddyContext {
    pub preferences: Option<BuddyPreferences>,
    /// Best match first.
    pub candidates: Vec<BuddyCandidate>,
    pub cursor: usize,
    pub selected_match: Option<BuddyCandidate>,
    /// Kept across searches.
    pub current_buddy: Option<BuddyCandidate>,
    pub last_search_empty: bool,
    pub error: Option<String>,
}

impl BuddyContext {
    /// Candidate currently shown while browsing.
    pub fn current_candidate(&self) -> Option<&BuddyCandidate> {
        self.candidates.get(self.cursor)
    }

    pub fn remaining_candidates(&self) -> usize {
        self.candidates.len().saturating_sub(self.cursor)
    }

    fn clear_search(&mut self) {
        self.candidates.clear();
        self.cursor = 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuddyEvent {
    StartSearch { preferences: BuddyPreferences },
    CandidatesLoaded { candidates: Vec<BuddyCandidate> },
    SearchFailed { reason: String },
    NextCandidate,
    SelectMatch { user_id: String },
    MatchCreated,
    MatchFailed { reason: String },
    DismissMatch,
    Cancel,
    Fail { reason: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuddyAction {
    SearchCandidates { preferences: BuddyPreferences },
    CreateMatch { user_id: String },
}

fn has_candidates(ctx: &BuddyContext) -> bool {
    !ctx.candidates.is_empty()
}

pub struct BuddyMachine {
    match_dismiss: Duration,
}

impl BuddyMachine {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            match_dismiss: config.match_dismiss,
        }
    }
}

impl StateMachine for BuddyMachine {
    type State = BuddyState;
    type Context = BuddyContext;
    type Event = BuddyEvent;
    type Action = BuddyAction;

    const NAME: &'static str = "buddy";

    fn initial_state(&self) -> BuddyState {
        BuddyState::Idle
    }

    fn initial_context(&self) -> BuddyContext {
        BuddyContext::default()
    }

    fn transition(
        &self,
        state: &BuddyState,
        ctx: &mut BuddyContext,
        event: &BuddyEvent,
    ) -> Transition<BuddyState, BuddyAction> {
        use BuddyEvent as E;
        use BuddyState as S;

        match (state, event) {
            (_, E::Reset) => {
                let current_buddy = ctx.current_buddy.take();
                *ctx = BuddyContext {
                    current_buddy,
                    ..Default::default()
                };
                Transition::goto(S::Idle)
            }
            (S::Error, E::Fail { .. }) => Transition::Ignored,
            (_, E::Fail { reason }) => {
                ctx.error = Some(reason.clone());
                Transition::goto(S::Error)
            }

            (S::Idle, E::StartSearch { preferences }) => {
                ctx.preferences = Some(preferences.clone());
                ctx.clear_search();
                ctx.last_search_empty = false;
                ctx.error = None;
                Transition::goto(S::Searching).with_action(BuddyAction::SearchCandidates {
                    preferences: preferences.clone(),
                })
            }

            (S::Searching, E::CandidatesLoaded { candidates }) => {
                let mut candidates = candidates.clone();
                candidates.sort_by(|a, b| b.compatibility.total_cmp(&a.compatibility));
                ctx.last_search_empty = candidates.is_empty();
                ctx.candidates = candidates;
                ctx.cursor = 0;
                let branches: [(Guard<BuddyContext>, BuddyState); 1] =
                    [(has_candidates, S::Browsing)];
                Transition::goto(first_match(&*ctx, &branches, S::Idle))
            }
            (S::Searching, E::SearchFailed { reason }) => {
                ctx.error = Some(reason.clone());
                Transition::goto(S::Error)
            }

            (S::Browsing, E::NextCandidate) => {
                if ctx.cursor + 1 < ctx.candidates.len() {
                    ctx.cursor += 1;
                    Transition::stay()
                } else {
                    ctx.clear_search();
                    Transition::goto(S::Idle)
                }
            }
            (S::Browsing, E::SelectMatch { user_id }) => {
                match ctx.candidates.iter().find(|c| &c.user_id == user_id) {
                    Some(candidate) => {
                        ctx.selected_match = Some(candidate.clone());
                        Transition::goto(S::Matching).with_action(BuddyAction::CreateMatch {
                            user_id: user_id.clone(),
                        })
                    }
                    None => Transition::Ignored,
                }
            }

            // Only a confirmed match becomes the current buddy.
            (S::Matching, E::MatchCreated) => {
                ctx.current_buddy = ctx.selected_match.take();
                ctx.clear_search();
                Transition::goto(S::Matched)
            }
            (S::Matching, E::MatchFailed { reason }) => {
                ctx.selected_match = None;
                ctx.error = Some(reason.clone());
                Transition::goto(S::Error)
            }
            (S::Matched, E::DismissMatch) => Transition::goto(S::Idle),

            (S::Searching | S::Browsing, E::Cancel) => {
                ctx.clear_search();
                Transition::goto(S::Idle)
            }

            _ => Transition::Ignored,
        }
    }

    fn after(&self, state: &BuddyState) -> Option<Delayed<BuddyEvent>> {
        match state {
            BuddyState::Matched => Some(Delayed::new(self.match_dismiss, BuddyEvent::DismissMatch)),
            _ => None,
        }
    }
}
