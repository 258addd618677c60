//! Onboarding checkpoints — the six fixed steps of the onboarding wizard.

use serde::{Deserialize, Serialize};

use crate::error::OnboardingError;

/// One of the six onboarding steps.
///
/// Progresses linearly: Identity → Goals → Movement → Access → Commitment →
/// MoaiSetup. The discriminant is the 1-based step number persisted in
/// `profiles.onboarding_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Identity = 1,
    Goals = 2,
    Movement = 3,
    Access = 4,
    Commitment = 5,
    MoaiSetup = 6,
}

impl Checkpoint {
    /// All checkpoints in order.
    pub const ALL: [Checkpoint; 6] = [
        Checkpoint::Identity,
        Checkpoint::Goals,
        Checkpoint::Movement,
        Checkpoint::Access,
        Checkpoint::Commitment,
        Checkpoint::MoaiSetup,
    ];

    pub const FIRST: Checkpoint = Checkpoint::Identity;
    pub const LAST: Checkpoint = Checkpoint::MoaiSetup;

    /// The 1-based step number.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Look up a checkpoint by step number. `None` outside 1..=6.
    pub fn from_number(n: i64) -> Option<Checkpoint> {
        match n {
            1 => Some(Self::Identity),
            2 => Some(Self::Goals),
            3 => Some(Self::Movement),
            4 => Some(Self::Access),
            5 => Some(Self::Commitment),
            6 => Some(Self::MoaiSetup),
            _ => None,
        }
    }

    /// Get the next checkpoint in the linear progression, if any.
    pub fn next(self) -> Option<Checkpoint> {
        Self::from_number(i64::from(self.number()) + 1)
    }

    /// Checkpoints that must be complete before this one can be entered.
    pub fn prerequisites(self) -> impl Iterator<Item = Checkpoint> {
        Self::ALL.into_iter().take_while(move |step| *step < self)
    }

    /// Whether this is the final checkpoint.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::MoaiSetup)
    }

    /// Human-readable title used by the wizard screens.
    pub fn title(self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Goals => "Goals",
            Self::Movement => "Movement",
            Self::Access => "Access",
            Self::Commitment => "Commitment",
            Self::MoaiSetup => "Moai Setup",
        }
    }
}

impl TryFrom<i64> for Checkpoint {
    type Error = OnboardingError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or(OnboardingError::InvalidStep(n))
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::Goals => "goals",
            Self::Movement => "movement",
            Self::Access => "access",
            Self::Commitment => "commitment",
            Self::MoaiSetup => "moai_setup",
        };
        write!(f, "{s}")
    }
}
