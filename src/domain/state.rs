use serde::{Deserialize, Serialize};
use std::fmt;

/// Season lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonStatus {
    /// No season running, baseline roster loaded
    Idle,
    /// Tick timer armed, results being folded
    Active,
    /// Timers cancelled; summary available if at least one tick ran
    Stopped,
}

impl SeasonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonStatus::Idle => "IDLE",
            SeasonStatus::Active => "ACTIVE",
            SeasonStatus::Stopped => "STOPPED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: SeasonStatus) -> bool {
        use SeasonStatus::*;

        match (self, target) {
            (Idle, Active) => true,
            // A stopped season can be restarted directly; start wipes the ledger.
            (Stopped, Active) => true,
            (Active, Stopped) => true,
            (Stopped, Idle) => true,
            (Idle, Idle) => true,
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SeasonStatus::Active)
    }
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SeasonStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "IDLE" => Ok(SeasonStatus::Idle),
            "ACTIVE" => Ok(SeasonStatus::Active),
            "STOPPED" => Ok(SeasonStatus::Stopped),
            _ => Err(format!("Unknown season status: {}", s)),
        }
    }
}
