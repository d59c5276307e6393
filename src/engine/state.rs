//! Flow state machine — which step of a conversation the user is in.

use serde::{Deserialize, Serialize};

/// The conversational steps.
///
/// The create flow progresses linearly: Idle → AwaitLocation → AwaitDate →
/// AwaitTime → AwaitOrg2Name → (game created) → Idle. The join flow is a
/// single step: Idle → AwaitSecondPlayer → Idle. `/cancel` returns to Idle
/// from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    AwaitLocation,
    AwaitDate,
    AwaitTime,
    AwaitOrg2Name,
    AwaitSecondPlayer { game_id: i64 },
}

impl FlowState {
    /// The next step of the create flow, if this state is part of it.
    pub fn next_create_step(&self) -> Option<FlowState> {
        match self {
            Self::Idle => Some(Self::AwaitLocation),
            Self::AwaitLocation => Some(Self::AwaitDate),
            Self::AwaitDate => Some(Self::AwaitTime),
            Self::AwaitTime => Some(Self::AwaitOrg2Name),
            Self::AwaitOrg2Name | Self::AwaitSecondPlayer { .. } => None,
        }
    }

    /// Whether this state expects free-text input.
    pub fn awaits_text(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitLocation => write!(f, "await_location"),
            Self::AwaitDate => write!(f, "await_date"),
            Self::AwaitTime => write!(f, "await_time"),
            Self::AwaitOrg2Name => write!(f, "await_org2_name"),
            Self::AwaitSecondPlayer { game_id } => write!(f, "await_second_player({game_id})"),
        }
    }
}
