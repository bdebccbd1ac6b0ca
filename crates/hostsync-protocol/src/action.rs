//! Player actions.
//!
//! Actions are a closed set of tagged variants, each with its own schema,
//! plus a `custom` escape hatch whose payload stays opaque. The tag is
//! internally represented (`{"type": "move", "dx": 1, "dy": 0}`) so the
//! JSON reads naturally from any client.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// What a player wants to do. Validated with [`ActionKind::validate`]
/// before it reaches a simulation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionKind {
    /// Step by one tile. Each component must be in `-1..=1` and the
    /// step must not be `(0, 0)`.
    Move { dx: i32, dy: i32 },

    /// Attack another entity by id.
    Attack { target: String },

    /// Use an inventory item by name.
    UseItem { item: String },

    /// Interact with the current tile (pick up, descend stairs, ...).
    Interact,

    /// Skip a turn.
    Wait,

    /// Game-specific action. `payload` is handed to the backend untouched.
    Custom {
        name: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl ActionKind {
    /// Checks the per-variant schema.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidAction`] describing the first
    /// violated rule.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Move { dx, dy } => {
                if !(-1..=1).contains(dx) || !(-1..=1).contains(dy) {
                    return Err(ProtocolError::InvalidAction(format!(
                        "move step ({dx}, {dy}) out of range"
                    )));
                }
                if *dx == 0 && *dy == 0 {
                    return Err(ProtocolError::InvalidAction(
                        "move step must not be zero".into(),
                    ));
                }
                Ok(())
            }
            Self::Attack { target } if target.is_empty() => Err(
                ProtocolError::InvalidAction("attack target is empty".into()),
            ),
            Self::UseItem { item } if item.is_empty() => Err(
                ProtocolError::InvalidAction("item name is empty".into()),
            ),
            Self::Custom { name, .. } if name.is_empty() => Err(
                ProtocolError::InvalidAction("custom action name is empty".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Short name of the variant, for logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::UseItem { .. } => "useItem",
            Self::Interact => "interact",
            Self::Wait => "wait",
            Self::Custom { name, .. } => name.as_str(),
        }
    }
}

/// An action plus the delivery metadata the queue attaches to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// The action itself.
    pub kind: ActionKind,

    /// Milliseconds between submission and authoritative processing.
    /// Set by the action queue when prediction is enabled; absent on
    /// the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_compensation: Option<u64>,
}

impl Action {
    /// Wraps a kind with no latency compensation.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            latency_compensation: None,
        }
    }

    /// Validates the action schema.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.kind.validate()
    }

    /// Returns a copy carrying the given latency compensation.
    pub fn with_latency_compensation(mut self, ms: u64) -> Self {
        self.latency_compensation = Some(ms);
        self
    }
}

impl From<ActionKind> for Action {
    fn from(kind: ActionKind) -> Self {
        Self::new(kind)
    }
}
