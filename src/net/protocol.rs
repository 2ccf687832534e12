//! Network action definitions
//! These are the actions the engine composes for the transport collaborator

use serde::{Deserialize, Serialize};

use crate::world::{BlockPos, EntityId, Face, Hand, Vec3};

/// Actions emitted toward the remote world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Interact-attack an entity
    Attack {
        target: EntityId,
    },

    /// Arm swing animation
    Swing {
        hand: Hand,
    },

    /// Use the held item on a block face
    UseOnBlock {
        hand: Hand,
        pos: BlockPos,
        face: Face,
        /// Confirmation id assigned by the transport
        sequence: u32,
    },

    /// Current position, sent ahead of interactions on strict servers
    PositionSync {
        pos: Vec3,
        on_ground: bool,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Attack { .. } => "attack",
            Action::Swing { .. } => "swing",
            Action::UseOnBlock { .. } => "use_on_block",
            Action::PositionSync { .. } => "position_sync",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_with_type_tag() {
        let action = Action::UseOnBlock {
            hand: Hand::Off,
            pos: BlockPos::new(1, 2, 3),
            face: Face::Up,
            sequence: 7,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "use_on_block");
        assert_eq!(json["hand"], "off");
        assert_eq!(json["face"], "up");
        assert_eq!(json["sequence"], 7);
    }
}
