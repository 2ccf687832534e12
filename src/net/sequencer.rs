//! Ordered micro-sequences for the two dispatch kinds

use tracing::debug;

use crate::error::DispatchError;
use crate::world::{ActorState, BlockPos, EntityId, Face, Hand, Terrain, Vec3};

use super::{Action, ActionSink};

/// Attack then swing
pub fn dispatch_attack<S: ActionSink + ?Sized>(
    sink: &mut S,
    target: EntityId,
    hand: Hand,
) -> Result<(), DispatchError> {
    sink.send(Action::Attack { target })?;
    sink.send(Action::Swing { hand })?;
    debug!(entity = %target, "Dispatched attack");
    Ok(())
}

/// Optional position sync, sequenced placement, then swing
pub fn dispatch_place<S: ActionSink + ?Sized>(
    sink: &mut S,
    pos: BlockPos,
    face: Face,
    hand: Hand,
    position_sync: Option<Vec3>,
) -> Result<(), DispatchError> {
    if let Some(at) = position_sync {
        sink.send(Action::PositionSync {
            pos: at,
            on_ground: true,
        })?;
    }
    sink.send_sequenced(&|sequence| Action::UseOnBlock {
        hand,
        pos,
        face,
        sequence,
    })?;
    sink.send(Action::Swing { hand })?;
    debug!(pos = %pos, face = ?face, "Dispatched placement");
    Ok(())
}

/// Face of `pos` to interact with
pub fn placement_face(actor: &ActorState, terrain: &Terrain, pos: BlockPos, strict: bool) -> Face {
    if strict && actor.pos.y >= pos.y as f64 {
        return Face::Up;
    }

    let eye = actor.eye_pos();
    let center = pos.center();
    if let Some(hit) = terrain.raycast(eye, center, false) {
        if hit.pos == pos {
            return hit.face;
        }
    }

    if eye.y >= pos.y as f64 + 1.0 {
        return Face::Up;
    }
    let offset = eye - center;
    if offset.x.abs() > offset.z.abs() {
        if offset.x > 0.0 {
            Face::East
        } else {
            Face::West
        }
    } else if offset.z > 0.0 {
        Face::South
    } else {
        Face::North
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::RecordingSink;
    use crate::world::BlockKind;

    #[test]
    fn attack_precedes_swing() {
        let mut sink = RecordingSink::new();
        dispatch_attack(&mut sink, EntityId(5), Hand::Main).unwrap();
        assert_eq!(
            sink.actions(),
            &[
                Action::Attack {
                    target: EntityId(5)
                },
                Action::Swing { hand: Hand::Main },
            ]
        );
    }

    #[test]
    fn placement_sequence_order() {
        let mut sink = RecordingSink::new();
        let at = Vec3::new(0.5, 1.0, 0.5);
        dispatch_place(
            &mut sink,
            BlockPos::new(2, 0, 0),
            Face::Up,
            Hand::Off,
            Some(at),
        )
        .unwrap();

        let names: Vec<&str> = sink.actions().iter().map(Action::name).collect();
        assert_eq!(names, vec!["position_sync", "use_on_block", "swing"]);
        assert!(matches!(
            sink.actions()[1],
            Action::UseOnBlock { sequence: 1, .. }
        ));
    }

    #[test]
    fn rejected_placement_stops_sequence() {
        let mut sink = RecordingSink::new();
        sink.set_rejecting(true);
        let result = dispatch_place(&mut sink, BlockPos::new(0, 0, 0), Face::Up, Hand::Main, None);
        assert!(matches!(result, Err(DispatchError::Rejected { .. })));
        assert!(sink.actions().is_empty());
    }

    #[test]
    fn face_follows_line_of_sight() {
        let mut terrain = Terrain::new();
        let pos = BlockPos::new(3, 2, 0);
        terrain.set(pos, BlockKind::Resistant);
        // eye at y 2.62 is level with the block, west of it
        let actor = ActorState::new(EntityId(1), Vec3::new(0.5, 1.0, 0.5));
        assert_eq!(placement_face(&actor, &terrain, pos, false), Face::West);
    }

    #[test]
    fn strict_face_from_above_is_up() {
        let terrain = Terrain::new();
        let actor = ActorState::new(EntityId(1), Vec3::new(0.5, 1.0, 0.5));
        assert_eq!(
            placement_face(&actor, &terrain, BlockPos::new(2, 0, 0), true),
            Face::Up
        );
    }
}
