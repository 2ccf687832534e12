//! Snapshot capture: copies the live world into an immutable value the
//! evaluation worker can own

use super::{ActorState, BlockPos, EntityId, EntityKind, EntitySnapshot, Terrain, WorldView};

/// Blocks of terrain captured past the farthest target or candidate, enough
/// for a target's box and an eye-centred origin
pub const TERRAIN_MARGIN: i32 = 3;

/// Immutable copy of everything one evaluation cycle reads
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    /// Tick at which this snapshot was captured
    pub tick: u64,
    pub actor: ActorState,
    pub entities: Vec<EntitySnapshot>,
    /// Candidate base blocks for placement
    pub candidates: Vec<BlockPos>,
    pub terrain: Terrain,
    pub mining: Vec<BlockPos>,
}

impl WorldSnapshot {
    /// Capture the world around the actor.
    ///
    /// `search_radius` bounds the cube of placement candidates and
    /// `terrain_radius` the cube of terrain copied for raycasts. The terrain
    /// cube never shrinks below the candidate cube.
    pub fn capture(
        world: &dyn WorldView,
        tick: u64,
        search_radius: i32,
        terrain_radius: i32,
        from_eye: bool,
    ) -> Self {
        let actor = world.actor();
        let origin = if from_eye {
            actor.eye_pos().block()
        } else {
            actor.pos.block()
        };

        let search_radius = search_radius.max(0);
        let candidates = world.blocks_in_radius(origin, search_radius);

        let mut terrain = Terrain::new();
        for pos in world.blocks_in_radius(origin, terrain_radius.max(search_radius)) {
            terrain.set(pos, world.block_at(pos));
        }

        Self {
            tick,
            entities: world.entities(),
            candidates,
            terrain,
            mining: world.mining_blocks(),
            actor,
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Live hazards in snapshot order
    pub fn hazards(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities
            .iter()
            .filter(|e| e.kind == EntityKind::Hazard && e.alive)
    }

    /// A live hazard resting on `base`, nearest to the actor
    pub fn hazard_on(&self, base: BlockPos) -> Option<&EntitySnapshot> {
        let actor = self.actor.pos;
        self.hazards()
            .filter(|e| e.pos.block().down() == base)
            .min_by(|a, b| {
                a.pos
                    .distance_squared(actor)
                    .total_cmp(&b.pos.distance_squared(actor))
            })
    }
}
