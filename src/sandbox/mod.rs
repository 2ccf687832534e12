//! In-memory world and server used by the demo and the tests

pub mod server;

pub use server::{SandboxServer, ServerEvent};

use crate::world::{
    ActorState, BlockKind, BlockPos, EntityId, EntityKind, EntitySnapshot, Terrain, Vec3,
    WorldView,
};

/// Actor id used when none is given
pub const SANDBOX_ACTOR_ID: EntityId = EntityId(1);

/// Mutable world implementing [`WorldView`]
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    actor: ActorState,
    entities: Vec<EntitySnapshot>,
    terrain: Terrain,
    mining: Vec<BlockPos>,
}

impl SandboxWorld {
    pub fn builder() -> SandboxWorldBuilder {
        SandboxWorldBuilder::default()
    }

    pub fn actor_state(&self) -> &ActorState {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut ActorState {
        &mut self.actor
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntitySnapshot> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Insert or replace by id
    pub fn add_entity(&mut self, entity: EntitySnapshot) {
        match self.entity_mut(entity.id) {
            Some(existing) => *existing = entity,
            None => self.entities.push(entity),
        }
    }

    /// Advance one tick: entities move by their velocity and age
    pub fn step(&mut self) {
        for entity in &mut self.entities {
            entity.pos = entity.pos + entity.velocity;
            entity.age_ticks = entity.age_ticks.saturating_add(1);
        }
        self.actor.pos = self.actor.pos + self.actor.velocity;
    }
}

impl WorldView for SandboxWorld {
    fn actor(&self) -> ActorState {
        self.actor.clone()
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.entities
            .iter()
            .filter(|e| e.id != self.actor.id)
            .cloned()
            .collect()
    }

    fn blocks_in_radius(&self, origin: BlockPos, radius: i32) -> Vec<BlockPos> {
        let side = (2 * radius + 1).max(0) as usize;
        let mut blocks = Vec::with_capacity(side * side * side);
        for x in -radius..=radius {
            for y in -radius..=radius {
                for z in -radius..=radius {
                    blocks.push(BlockPos::new(origin.x + x, origin.y + y, origin.z + z));
                }
            }
        }
        blocks
    }

    fn block_at(&self, pos: BlockPos) -> BlockKind {
        self.terrain.block_at(pos)
    }

    fn mining_blocks(&self) -> Vec<BlockPos> {
        self.mining.clone()
    }
}

#[derive(Debug, Clone)]
pub struct SandboxWorldBuilder {
    world: SandboxWorld,
}

impl Default for SandboxWorldBuilder {
    fn default() -> Self {
        Self {
            world: SandboxWorld {
                actor: ActorState::new(SANDBOX_ACTOR_ID, Vec3::ZERO),
                entities: Vec::new(),
                terrain: Terrain::new(),
                mining: Vec::new(),
            },
        }
    }
}

impl SandboxWorldBuilder {
    pub fn actor_at(mut self, pos: Vec3) -> Self {
        self.world.actor = ActorState::new(SANDBOX_ACTOR_ID, pos);
        self
    }

    pub fn actor(mut self, actor: ActorState) -> Self {
        self.world.actor = actor;
        self
    }

    /// Square slab of `kind` at height `y`, `half_extent` blocks each way
    pub fn floor(mut self, y: i32, half_extent: i32, kind: BlockKind) -> Self {
        for x in -half_extent..=half_extent {
            for z in -half_extent..=half_extent {
                self.world.terrain.set(BlockPos::new(x, y, z), kind);
            }
        }
        self
    }

    pub fn block(mut self, pos: BlockPos, kind: BlockKind) -> Self {
        self.world.terrain.set(pos, kind);
        self
    }

    pub fn hazard(self, id: EntityId, pos: Vec3) -> Self {
        self.entity(EntitySnapshot::new(id, EntityKind::Hazard, pos))
    }

    pub fn player(self, id: EntityId, pos: Vec3) -> Self {
        self.entity(EntitySnapshot::new(id, EntityKind::Player, pos))
    }

    pub fn entity(mut self, entity: EntitySnapshot) -> Self {
        self.world.add_entity(entity);
        self
    }

    pub fn mining(mut self, pos: BlockPos) -> Self {
        self.world.mining.push(pos);
        self
    }

    pub fn build(self) -> SandboxWorld {
        self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_excludes_the_actor() {
        let mut world = SandboxWorld::builder()
            .actor_at(Vec3::new(0.5, 1.0, 0.5))
            .player(EntityId(2), Vec3::new(3.5, 1.0, 0.5))
            .build();
        world.add_entity(EntitySnapshot::new(
            SANDBOX_ACTOR_ID,
            EntityKind::Player,
            Vec3::new(0.5, 1.0, 0.5),
        ));

        let ids: Vec<EntityId> = world.entities().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![EntityId(2)]);
    }

    #[test]
    fn step_moves_and_ages() {
        let mut world = SandboxWorld::builder()
            .player(EntityId(2), Vec3::new(0.5, 1.0, 0.5))
            .build();
        if let Some(player) = world.entity_mut(EntityId(2)) {
            player.velocity = Vec3::new(0.25, 0.0, 0.0);
        }

        world.step();
        world.step();
        let player = world.entity(EntityId(2)).unwrap();
        assert_eq!(player.pos, Vec3::new(1.0, 1.0, 0.5));
        assert_eq!(player.age_ticks, 2);
    }

    #[test]
    fn radius_is_a_cube() {
        let world = SandboxWorld::builder().build();
        assert_eq!(world.blocks_in_radius(BlockPos::new(0, 0, 0), 1).len(), 27);
        assert!(world.blocks_in_radius(BlockPos::new(0, 0, 0), 0).len() == 1);
    }
}
