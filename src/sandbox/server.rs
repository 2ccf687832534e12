//! Authoritative sandbox server
//!
//! Drains the actions a [`ChannelSink`](crate::net::ChannelSink) produced,
//! applies them to the [`SandboxWorld`] and reports what a remote server would
//! announce back: spawns, removals and explosions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::game::physics::{BlastOptions, BlastPhysics, BLAST_RADIUS};
use crate::game::DecisionEngine;
use crate::net::{Action, ActionSink};
use crate::world::{Aabb, BlockPos, EntityId, EntityKind, EntitySnapshot, Vec3};

use super::SandboxWorld;

/// First id handed to server-spawned entities
pub const FIRST_SPAWN_ID: i32 = 1_000;
/// Horizontal speed of wandering players, blocks per tick
pub const WANDER_SPEED: f64 = 0.08;
/// Chance per tick that a wandering player picks a new heading
const TURN_CHANCE: f64 = 0.1;

/// Announcement from the server to the client side
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Spawned(EntitySnapshot),
    Removed(Vec<EntityId>),
    Explosion(Vec3),
}

impl ServerEvent {
    /// Forward to the matching engine hook
    pub fn deliver<S: ActionSink>(&self, engine: &mut DecisionEngine<S>, settings: &EngineSettings) {
        match self {
            ServerEvent::Spawned(entity) => engine.on_entity_added(entity, settings),
            ServerEvent::Removed(ids) => engine.on_entities_removed(ids),
            ServerEvent::Explosion(point) => engine.on_explosion(*point),
        }
    }
}

pub struct SandboxServer {
    world: SandboxWorld,
    actions: mpsc::UnboundedReceiver<Action>,
    log: Vec<Action>,
    next_id: i32,
    rng: ChaCha8Rng,
    kills: u32,
}

impl SandboxServer {
    pub fn new(world: SandboxWorld, actions: mpsc::UnboundedReceiver<Action>, seed: u64) -> Self {
        Self {
            world,
            actions,
            log: Vec::new(),
            next_id: FIRST_SPAWN_ID,
            rng: ChaCha8Rng::seed_from_u64(seed),
            kills: 0,
        }
    }

    pub fn world(&self) -> &SandboxWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SandboxWorld {
        &mut self.world
    }

    /// Every action received so far, in arrival order
    pub fn log(&self) -> &[Action] {
        &self.log
    }

    /// Players killed by detonations
    pub fn kills(&self) -> u32 {
        self.kills
    }

    /// Drain and apply every queued action
    pub fn process(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        while let Ok(action) = self.actions.try_recv() {
            match &action {
                Action::UseOnBlock { pos, .. } => {
                    if let Some(event) = self.place(*pos) {
                        events.push(event);
                    }
                }
                Action::Attack { target } => events.extend(self.detonate(*target)),
                Action::Swing { .. } | Action::PositionSync { .. } => {}
            }
            self.log.push(action);
        }

        events
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn place(&mut self, base: BlockPos) -> Option<ServerEvent> {
        let above = base.up();
        let terrain = &self.world.terrain;
        if !terrain.block_at(base).supports_hazard() || !terrain.is_air(above) {
            debug!(pos = %base, "Rejected placement on unsupported block");
            return None;
        }

        let pos = above.corner() + Vec3::new(0.5, 0.0, 0.5);
        // Placement is checked against the block space, not the hazard's box
        let bounds = Aabb::new(above.corner(), above.corner() + Vec3::new(1.0, 2.0, 1.0));
        let actor = Aabb::around_feet(self.world.actor.pos, 0.6, 1.8);
        let obstructed = actor.intersects(&bounds)
            || self.world.entities.iter().any(|e| {
                e.pos.block() == above
                    || (e.kind != EntityKind::Hazard && e.bounding_box().intersects(&bounds))
            });
        if obstructed {
            debug!(pos = %base, "Rejected obstructed placement");
            return None;
        }

        let hazard = EntitySnapshot::new(self.allocate_id(), EntityKind::Hazard, pos);
        debug!(entity = %hazard.id, pos = %base, "Spawned hazard");
        self.world.add_entity(hazard.clone());
        Some(ServerEvent::Spawned(hazard))
    }

    fn detonate(&mut self, id: EntityId) -> Vec<ServerEvent> {
        let hazard = match self.world.entity(id) {
            Some(entity) if entity.kind == EntityKind::Hazard => entity.clone(),
            _ => {
                debug!(entity = %id, "Attack on unknown or non-hazard entity ignored");
                return Vec::new();
            }
        };

        let point = hazard.pos;
        let options = BlastOptions::default();
        let mut removed = vec![id];

        let SandboxWorld {
            actor,
            entities,
            terrain,
            ..
        } = &mut self.world;

        for entity in entities.iter_mut().filter(|e| e.id != id) {
            if entity.pos.distance(point) > BLAST_RADIUS {
                continue;
            }
            // Hazards caught in the blast are destroyed
            if entity.kind == EntityKind::Hazard {
                removed.push(entity.id);
                continue;
            }

            let damage =
                BlastPhysics::estimate_damage(terrain, point, &entity.damage_profile(), options);
            take_damage(&mut entity.health, &mut entity.absorption, damage);
            if entity.health <= 0.0 {
                entity.alive = false;
                removed.push(entity.id);
                if entity.kind == EntityKind::Player {
                    self.kills += 1;
                    info!(entity = %entity.id, damage, "Player killed");
                }
            }
        }
        entities.retain(|e| !removed.contains(&e.id));

        if !actor.creative {
            let damage = BlastPhysics::estimate_damage(terrain, point, &actor.damage_profile(), options);
            take_damage(&mut actor.health, &mut actor.absorption, damage);
            if actor.health <= 0.0 {
                warn!(damage, "Actor killed by own detonation");
            }
        }

        debug!(entity = %id, removed = removed.len(), "Hazard detonated");
        vec![ServerEvent::Removed(removed), ServerEvent::Explosion(point)]
    }

    /// Spawn a player on a random heading `min..max` blocks from `around`
    pub fn spawn_player(&mut self, around: Vec3, min: f64, max: f64) -> ServerEvent {
        let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let distance = self.rng.gen_range(min..max.max(min + f64::EPSILON));
        let pos = Vec3::new(
            (around.x + angle.cos() * distance).floor() + 0.5,
            around.y,
            (around.z + angle.sin() * distance).floor() + 0.5,
        );

        let player = EntitySnapshot::new(self.allocate_id(), EntityKind::Player, pos);
        info!(entity = %player.id, x = pos.x, z = pos.z, "Player spawned");
        self.world.add_entity(player.clone());
        ServerEvent::Spawned(player)
    }

    /// Random walk for every player, kept within `radius` of `center`
    pub fn wander(&mut self, center: Vec3, radius: f64) {
        let actor = self.world.actor.id;
        for entity in self.world.entities.iter_mut() {
            if entity.kind != EntityKind::Player || entity.id == actor {
                continue;
            }

            let offset = entity.pos - center;
            let horizontal = (offset.x * offset.x + offset.z * offset.z).sqrt();
            if horizontal > radius {
                entity.velocity = Vec3::new(
                    -offset.x / horizontal * WANDER_SPEED,
                    0.0,
                    -offset.z / horizontal * WANDER_SPEED,
                );
            } else if self.rng.gen_bool(TURN_CHANCE) {
                let heading = self.rng.gen_range(0.0..std::f64::consts::TAU);
                entity.velocity = Vec3::new(
                    heading.cos() * WANDER_SPEED,
                    0.0,
                    heading.sin() * WANDER_SPEED,
                );
            }
        }
    }

    /// Advance world time by one tick
    pub fn step(&mut self) {
        self.world.step();
    }
}

/// Absorption soaks damage before health
fn take_damage(health: &mut f32, absorption: &mut f32, damage: f32) {
    let absorbed = damage.min(*absorption);
    *absorption -= absorbed;
    *health = (*health - (damage - absorbed)).max(0.0);
}
