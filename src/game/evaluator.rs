//! Candidate evaluation - scores every attack and placement option against
//! every target on an immutable snapshot

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{EngineSettings, PlacementRule};
use crate::error::EvaluationError;
use crate::world::{
    Aabb, ActorState, BlockKind, BlockPos, EntityId, EntityKind, EntitySnapshot, Face, Vec3,
    WorldSnapshot,
};

use super::combat::CombatRules;
use super::physics::{BlastOptions, BlastPhysics, BLAST_RADIUS};
use super::tracker::ConflictTracker;

/// Everything one evaluation cycle reads. Owned by the worker.
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub snapshot: Arc<WorldSnapshot>,
    pub settings: EngineSettings,
    pub extrapolation_ticks: u32,
    /// Positions held by the conflict tracker at submission
    pub blocked: HashSet<BlockPos>,
    /// Hazards with an attack still awaiting acknowledgement
    pub inhibited: HashSet<EntityId>,
    pub attack_counts: HashMap<EntityId, u32>,
}

/// Best candidate of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageResult<T> {
    /// Hazard id for attacks, base block for placements
    pub source: T,
    pub target: EntityId,
    pub target_damage: f32,
    pub self_damage: f32,
    /// Chosen for breaking a surround rather than for raw damage
    pub anti_surround: bool,
    /// Block the hazard occupies
    pub block: BlockPos,
    /// Detonation point
    pub point: Vec3,
}

/// A hazard that sat in a placement hitbox and could not be cleared
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StuckHazard {
    pub id: EntityId,
    pub pos: BlockPos,
    /// Actor distance when the obstruction was seen
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationOutcome {
    /// Tick of the snapshot this outcome was computed from
    pub snapshot_tick: u64,
    pub attack: Option<DamageResult<EntityId>>,
    pub place: Option<DamageResult<BlockPos>>,
    pub stuck: Vec<StuckHazard>,
    pub elapsed: Duration,
}

/// Run both passes over the job's snapshot
pub fn evaluate(job: &EvaluationJob) -> Result<EvaluationOutcome, EvaluationError> {
    let started = Instant::now();
    let snapshot = job.snapshot.as_ref();

    if !snapshot.actor.pos.is_finite() || !snapshot.actor.velocity.is_finite() {
        return Err(EvaluationError::NonFiniteActor);
    }
    if let Some(bad) = snapshot
        .entities
        .iter()
        .find(|e| !e.pos.is_finite() || !e.velocity.is_finite())
    {
        return Err(EvaluationError::NonFiniteEntity(bad.id));
    }

    let evaluator = Evaluator::new(job);
    let mut outcome = EvaluationOutcome {
        snapshot_tick: snapshot.tick,
        ..Default::default()
    };

    if !evaluator.targets.is_empty() {
        outcome.attack = evaluator.attack_pass();
        if job.settings.place && snapshot.actor.hazard_hand.is_some() {
            let (place, stuck) = evaluator.place_pass();
            outcome.place = place;
            outcome.stuck = stuck;
        }
    }

    outcome.elapsed = started.elapsed();
    Ok(outcome)
}

struct Evaluator<'a> {
    job: &'a EvaluationJob,
    snapshot: &'a WorldSnapshot,
    settings: &'a EngineSettings,
    actor: &'a ActorState,
    targets: Vec<&'a EntitySnapshot>,
    surround: HashSet<BlockPos>,
}

/// Running best of one category
struct Selection<T> {
    best: Option<DamageResult<T>>,
    surround: Option<(f64, DamageResult<T>)>,
}

/// Per-point scoring: the best pair passing every gate, and the best pair
/// passing the safety gate when the point breaks a surround
struct Scored<T> {
    accepted: Option<DamageResult<T>>,
    surround: Option<DamageResult<T>>,
}

impl<T> Selection<T> {
    fn new() -> Self {
        Self {
            best: None,
            surround: None,
        }
    }

    fn offer(&mut self, result: DamageResult<T>) {
        let better = self
            .best
            .as_ref()
            .map_or(true, |best| result.target_damage > best.target_damage);
        if better {
            self.best = Some(result);
        }
    }

    /// Surround candidates skip the damage floor; the nearest one wins
    fn offer_surround(&mut self, result: DamageResult<T>, actor_distance: f64) {
        let nearer = self
            .surround
            .as_ref()
            .map_or(true, |(distance, _)| actor_distance < *distance);
        if nearer {
            self.surround = Some((actor_distance, result));
        }
    }

    fn offer_scored(&mut self, scored: Scored<T>, actor_distance: f64) {
        if let Some(result) = scored.surround {
            self.offer_surround(result, actor_distance);
        }
        if let Some(result) = scored.accepted {
            self.offer(result);
        }
    }

    fn finish(self) -> Option<DamageResult<T>> {
        match self.surround {
            Some((_, result)) => Some(result),
            None => self.best,
        }
    }
}

impl<'a> Evaluator<'a> {
    fn new(job: &'a EvaluationJob) -> Self {
        let snapshot = job.snapshot.as_ref();
        let settings = &job.settings;
        let actor = &snapshot.actor;

        let targets: Vec<&EntitySnapshot> = snapshot
            .entities
            .iter()
            .filter(|e| is_target(e, actor, settings))
            .collect();

        let surround = if settings.anti_surround {
            surround_blocks(snapshot, &targets)
        } else {
            HashSet::new()
        };

        Self {
            job,
            snapshot,
            settings,
            actor,
            targets,
            surround,
        }
    }

    fn attack_pass(&self) -> Option<DamageResult<EntityId>> {
        let mut selection = Selection::new();

        for hazard in self.snapshot.hazards() {
            let block = hazard.pos.block();
            if self.job.blocked.contains(&block) || self.job.inhibited.contains(&hazard.id) {
                continue;
            }
            if self.settings.inhibit && hazard.age_ticks < self.settings.ticks_existed {
                continue;
            }
            if !self.in_attack_range(hazard) {
                continue;
            }

            let distance = self.actor.pos.distance(hazard.pos);
            selection.offer_scored(self.score(hazard.id, hazard.pos, block), distance);
        }

        selection.finish()
    }

    fn place_pass(&self) -> (Option<DamageResult<BlockPos>>, Vec<StuckHazard>) {
        let mut selection = Selection::new();
        let mut stuck = Vec::new();

        for &base in &self.snapshot.candidates {
            let block = base.up();
            if self.job.blocked.contains(&block) {
                continue;
            }
            if !self.in_place_range(base) || !self.can_place(base, &mut stuck) {
                continue;
            }

            let point = hazard_point(base);
            let distance = self.actor.pos.distance(point);
            selection.offer_scored(self.score(base, point, block), distance);
        }

        (selection.finish(), stuck)
    }

    /// Best target for one detonation point
    fn score<T: Copy>(&self, source: T, point: Vec3, block: BlockPos) -> Scored<T> {
        let self_ticks = if self.settings.self_extrapolate {
            self.job.extrapolation_ticks
        } else {
            0
        };
        let self_damage = BlastPhysics::estimate_damage(
            &self.snapshot.terrain,
            point,
            &self.actor.damage_profile(),
            BlastOptions {
                extrapolation_ticks: self_ticks,
                terrain_destruction: self.settings.block_destruction,
                assume_best_armor: false,
            },
        );

        let rules = CombatRules::new(self.settings);
        let anti_surround = self.is_anti_surround(block);
        let mut scored = Scored {
            accepted: None,
            surround: None,
        };

        for target in &self.targets {
            if target.pos.distance_squared(point) > BLAST_RADIUS * BLAST_RADIUS {
                continue;
            }

            let target_damage = BlastPhysics::estimate_damage(
                &self.snapshot.terrain,
                point,
                &target.damage_profile(),
                BlastOptions {
                    extrapolation_ticks: self.job.extrapolation_ticks,
                    terrain_destruction: self.settings.block_destruction,
                    assume_best_armor: self.settings.assume_best_armor,
                },
            );

            let Some(verdict) =
                rules.safety_verdict(self.actor, target, target_damage, self_damage)
            else {
                continue;
            };
            let result = DamageResult {
                source,
                target: target.id,
                target_damage,
                self_damage,
                anti_surround,
                block,
                point,
            };

            if anti_surround && is_higher(&scored.surround, target_damage) {
                scored.surround = Some(result.clone());
            }
            if target_damage >= rules.min_damage(verdict.lethal)
                && is_higher(&scored.accepted, target_damage)
            {
                scored.accepted = Some(result);
            }
        }

        scored
    }

    fn in_attack_range(&self, hazard: &EntitySnapshot) -> bool {
        let aim = hazard.pos + Vec3::new(0.0, hazard.height / 2.0, 0.0);
        self.reachable(aim, hazard.pos.y)
    }

    /// Break range from the eye with the through-wall budget when obstructed
    fn reachable(&self, aim: Vec3, feet_y: f64) -> bool {
        let eye = self.actor.eye_pos();
        let distance = eye.distance(aim);
        if distance > self.settings.break_range {
            return false;
        }
        if (feet_y - self.actor.pos.y).abs() > self.settings.max_y_offset {
            return false;
        }
        let obstructed = self.snapshot.terrain.raycast(eye, aim, false).is_some();
        !obstructed || distance <= self.settings.break_wall_range
    }

    fn in_place_range(&self, base: BlockPos) -> bool {
        let settings = self.settings;
        let eye = self.actor.eye_pos();

        let from = if settings.place_range_eye {
            eye
        } else {
            self.actor.pos
        };
        let to = if settings.place_range_center {
            base.center()
        } else {
            base.corner()
        };
        let distance = from.distance(to);
        if distance > settings.place_range {
            return false;
        }

        let sight = base.corner() + Vec3::new(0.5, 2.7, 0.5);
        let obstructed = self
            .snapshot
            .terrain
            .raycast(eye, sight, false)
            .is_some_and(|hit| hit.pos != base);
        if obstructed && (!settings.raytrace || distance > settings.place_wall_range) {
            return false;
        }

        if settings.strict_validation {
            let point = hazard_point(base);
            let aim = point + Vec3::new(0.0, 1.0, 0.0);
            if !self.reachable(aim, point.y) {
                return false;
            }
        }

        true
    }

    /// Terrain and entity checks for a hazard resting on `base`
    fn can_place(&self, base: BlockPos, stuck: &mut Vec<StuckHazard>) -> bool {
        let terrain = &self.snapshot.terrain;
        if !terrain.block_at(base).supports_hazard() {
            return false;
        }

        let above = base.up();
        if !terrain.is_air(above) {
            return false;
        }
        if self.settings.placements == PlacementRule::Protocol && !terrain.is_air(above.up()) {
            return false;
        }

        let height = if self.settings.half_hitbox { 1.0 } else { 2.0 };
        let hitbox = Aabb::new(above.corner(), above.corner() + Vec3::new(1.0, height, 1.0));

        let actor_box = Aabb::around_feet(self.actor.pos, 0.6, 1.8);
        if actor_box.intersects(&hitbox) {
            return false;
        }

        for entity in &self.snapshot.entities {
            if !entity.alive || entity.kind == EntityKind::ExperienceOrb {
                continue;
            }
            if !entity.bounding_box().intersects(&hitbox) {
                continue;
            }

            if entity.kind == EntityKind::Hazard {
                let attacks = self.job.attack_counts.get(&entity.id).copied().unwrap_or(0);
                let limit = self.settings.attack_limit * 10.0;
                if self.in_attack_range(entity) && attacks as f32 <= limit {
                    continue;
                }
                let pos = entity.pos.block();
                stuck.push(StuckHazard {
                    id: entity.id,
                    pos,
                    distance: ConflictTracker::distance_to(pos, self.actor.pos),
                });
            }
            return false;
        }

        true
    }

    fn is_anti_surround(&self, block: BlockPos) -> bool {
        self.surround.iter().any(|mining| {
            Face::ALL
                .iter()
                .any(|face| mining.offset(*face).down() == block)
        })
    }
}

pub(crate) fn is_target(
    entity: &EntitySnapshot,
    actor: &ActorState,
    settings: &EngineSettings,
) -> bool {
    if !entity.alive || entity.id == actor.id || entity.friend {
        return false;
    }
    let enabled = match entity.kind {
        EntityKind::Player => settings.target_players,
        EntityKind::Monster => settings.target_monsters,
        EntityKind::Neutral => settings.target_neutrals,
        EntityKind::Animal => settings.target_animals,
        _ => false,
    };
    enabled && actor.pos.distance(entity.pos) <= settings.target_range
}

/// Mined blocks in the horizontal ring around any player target
fn surround_blocks(snapshot: &WorldSnapshot, targets: &[&EntitySnapshot]) -> HashSet<BlockPos> {
    let mut ring = HashSet::new();
    for target in targets.iter().filter(|t| t.kind == EntityKind::Player) {
        let feet = target.pos.block();
        if snapshot.terrain.block_at(feet) == BlockKind::Unbreakable {
            continue;
        }
        for face in Face::HORIZONTAL {
            let side = feet.offset(face);
            if snapshot.mining.contains(&side) {
                ring.insert(side);
            }
        }
    }
    ring
}

fn is_higher<T>(current: &Option<DamageResult<T>>, damage: f32) -> bool {
    current.as_ref().map_or(true, |c| damage > c.target_damage)
}

/// Detonation point of a hazard resting on `base`
pub fn hazard_point(base: BlockPos) -> Vec3 {
    base.corner() + Vec3::new(0.5, 1.0, 0.5)
}
