//! Decision and sequencing engine - the per-tick driver
//!
//! Each tick consumes the outcome published by the previous evaluation,
//! captures a fresh snapshot for the next one, and resolves at most one
//! dispatch through the per-category state machines. Sequential placement
//! may follow an attack with a placement outside that budget.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, info, trace, warn};

use crate::config::{EngineSettings, Sequential};
use crate::error::SchedulerError;
use crate::net::sequencer::{dispatch_attack, dispatch_place, placement_face};
use crate::net::ActionSink;
use crate::util::rate_limit::LogLimiter;
use crate::util::time::{Clock, Timer, TICK_DURATION_MS};
use crate::world::{
    BlockPos, EntityId, EntityKind, EntitySnapshot, Face, Hand, Vec3, WorldSnapshot, WorldView,
};

use super::combat::CombatRules;
use super::evaluator::{is_target, DamageResult, EvaluationJob, EvaluationOutcome};
use super::feed::{FadeEntry, RenderFeed};
use super::latency::{current_extrapolation_ticks, LatencyWindow, PerSecondCounter};
use super::physics::{BlastOptions, BlastPhysics, BLAST_RADIUS};
use super::rotation::{Rotation, RotationRequest};
use super::scheduler::EvaluationScheduler;
use super::tracker::{ConflictTracker, PendingActions};

/// Outcomes older than this many ticks are discarded
pub const MAX_OUTCOME_AGE_TICKS: u64 = 2;
/// Floor of the acknowledgement window for duplicate suppression
pub const MIN_ACK_WINDOW_MS: u64 = 250;
/// The status line reports zero once attacks have been quiet this long past
/// the attack delay
pub const STATUS_QUIET_MS: u64 = 2_000;

/// Whether an outcome computed at `snapshot_tick` may be used on `tick`
pub fn is_fresh(snapshot_tick: u64, tick: u64) -> bool {
    snapshot_tick < tick && snapshot_tick + MAX_OUTCOME_AGE_TICKS >= tick
}

/// Cooldown for a 0..=20 action speed
pub fn speed_cooldown_ms(speed: f32) -> u64 {
    ((20.0 - speed.clamp(0.0, 20.0)) * 100.0).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ready,
    Dispatched,
    Cooldown { until_ms: u64 },
}

#[derive(Debug)]
struct Category {
    name: &'static str,
    phase: Phase,
}

impl Category {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: Phase::Idle,
        }
    }

    fn set(&mut self, next: Phase) {
        if self.phase != next {
            debug!(category = self.name, from = ?self.phase, to = ?next, "Phase transition");
            self.phase = next;
        }
    }

    fn refresh(&mut self, now_ms: u64) {
        if let Phase::Cooldown { until_ms } = self.phase {
            if now_ms >= until_ms {
                self.set(Phase::Idle);
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}

/// What a tick sent, if anything
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Attack {
        target: EntityId,
        /// A placement resolved into an attack on a hazard already there
        reclassified: bool,
    },
    Place {
        base: BlockPos,
        face: Face,
    },
}

/// Result of trying one attack
enum Attempt {
    Sent(Dispatch),
    /// Every gate passed but the actor is still turning toward it
    Turning,
    Gated,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    /// A new evaluation was started this tick
    pub submitted: bool,
    /// Snapshot tick of the outcome consumed this tick
    pub consumed: Option<u64>,
    pub dispatched: Option<Dispatch>,
    pub rotation: Option<RotationRequest>,
}

pub struct DecisionEngine<S: ActionSink> {
    sink: S,
    clock: Arc<dyn Clock>,
    scheduler: EvaluationScheduler,
    conflicts: ConflictTracker,
    pending: PendingActions,
    latency: LatencyWindow,
    placements: PerSecondCounter,
    attack: Category,
    place: Category,
    swap_timer: Timer,
    last_attack: Timer,
    rotation: Rotation,
    highest_spawned: Option<EntityId>,
    last_snapshot: Option<Arc<WorldSnapshot>>,
    /// Placement of the last consumed outcome, for sequential placement
    cached_place: Option<DamageResult<BlockPos>>,
    best_attack_damage: Option<f32>,
    feed: RenderFeed,
    last_calc: Option<Duration>,
    fault_log: LogLimiter,
    tick: u64,
}

impl<S: ActionSink> DecisionEngine<S> {
    /// Build an engine on the current tokio runtime
    pub fn new(sink: S, clock: Arc<dyn Clock>) -> Result<Self, SchedulerError> {
        Ok(Self::with_scheduler(sink, clock, EvaluationScheduler::new()?))
    }

    pub fn with_scheduler(sink: S, clock: Arc<dyn Clock>, scheduler: EvaluationScheduler) -> Self {
        Self {
            sink,
            clock,
            scheduler,
            conflicts: ConflictTracker::new(),
            pending: PendingActions::new(),
            latency: LatencyWindow::default(),
            placements: PerSecondCounter::new(),
            attack: Category::new("attack"),
            place: Category::new("place"),
            swap_timer: Timer::new(),
            last_attack: Timer::new(),
            rotation: Rotation::new(),
            highest_spawned: None,
            last_snapshot: None,
            cached_place: None,
            best_attack_damage: None,
            feed: RenderFeed::new(),
            last_calc: None,
            fault_log: LogLimiter::default(),
            tick: 0,
        }
    }

    /// Run one tick. Never blocks on the evaluation worker.
    pub fn tick(
        &mut self,
        world: &dyn WorldView,
        settings: &EngineSettings,
        latency_ms: i64,
    ) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let now = self.clock.now_ms();

        self.attack.refresh(now);
        self.place.refresh(now);
        self.feed.prune(now, settings.fade_ms);

        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        // Drain before submitting so the consumed outcome predates this tick
        let outcome = match self.scheduler.take_latest() {
            Some(outcome) if is_fresh(outcome.snapshot_tick, tick) => {
                trace!(
                    tick,
                    snapshot_tick = outcome.snapshot_tick,
                    elapsed_us = outcome.elapsed.as_micros() as u64,
                    "Consumed outcome"
                );
                report.consumed = Some(outcome.snapshot_tick);
                Some(outcome)
            }
            Some(outcome) => {
                debug!(
                    tick,
                    snapshot_tick = outcome.snapshot_tick,
                    "Discarding stale outcome"
                );
                None
            }
            None => None,
        };

        if let Some(outcome) = &outcome {
            self.last_calc = Some(outcome.elapsed);
            for stuck in &outcome.stuck {
                if !self.conflicts.is_blocked(stuck.pos) {
                    debug!(entity = %stuck.id, pos = %stuck.pos, "Hazard stuck in placement");
                }
                self.conflicts.record_blocked(stuck.pos, stuck.distance);
            }
        }

        let snapshot = Arc::new(WorldSnapshot::capture(
            world,
            tick,
            settings.search_radius(),
            settings.terrain_radius(),
            settings.place_range_eye,
        ));
        self.conflicts.prune(snapshot.actor.pos);

        let ack_window = self.ack_window_ms();
        let job = EvaluationJob {
            snapshot: snapshot.clone(),
            settings: settings.clone(),
            extrapolation_ticks: current_extrapolation_ticks(settings, latency_ms, TICK_DURATION_MS),
            blocked: self.conflicts.positions(),
            inhibited: self.pending.attacks_within(now, ack_window),
            attack_counts: self.pending.attack_counts(),
        };
        report.submitted = self.scheduler.submit(job);
        self.last_snapshot = Some(snapshot.clone());

        if let Some(outcome) = outcome {
            report.dispatched = self.decide(outcome, &snapshot, settings, now);
        }
        report.rotation = self.rotation.take_request();
        report
    }

    fn decide(
        &mut self,
        outcome: EvaluationOutcome,
        snapshot: &WorldSnapshot,
        settings: &EngineSettings,
        now: u64,
    ) -> Option<Dispatch> {
        let EvaluationOutcome { attack, place, .. } = outcome;
        self.best_attack_damage = attack.as_ref().map(|a| a.target_damage);
        self.cached_place = place.clone();

        if let Some(attack) = attack {
            match self.try_attack(attack.source, attack.point, false, snapshot, settings, now) {
                Attempt::Sent(dispatch) => return Some(dispatch),
                // keep turning toward the attack rather than facing away to place
                Attempt::Turning => return None,
                Attempt::Gated => {}
            }
        }

        let place = place?;
        if let Some(hazard) = snapshot.hazard_on(place.source) {
            return self.reclassify(hazard.id, hazard.pos, snapshot, settings, now);
        }
        self.try_place(&place, snapshot, settings, now)
    }

    /// Step the rotation toward `point`; true once facing it
    fn face(&mut self, snapshot: &WorldSnapshot, point: Vec3, settings: &EngineSettings) -> bool {
        !settings.rotate
            || self
                .rotation
                .aim(snapshot.actor.eye_pos(), point, settings.yaw_step)
    }

    /// A hazard already sits where the placement was chosen: attack it instead
    fn reclassify(
        &mut self,
        id: EntityId,
        point: Vec3,
        snapshot: &WorldSnapshot,
        settings: &EngineSettings,
        now: u64,
    ) -> Option<Dispatch> {
        let self_damage = BlastPhysics::estimate_damage(
            &snapshot.terrain,
            point,
            &snapshot.actor.damage_profile(),
            BlastOptions {
                terrain_destruction: settings.block_destruction,
                ..Default::default()
            },
        );
        if CombatRules::new(settings).is_self_unsafe(&snapshot.actor, self_damage) {
            debug!(entity = %id, damage = self_damage, "Skipping unsafe hazard at placement");
            return None;
        }
        match self.try_attack(id, point, true, snapshot, settings, now) {
            Attempt::Sent(dispatch) => Some(dispatch),
            Attempt::Turning | Attempt::Gated => None,
        }
    }

    fn try_attack(
        &mut self,
        id: EntityId,
        point: Vec3,
        reclassified: bool,
        snapshot: &WorldSnapshot,
        settings: &EngineSettings,
        now: u64,
    ) -> Attempt {
        if !self.attack.is_idle() {
            return Attempt::Gated;
        }
        if !self.swap_timer.passed(now, settings.swap_penalty as f64 * 25.0) {
            return Attempt::Gated;
        }
        if !snapshot.entity(id).is_some_and(|e| e.alive) {
            debug!(entity = %id, "Hazard gone before dispatch");
            return Attempt::Gated;
        }
        if self.pending.attack_within(id, now, self.ack_window_ms()) {
            return Attempt::Gated;
        }
        if !self.face(snapshot, point, settings) {
            return Attempt::Turning;
        }

        if self.fire_attack(id, settings, now) {
            Attempt::Sent(Dispatch::Attack {
                target: id,
                reclassified,
            })
        } else {
            Attempt::Gated
        }
    }

    /// Ready, dispatch and cool down the attack category
    fn fire_attack(&mut self, id: EntityId, settings: &EngineSettings, now: u64) -> bool {
        self.attack.set(Phase::Ready);
        match dispatch_attack(&mut self.sink, id, Hand::Main) {
            Ok(()) => {
                self.attack.set(Phase::Dispatched);
                self.pending.record_attack(id, now);
                self.last_attack.reset(now);
                let cooldown = self.jittered(self.attack_delay_ms(settings), settings);
                self.attack.set(Phase::Cooldown {
                    until_ms: now + cooldown,
                });
                if settings.sequential == Sequential::Strict {
                    self.place_sequential(settings, now);
                }
                true
            }
            Err(err) => {
                if self.fault_log.allow() {
                    warn!(entity = %id, error = %err, "Attack dispatch failed");
                }
                self.attack.set(Phase::Idle);
                false
            }
        }
    }

    fn try_place(
        &mut self,
        place: &DamageResult<BlockPos>,
        snapshot: &WorldSnapshot,
        settings: &EngineSettings,
        now: u64,
    ) -> Option<Dispatch> {
        if !self.place.is_idle() || snapshot.actor.hazard_hand.is_none() {
            return None;
        }
        if self.pending.place_within(place.source, now, self.ack_window_ms()) {
            return None;
        }
        if !self.face(snapshot, place.point, settings) {
            return None;
        }
        self.send_place(place, snapshot, settings, now)
    }

    /// Ready, dispatch and cool down the place category
    fn send_place(
        &mut self,
        place: &DamageResult<BlockPos>,
        snapshot: &WorldSnapshot,
        settings: &EngineSettings,
        now: u64,
    ) -> Option<Dispatch> {
        let hand = snapshot.actor.hazard_hand?;
        let base = place.source;
        let face = placement_face(
            &snapshot.actor,
            &snapshot.terrain,
            base,
            settings.strict_direction,
        );
        let sync = settings.position_sync.then_some(snapshot.actor.pos);

        self.place.set(Phase::Ready);
        if let Err(err) = dispatch_place(&mut self.sink, base, face, hand, sync) {
            if self.fault_log.allow() {
                warn!(pos = %base, error = %err, "Placement dispatch failed");
            }
            self.place.set(Phase::Idle);
            return None;
        }

        self.place.set(Phase::Dispatched);
        self.pending.record_place(base, now);
        self.feed.insert(base, now, place.target_damage);
        let cooldown = self.jittered(speed_cooldown_ms(settings.place_speed), settings);
        self.place.set(Phase::Cooldown {
            until_ms: now + cooldown,
        });

        if settings.id_predict {
            self.predict_attack(snapshot, now);
        }

        Some(Dispatch::Place { base, face })
    }

    /// Re-place on the last chosen base right after an attack, ignoring the
    /// place cooldown
    fn place_sequential(&mut self, settings: &EngineSettings, now: u64) {
        if !settings.place {
            return;
        }
        let Some(place) = self.cached_place.clone() else {
            return;
        };
        let Some(snapshot) = self.last_snapshot.clone() else {
            return;
        };
        if !self.face(&snapshot, place.point, settings) {
            return;
        }
        if self.send_place(&place, &snapshot, settings, now).is_some() {
            debug!(pos = %place.source, "Sequential placement");
        }
    }

    /// Best-effort attack on the id the new hazard is expected to receive
    fn predict_attack(&mut self, snapshot: &WorldSnapshot, now: u64) {
        let Some(highest) = self.highest_spawned else {
            return;
        };
        let id = EntityId(highest.0.wrapping_add(1));
        if self.pending.has_attack(id) {
            return;
        }
        if snapshot
            .entity(id)
            .is_some_and(|e| e.alive && e.kind != EntityKind::Hazard)
        {
            return;
        }

        match dispatch_attack(&mut self.sink, id, Hand::Main) {
            Ok(()) => self.pending.record_attack(id, now),
            Err(err) => debug!(entity = %id, error = %err, "Predicted attack not sent"),
        }
    }

    fn attack_delay_ms(&self, settings: &EngineSettings) -> u64 {
        if settings.latency_break_delay {
            let floor = settings.min_timeout as f64 * TICK_DURATION_MS as f64;
            let measured = self.latency.average_or_zero()
                + settings.break_timeout as f64 * TICK_DURATION_MS as f64;
            floor.max(measured).round() as u64
        } else {
            speed_cooldown_ms(settings.break_speed)
        }
    }

    fn jittered(&self, base_ms: u64, settings: &EngineSettings) -> u64 {
        if settings.cooldown_jitter_ms == 0 {
            base_ms
        } else {
            base_ms + rand::thread_rng().gen_range(0..=settings.cooldown_jitter_ms)
        }
    }

    fn ack_window_ms(&self) -> u64 {
        let doubled = (self.latency.average_or_zero() * 2.0).round() as u64;
        doubled.max(MIN_ACK_WINDOW_MS)
    }

    /// A new entity appeared in the remote world
    pub fn on_entity_added(&mut self, entity: &EntitySnapshot, settings: &EngineSettings) {
        self.on_entity_spawned(entity.id);
        if entity.kind != EntityKind::Hazard {
            return;
        }

        let base = entity.pos.block().down();
        let now = self.clock.now_ms();
        let requested = self.pending.take_place(base).is_some();
        if requested {
            self.placements.record(now);
            debug!(entity = %entity.id, pos = %base, "Placement acknowledged");
        }

        if !settings.instant || self.pending.has_attack(entity.id) {
            return;
        }
        let worth =
            requested || (settings.instant_calc && self.worth_instant_attack(entity, settings));
        if worth
            && self.fire_attack(entity.id, settings, now)
            && settings.sequential == Sequential::Normal
        {
            self.place_sequential(settings, now);
        }
    }

    /// Whether a spawn nobody asked for should be attacked on sight, judged
    /// against the last captured snapshot
    fn worth_instant_attack(&self, hazard: &EntitySnapshot, settings: &EngineSettings) -> bool {
        let Some(snapshot) = &self.last_snapshot else {
            return false;
        };
        let actor = &snapshot.actor;

        let eye = actor.eye_pos();
        let aim = hazard.pos + Vec3::new(0.0, hazard.height / 2.0, 0.0);
        let distance = eye.distance(aim);
        let walled = snapshot.terrain.raycast(eye, aim, false).is_some();
        if distance > settings.break_range || (walled && distance > settings.break_wall_range) {
            return false;
        }

        let options = BlastOptions {
            terrain_destruction: settings.block_destruction,
            ..Default::default()
        };
        let rules = CombatRules::new(settings);
        let self_damage = BlastPhysics::estimate_damage(
            &snapshot.terrain,
            hazard.pos,
            &actor.damage_profile(),
            options,
        );
        if rules.is_self_unsafe(actor, self_damage) {
            return false;
        }

        snapshot
            .entities
            .iter()
            .filter(|e| is_target(e, actor, settings))
            .filter(|e| e.pos.distance(hazard.pos) <= BLAST_RADIUS)
            .any(|target| {
                let damage = BlastPhysics::estimate_damage(
                    &snapshot.terrain,
                    hazard.pos,
                    &target.damage_profile(),
                    BlastOptions {
                        assume_best_armor: settings.assume_best_armor,
                        ..options
                    },
                );
                let matches_best = settings.instant_max
                    && self.best_attack_damage.is_some_and(|best| damage >= best);
                damage > settings.instant_damage
                    || matches_best
                    || rules.is_lethal(target, damage)
            })
    }

    /// Track the highest id the remote world has assigned
    pub fn on_entity_spawned(&mut self, id: EntityId) {
        if self.highest_spawned.map_or(true, |highest| id > highest) {
            self.highest_spawned = Some(id);
        }
    }

    pub fn on_entities_removed(&mut self, ids: &[EntityId]) {
        let now = self.clock.now_ms();
        for &id in ids {
            if let Some(sent) = self.pending.take_attack(id) {
                self.latency.push(now.saturating_sub(sent));
            }
            self.pending.forget_hazard(id);

            let block = self
                .last_snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.entity(id))
                .map(|entity| entity.pos.block());
            if let Some(block) = block {
                self.conflicts.remove(block);
            }
        }
    }

    /// A detonation was observed: every known hazard in range is gone
    pub fn on_explosion(&mut self, point: Vec3) {
        let ids: Vec<EntityId> = match &self.last_snapshot {
            Some(snapshot) => snapshot
                .hazards()
                .filter(|hazard| hazard.pos.distance(point) <= BLAST_RADIUS)
                .map(|hazard| hazard.id)
                .collect(),
            None => return,
        };
        self.on_entities_removed(&ids);
    }

    /// The held slot changed; attacks wait out the swap penalty
    pub fn on_slot_changed(&mut self) {
        self.swap_timer.reset(self.clock.now_ms());
    }

    /// Drop all transient state (disable / disconnect)
    pub fn reset(&mut self) {
        self.scheduler.clear();
        self.conflicts.clear();
        self.pending.clear();
        self.latency.clear();
        self.placements.clear();
        self.attack.set(Phase::Idle);
        self.place.set(Phase::Idle);
        self.swap_timer.clear();
        self.last_attack.clear();
        self.rotation.reset();
        self.highest_spawned = None;
        self.last_snapshot = None;
        self.cached_place = None;
        self.best_attack_damage = None;
        self.feed.clear();
        self.last_calc = None;
        self.tick = 0;
        info!("Engine state reset");
    }

    /// One-line status: last evaluation time, attack round trip and
    /// placements per second
    pub fn status(&mut self, settings: &EngineSettings) -> String {
        let now = self.clock.now_ms();
        let quiet_after = self.attack_delay_ms(settings) + STATUS_QUIET_MS;
        let break_ms = match self.last_attack.elapsed_ms(now) {
            Some(elapsed) if elapsed <= quiet_after => self.latency.average_or_zero().round() as u64,
            _ => 0,
        };
        let calc_ms = self
            .last_calc
            .unwrap_or(self.scheduler.last_elapsed())
            .as_secs_f64()
            * 1_000.0;

        format!("{:.2}ms, {}ms, {}", calc_ms, break_ms, self.placements.count(now))
    }

    /// Wait for the in-flight evaluation to publish
    pub async fn settle(&self) {
        self.scheduler.wait_idle().await;
    }

    pub fn render_feed(&self) -> Arc<DashMap<BlockPos, FadeEntry>> {
        self.feed.handle()
    }

    pub fn attack_phase(&self) -> Phase {
        self.attack.phase
    }

    pub fn place_phase(&self) -> Phase {
        self.place.phase
    }

    pub fn conflicts(&self) -> &ConflictTracker {
        &self.conflicts
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
