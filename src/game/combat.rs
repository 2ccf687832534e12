//! Combat rules - self-safety, lethality and damage thresholds

use crate::config::EngineSettings;
use crate::world::{ActorState, EntitySnapshot};

/// Health margin added to remaining health when judging a kill or a suicide
pub const HEALTH_MARGIN: f32 = 0.5;

/// Minimum damage accepted for a candidate that is lethal on its own
pub const LETHAL_MIN_DAMAGE: f32 = 2.0;

/// Outcome of the safety, lethality and minimum-damage gates for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub lethal: bool,
    /// Accepted only through the lethality override
    pub overridden: bool,
}

/// Gate evaluation over the current settings
pub struct CombatRules<'a> {
    settings: &'a EngineSettings,
}

impl<'a> CombatRules<'a> {
    pub fn new(settings: &'a EngineSettings) -> Self {
        Self { settings }
    }

    /// Whether the actor should refuse a detonation dealing `self_damage` to itself
    pub fn is_self_unsafe(&self, actor: &ActorState, self_damage: f32) -> bool {
        if actor.creative {
            return false;
        }
        if self.settings.safety && self_damage >= actor.total_health() + HEALTH_MARGIN {
            return true;
        }
        self_damage > self.settings.max_local_damage
    }

    /// Whether `damage` is expected to finish `target`
    pub fn is_lethal(&self, target: &EntitySnapshot, damage: f32) -> bool {
        let scaled = damage * (1.0 + self.settings.lethal_multiplier);
        if scaled >= target.total_health() + HEALTH_MARGIN {
            return true;
        }

        self.settings.armor_breaker
            && target
                .armor
                .lowest_durability_pct
                .is_some_and(|pct| pct < self.settings.armor_scale)
    }

    pub fn min_damage(&self, lethal: bool) -> f32 {
        if lethal {
            LETHAL_MIN_DAMAGE
        } else {
            self.settings.min_damage
        }
    }

    /// Self-safety gate alone, with the lethality override. Surround-breaking
    /// candidates only have to pass this one.
    pub fn safety_verdict(
        &self,
        actor: &ActorState,
        target: &EntitySnapshot,
        target_damage: f32,
        self_damage: f32,
    ) -> Option<Verdict> {
        let lethal = self.is_lethal(target, target_damage);

        let unsafe_for_self = self.is_self_unsafe(actor, self_damage);
        if unsafe_for_self && !(self.settings.safety_override && lethal) {
            return None;
        }

        Some(Verdict {
            lethal,
            overridden: unsafe_for_self,
        })
    }

    /// Apply every damage gate to one (detonation, target) pair
    pub fn judge(
        &self,
        actor: &ActorState,
        target: &EntitySnapshot,
        target_damage: f32,
        self_damage: f32,
    ) -> Option<Verdict> {
        let verdict = self.safety_verdict(actor, target, target_damage, self_damage)?;
        if target_damage < self.min_damage(verdict.lethal) {
            return None;
        }
        Some(verdict)
    }
}
