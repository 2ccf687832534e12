//! Bookkeeping owned by the main tick: obstructed positions, pending
//! dispatches awaiting acknowledgement and per-hazard attack counts

use std::collections::{HashMap, HashSet};

use crate::world::{BlockPos, EntityId, Vec3};

/// How much farther the actor must be before an obstruction is forgotten
pub const PRUNE_MARGIN: f64 = 0.5;

/// Positions occupied by a hazard that refused to clear
#[derive(Debug, Clone, Default)]
pub struct ConflictTracker {
    blocked: HashMap<BlockPos, f64>,
}

impl ConflictTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance measure shared by recording and pruning: actor feet to the
    /// bottom centre of the block
    pub fn distance_to(pos: BlockPos, actor: Vec3) -> f64 {
        (pos.corner() + Vec3::new(0.5, 0.0, 0.5)).distance(actor)
    }

    pub fn record_blocked(&mut self, pos: BlockPos, distance: f64) {
        self.blocked.insert(pos, distance);
    }

    pub fn is_blocked(&self, pos: BlockPos) -> bool {
        self.blocked.contains_key(&pos)
    }

    pub fn remove(&mut self, pos: BlockPos) -> bool {
        self.blocked.remove(&pos).is_some()
    }

    /// Drop entries the actor has since moved away from
    pub fn prune(&mut self, actor: Vec3) -> usize {
        let before = self.blocked.len();
        self.blocked
            .retain(|pos, recorded| Self::distance_to(*pos, actor) - *recorded <= PRUNE_MARGIN);
        before - self.blocked.len()
    }

    /// Copy handed to an evaluation job
    pub fn positions(&self) -> HashSet<BlockPos> {
        self.blocked.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocked.clear();
    }
}

/// Dispatches awaiting a removal or spawn signal from the remote world
#[derive(Debug, Clone, Default)]
pub struct PendingActions {
    attacks: HashMap<EntityId, u64>,
    places: HashMap<BlockPos, u64>,
    attack_counts: HashMap<EntityId, u32>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attack and bump the hazard's attack count
    pub fn record_attack(&mut self, id: EntityId, now_ms: u64) {
        self.attacks.insert(id, now_ms);
        *self.attack_counts.entry(id).or_insert(0) += 1;
    }

    pub fn record_place(&mut self, base: BlockPos, now_ms: u64) {
        self.places.insert(base, now_ms);
    }

    /// Remove an attack record, returning when it was sent
    pub fn take_attack(&mut self, id: EntityId) -> Option<u64> {
        self.attacks.remove(&id)
    }

    pub fn take_place(&mut self, base: BlockPos) -> Option<u64> {
        self.places.remove(&base)
    }

    pub fn has_attack(&self, id: EntityId) -> bool {
        self.attacks.contains_key(&id)
    }

    /// Whether an attack on `id` was sent less than `window_ms` ago
    pub fn attack_within(&self, id: EntityId, now_ms: u64, window_ms: u64) -> bool {
        self.attacks
            .get(&id)
            .is_some_and(|sent| now_ms.saturating_sub(*sent) < window_ms)
    }

    pub fn place_within(&self, base: BlockPos, now_ms: u64, window_ms: u64) -> bool {
        self.places
            .get(&base)
            .is_some_and(|sent| now_ms.saturating_sub(*sent) < window_ms)
    }

    /// Hazards whose last attack is still inside the acknowledgement window
    pub fn attacks_within(&self, now_ms: u64, window_ms: u64) -> HashSet<EntityId> {
        self.attacks
            .iter()
            .filter(|(_, sent)| now_ms.saturating_sub(**sent) < window_ms)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn attack_count(&self, id: EntityId) -> u32 {
        self.attack_counts.get(&id).copied().unwrap_or(0)
    }

    pub fn attack_counts(&self) -> HashMap<EntityId, u32> {
        self.attack_counts.clone()
    }

    pub fn forget_hazard(&mut self, id: EntityId) {
        self.attack_counts.remove(&id);
    }

    pub fn clear(&mut self) {
        self.attacks.clear();
        self.places.clear();
        self.attack_counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_until_actor_moves_past_margin() {
        let pos = BlockPos::new(0, 1, 0);
        let mut tracker = ConflictTracker::new();
        tracker.record_blocked(pos, 3.0);

        // bottom centre of the block is (0.5, 1.0, 0.5)
        let inside = Vec3::new(0.5 + 3.0 + PRUNE_MARGIN - 0.4, 1.0, 0.5);
        assert_eq!(tracker.prune(inside), 0);
        assert!(tracker.is_blocked(pos));

        let outside = Vec3::new(0.5 + 3.0 + PRUNE_MARGIN + 0.4, 1.0, 0.5);
        assert_eq!(tracker.prune(outside), 1);
        assert!(!tracker.is_blocked(pos));
    }

    #[test]
    fn approaching_keeps_entry() {
        let pos = BlockPos::new(4, 1, 4);
        let mut tracker = ConflictTracker::new();
        tracker.record_blocked(pos, 2.0);
        tracker.prune(Vec3::new(4.5, 1.0, 4.5));
        assert!(tracker.positions().contains(&pos));
    }

    #[test]
    fn attack_records_expire_from_window() {
        let mut pending = PendingActions::new();
        pending.record_attack(EntityId(9), 1_000);
        pending.record_attack(EntityId(9), 1_100);

        assert_eq!(pending.attack_count(EntityId(9)), 2);
        assert!(pending.attack_within(EntityId(9), 1_300, 250));
        assert!(!pending.attack_within(EntityId(9), 1_350, 250));
        assert!(pending.attacks_within(1_200, 250).contains(&EntityId(9)));

        assert_eq!(pending.take_attack(EntityId(9)), Some(1_100));
        assert!(!pending.has_attack(EntityId(9)));
        pending.forget_hazard(EntityId(9));
        assert_eq!(pending.attack_count(EntityId(9)), 0);
    }

    #[test]
    fn place_records_are_acknowledged_once() {
        let mut pending = PendingActions::new();
        let base = BlockPos::new(2, 0, 0);
        pending.record_place(base, 50);
        assert!(pending.place_within(base, 100, 250));
        assert_eq!(pending.take_place(base), Some(50));
        assert_eq!(pending.take_place(base), None);
    }
}
