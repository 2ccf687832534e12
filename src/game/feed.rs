//! Render feed - recently chosen placements for an external overlay

use std::sync::Arc;

use dashmap::DashMap;

use crate::world::BlockPos;

/// One highlighted placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeEntry {
    pub started_ms: u64,
    pub damage: f32,
}

/// Concurrent map shared with the overlay; written by the tick only
#[derive(Debug, Clone, Default)]
pub struct RenderFeed {
    entries: Arc<DashMap<BlockPos, FadeEntry>>,
}

impl RenderFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the consumer side
    pub fn handle(&self) -> Arc<DashMap<BlockPos, FadeEntry>> {
        self.entries.clone()
    }

    pub fn insert(&self, pos: BlockPos, now_ms: u64, damage: f32) {
        self.entries.insert(
            pos,
            FadeEntry {
                started_ms: now_ms,
                damage,
            },
        );
    }

    /// Remove entries whose fade has finished
    pub fn prune(&self, now_ms: u64, fade_ms: u64) {
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.started_ms) < fade_ms);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
