//! Captured terrain and voxel raycasting

use std::collections::HashMap;

use super::{BlockKind, BlockPos, Face, Vec3};

/// Upper bound on voxel steps for a single ray
const MAX_RAY_STEPS: usize = 512;

/// First solid block hit by a ray
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayHit {
    pub pos: BlockPos,
    /// Face through which the ray entered the block
    pub face: Face,
}

/// Immutable copy of the non-air blocks around the actor.
///
/// Anything outside the captured region reads as air.
#[derive(Debug, Clone, Default)]
pub struct Terrain {
    blocks: HashMap<BlockPos, BlockKind>,
}

impl Terrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, pos: BlockPos, kind: BlockKind) {
        if kind.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, kind);
        }
    }

    pub fn block_at(&self, pos: BlockPos) -> BlockKind {
        self.blocks.get(&pos).copied().unwrap_or_default()
    }

    pub fn is_air(&self, pos: BlockPos) -> bool {
        self.block_at(pos).is_air()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Walk the voxels between `from` and `to` and return the first block
    /// that stops the ray. The starting voxel counts.
    pub fn raycast(&self, from: Vec3, to: Vec3, ignore_breakable: bool) -> Option<RayHit> {
        let dir = to - from;
        let mut cell = from.block();
        let blocks = |pos: BlockPos| self.block_at(pos).blocks_ray(ignore_breakable);

        let step = |d: f64| -> i32 {
            if d > 0.0 {
                1
            } else if d < 0.0 {
                -1
            } else {
                0
            }
        };
        let (sx, sy, sz) = (step(dir.x), step(dir.y), step(dir.z));

        if blocks(cell) {
            return Some(RayHit {
                pos: cell,
                face: dominant_entry_face(dir),
            });
        }

        if dir.length_squared() < 1e-12 {
            return None;
        }

        // Parametric distance (0..=1 along dir) to the first boundary per axis
        let first_boundary = |origin: f64, cell: i32, d: f64, s: i32| -> f64 {
            if s == 0 {
                f64::INFINITY
            } else {
                let edge = if s > 0 { cell as f64 + 1.0 } else { cell as f64 };
                (edge - origin) / d
            }
        };
        let delta = |d: f64| -> f64 {
            if d == 0.0 {
                f64::INFINITY
            } else {
                1.0 / d.abs()
            }
        };

        let mut t_max_x = first_boundary(from.x, cell.x, dir.x, sx);
        let mut t_max_y = first_boundary(from.y, cell.y, dir.y, sy);
        let mut t_max_z = first_boundary(from.z, cell.z, dir.z, sz);
        let (dx, dy, dz) = (delta(dir.x), delta(dir.y), delta(dir.z));

        // A boundary reached exactly at `to` does not enter the next voxel
        for _ in 0..MAX_RAY_STEPS {
            let face;
            if t_max_x <= t_max_y && t_max_x <= t_max_z {
                if t_max_x >= 1.0 {
                    return None;
                }
                cell.x += sx;
                t_max_x += dx;
                face = if sx > 0 { Face::West } else { Face::East };
            } else if t_max_y <= t_max_z {
                if t_max_y >= 1.0 {
                    return None;
                }
                cell.y += sy;
                t_max_y += dy;
                face = if sy > 0 { Face::Down } else { Face::Up };
            } else {
                if t_max_z >= 1.0 {
                    return None;
                }
                cell.z += sz;
                t_max_z += dz;
                face = if sz > 0 { Face::North } else { Face::South };
            }

            if blocks(cell) {
                return Some(RayHit { pos: cell, face });
            }
        }

        None
    }
}

fn dominant_entry_face(dir: Vec3) -> Face {
    let (ax, ay, az) = (dir.x.abs(), dir.y.abs(), dir.z.abs());
    if ay >= ax && ay >= az {
        if dir.y > 0.0 {
            Face::Down
        } else {
            Face::Up
        }
    } else if ax >= az {
        if dir.x > 0.0 {
            Face::West
        } else {
            Face::East
        }
    } else if dir.z > 0.0 {
        Face::North
    } else {
        Face::South
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_line_has_no_hit() {
        let terrain = Terrain::new();
        assert_eq!(
            terrain.raycast(Vec3::new(0.5, 1.5, 0.5), Vec3::new(5.5, 1.5, 3.5), false),
            None
        );
    }

    #[test]
    fn wall_is_hit_on_entry_face() {
        let mut terrain = Terrain::new();
        terrain.set(BlockPos::new(3, 1, 0), BlockKind::Resistant);

        let hit = terrain
            .raycast(Vec3::new(0.5, 1.5, 0.5), Vec3::new(6.5, 1.5, 0.5), false)
            .expect("wall should stop the ray");
        assert_eq!(hit.pos, BlockPos::new(3, 1, 0));
        assert_eq!(hit.face, Face::West);

        let back = terrain
            .raycast(Vec3::new(6.5, 1.5, 0.5), Vec3::new(0.5, 1.5, 0.5), false)
            .expect("wall should stop the reverse ray");
        assert_eq!(back.face, Face::East);
    }

    #[test]
    fn ray_stops_before_reaching_far_blocks() {
        let mut terrain = Terrain::new();
        terrain.set(BlockPos::new(8, 1, 0), BlockKind::Unbreakable);
        assert_eq!(
            terrain.raycast(Vec3::new(0.5, 1.5, 0.5), Vec3::new(4.5, 1.5, 0.5), false),
            None
        );
    }

    #[test]
    fn breakable_blocks_are_transparent_when_ignored() {
        let mut terrain = Terrain::new();
        terrain.set(BlockPos::new(2, 1, 0), BlockKind::Breakable);
        let from = Vec3::new(0.5, 1.5, 0.5);
        let to = Vec3::new(4.5, 1.5, 0.5);
        assert!(terrain.raycast(from, to, false).is_some());
        assert!(terrain.raycast(from, to, true).is_none());
    }

    #[test]
    fn looking_down_enters_top_face() {
        let mut terrain = Terrain::new();
        terrain.set(BlockPos::new(0, 0, 0), BlockKind::Resistant);
        let hit = terrain
            .raycast(Vec3::new(0.5, 3.0, 0.5), Vec3::new(0.5, 0.5, 0.5), false)
            .expect("floor should be hit");
        assert_eq!(hit.face, Face::Up);
    }

    #[test]
    fn ray_ending_on_a_surface_is_clear() {
        let mut terrain = Terrain::new();
        terrain.set(BlockPos::new(0, 0, 0), BlockKind::Resistant);
        assert_eq!(
            terrain.raycast(Vec3::new(0.5, 2.5, 0.5), Vec3::new(0.5, 1.0, 0.5), false),
            None
        );
    }

    #[test]
    fn setting_air_removes_block() {
        let mut terrain = Terrain::new();
        let pos = BlockPos::new(1, 2, 3);
        terrain.set(pos, BlockKind::Breakable);
        assert_eq!(terrain.len(), 1);
        terrain.set(pos, BlockKind::Air);
        assert!(terrain.is_empty());
        assert!(terrain.is_air(pos));
    }
}
