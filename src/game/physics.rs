//! Blast physics: area damage estimation against a captured terrain

use crate::world::{Aabb, DamageProfile, Terrain, Vec3};

/// Explosion power of a hazard
pub const BLAST_POWER: f64 = 6.0;
/// Radius inside which a blast deals damage
pub const BLAST_RADIUS: f64 = BLAST_POWER * 2.0;
/// Players take extra blast damage on the hardest difficulty
pub const PLAYER_DIFFICULTY_SCALE: f32 = 1.5;
/// Protection factor assumed when the target is treated as fully enchanted
pub const MAX_PROTECTION: f32 = 20.0;

/// Inputs that shape one estimate besides the geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlastOptions {
    /// Ticks of horizontal motion to project the target forward
    pub extrapolation_ticks: u32,
    /// Treat breakable terrain as already destroyed
    pub terrain_destruction: bool,
    /// Assume maximum protection regardless of observed armor
    pub assume_best_armor: bool,
}

/// Damage simulator
pub struct BlastPhysics;

impl BlastPhysics {
    /// Estimated damage a blast at `point` deals to `target`.
    ///
    /// Pure and allocation free. A target with no unobstructed line to the
    /// blast takes no damage.
    pub fn estimate_damage(
        terrain: &Terrain,
        point: Vec3,
        target: &DamageProfile,
        options: BlastOptions,
    ) -> f32 {
        let pos = Self::extrapolate(target.pos, target.velocity, options.extrapolation_ticks);

        let ratio = pos.distance(point) / BLAST_RADIUS;
        if ratio > 1.0 {
            return 0.0;
        }

        let bounds = Aabb::around_feet(pos, target.width, target.height);
        let exposure = Self::exposure(terrain, point, &bounds, options.terrain_destruction);
        if exposure <= 0.0 {
            return 0.0;
        }

        let impact = (1.0 - ratio) * exposure;
        let mut damage = ((impact * impact + impact) / 2.0 * 7.0 * BLAST_RADIUS + 1.0) as f32;

        if target.is_player {
            damage *= PLAYER_DIFFICULTY_SCALE;
        }

        damage = Self::apply_armor(damage, target.armor.points, target.armor.toughness);

        if target.resistance > 0 {
            let reduction = (25.0 - 5.0 * target.resistance as f32).max(0.0);
            damage *= reduction / 25.0;
        }

        let protection = if options.assume_best_armor {
            MAX_PROTECTION
        } else {
            target.armor.protection
        };
        damage *= 1.0 - protection.clamp(0.0, MAX_PROTECTION) / 25.0;

        damage.max(0.0)
    }

    /// Project a position along its horizontal velocity
    pub fn extrapolate(pos: Vec3, velocity: Vec3, ticks: u32) -> Vec3 {
        let t = ticks as f64;
        Vec3::new(pos.x + velocity.x * t, pos.y, pos.z + velocity.z * t)
    }

    /// Fraction of sample points on the box with a clear line to `point`
    pub fn exposure(terrain: &Terrain, point: Vec3, bounds: &Aabb, ignore_breakable: bool) -> f64 {
        let size = bounds.max - bounds.min;
        let step_x = 1.0 / (size.x * 2.0 + 1.0);
        let step_y = 1.0 / (size.y * 2.0 + 1.0);
        let step_z = 1.0 / (size.z * 2.0 + 1.0);
        if step_x <= 0.0 || step_y <= 0.0 || step_z <= 0.0 {
            return 0.0;
        }

        let count_x = (1.0 / step_x).floor() as u32;
        let count_y = (1.0 / step_y).floor() as u32;
        let count_z = (1.0 / step_z).floor() as u32;
        let offset_x = (1.0 - count_x as f64 * step_x) / 2.0;
        let offset_z = (1.0 - count_z as f64 * step_z) / 2.0;

        let mut clear = 0u32;
        let mut total = 0u32;
        for i in 0..=count_x {
            for j in 0..=count_y {
                for k in 0..=count_z {
                    let sample = Vec3::new(
                        lerp(i as f64 * step_x, bounds.min.x, bounds.max.x) + offset_x,
                        lerp(j as f64 * step_y, bounds.min.y, bounds.max.y),
                        lerp(k as f64 * step_z, bounds.min.z, bounds.max.z) + offset_z,
                    );
                    if terrain.raycast(sample, point, ignore_breakable).is_none() {
                        clear += 1;
                    }
                    total += 1;
                }
            }
        }

        if total == 0 {
            0.0
        } else {
            clear as f64 / total as f64
        }
    }

    /// Armor mitigation with toughness
    pub fn apply_armor(damage: f32, armor: f32, toughness: f32) -> f32 {
        if armor <= 0.0 {
            return damage;
        }
        let divisor = 2.0 + toughness / 4.0;
        let effective = (armor - damage / divisor).clamp(armor * 0.2, 20.0);
        damage * (1.0 - effective / 25.0)
    }
}

fn lerp(delta: f64, start: f64, end: f64) -> f64 {
    start + delta * (end - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ArmorState, BlockKind, BlockPos};

    fn target_at(pos: Vec3) -> DamageProfile {
        DamageProfile {
            pos,
            velocity: Vec3::ZERO,
            width: 0.6,
            height: 1.8,
            armor: ArmorState::default(),
            resistance: 0,
            is_player: true,
        }
    }

    fn open_ground() -> Terrain {
        let mut terrain = Terrain::new();
        for x in -14..=14 {
            for z in -14..=14 {
                terrain.set(BlockPos::new(x, 0, z), BlockKind::Resistant);
            }
        }
        terrain
    }

    #[test]
    fn damage_falls_off_with_distance() {
        let terrain = open_ground();
        let point = Vec3::new(0.5, 1.0, 0.5);
        let near = BlastPhysics::estimate_damage(
            &terrain,
            point,
            &target_at(Vec3::new(1.5, 1.0, 0.5)),
            BlastOptions::default(),
        );
        let far = BlastPhysics::estimate_damage(
            &terrain,
            point,
            &target_at(Vec3::new(6.5, 1.0, 0.5)),
            BlastOptions::default(),
        );
        assert!(near > far, "near {} should exceed far {}", near, far);
        assert!(far > 0.0);
    }

    #[test]
    fn out_of_radius_is_zero() {
        let terrain = open_ground();
        let damage = BlastPhysics::estimate_damage(
            &terrain,
            Vec3::new(0.5, 1.0, 0.5),
            &target_at(Vec3::new(13.0, 1.0, 0.5)),
            BlastOptions::default(),
        );
        assert_eq!(damage, 0.0);
    }

    #[test]
    fn target_sealed_in_unbreakable_terrain_takes_nothing() {
        let mut terrain = open_ground();
        for x in -1..=1 {
            for y in 0..=3 {
                for z in -1..=1 {
                    terrain.set(BlockPos::new(x, y, z), BlockKind::Unbreakable);
                }
            }
        }
        terrain.set(BlockPos::new(0, 1, 0), BlockKind::Air);
        terrain.set(BlockPos::new(0, 2, 0), BlockKind::Air);

        let target = target_at(Vec3::new(0.5, 1.0, 0.5));
        for destruction in [false, true] {
            let damage = BlastPhysics::estimate_damage(
                &terrain,
                Vec3::new(3.5, 1.0, 0.5),
                &target,
                BlastOptions {
                    terrain_destruction: destruction,
                    ..Default::default()
                },
            );
            assert_eq!(damage, 0.0);
        }
    }

    #[test]
    fn destruction_lets_blast_through_breakable_walls() {
        let mut terrain = open_ground();
        for y in 1..=3 {
            for z in -2..=2 {
                terrain.set(BlockPos::new(2, y, z), BlockKind::Breakable);
            }
        }
        let point = Vec3::new(4.5, 1.0, 0.5);
        let target = target_at(Vec3::new(0.5, 1.0, 0.5));

        let shielded =
            BlastPhysics::estimate_damage(&terrain, point, &target, BlastOptions::default());
        let exposed = BlastPhysics::estimate_damage(
            &terrain,
            point,
            &target,
            BlastOptions {
                terrain_destruction: true,
                ..Default::default()
            },
        );
        assert_eq!(shielded, 0.0);
        assert!(exposed > 0.0);
    }

    #[test]
    fn extrapolation_uses_horizontal_motion_only() {
        let projected = BlastPhysics::extrapolate(
            Vec3::new(0.0, 64.0, 0.0),
            Vec3::new(0.25, -1.0, -0.5),
            4,
        );
        assert_eq!(projected, Vec3::new(1.0, 64.0, -2.0));
    }

    #[test]
    fn fleeing_target_is_projected_away() {
        let terrain = open_ground();
        let point = Vec3::new(0.5, 1.0, 0.5);
        let mut target = target_at(Vec3::new(2.5, 1.0, 0.5));
        target.velocity = Vec3::new(0.5, 0.0, 0.0);

        let now = BlastPhysics::estimate_damage(&terrain, point, &target, BlastOptions::default());
        let later = BlastPhysics::estimate_damage(
            &terrain,
            point,
            &target,
            BlastOptions {
                extrapolation_ticks: 6,
                ..Default::default()
            },
        );
        assert!(later < now);
    }

    #[test]
    fn armor_and_protection_mitigate() {
        let terrain = open_ground();
        let point = Vec3::new(0.5, 1.0, 0.5);
        let bare = target_at(Vec3::new(2.5, 1.0, 0.5));
        let mut armored = bare;
        armored.armor = ArmorState {
            points: 20.0,
            toughness: 8.0,
            protection: 4.0,
            lowest_durability_pct: None,
        };

        let bare_damage =
            BlastPhysics::estimate_damage(&terrain, point, &bare, BlastOptions::default());
        let armored_damage =
            BlastPhysics::estimate_damage(&terrain, point, &armored, BlastOptions::default());
        let worst_case = BlastPhysics::estimate_damage(
            &terrain,
            point,
            &armored,
            BlastOptions {
                assume_best_armor: true,
                ..Default::default()
            },
        );
        assert!(armored_damage < bare_damage);
        assert!(worst_case < armored_damage);
        assert!(worst_case >= 0.0);
    }

    #[test]
    fn point_blank_matches_closed_form() {
        let terrain = Terrain::new();
        let mut target = target_at(Vec3::new(0.5, 1.0, 0.5));
        target.is_player = false;
        let damage = BlastPhysics::estimate_damage(
            &terrain,
            Vec3::new(0.5, 1.0, 0.5),
            &target,
            BlastOptions::default(),
        );
        // impact 1.0 -> (1 + 1) / 2 * 7 * 12 + 1
        assert!((damage - 85.0).abs() < 1e-3);
    }
}
