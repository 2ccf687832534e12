//! Yaw/pitch tracking for servers that validate facing before interaction

use serde::Serialize;

use crate::world::Vec3;

/// Facing the external rotation collaborator should apply this tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotationRequest {
    pub yaw: f32,
    pub pitch: f32,
}

/// Yaw and pitch, in degrees, toward `to` from `from`
pub fn look_angles(from: Vec3, to: Vec3) -> (f32, f32) {
    let d = to - from;
    let horizontal = (d.x * d.x + d.z * d.z).sqrt();
    let yaw = (-d.x).atan2(d.z).to_degrees() as f32;
    let pitch = (-d.y).atan2(horizontal).to_degrees() as f32;
    (yaw, pitch)
}

fn wrap_degrees(angle: f32) -> f32 {
    let mut wrapped = angle % 360.0;
    if wrapped >= 180.0 {
        wrapped -= 360.0;
    }
    if wrapped < -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Stepped rotation state
#[derive(Debug, Clone, Default)]
pub struct Rotation {
    yaw: f32,
    pitch: f32,
    request: Option<RotationRequest>,
}

impl Rotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step toward `point`, limited to `yaw_step` degrees of yaw (0 = no
    /// limit). Returns true once aligned.
    pub fn aim(&mut self, eye: Vec3, point: Vec3, yaw_step: f32) -> bool {
        let (yaw, pitch) = look_angles(eye, point);
        let diff = wrap_degrees(yaw - self.yaw);

        let step = if yaw_step > 0.0 {
            diff.clamp(-yaw_step, yaw_step)
        } else {
            diff
        };
        self.yaw = wrap_degrees(self.yaw + step);
        self.pitch = pitch;
        self.request = Some(RotationRequest {
            yaw: self.yaw,
            pitch: self.pitch,
        });

        wrap_degrees(yaw - self.yaw).abs() < 1e-3
    }

    /// Pending request, consumed once per tick
    pub fn take_request(&mut self) -> Option<RotationRequest> {
        self.request.take()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_convention() {
        let origin = Vec3::ZERO;
        let (south, _) = look_angles(origin, Vec3::new(0.0, 0.0, 1.0));
        let (west, _) = look_angles(origin, Vec3::new(-1.0, 0.0, 0.0));
        let (_, down) = look_angles(origin, Vec3::new(1.0, -1.0, 0.0));
        assert!(south.abs() < 1e-4);
        assert!((west - 90.0).abs() < 1e-4);
        assert!((down - 45.0).abs() < 1e-4);
    }

    #[test]
    fn limited_steps_reach_target() {
        let mut rotation = Rotation::new();
        let eye = Vec3::ZERO;
        let west = Vec3::new(-4.0, 0.0, 0.0);

        let mut ticks = 0;
        while !rotation.aim(eye, west, 10.0) {
            ticks += 1;
            assert!(ticks < 20, "never aligned");
        }
        // 90 degrees at 10 per tick
        assert_eq!(ticks, 8);
        assert!(rotation.take_request().is_some());
        assert!(rotation.take_request().is_none());
    }

    #[test]
    fn unlimited_step_aligns_immediately() {
        let mut rotation = Rotation::new();
        assert!(rotation.aim(Vec3::ZERO, Vec3::new(3.0, 1.0, -2.0), 0.0));
    }
}
