//! Configuration module - environment variable parsing and engine settings

pub mod profile;

pub use profile::{profile_params, ProfileParams, ServerProfile};

use std::env;

use serde::{Deserialize, Serialize};

use crate::util::time::TICK_DURATION_MS;
use crate::world::snapshot::TERRAIN_MARGIN;

/// Process configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Tick duration in milliseconds
    pub tick_ms: u64,
    /// Server compatibility preset applied on top of the settings
    pub profile: ServerProfile,
    /// Ticks to run the demo for (0 = until interrupted)
    pub demo_ticks: u64,
    /// Seed for the demo opponent's movement
    pub demo_seed: u64,
    /// Engine settings after JSON overrides and the preset
    pub settings: EngineSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let tick_ms = parse_var("TICK_MS", TICK_DURATION_MS)?;
        if tick_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "TICK_MS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let profile = match env::var("SERVER_PROFILE") {
            Ok(value) => value.parse()?,
            Err(_) => ServerProfile::default(),
        };

        let mut settings = match env::var("ENGINE_SETTINGS_JSON") {
            Ok(json) => EngineSettings::from_json(&json)?,
            Err(_) => EngineSettings::default(),
        };
        if let Some(params) = profile_params(profile) {
            settings.apply_profile(&params);
        }

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            tick_ms,
            profile,
            demo_ticks: parse_var("DEMO_TICKS", 400)?,
            demo_seed: parse_var("DEMO_SEED", 7)?,
            settings,
        })
    }
}

fn parse_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("expected an unsigned integer, got {:?}", value),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Unknown server profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid engine settings JSON: {0}")]
    Settings(#[from] serde_json::Error),
}

/// How the damage projection horizon is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolateMode {
    /// Derived from observed latency
    #[default]
    Auto,
    /// Fixed tick count
    Manual,
}

/// Placement validity standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRule {
    /// One free block above the base
    #[default]
    Native,
    /// Two free blocks above the base
    Protocol,
}

/// Placement sent straight after an attack, from the last chosen base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sequential {
    #[default]
    None,
    /// After an instant attack on a freshly spawned hazard
    Normal,
    /// After every attack
    Strict,
}

/// Numeric thresholds and toggles polled by the engine every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    // Targets
    pub target_range: f64,
    pub target_players: bool,
    pub target_monsters: bool,
    pub target_neutrals: bool,
    pub target_animals: bool,

    // Attacking existing hazards
    /// 0..=20 scale
    pub break_speed: f32,
    pub break_range: f64,
    pub break_wall_range: f64,
    pub max_y_offset: f64,
    pub ticks_existed: u32,
    pub inhibit: bool,
    /// Attacks (in tens) before a hazard is considered stuck
    pub attack_limit: f32,
    /// Derive the attack cooldown from observed round trips
    pub latency_break_delay: bool,
    /// Ticks added to the average round trip
    pub break_timeout: f32,
    /// Minimum cooldown in ticks when using the latency delay
    pub min_timeout: f32,
    /// Ticks (x25 ms) to hold attacks after a held-slot change
    pub swap_penalty: f32,
    pub instant: bool,
    /// Instant-attack unrequested spawns that score well enough
    pub instant_calc: bool,
    /// Damage an unrequested spawn must exceed for an instant attack
    pub instant_damage: f32,
    /// Also instant-attack spawns matching the current best attack
    pub instant_max: bool,
    pub sequential: Sequential,
    pub id_predict: bool,

    // Placing new hazards
    pub place: bool,
    /// 0..=20 scale
    pub place_speed: f32,
    pub place_range: f64,
    pub place_wall_range: f64,
    pub place_range_eye: bool,
    pub place_range_center: bool,
    pub raytrace: bool,
    pub anti_surround: bool,
    /// Only place hazards that could be attacked from here
    pub strict_validation: bool,
    pub strict_direction: bool,
    pub placements: PlacementRule,
    pub half_hitbox: bool,

    // Damage
    pub min_damage: f32,
    pub max_local_damage: f32,
    pub assume_best_armor: bool,
    pub armor_breaker: bool,
    /// Durability percent under which a target counts as lethal
    pub armor_scale: f32,
    pub lethal_multiplier: f32,
    pub safety: bool,
    pub safety_override: bool,
    pub block_destruction: bool,
    pub self_extrapolate: bool,

    // Extrapolation
    pub extrapolate_mode: ExtrapolateMode,
    pub extrapolate_ticks: u32,
    pub max_extrapolate_ticks: u32,

    // Sequencing
    pub rotate: bool,
    /// Degrees of yaw per tick
    pub yaw_step: f32,
    pub position_sync: bool,
    pub cooldown_jitter_ms: u64,

    // Feedback
    pub fade_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            target_range: 10.0,
            target_players: true,
            target_monsters: false,
            target_neutrals: false,
            target_animals: false,

            break_speed: 18.0,
            break_range: 4.0,
            break_wall_range: 4.0,
            max_y_offset: 5.0,
            ticks_existed: 0,
            inhibit: true,
            attack_limit: 1.5,
            latency_break_delay: false,
            break_timeout: 3.0,
            min_timeout: 5.0,
            swap_penalty: 0.0,
            instant: false,
            instant_calc: false,
            instant_damage: 6.0,
            instant_max: true,
            sequential: Sequential::None,
            id_predict: false,

            place: true,
            place_speed: 18.0,
            place_range: 4.0,
            place_wall_range: 4.0,
            place_range_eye: false,
            place_range_center: true,
            raytrace: true,
            anti_surround: false,
            strict_validation: false,
            strict_direction: false,
            placements: PlacementRule::Native,
            half_hitbox: false,

            min_damage: 4.0,
            max_local_damage: 12.0,
            assume_best_armor: false,
            armor_breaker: true,
            armor_scale: 5.0,
            lethal_multiplier: 1.5,
            safety: true,
            safety_override: false,
            block_destruction: false,
            self_extrapolate: false,

            extrapolate_mode: ExtrapolateMode::Auto,
            extrapolate_ticks: 0,
            max_extrapolate_ticks: 8,

            rotate: false,
            yaw_step: 180.0,
            position_sync: false,
            cooldown_jitter_ms: 0,

            fade_ms: 250,
        }
    }
}

impl EngineSettings {
    /// Parse a JSON object; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Overwrite the preset-controlled parameters
    pub fn apply_profile(&mut self, params: &ProfileParams) {
        self.rotate = params.rotate;
        self.yaw_step = params.yaw_step;
        self.strict_direction = params.strict_direction;
        self.position_sync = params.position_sync;
        self.placements = params.placements;
    }

    /// Cube radius searched for placement candidates
    pub fn search_radius(&self) -> i32 {
        self.place_range.ceil() as i32
    }

    /// Cube radius of terrain copied for blast raycasts: every candidate,
    /// every hazard in reach and every target in range
    pub fn terrain_radius(&self) -> i32 {
        let reach = self.target_range.max(self.break_range).ceil() as i32;
        self.search_radius().max(reach) + TERRAIN_MARGIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_overrides_keep_other_defaults() {
        let settings = EngineSettings::from_json(
            r#"{"min_damage": 6.5, "extrapolate_mode": "manual", "sequential": "strict"}"#,
        )
        .unwrap();
        assert_eq!(settings.min_damage, 6.5);
        assert_eq!(settings.extrapolate_mode, ExtrapolateMode::Manual);
        assert_eq!(settings.sequential, Sequential::Strict);
        assert_eq!(settings.instant_damage, 6.0);
        assert_eq!(settings.place_range, 4.0);
        assert!(settings.safety);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EngineSettings::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn search_radius_rounds_up() {
        let settings = EngineSettings {
            place_range: 4.5,
            ..Default::default()
        };
        assert_eq!(settings.search_radius(), 5);
    }

    #[test]
    fn terrain_covers_target_range() {
        let settings = EngineSettings {
            place_range: 4.5,
            target_range: 10.2,
            ..Default::default()
        };
        assert_eq!(settings.terrain_radius(), 11 + TERRAIN_MARGIN);
    }
}
