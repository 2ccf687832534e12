//! Server compatibility presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ConfigError, PlacementRule};

/// Validator family running on the remote server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerProfile {
    #[default]
    Grim,
    Ncp,
    Paper,
    Folia,
    Vanilla,
    /// Settings are left as configured
    Custom,
}

impl FromStr for ServerProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grim" => Ok(Self::Grim),
            "ncp" => Ok(Self::Ncp),
            "paper" => Ok(Self::Paper),
            "folia" => Ok(Self::Folia),
            "vanilla" => Ok(Self::Vanilla),
            "custom" => Ok(Self::Custom),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

impl fmt::Display for ServerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Grim => "grim",
            Self::Ncp => "ncp",
            Self::Paper => "paper",
            Self::Folia => "folia",
            Self::Vanilla => "vanilla",
            Self::Custom => "custom",
        };
        write!(f, "{}", label)
    }
}

/// Sequencing parameters a preset controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    /// Dispatch only after facing the detonation point
    pub rotate: bool,
    /// Degrees of yaw per tick (0 = unlimited)
    pub yaw_step: f32,
    /// Interact only with visible faces
    pub strict_direction: bool,
    /// Send the current position ahead of placement interactions
    pub position_sync: bool,
    pub placements: PlacementRule,
}

/// Map a preset to its parameters. `Custom` has none.
pub fn profile_params(profile: ServerProfile) -> Option<ProfileParams> {
    match profile {
        ServerProfile::Grim => Some(ProfileParams {
            rotate: true,
            yaw_step: 1.0,
            strict_direction: true,
            position_sync: false,
            placements: PlacementRule::Native,
        }),
        ServerProfile::Ncp => Some(ProfileParams {
            rotate: true,
            yaw_step: 10.0,
            strict_direction: true,
            position_sync: false,
            placements: PlacementRule::Native,
        }),
        ServerProfile::Paper | ServerProfile::Folia => Some(ProfileParams {
            rotate: true,
            yaw_step: 0.0,
            strict_direction: true,
            position_sync: true,
            placements: PlacementRule::Native,
        }),
        ServerProfile::Vanilla => Some(ProfileParams {
            rotate: false,
            yaw_step: 0.0,
            strict_direction: false,
            position_sync: false,
            placements: PlacementRule::Protocol,
        }),
        ServerProfile::Custom => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;

    #[test]
    fn custom_profile_leaves_settings_alone() {
        assert!(profile_params(ServerProfile::Custom).is_none());
    }

    #[test]
    fn paper_family_syncs_position_before_interacting() {
        for profile in [ServerProfile::Paper, ServerProfile::Folia] {
            let params = profile_params(profile).unwrap();
            assert!(params.position_sync);
            assert_eq!(params.yaw_step, 0.0);
        }
        assert!(!profile_params(ServerProfile::Grim).unwrap().position_sync);
    }

    #[test]
    fn applying_a_profile_overwrites_only_its_fields() {
        let mut settings = EngineSettings {
            min_damage: 7.0,
            ..Default::default()
        };
        settings.apply_profile(&profile_params(ServerProfile::Ncp).unwrap());
        assert!(settings.rotate);
        assert_eq!(settings.yaw_step, 10.0);
        assert!(settings.strict_direction);
        assert_eq!(settings.min_damage, 7.0);
    }

    #[test]
    fn profiles_parse_case_insensitively() {
        assert_eq!("FOLIA".parse::<ServerProfile>().unwrap(), ServerProfile::Folia);
        assert!(matches!(
            "spigot".parse::<ServerProfile>(),
            Err(ConfigError::UnknownProfile(_))
        ));
        assert_eq!(ServerProfile::Vanilla.to_string(), "vanilla");
    }
}
