//! Simulation tuning parameters

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::foundation::math::Vec3;
use crate::foundation::time::steps_per_second;

/// Tuning for a [`PhysicsWorld`](crate::physics::PhysicsWorld)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravitational acceleration
    pub gravity: Vec3,

    /// Seconds per physics step
    pub fixed_timestep: f32,

    /// Per-axis speeds below this snap to zero
    pub epsilon: f32,

    /// GJK iteration cap
    pub gjk_max_iterations: u32,

    /// EPA iteration cap
    pub epa_max_iterations: u32,

    /// EPA convergence tolerance
    pub epa_tolerance: f32,

    /// Coefficient of restitution for contact impulses
    pub restitution: f32,

    /// Approach speed below which a contact is treated as inelastic
    ///
    /// Zero (the default) keeps the restitution on every approach.
    pub resting_velocity: f32,

    /// Penetration left uncorrected so resting bodies keep touching
    pub penetration_slop: f32,

    /// Linear drag applied while airborne
    pub drag_coefficient: f32,

    /// Downward offset used by the grounded probe
    pub ground_probe_distance: f32,

    /// Multiplier on `|v| * dt` when sweeping bounding volumes
    pub speculative_margin: f32,

    /// Whether fast movers get speculative contacts at all
    pub speculation_enabled: bool,

    /// Edge length of the spatial index, centred on the origin
    pub world_extent: u32,

    /// Edge length of one spatial index cell
    pub cell_size: f32,

    /// Tessellation of the stock sphere hull
    pub sphere_tessellation: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let gravity = 9.81;
        let fixed_timestep = 0.02;
        Self {
            gravity: Vec3::new(0.0, -gravity, 0.0),
            fixed_timestep,
            epsilon: 0.001,
            gjk_max_iterations: 64,
            epa_max_iterations: 64,
            epa_tolerance: 0.001,
            restitution: 0.6666,
            resting_velocity: 0.0,
            penetration_slop: 0.005,
            drag_coefficient: 0.25,
            ground_probe_distance: 0.01,
            speculative_margin: 1.0,
            speculation_enabled: true,
            world_extent: 2048,
            cell_size: 1.0,
            sphere_tessellation: 16,
        }
    }
}

impl Config for PhysicsConfig {}

impl PhysicsConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps per simulated second, the window of the stacking penalty
    pub fn steps_per_second(&self) -> u32 {
        steps_per_second(self.fixed_timestep)
    }

    /// Half the world extent; shifts negative coordinates into the grid
    pub fn world_offset(&self) -> f32 {
        self.world_extent as f32 * 0.5
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(invalid(format!("fixed_timestep must be positive, got {}", self.fixed_timestep)));
        }
        if !self.gravity.iter().all(|c| c.is_finite()) {
            return Err(invalid("gravity must be finite".to_string()));
        }
        if self.gjk_max_iterations == 0 || self.epa_max_iterations == 0 {
            return Err(invalid("iteration caps must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(invalid(format!("restitution must be in [0, 1], got {}", self.restitution)));
        }
        for (name, value) in [
            ("epsilon", self.epsilon),
            ("epa_tolerance", self.epa_tolerance),
            ("resting_velocity", self.resting_velocity),
            ("penetration_slop", self.penetration_slop),
            ("drag_coefficient", self.drag_coefficient),
            ("ground_probe_distance", self.ground_probe_distance),
            ("speculative_margin", self.speculative_margin),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{name} must be finite and non-negative, got {value}")));
            }
        }
        if !self.world_extent.is_power_of_two() {
            return Err(invalid(format!("world_extent must be a power of two, got {}", self.world_extent)));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(invalid(format!("cell_size must be positive, got {}", self.cell_size)));
        }
        if self.sphere_tessellation < 3 {
            return Err(invalid("sphere_tessellation must be at least 3".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PhysicsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.steps_per_second(), 50);
        assert_eq!(config.world_offset(), 1024.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = PhysicsConfig::default();
        config.fixed_timestep = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PhysicsConfig::default();
        config.world_extent = 1000;
        assert!(config.validate().is_err());

        let mut config = PhysicsConfig::default();
        config.restitution = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PhysicsConfig = toml::from_str("restitution = 0.5\nfixed_timestep = 0.01\n").unwrap();
        assert_eq!(config.restitution, 0.5);
        assert_eq!(config.steps_per_second(), 100);
        assert_eq!(config.gjk_max_iterations, 64);
    }

    #[test]
    fn test_file_round_trip_through_both_formats() {
        let dir = std::env::temp_dir();
        let mut config = PhysicsConfig::default();
        config.drag_coefficient = 0.5;

        for name in ["rust_physics_config_test.toml", "rust_physics_config_test.ron"] {
            let path = dir.join(name);
            config.save_to_file(&path).unwrap();
            let loaded = PhysicsConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, config);
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = PhysicsConfig::load_from_file("physics.yaml");
        assert!(result.is_err());
    }
}
