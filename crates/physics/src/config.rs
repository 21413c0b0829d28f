//! World and solver settings, loadable from JSON. Missing fields take their
//! defaults.

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::types::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: [f32; 3],
    /// Seconds advanced by one [`crate::World::step`] call.
    pub timestep: f32,
    /// Sub-steps per step; each advances `timestep / substeps`.
    pub substeps: u32,
    /// Requested worker count, owner included. Clamped by the pool.
    pub thread_count: usize,
    /// Run the scene tree rebalancing pass every this many sub-steps.
    /// Zero disables it.
    pub fitness_interval: u32,
    /// Warn when the pool barrier waits longer than this. Zero disables the
    /// warning.
    pub pool_diagnostic_ms: u64,
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Relative residual at which conjugate gradient stops.
    pub tolerance: f32,
    /// Conjugate gradient iteration cap; 0 uses the row count.
    pub max_iterations: usize,
    /// Factor applied to the system diagonal before solving.
    pub diagonal_scale: f32,
    /// Fraction of positional error fed back into velocity per step.
    pub baumgarte: f32,
    /// Penetration tolerated without correction.
    pub penetration_slop: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            timestep: 1.0 / 60.0,
            substeps: 2,
            thread_count: 1,
            fitness_interval: 16,
            pool_diagnostic_ms: 0,
            solver: SolverConfig::default(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-5,
            max_iterations: 0,
            diagonal_scale: 1.1,
            baumgarte: 0.2,
            penetration_slop: 0.01,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Config`] for malformed JSON and
    /// [`PhysicsError::InvalidConfig`] for out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, PhysicsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    /// Duration of one sub-step.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn substep_dt(&self) -> f32 {
        self.timestep / self.substeps.max(1) as f32
    }

    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(invalid("gravity must be finite"));
        }
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(invalid(format!("timestep must be positive, got {}", self.timestep)));
        }
        if self.substeps == 0 {
            return Err(invalid("substeps must be at least 1"));
        }
        if self.thread_count == 0 {
            return Err(invalid("thread_count must be at least 1"));
        }
        self.solver.validate()
    }
}

impl SolverConfig {
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(invalid("solver.tolerance must be positive"));
        }
        if !(self.diagonal_scale.is_finite() && self.diagonal_scale >= 1.0) {
            return Err(invalid(format!(
                "solver.diagonal_scale must be at least 1, got {}",
                self.diagonal_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.baumgarte) {
            return Err(invalid("solver.baumgarte must lie in [0, 1]"));
        }
        if !(self.penetration_slop.is_finite() && self.penetration_slop >= 0.0) {
            return Err(invalid("solver.penetration_slop must be non-negative"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> PhysicsError {
    PhysicsError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(WorldConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = WorldConfig::from_json(r#"{ "substeps": 4, "solver": { "baumgarte": 0.3 } }"#)
            .unwrap();
        assert_eq!(config.substeps, 4);
        assert!((config.solver.baumgarte - 0.3).abs() < f32::EPSILON);
        assert!((config.solver.diagonal_scale - 1.1).abs() < f32::EPSILON);
        assert_eq!(config.gravity, [0.0, -9.81, 0.0]);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = WorldConfig::from_json(r#"{ "timestep": -1.0 }"#).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidConfig(_)));
        let err = WorldConfig::from_json(r#"{ "solver": { "diagonal_scale": 0.5 } }"#).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = WorldConfig::from_json("{ substeps: }").unwrap_err();
        assert!(matches!(err, PhysicsError::Config(_)));
    }
}
