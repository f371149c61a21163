//! Run configuration, validation, and error types.
//!
//! [`SimulationConfig`] is the builder-input for
//! [`Simulation::new`](crate::Simulation::new), which calls
//! [`validate()`](SimulationConfig::validate) before doing any work.

use rupture_friction::SolverSettings;
use thiserror::Error;

// ── SlipIntegration ────────────────────────────────────────────────

/// How accumulated slip is integrated between two fault resolutions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlipIntegration {
    /// `slip += V_new · Δt`.
    Forward,
    /// `slip += ½(V_prev + V_new) · Δt`.
    #[default]
    Trapezoidal,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SimulationConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The LTS rate must be at least 1.
    #[error("rate must be at least 1, got {rate}")]
    InvalidRate {
        /// The configured rate.
        rate: u32,
    },
    /// `end_time` is NaN, infinite, zero, or negative.
    #[error("end_time must be finite and positive, got {value}")]
    InvalidEndTime {
        /// The invalid value.
        value: f64,
    },
    /// `output_interval` is NaN, infinite, zero, or negative.
    #[error("output_interval must be finite and positive, got {value}")]
    InvalidOutputInterval {
        /// The invalid value.
        value: f64,
    },
    /// Output buffer capacity is zero.
    #[error("output_buffer_capacity must be at least 1")]
    OutputBufferZero,
    /// `rupture_velocity_threshold` is not finite and positive.
    #[error("rupture_velocity_threshold must be finite and positive, got {value}")]
    InvalidRuptureThreshold {
        /// The invalid value.
        value: f64,
    },
    /// Solver settings are out of range.
    #[error("invalid solver settings: {reason}")]
    InvalidSolver {
        /// Which setting is wrong.
        reason: String,
    },
    /// The run would need more finest-level steps than the tick counter
    /// can hold.
    #[error("end_time / dt_min = {steps} exceeds the tick range")]
    TooManySteps {
        /// `end_time / dt_min`.
        steps: f64,
    },
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Complete run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// LTS rate `r`. `1` is global time stepping. Default: 2.
    pub rate: u32,
    /// Simulated end time in seconds. Default: 1.0.
    pub end_time: f64,
    /// Snapshot spacing in seconds. `None` emits only the initial and
    /// final snapshots. Default: `None`.
    pub output_interval: Option<f64>,
    /// Snapshots buffered per sink before the producer is throttled.
    /// Default: 4.
    pub output_buffer_capacity: usize,
    /// Coarsest cluster level allowed. Default: unlimited.
    pub max_cluster_level: Option<u32>,
    /// Slip integration rule. Default: trapezoidal.
    pub slip_integration: SlipIntegration,
    /// Slip rate (m/s) above which a face counts as ruptured.
    /// Default: 1e-3.
    pub rupture_velocity_threshold: f64,
    /// Rate-and-state solver settings.
    pub solver: SolverSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rate: 2,
            end_time: 1.0,
            output_interval: None,
            output_buffer_capacity: 4,
            max_cluster_level: None,
            slip_integration: SlipIntegration::default(),
            rupture_velocity_threshold: 1e-3,
            solver: SolverSettings::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate == 0 {
            return Err(ConfigError::InvalidRate { rate: self.rate });
        }
        if !self.end_time.is_finite() || self.end_time <= 0.0 {
            return Err(ConfigError::InvalidEndTime {
                value: self.end_time,
            });
        }
        if let Some(interval) = self.output_interval {
            if !interval.is_finite() || interval <= 0.0 {
                return Err(ConfigError::InvalidOutputInterval { value: interval });
            }
        }
        if self.output_buffer_capacity == 0 {
            return Err(ConfigError::OutputBufferZero);
        }
        let threshold = self.rupture_velocity_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidRuptureThreshold { value: threshold });
        }
        if self.solver.max_iterations == 0 {
            return Err(ConfigError::InvalidSolver {
                reason: "max_iterations must be at least 1".into(),
            });
        }
        if !self.solver.tolerance.is_finite() || self.solver.tolerance <= 0.0 {
            return Err(ConfigError::InvalidSolver {
                reason: format!(
                    "tolerance must be finite and positive, got {}",
                    self.solver.tolerance
                ),
            });
        }
        let relax = self.solver.relaxed_tolerance_factor;
        if !relax.is_finite() || relax < 1.0 {
            return Err(ConfigError::InvalidSolver {
                reason: format!("relaxed_tolerance_factor must be finite and >= 1, got {relax}"),
            });
        }
        Ok(())
    }
}
