//! Linear slip-weakening friction.
//!
//! ```text
//! mu(s)    = mu_s - (mu_s - mu_d) * min(s, D_c) / D_c
//! strength = cohesion + mu(s) * sigma_n        (sigma_n > 0)
//! strength = 0                                 (sigma_n <= 0, open)
//! ```
//!
//! The face is locked while `|tau_trial| <= strength`; otherwise the
//! traction is pinned to the strength and the excess drives slip at
//! `(tau_trial - tau) / eta`. No internal ODE: state is the accumulated
//! slip alone.
//!
//! Constructed via the builder pattern: [`LinearSlipWeakening::builder`].

use crate::law::{open_fault, FrictionInput, FrictionOutput, ParameterError};

const LAW: &str = "linear_slip_weakening";

/// Linear slip-weakening parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSlipWeakening {
    static_friction: f64,
    dynamic_friction: f64,
    critical_slip: f64,
    cohesion: f64,
}

/// Builder for [`LinearSlipWeakening`].
///
/// Defaults follow the SCEC TPV benchmarks: `mu_s = 0.677`,
/// `mu_d = 0.525`, `D_c = 0.4`, no cohesion.
pub struct LinearSlipWeakeningBuilder {
    static_friction: f64,
    dynamic_friction: f64,
    critical_slip: f64,
    cohesion: f64,
}

impl LinearSlipWeakening {
    /// Create a new builder.
    pub fn builder() -> LinearSlipWeakeningBuilder {
        LinearSlipWeakeningBuilder {
            static_friction: 0.677,
            dynamic_friction: 0.525,
            critical_slip: 0.4,
            cohesion: 0.0,
        }
    }

    /// Static friction coefficient `mu_s`.
    pub fn static_friction(&self) -> f64 {
        self.static_friction
    }

    /// Dynamic friction coefficient `mu_d`.
    pub fn dynamic_friction(&self) -> f64 {
        self.dynamic_friction
    }

    /// Slip-weakening distance `D_c`.
    pub fn critical_slip(&self) -> f64 {
        self.critical_slip
    }

    /// Cohesion added to the frictional strength of a closed fault.
    pub fn cohesion(&self) -> f64 {
        self.cohesion
    }

    /// A copy with `mu_s` replaced, as used by nucleation patches.
    ///
    /// `mu_d` is lowered to the new `mu_s` if it would exceed it, so the
    /// law never strengthens with slip.
    pub fn with_static_friction(&self, static_friction: f64) -> Self {
        Self {
            static_friction,
            dynamic_friction: self.dynamic_friction.min(static_friction),
            ..self.clone()
        }
    }

    /// Friction coefficient after `slip` of accumulated slip.
    pub fn friction_coefficient(&self, slip: f64) -> f64 {
        let weakened = (slip / self.critical_slip).clamp(0.0, 1.0);
        self.static_friction - (self.static_friction - self.dynamic_friction) * weakened
    }

    /// Shear strength at `slip` under compression-positive `normal_stress`.
    pub fn strength(&self, slip: f64, normal_stress: f64) -> f64 {
        if normal_stress <= 0.0 {
            return 0.0;
        }
        self.cohesion + self.friction_coefficient(slip) * normal_stress
    }

    /// Resolve traction and slip rate given the accumulated slip.
    pub fn resolve(&self, slip: f64, input: &FrictionInput) -> FrictionOutput {
        if input.normal_stress <= 0.0 {
            return open_fault(input);
        }
        let strength = self.strength(slip, input.normal_stress);
        let trial = input.trial_shear_stress;
        if trial.abs() <= strength {
            return FrictionOutput {
                shear_stress: trial,
                slip_rate: 0.0,
                strength,
            };
        }
        let shear_stress = trial.signum() * strength;
        FrictionOutput {
            shear_stress,
            slip_rate: (trial - shear_stress) / input.impedance,
            strength,
        }
    }
}

impl LinearSlipWeakeningBuilder {
    /// Set the static friction coefficient (default: 0.677).
    pub fn static_friction(mut self, value: f64) -> Self {
        self.static_friction = value;
        self
    }

    /// Set the dynamic friction coefficient (default: 0.525).
    pub fn dynamic_friction(mut self, value: f64) -> Self {
        self.dynamic_friction = value;
        self
    }

    /// Set the slip-weakening distance `D_c` in metres (default: 0.4).
    pub fn critical_slip(mut self, value: f64) -> Self {
        self.critical_slip = value;
        self
    }

    /// Set the cohesion in pascals (default: 0).
    pub fn cohesion(mut self, value: f64) -> Self {
        self.cohesion = value;
        self
    }

    /// Build the law, validating all parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] if:
    /// - either coefficient is negative or not finite
    /// - `mu_d > mu_s`
    /// - `D_c` is not finite and positive
    /// - `cohesion` is negative or not finite
    pub fn build(self) -> Result<LinearSlipWeakening, ParameterError> {
        let err = |reason: String| ParameterError { law: LAW, reason };
        for (name, v) in [
            ("static_friction", self.static_friction),
            ("dynamic_friction", self.dynamic_friction),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(err(format!("{name} must be finite and >= 0, got {v}")));
            }
        }
        if self.dynamic_friction > self.static_friction {
            return Err(err(format!(
                "dynamic_friction ({}) exceeds static_friction ({})",
                self.dynamic_friction, self.static_friction
            )));
        }
        if !self.critical_slip.is_finite() || self.critical_slip <= 0.0 {
            return Err(err(format!(
                "critical_slip must be finite and > 0, got {}",
                self.critical_slip
            )));
        }
        if !self.cohesion.is_finite() || self.cohesion < 0.0 {
            return Err(err(format!(
                "cohesion must be finite and >= 0, got {}",
                self.cohesion
            )));
        }
        Ok(LinearSlipWeakening {
            static_friction: self.static_friction,
            dynamic_friction: self.dynamic_friction,
            critical_slip: self.critical_slip,
            cohesion: self.cohesion,
        })
    }
}
