//! Regularized rate-and-state friction.
//!
//! ```text
//! psi      = f0 + b * ln(V0 * theta / L)
//! mu(V)    = a * asinh( V / (2 V0) * exp(psi / a) )
//! tau(V)   = mu(V) * sigma_n
//! aging:     d(theta)/dt = 1 - V theta / L
//! slip law:  d(theta)/dt = -(V theta / L) ln(V theta / L)
//! ```
//!
//! The friction coefficient depends on the unknown slip rate, which in
//! turn depends on the traction through the elastic boundary condition
//! `tau = tau_trial - eta V`. Each update solves
//!
//! ```text
//! g(V) = eta V + tau(V) - |tau_trial| = 0
//! ```
//!
//! with Newton's method. `g` is increasing and concave on `V >= 0`, so
//! starting from a point where `g <= 0` every iterate stays left of the
//! root and the residual decreases monotonically.
//!
//! The state variable is advanced after the solve, integrating its ODE
//! exactly under the assumption that `V` is constant over the step.

use smallvec::SmallVec;
use tracing::warn;

use crate::law::{
    open_fault, FrictionInput, FrictionOutput, FrictionState, FrictionUpdate, ParameterError,
    SolveFailure, SolverSettings,
};

const LAW: &str = "rate_and_state";

/// State variable evolution law.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateEvolution {
    /// Dieterich aging law.
    Aging,
    /// Ruina slip law.
    Slip,
}

/// Converged Newton solve for the slip-rate magnitude.
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonSolution {
    /// Slip-rate magnitude.
    pub slip_rate: f64,
    /// Newton updates performed.
    pub iterations: u32,
    /// Absolute residual before each update and at convergence.
    pub residuals: SmallVec<[f64; 16]>,
}

/// Rate-and-state parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct RateAndState {
    direct_effect: f64,
    evolution_effect: f64,
    characteristic_slip: f64,
    reference_friction: f64,
    reference_slip_rate: f64,
    initial_slip_rate: f64,
    evolution: StateEvolution,
}

/// Builder for [`RateAndState`].
///
/// Defaults follow SCEC TPV101: `a = 0.008`, `b = 0.012`, `L = 0.02`,
/// `f0 = 0.6`, `V0 = 1e-6`, initial slip rate `1e-16`, aging law.
pub struct RateAndStateBuilder {
    direct_effect: f64,
    evolution_effect: f64,
    characteristic_slip: f64,
    reference_friction: f64,
    reference_slip_rate: f64,
    initial_slip_rate: f64,
    evolution: StateEvolution,
}

impl RateAndState {
    /// Create a new builder.
    pub fn builder() -> RateAndStateBuilder {
        RateAndStateBuilder {
            direct_effect: 0.008,
            evolution_effect: 0.012,
            characteristic_slip: 0.02,
            reference_friction: 0.6,
            reference_slip_rate: 1e-6,
            initial_slip_rate: 1e-16,
            evolution: StateEvolution::Aging,
        }
    }

    /// Direct-effect parameter `a`.
    pub fn direct_effect(&self) -> f64 {
        self.direct_effect
    }

    /// Evolution-effect parameter `b`.
    pub fn evolution_effect(&self) -> f64 {
        self.evolution_effect
    }

    /// Characteristic slip distance `L`.
    pub fn characteristic_slip(&self) -> f64 {
        self.characteristic_slip
    }

    /// Slip rate the face is initially in steady state at.
    pub fn initial_slip_rate(&self) -> f64 {
        self.initial_slip_rate
    }

    /// State evolution law.
    pub fn evolution(&self) -> StateEvolution {
        self.evolution
    }

    /// Steady-state `theta` at slip-rate magnitude `v`.
    pub fn steady_state(&self, v: f64) -> f64 {
        self.characteristic_slip / v
    }

    /// `exp(psi / a) / (2 V0)`: the factor multiplying `V` inside asinh.
    fn rate_factor(&self, theta: f64) -> f64 {
        let psi = self.reference_friction
            + self.evolution_effect
                * (self.reference_slip_rate * theta / self.characteristic_slip).ln();
        (psi / self.direct_effect).exp() / (2.0 * self.reference_slip_rate)
    }

    /// Friction coefficient at slip-rate magnitude `v` and state `theta`.
    pub fn friction_coefficient(&self, v: f64, theta: f64) -> f64 {
        self.direct_effect * (v * self.rate_factor(theta)).asinh()
    }

    /// Solve for the slip-rate magnitude at one tolerance.
    ///
    /// `tolerance` is relative to `|trial_shear_stress|`; `input.normal_stress`
    /// must be positive (callers handle the open fault).
    ///
    /// # Errors
    ///
    /// [`SolveFailure`] if the residual is non-finite or still above the
    /// tolerance after `max_iterations` Newton updates.
    pub fn solve_slip_rate(
        &self,
        theta: f64,
        input: &FrictionInput,
        tolerance: f64,
        max_iterations: u32,
    ) -> Result<NewtonSolution, SolveFailure> {
        let target = input.trial_shear_stress.abs();
        let eta = input.impedance;
        let a_sigma = self.direct_effect * input.normal_stress;
        let k = self.rate_factor(theta);
        let abs_tol = tolerance * target;

        let residual = |v: f64| eta * v + a_sigma * (k * v).asinh() - target;
        let slope = |v: f64| eta + a_sigma * k / (k * v).hypot(1.0);

        let mut residuals = SmallVec::new();
        if target == 0.0 {
            residuals.push(0.0);
            return Ok(NewtonSolution {
                slip_rate: 0.0,
                iterations: 0,
                residuals,
            });
        }

        // Warm start from the previous slip rate, unless it lies right of
        // the root; the locked bound target/eta always lies right of it.
        let mut v = input.slip_rate_prev.abs().min(target / eta);
        if !(residual(v) <= 0.0) {
            v = 0.0;
        }

        let mut iterations = 0;
        loop {
            let r = residual(v);
            residuals.push(r.abs());
            if !r.is_finite() {
                return Err(SolveFailure {
                    iterations,
                    residual: r,
                    tolerance: abs_tol,
                });
            }
            if r.abs() <= abs_tol {
                return Ok(NewtonSolution {
                    slip_rate: v,
                    iterations,
                    residuals,
                });
            }
            if iterations >= max_iterations {
                return Err(SolveFailure {
                    iterations,
                    residual: r.abs(),
                    tolerance: abs_tol,
                });
            }
            v = (v - r / slope(v)).max(0.0);
            iterations += 1;
        }
    }

    /// Advance `theta` over `dt` at constant slip-rate magnitude `v`.
    pub fn evolve_state(&self, theta: f64, v: f64, dt: f64) -> f64 {
        let l = self.characteristic_slip;
        match self.evolution {
            StateEvolution::Aging => {
                if v <= 0.0 {
                    return theta + dt;
                }
                let steady = l / v;
                steady + (theta - steady) * (-v * dt / l).exp()
            }
            StateEvolution::Slip => {
                if v <= 0.0 {
                    return theta;
                }
                let steady = l / v;
                steady * (theta / steady).powf((-v * dt / l).exp())
            }
        }
    }

    /// Full update: Newton solve with one relaxed retry, then state evolution.
    pub fn update(
        &self,
        state: &FrictionState,
        input: &FrictionInput,
        solver: &SolverSettings,
    ) -> Result<FrictionUpdate, SolveFailure> {
        let theta = state.state_variable;

        if input.normal_stress <= 0.0 {
            let output = open_fault(input);
            return Ok(FrictionUpdate {
                output,
                state: FrictionState {
                    state_variable: self.evolve_state(theta, output.slip_rate.abs(), input.dt),
                    ..*state
                },
                retried: false,
            });
        }

        let (solution, retried) =
            match self.solve_slip_rate(theta, input, solver.tolerance, solver.max_iterations) {
                Ok(sol) => (sol, false),
                Err(first) => {
                    warn!(
                        iterations = first.iterations,
                        residual = first.residual,
                        "rate-and-state solve missed tolerance, retrying relaxed"
                    );
                    let relaxed = solver.tolerance * solver.relaxed_tolerance_factor;
                    let sol =
                        self.solve_slip_rate(theta, input, relaxed, solver.max_iterations)?;
                    (sol, true)
                }
            };

        let v = solution.slip_rate;
        let strength = self.friction_coefficient(v, theta) * input.normal_stress;
        let sign = input.trial_shear_stress.signum();
        // Pin to the strength: the Newton iterate sits left of the root,
        // where tau_trial - eta V overshoots tau(V) by the residual.
        let output = FrictionOutput {
            shear_stress: sign * strength,
            slip_rate: sign * v,
            strength,
        };
        Ok(FrictionUpdate {
            output,
            state: FrictionState {
                state_variable: self.evolve_state(theta, v, input.dt),
                ..*state
            },
            retried,
        })
    }
}

impl RateAndStateBuilder {
    /// Set the direct-effect parameter `a` (default: 0.008).
    pub fn direct_effect(mut self, value: f64) -> Self {
        self.direct_effect = value;
        self
    }

    /// Set the evolution-effect parameter `b` (default: 0.012).
    pub fn evolution_effect(mut self, value: f64) -> Self {
        self.evolution_effect = value;
        self
    }

    /// Set the characteristic slip distance `L` in metres (default: 0.02).
    pub fn characteristic_slip(mut self, value: f64) -> Self {
        self.characteristic_slip = value;
        self
    }

    /// Set the reference friction coefficient `f0` (default: 0.6).
    pub fn reference_friction(mut self, value: f64) -> Self {
        self.reference_friction = value;
        self
    }

    /// Set the reference slip rate `V0` in m/s (default: 1e-6).
    pub fn reference_slip_rate(mut self, value: f64) -> Self {
        self.reference_slip_rate = value;
        self
    }

    /// Set the initial steady-state slip rate in m/s (default: 1e-16).
    pub fn initial_slip_rate(mut self, value: f64) -> Self {
        self.initial_slip_rate = value;
        self
    }

    /// Set the state evolution law (default: aging).
    pub fn evolution(mut self, evolution: StateEvolution) -> Self {
        self.evolution = evolution;
        self
    }

    /// Build the law, validating all parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] if `a`, `L`, `V0` or the initial slip
    /// rate are not finite and positive, or if `b` or `f0` are not finite.
    pub fn build(self) -> Result<RateAndState, ParameterError> {
        for (name, v) in [
            ("direct_effect", self.direct_effect),
            ("characteristic_slip", self.characteristic_slip),
            ("reference_slip_rate", self.reference_slip_rate),
            ("initial_slip_rate", self.initial_slip_rate),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ParameterError {
                    law: LAW,
                    reason: format!("{name} must be finite and > 0, got {v}"),
                });
            }
        }
        for (name, v) in [
            ("evolution_effect", self.evolution_effect),
            ("reference_friction", self.reference_friction),
        ] {
            if !v.is_finite() {
                return Err(ParameterError {
                    law: LAW,
                    reason: format!("{name} must be finite, got {v}"),
                });
            }
        }
        Ok(RateAndState {
            direct_effect: self.direct_effect,
            evolution_effect: self.evolution_effect,
            characteristic_slip: self.characteristic_slip,
            reference_friction: self.reference_friction,
            reference_slip_rate: self.reference_slip_rate,
            initial_slip_rate: self.initial_slip_rate,
            evolution: self.evolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law() -> RateAndState {
        RateAndState::builder().build().unwrap()
    }

    /// Steady sliding at 1 m/s under TPV101-like stresses.
    fn sliding_input() -> FrictionInput {
        FrictionInput {
            normal_stress: 120.0e6,
            trial_shear_stress: 90.0e6,
            slip_rate_prev: 0.0,
            dt: 1e-3,
            impedance: 4.6e6,
        }
    }

    fn sliding_theta(l: &RateAndState) -> f64 {
        l.steady_state(1e-3)
    }

    #[test]
    fn newton_residual_decreases_monotonically() {
        let l = law();
        let sol = l
            .solve_slip_rate(sliding_theta(&l), &sliding_input(), 1e-12, 100)
            .unwrap();
        assert!(sol.iterations >= 2, "trivial solve: {sol:?}");
        for w in sol.residuals.windows(2) {
            assert!(w[1] <= w[0], "residual increased: {:?}", sol.residuals);
        }
    }

    #[test]
    fn newton_solution_satisfies_boundary_condition() {
        let l = law();
        let theta = sliding_theta(&l);
        let input = sliding_input();
        let sol = l.solve_slip_rate(theta, &input, 1e-12, 100).unwrap();
        let tau = l.friction_coefficient(sol.slip_rate, theta) * input.normal_stress;
        let lhs = tau + input.impedance * sol.slip_rate;
        assert!((lhs - input.trial_shear_stress).abs() <= 1e-12 * 90.0e6 + 1e-6);
        assert!(sol.slip_rate > 0.0);
    }

    #[test]
    fn warm_start_converges_faster() {
        let l = law();
        let theta = sliding_theta(&l);
        let cold = l
            .solve_slip_rate(theta, &sliding_input(), 1e-12, 100)
            .unwrap();
        let mut warm_input = sliding_input();
        warm_input.slip_rate_prev = cold.slip_rate * (1.0 - 1e-6);
        let warm = l.solve_slip_rate(theta, &warm_input, 1e-12, 100).unwrap();
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn pathological_state_fails_deterministically() {
        // An infinite state variable demands infinite strength at any
        // positive slip rate, while the stress drives slip.
        let l = law();
        let state = FrictionState {
            accumulated_slip: 0.0,
            state_variable: f64::INFINITY,
        };
        let settings = SolverSettings::default();
        let a = l.update(&state, &sliding_input(), &settings).unwrap_err();
        let b = l.update(&state, &sliding_input(), &settings).unwrap_err();
        assert_eq!(a.iterations, b.iterations);
        assert!(!a.residual.is_finite());
    }

    #[test]
    fn iteration_budget_exhaustion_fails() {
        let l = law();
        let settings = SolverSettings {
            max_iterations: 1,
            tolerance: 1e-15,
            relaxed_tolerance_factor: 10.0,
        };
        let state = FrictionState {
            accumulated_slip: 0.0,
            state_variable: sliding_theta(&l),
        };
        let err = l.update(&state, &sliding_input(), &settings).unwrap_err();
        assert_eq!(err.iterations, 1);
        assert!(err.residual > err.tolerance);
    }

    #[test]
    fn relaxed_retry_is_reported() {
        let l = law();
        let theta = sliding_theta(&l);
        let strict = l
            .solve_slip_rate(theta, &sliding_input(), 1e-12, 100)
            .unwrap();
        // Budget one update short of the strict solve, but enough to hit
        // a tolerance relaxed far enough to accept the initial residual.
        let settings = SolverSettings {
            max_iterations: strict.iterations - 1,
            tolerance: 1e-12,
            relaxed_tolerance_factor: 1e12,
        };
        let state = FrictionState {
            accumulated_slip: 0.0,
            state_variable: theta,
        };
        let update = l.update(&state, &sliding_input(), &settings).unwrap();
        assert!(update.retried);
    }

    #[test]
    fn shear_is_bounded_by_strength() {
        let l = law();
        let state = FrictionState {
            accumulated_slip: 0.0,
            state_variable: sliding_theta(&l),
        };
        let mut input = sliding_input();
        input.trial_shear_stress = -90.0e6;
        let update = l.update(&state, &input, &SolverSettings::default()).unwrap();
        assert!(update.output.shear_stress.abs() <= update.output.strength);
        assert!(update.output.slip_rate < 0.0);
    }

    #[test]
    fn zero_trial_stress_is_at_rest() {
        let l = law();
        let mut input = sliding_input();
        input.trial_shear_stress = 0.0;
        let sol = l.solve_slip_rate(1.0, &input, 1e-10, 10).unwrap();
        assert_eq!(sol.slip_rate, 0.0);
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn aging_relaxes_towards_steady_state() {
        let l = law();
        let v = 1e-3;
        let steady = l.steady_state(v);
        let theta = l.evolve_state(10.0 * steady, v, 1.0);
        assert!(theta < 10.0 * steady && theta > steady);
        let settled = l.evolve_state(10.0 * steady, v, 1e4);
        assert!((settled - steady).abs() <= 1e-9 * steady);
    }

    #[test]
    fn aging_heals_when_locked() {
        assert_eq!(law().evolve_state(2.0, 0.0, 0.5), 2.5);
    }

    #[test]
    fn slip_law_holds_steady_state() {
        let l = RateAndState::builder()
            .evolution(StateEvolution::Slip)
            .build()
            .unwrap();
        let v = 0.5;
        let steady = l.steady_state(v);
        assert!((l.evolve_state(steady, v, 0.1) - steady).abs() <= 1e-12 * steady);
        assert_eq!(l.evolve_state(3.0, 0.0, 1.0), 3.0);
    }

    #[test]
    fn builder_rejects_nonpositive_direct_effect() {
        let err = RateAndState::builder().direct_effect(0.0).build().unwrap_err();
        assert_eq!(err.law, "rate_and_state");
    }
}
