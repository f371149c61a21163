//! The [`FrictionLaw`] variant type and its update contract.

use thiserror::Error;

use crate::linear_slip_weakening::LinearSlipWeakening;
use crate::rate_and_state::RateAndState;

/// Inputs of one friction update on one fault face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrictionInput {
    /// Effective normal stress, compression positive.
    pub normal_stress: f64,
    /// Shear traction the face would carry with zero slip rate.
    pub trial_shear_stress: f64,
    /// Slip rate resolved at the previous synchronization.
    pub slip_rate_prev: f64,
    /// Time elapsed since the previous synchronization.
    pub dt: f64,
    /// Combined shear impedance `η` linking traction drop and slip rate:
    /// `slip_rate = (trial_shear_stress - shear_stress) / η`.
    pub impedance: f64,
}

/// Result of a friction update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrictionOutput {
    /// Shear traction carried by the face. `|shear_stress| <= strength`.
    pub shear_stress: f64,
    /// Slip rate, signed like the trial shear stress.
    pub slip_rate: f64,
    /// Frictional strength the shear traction was bounded by.
    pub strength: f64,
}

/// Per-face friction state.
///
/// The law owns `state_variable`; the fault interface owns
/// `accumulated_slip` and integrates it after each update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrictionState {
    /// Slip path length accumulated since the start of the run.
    pub accumulated_slip: f64,
    /// Rate-and-state state variable `θ` (unused by slip weakening).
    pub state_variable: f64,
}

/// Local solver settings for laws that need an iterative solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverSettings {
    /// Newton iterations allowed per attempt. Default: 50.
    pub max_iterations: u32,
    /// Residual tolerance relative to the trial shear stress. Default: 1e-10.
    pub tolerance: f64,
    /// Factor applied to `tolerance` for the single relaxed retry.
    /// Default: 1e3.
    pub relaxed_tolerance_factor: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-10,
            relaxed_tolerance_factor: 1e3,
        }
    }
}

/// The local solve failed to reach its tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
#[error("no convergence after {iterations} iterations (residual {residual:e}, tolerance {tolerance:e})")]
pub struct SolveFailure {
    /// Newton updates performed.
    pub iterations: u32,
    /// Last absolute residual; non-finite if the iteration diverged.
    pub residual: f64,
    /// Absolute tolerance that was not met.
    pub tolerance: f64,
}

/// A friction parameter is out of range.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{law}: {reason}")]
pub struct ParameterError {
    /// Name of the law being built.
    pub law: &'static str,
    /// Which parameter is wrong and why.
    pub reason: String,
}

/// Successful friction update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrictionUpdate {
    /// Traction, slip rate and strength.
    pub output: FrictionOutput,
    /// Law state after the update (slip not yet integrated).
    pub state: FrictionState,
    /// Whether the relaxed-tolerance retry was needed.
    pub retried: bool,
}

/// A fault friction law, selected per fault face.
#[derive(Clone, Debug, PartialEq)]
pub enum FrictionLaw {
    /// Linear slip-weakening.
    LinearSlipWeakening(LinearSlipWeakening),
    /// Regularized rate-and-state.
    RateAndState(RateAndState),
}

impl FrictionLaw {
    /// Short name for logs and output headers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LinearSlipWeakening(_) => "linear_slip_weakening",
            Self::RateAndState(_) => "rate_and_state",
        }
    }

    /// State of a face that has not slipped yet.
    pub fn initial_state(&self) -> FrictionState {
        match self {
            Self::LinearSlipWeakening(_) => FrictionState::default(),
            Self::RateAndState(rs) => FrictionState {
                accumulated_slip: 0.0,
                state_variable: rs.steady_state(rs.initial_slip_rate()),
            },
        }
    }

    /// Resolve traction and slip rate for one synchronization.
    ///
    /// # Errors
    ///
    /// Returns [`SolveFailure`] when the rate-and-state solve fails twice
    /// (strict, then relaxed tolerance). Slip weakening never fails.
    pub fn update(
        &self,
        state: &FrictionState,
        input: &FrictionInput,
        solver: &SolverSettings,
    ) -> Result<FrictionUpdate, SolveFailure> {
        match self {
            Self::LinearSlipWeakening(lsw) => Ok(FrictionUpdate {
                output: lsw.resolve(state.accumulated_slip, input),
                state: *state,
                retried: false,
            }),
            Self::RateAndState(rs) => rs.update(state, input, solver),
        }
    }
}

impl From<LinearSlipWeakening> for FrictionLaw {
    fn from(law: LinearSlipWeakening) -> Self {
        Self::LinearSlipWeakening(law)
    }
}

impl From<RateAndState> for FrictionLaw {
    fn from(law: RateAndState) -> Self {
        Self::RateAndState(law)
    }
}

/// Frictionless response of an open fault (`normal_stress <= 0`).
pub(crate) fn open_fault(input: &FrictionInput) -> FrictionOutput {
    FrictionOutput {
        shear_stress: 0.0,
        slip_rate: input.trial_shear_stress / input.impedance,
        strength: 0.0,
    }
}
