//! Error types for the Rupture engine.
//!
//! Organized by phase: setup (clustering input and mesh linkage), and
//! step (anything that can abort the time loop). Every step error is
//! fatal for the run; there is no partial-result continuation.

use thiserror::Error;

use crate::id::{ElementId, FaultId, LocalFace};

/// Malformed input detected before the time loop starts.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SetupError {
    /// The mesh has no elements to cluster.
    #[error("mesh has no elements")]
    NoElements,
    /// The LTS rate must be a positive integer.
    #[error("LTS rate must be at least 1, got {rate}")]
    InvalidRate {
        /// The configured rate.
        rate: u32,
    },
    /// The oracle has no stable time step for an element.
    #[error("no stable time step for element {element}")]
    MissingTimestep {
        /// The element without a bound.
        element: ElementId,
    },
    /// An element's stable time step is non-positive or not finite.
    #[error("element {element} has unusable stable time step {value}")]
    InvalidTimestep {
        /// The offending element.
        element: ElementId,
        /// The value returned by the oracle.
        value: f64,
    },
    /// A link references an element that does not exist.
    #[error("element {element} out of range (mesh has {count} elements)")]
    ElementOutOfRange {
        /// The referenced element.
        element: ElementId,
        /// Number of elements in the mesh.
        count: usize,
    },
    /// A local face is linked more than once.
    #[error("face {face} of element {element} is linked more than once")]
    DuplicateFace {
        /// The element owning the face.
        element: ElementId,
        /// The doubly-linked face.
        face: LocalFace,
    },
    /// An interface connects an element to itself.
    #[error("interface links element {element} to itself")]
    SelfLink {
        /// The offending element.
        element: ElementId,
    },
    /// An element's initial state has the wrong number of DOFs.
    #[error("element {element} has {actual} DOFs, kernel expects {expected}")]
    StateLength {
        /// The offending element.
        element: ElementId,
        /// DOFs per element declared by the kernel.
        expected: usize,
        /// DOFs supplied.
        actual: usize,
    },
    /// A fault face is inconsistent with the mesh or its parameters.
    #[error("fault {fault}: {reason}")]
    InvalidFault {
        /// The offending fault face.
        fault: FaultId,
        /// What is wrong with it.
        reason: String,
    },
}

/// A non-finite value appeared in an element's state.
///
/// Explicit time integration cannot recover from corrupted state, so this
/// always aborts the run.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("non-finite state in element {element} at t = {time} (dof {dof})")]
pub struct NumericalInstabilityError {
    /// The element whose state went non-finite.
    pub element: ElementId,
    /// Simulation time at the end of the offending sub-step.
    pub time: f64,
    /// Index of the first non-finite DOF.
    pub dof: usize,
}

/// The rate-and-state local solve did not converge, even after the
/// relaxed retry.
#[derive(Clone, Debug, PartialEq, Error)]
#[error(
    "friction solve on fault {fault} at t = {time} did not converge after {iterations} \
     iterations (residual {residual:e}, tolerance {tolerance:e})"
)]
pub struct FrictionSolveError {
    /// The fault face whose solve failed.
    pub fault: FaultId,
    /// Simulation time of the resolution.
    pub time: f64,
    /// Iterations spent in the final attempt.
    pub iterations: u32,
    /// Last residual of the final attempt (may be non-finite).
    pub residual: f64,
    /// Tolerance of the final attempt.
    pub tolerance: f64,
}

/// The discretization kernel refused to advance an element.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("kernel failed on element {element}: {reason}")]
pub struct KernelError {
    /// The element being advanced.
    pub element: ElementId,
    /// Kernel-provided description.
    pub reason: String,
}

/// Fatal errors raised while advancing the scheduler.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StepError {
    /// Non-finite element state.
    #[error(transparent)]
    NumericalInstability(#[from] NumericalInstabilityError),
    /// Rate-and-state non-convergence.
    #[error(transparent)]
    FrictionSolve(#[from] FrictionSolveError),
    /// Kernel failure.
    #[error(transparent)]
    Kernel(#[from] KernelError),
    /// A previous fatal error halted the scheduler; it refuses to advance.
    #[error("scheduler halted by an earlier fatal error")]
    Halted,
}
