//! Fault friction laws for the Rupture engine.
//!
//! A [`FrictionLaw`] turns the elastic trial traction on a fault face
//! into the traction the face can actually sustain, plus the slip rate
//! that the excess stress drives. Two variants are provided:
//!
//! - [`LinearSlipWeakening`]: closed-form strength that decays linearly
//!   with accumulated slip. The default for throughput.
//! - [`RateAndState`]: regularized rate-and-state friction with aging or
//!   slip state evolution, solved per face with a local Newton iteration.
//!
//! Both variants treat a non-compressive normal stress as an open fault
//! with zero shear resistance.
//!
//! [`NucleationPatch`] seeds rupture by overriding parameters inside a
//! region of the fault.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod law;
pub mod linear_slip_weakening;
pub mod nucleation;
pub mod rate_and_state;

pub use law::{
    FrictionInput, FrictionLaw, FrictionOutput, FrictionState, FrictionUpdate, ParameterError,
    SolveFailure, SolverSettings,
};
pub use linear_slip_weakening::LinearSlipWeakening;
pub use nucleation::{NucleationPatch, Region};
pub use rate_and_state::{NewtonSolution, RateAndState, StateEvolution};
