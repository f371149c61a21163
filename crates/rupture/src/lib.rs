//! Rupture: earthquake rupture dynamics with clustered local time stepping.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Rupture sub-crates. For most users, adding `rupture` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use rupture::prelude::*;
//!
//! // A one-element "kernel" that holds its state still.
//! struct Frozen;
//! impl VolumeKernel for Frozen {
//!     fn name(&self) -> &str { "frozen" }
//!     fn dofs(&self) -> usize { 1 }
//!     fn advance(
//!         &self,
//!         _element: ElementId,
//!         state: &[f64],
//!         _dt: f64,
//!         _fluxes: &BoundaryFluxes<'_>,
//!         out: &mut [f64],
//!     ) -> Result<(), KernelError> {
//!         out.copy_from_slice(state);
//!         Ok(())
//!     }
//!     fn face_trace(&self, _: ElementId, state: &[f64], _: LocalFace) -> FaceTrace {
//!         FaceTrace { velocity: state[0], shear_stress: 0.0, normal_stress: 0.0, impedance: 1.0 }
//!     }
//! }
//!
//! let config = SimulationConfig { end_time: 4.0, ..Default::default() };
//! let mesh = MeshInput { element_count: 2, ..Default::default() };
//! let stable_dt = vec![0.5, 1.0];
//! let mut sim = Simulation::new(config, mesh, Box::new(Frozen), &stable_dt).unwrap();
//! assert_eq!(sim.layout().cluster_count(), 2);
//!
//! let summary = sim.run(vec![Box::new(MemorySink::new())]).unwrap();
//! assert_eq!(summary.final_time, 4.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `rupture-core` | IDs, errors, mesh linkage, kernel traits |
//! | [`friction`] | `rupture-friction` | Friction laws and nucleation patches |
//! | [`engine`] | `rupture-engine` | Clustering, scheduler, fault coupling, output |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`rupture-core`).
///
/// Contains the error taxonomy, the mesh linkage model, and the two
/// traits the engine drives the discretization through
/// ([`types::StableTimestepOracle`], [`types::VolumeKernel`]).
pub use rupture_core as types;

/// Friction laws (`rupture-friction`).
///
/// [`friction::LinearSlipWeakening`] and [`friction::RateAndState`],
/// wrapped in [`friction::FrictionLaw`].
pub use rupture_friction as friction;

/// The simulation engine (`rupture-engine`).
///
/// [`engine::assign_clusters`] groups elements, [`engine::ClusterScheduler`]
/// advances them, and [`engine::Simulation`] drives a whole run.
pub use rupture_engine as engine;

/// Common imports for typical Rupture usage.
///
/// ```rust
/// use rupture::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use rupture_core::{
        BoundaryFluxes, ClusterLevel, ElasticInterface, ElementId, FaceRef, FaceTrace, FaultId,
        FaultLink, FluxSource, LocalFace, StableTimestepOracle, Traction, VolumeKernel,
    };

    // Errors
    pub use rupture_core::{KernelError, SetupError, StepError};

    // Friction
    pub use rupture_friction::{
        FrictionLaw, LinearSlipWeakening, NucleationPatch, RateAndState, Region, StateEvolution,
    };

    // Engine
    pub use rupture_engine::{
        AdvanceOutcome, ClusterLayout, FaultSpec, MemorySink, MeshInput, OutputSink, RunError,
        RunSummary, Simulation, SimulationConfig, Snapshot, StopHandle,
    };
}
