//! Core types and traits for the Rupture earthquake-rupture engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers, the error taxonomy, the mesh linkage model, and the
//! two traits through which the engine talks to the discretization
//! layer: [`StableTimestepOracle`] and [`VolumeKernel`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod kernel;
pub mod mesh;
pub mod traits;

pub use error::{
    FrictionSolveError, KernelError, NumericalInstabilityError, SetupError, StepError,
};
pub use id::{ClusterLevel, ElementId, FaultId, LocalFace};
pub use kernel::{BoundaryFluxes, FaceFlux, FaceSide, FaceTrace, FluxSource, Traction};
pub use mesh::{ElasticInterface, FaceRef, FaultLink, Link, LinkTarget, MeshTopology};
pub use traits::{StableTimestepOracle, VolumeKernel};
