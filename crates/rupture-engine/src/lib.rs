//! Clustered local time stepping with on-fault friction.
//!
//! Elements are grouped by stable time step into clusters whose steps are
//! integer powers of a rate `r` times the smallest step. The
//! [`ClusterScheduler`] advances each cluster at its own step, gives
//! every element the neighbour data valid for its sub-step without ever
//! blocking, and resolves fault faces through the [`FaultInterface`]
//! whenever the clusters on both sides meet at a common time.
//!
//! [`Simulation`] is the run driver: validation, cluster assignment,
//! fault setup, and asynchronous snapshot output.
//!
//! # Quick start
//!
//! ```ignore
//! let mut sim = Simulation::new(config, mesh, Box::new(kernel), &stable_dts)?;
//! let summary = sim.run(vec![Box::new(MemorySink::new())])?;
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod config;
pub mod fault;
pub mod metrics;
pub mod output;
pub mod scheduler;
pub mod simulation;

pub use cluster::{assign_clusters, ClusterLayout, ClusterStats};
pub use config::{ConfigError, SimulationConfig, SlipIntegration};
pub use fault::{trial_traction, FaultFace, FaultInterface, FaultSpec, Resolution, TrialTraction};
pub use metrics::RunMetrics;
pub use output::{
    AsyncOutput, ElementRecord, FaultCsvSink, FaultRecord, MemorySink, OutputError, OutputReport,
    OutputSink, Snapshot,
};
pub use scheduler::{AdvanceOutcome, ClusterScheduler, StopHandle};
pub use simulation::{lattice_unit, MeshInput, RunError, RunSummary, Simulation};
