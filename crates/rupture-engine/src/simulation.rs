//! The run driver.
//!
//! [`Simulation`] validates the configuration and mesh, assigns clusters,
//! builds fault faces with their nucleation overrides, and drives the
//! [`ClusterScheduler`] from output time to output time, handing each
//! snapshot to the asynchronous output stage.
//!
//! # Time lattice
//!
//! All times are integer multiples of
//! `Δt_unit = T_end / ceil(T_end / Δt_min)`, so `T_end` is reached
//! exactly. Output times are snapped down to the lattice.

use std::time::Instant;

use rupture_core::{
    ElasticInterface, ElementId, FaultId, FaultLink, MeshTopology, SetupError,
    StableTimestepOracle, StepError, VolumeKernel,
};
use rupture_friction::NucleationPatch;
use thiserror::Error;
use tracing::{error, info};

use crate::cluster::{assign_clusters, ClusterLayout};
use crate::config::{ConfigError, SimulationConfig};
use crate::fault::{FaultFace, FaultInterface, FaultSpec};
use crate::metrics::RunMetrics;
use crate::output::{AsyncOutput, OutputError, OutputSink, Snapshot};
use crate::scheduler::{AdvanceOutcome, ClusterScheduler, StopHandle};

// Compile-time assertion: a simulation can be moved to a worker thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
    }
};

// ── RunError ───────────────────────────────────────────────────────

/// Any error that ends a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration is invalid.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// The mesh, time steps or faults are invalid.
    #[error("setup: {0}")]
    Setup(#[from] SetupError),
    /// The time loop hit a fatal error.
    #[error("step: {0}")]
    Step(#[from] StepError),
    /// The output stage failed.
    #[error("output: {0}")]
    Output(#[from] OutputError),
}

// ── MeshInput ──────────────────────────────────────────────────────

/// Mesh-derived setup data.
#[derive(Clone, Debug, Default)]
pub struct MeshInput {
    /// Number of volume elements.
    pub element_count: usize,
    /// Elastic interfaces between elements.
    pub interfaces: Vec<ElasticInterface>,
    /// Fault faces; `FaultId(i)` is `faults[i]`.
    pub faults: Vec<FaultSpec>,
    /// Nucleation patches, applied in order.
    pub nucleation: Vec<NucleationPatch>,
    /// Initial element states as `(element, dofs)`. Unlisted elements
    /// start at zero.
    pub initial_state: Vec<(ElementId, Vec<f64>)>,
}

// ── RunSummary ─────────────────────────────────────────────────────

/// Result of a completed or cancelled [`Simulation::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Common time all clusters reached.
    pub final_time: f64,
    /// Whether the run ended through the stop handle.
    pub cancelled: bool,
    /// Metrics at the end of the run.
    pub metrics: RunMetrics,
}

// ── Simulation ─────────────────────────────────────────────────────

/// A configured run.
pub struct Simulation {
    config: SimulationConfig,
    scheduler: ClusterScheduler,
    last_emitted: Option<f64>,
}

/// Lattice unit: the largest `T_end / n` not above `dt_min`.
pub fn lattice_unit(end_time: f64, dt_min: f64) -> Result<f64, ConfigError> {
    let steps = (end_time / dt_min).ceil().max(1.0);
    // 2^52: tick counts stay exact in f64.
    if steps > 4_503_599_627_370_496.0 {
        return Err(ConfigError::TooManySteps { steps });
    }
    let mut unit = end_time / steps;
    if unit > dt_min {
        unit = end_time / (steps + 1.0);
    }
    Ok(unit)
}

impl Simulation {
    /// Validate everything and build the run.
    ///
    /// # Errors
    ///
    /// [`RunError::Config`] or [`RunError::Setup`].
    pub fn new<O>(
        config: SimulationConfig,
        mesh: MeshInput,
        kernel: Box<dyn VolumeKernel>,
        oracle: &O,
    ) -> Result<Self, RunError>
    where
        O: StableTimestepOracle + ?Sized,
    {
        config.validate()?;

        let links: Vec<FaultLink> = mesh.faults.iter().map(|f| f.link).collect();
        let topology = MeshTopology::new(mesh.element_count, &mesh.interfaces, &links)?;
        for (i, spec) in mesh.faults.iter().enumerate() {
            if !spec.background.shear.is_finite() || !spec.background.normal.is_finite() {
                return Err(SetupError::InvalidFault {
                    fault: FaultId(i as u32),
                    reason: "background traction is not finite".into(),
                }
                .into());
            }
        }

        let layout = assign_clusters(
            oracle,
            mesh.element_count,
            config.rate,
            config.max_cluster_level,
        )?;
        let unit = lattice_unit(config.end_time, layout.dt_min())?;
        layout.log_summary();

        let faults: Vec<FaultFace> = mesh
            .faults
            .iter()
            .enumerate()
            .map(|(i, spec)| FaultFace::new(FaultId(i as u32), spec, &mesh.nucleation))
            .collect();
        let nucleating = faults
            .iter()
            .zip(&mesh.faults)
            .filter(|(face, spec)| {
                face.friction() != &spec.friction || face.background() != spec.background
            })
            .count();
        let interface = FaultInterface::new(
            config.solver,
            config.slip_integration,
            config.rupture_velocity_threshold,
        );

        let kernel_name = kernel.name().to_string();
        let mut scheduler =
            ClusterScheduler::new(kernel, topology, layout, faults, interface, unit)?;
        for (element, state) in &mesh.initial_state {
            scheduler.set_element_state(*element, state)?;
        }

        info!(
            kernel = %kernel_name,
            elements = mesh.element_count,
            faults = mesh.faults.len(),
            nucleating_faces = nucleating,
            end_time = config.end_time,
            time_unit = unit,
            "simulation ready"
        );
        Ok(Self {
            config,
            scheduler,
            last_emitted: None,
        })
    }

    /// Advance to `target`, clamped to the end time.
    ///
    /// # Errors
    ///
    /// The scheduler's [`StepError`].
    pub fn advance(&mut self, target: f64) -> Result<AdvanceOutcome, StepError> {
        self.scheduler.advance(target.min(self.config.end_time))
    }

    /// Run to the end time, emitting snapshots to `sinks`.
    ///
    /// A snapshot is taken at time 0, at every output interval, and at
    /// the final time. Cancellation ends the run early with a final
    /// snapshot at the common time reached.
    ///
    /// # Errors
    ///
    /// The first fatal error. No integration happens after it; the
    /// output stage is shut down before returning.
    pub fn run(&mut self, sinks: Vec<Box<dyn OutputSink>>) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let mut output = AsyncOutput::spawn(sinks, self.config.output_buffer_capacity)?;
        info!(
            end_time = self.config.end_time,
            rate = self.config.rate,
            clusters = self.scheduler.layout().cluster_count(),
            "run started"
        );

        let result = self.drive(&mut output);
        self.scheduler.metrics_mut().backpressure_events += output.backpressure_events();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, time = self.scheduler.time(), "run aborted");
                drop(output);
                return Err(e);
            }
        };
        if let Err(e) = output.finish() {
            error!(error = %e, "output stage failed");
            return Err(e.into());
        }

        let summary = RunSummary {
            final_time: outcome.time(),
            cancelled: outcome.is_cancelled(),
            metrics: self.scheduler.metrics().clone(),
        };
        info!(
            final_time = summary.final_time,
            cancelled = summary.cancelled,
            element_updates = summary.metrics.element_updates,
            fault_resolutions = summary.metrics.fault_resolutions,
            wall_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(summary)
    }

    fn drive(&mut self, output: &mut AsyncOutput) -> Result<AdvanceOutcome, RunError> {
        self.emit(output)?;
        let end = self.config.end_time;
        let mut k: u64 = 1;
        loop {
            let target = match self.config.output_interval {
                Some(interval) => (k as f64 * interval).min(end),
                None => end,
            };
            let outcome = self.scheduler.advance(target)?;
            let done = outcome.is_cancelled() || target >= end;
            // A snapped-down target can fall on the previous output time.
            if self.last_emitted != Some(outcome.time()) {
                self.emit(output)?;
            }
            if done {
                return Ok(outcome);
            }
            k += 1;
        }
    }

    fn emit(&mut self, output: &mut AsyncOutput) -> Result<(), RunError> {
        let snapshot = Snapshot::capture(&self.scheduler);
        self.last_emitted = Some(snapshot.time);
        output.submit(snapshot)?;
        self.scheduler.metrics_mut().snapshots_emitted += 1;
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// A handle that cancels the run between sub-steps.
    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    /// Common time of all clusters.
    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    /// The lattice unit.
    pub fn time_unit(&self) -> f64 {
        self.scheduler.time_unit()
    }

    /// The configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The cluster layout.
    pub fn layout(&self) -> &ClusterLayout {
        self.scheduler.layout()
    }

    /// The scheduler, for inspection.
    pub fn scheduler(&self) -> &ClusterScheduler {
        &self.scheduler
    }

    /// Fault faces in ID order.
    pub fn faults(&self) -> &[FaultFace] {
        self.scheduler.faults()
    }

    /// Current state of `element`.
    pub fn element_state(&self, element: ElementId) -> &[f64] {
        self.scheduler.element_state(element)
    }

    /// Cumulative metrics.
    pub fn metrics(&self) -> &RunMetrics {
        self.scheduler.metrics()
    }

    /// A snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_unit_divides_end_time() {
        assert_eq!(lattice_unit(20.0, 1.0).unwrap(), 1.0);
        assert_eq!(lattice_unit(1.0, 0.3).unwrap(), 0.25);
        // A run shorter than one step takes a single truncated step.
        assert_eq!(lattice_unit(0.5, 1.0).unwrap(), 0.5);
    }

    #[test]
    fn lattice_unit_never_exceeds_dt_min() {
        for &(end, dt) in &[(7.0, 0.7), (1.0, 1.0 / 3.0), (100.0, 0.013), (3.3, 1.1)] {
            let unit = lattice_unit(end, dt).unwrap();
            assert!(unit <= dt, "unit {unit} > dt_min {dt}");
            let steps = (end / unit).round();
            assert!((steps * unit - end).abs() <= 1e-9 * end);
        }
    }

    #[test]
    fn lattice_unit_rejects_overflowing_step_counts() {
        match lattice_unit(1.0, 1e-20) {
            Err(ConfigError::TooManySteps { .. }) => {}
            other => panic!("expected TooManySteps, got {other:?}"),
        }
    }
}
