//! The clustered local-time-stepping scheduler.
//!
//! [`ClusterScheduler`] owns every element state and fault face and
//! advances them cluster by cluster. Time is held as integer ticks of a
//! lattice unit no larger than `Δt_min`; cluster `c` steps `r^c` ticks,
//! so synchronization between clusters is an exact integer comparison.
//!
//! # Ordering
//!
//! The cluster with the smallest time moves next; on a tie the coarser
//! cluster goes first. An element reads its neighbours without waiting:
//!
//! | neighbour                      | state used               |
//! |--------------------------------|--------------------------|
//! | same cluster                   | pre-step (Jacobi)        |
//! | other cluster, not ahead       | current                  |
//! | other cluster, ahead           | start of its last step   |
//!
//! A fault face is resolved whenever the clusters on its two sides land
//! on the same time.
//!
//! # Failure
//!
//! Non-finite state, a friction solve failure or a kernel error halts
//! the scheduler. Nothing of the failing sub-step is committed: volume
//! states, cluster times and fault faces stay as they were before it.
//! Every later [`advance`](ClusterScheduler::advance) returns
//! [`StepError::Halted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rupture_core::{
    BoundaryFluxes, ClusterLevel, ElementId, FaceFlux, FaultId, FluxSource, LinkTarget,
    MeshTopology, NumericalInstabilityError, SetupError, StepError, VolumeKernel,
};
use tracing::debug;

use crate::cluster::ClusterLayout;
use crate::fault::{FaultFace, FaultInterface};
use crate::metrics::RunMetrics;

// Compile-time assertion: the scheduler can move to a worker thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<ClusterScheduler>();
    }
};

// ── StopHandle ─────────────────────────────────────────────────────

/// Cloneable cancellation flag.
///
/// Checked between sub-steps, never inside one. Once raised it stays
/// raised.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// A lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── AdvanceOutcome ─────────────────────────────────────────────────

/// How an [`advance`](ClusterScheduler::advance) call ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AdvanceOutcome {
    /// Every cluster reached the target.
    Completed {
        /// The common time (the target snapped to the lattice).
        time: f64,
    },
    /// Cancellation was observed; every cluster was drained to the
    /// leading cluster's time.
    Cancelled {
        /// The common time.
        time: f64,
    },
}

impl AdvanceOutcome {
    /// The common time all clusters share.
    pub fn time(&self) -> f64 {
        match *self {
            Self::Completed { time } | Self::Cancelled { time } => time,
        }
    }

    /// Whether the call ended through cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// ── ElementStore ───────────────────────────────────────────────────

/// Flat per-element state with the start-of-last-step copy.
struct ElementStore {
    dofs: usize,
    current: Vec<f64>,
    previous: Vec<f64>,
}

impl ElementStore {
    fn new(element_count: usize, dofs: usize) -> Self {
        Self {
            dofs,
            current: vec![0.0; element_count * dofs],
            previous: vec![0.0; element_count * dofs],
        }
    }

    fn range(&self, element: ElementId) -> std::ops::Range<usize> {
        let start = element.index() * self.dofs;
        start..start + self.dofs
    }

    fn current(&self, element: ElementId) -> &[f64] {
        &self.current[self.range(element)]
    }

    fn previous(&self, element: ElementId) -> &[f64] {
        &self.previous[self.range(element)]
    }

    fn commit(&mut self, element: ElementId, new: &[f64]) {
        let r = self.range(element);
        self.previous[r.clone()].copy_from_slice(&self.current[r.clone()]);
        self.current[r].copy_from_slice(new);
    }

    fn reset(&mut self, element: ElementId, state: &[f64]) {
        let r = self.range(element);
        self.previous[r.clone()].copy_from_slice(state);
        self.current[r].copy_from_slice(state);
    }
}

// ── ClusterClock ───────────────────────────────────────────────────

/// A non-empty cluster and its time pointer.
struct ClusterClock {
    level: ClusterLevel,
    step_ticks: u64,
    ticks: u64,
    members: Vec<ElementId>,
    faults: Vec<FaultId>,
}

// ── ClusterScheduler ───────────────────────────────────────────────

/// Advances all clusters to a common target time.
pub struct ClusterScheduler {
    kernel: Box<dyn VolumeKernel>,
    topology: MeshTopology,
    layout: ClusterLayout,
    store: ElementStore,
    staging: Vec<f64>,
    clocks: Vec<ClusterClock>,
    clock_of: Vec<usize>,
    faults: Vec<FaultFace>,
    interface: FaultInterface,
    time_unit: f64,
    stop: StopHandle,
    halted: bool,
    metrics: RunMetrics,
}

impl ClusterScheduler {
    /// Build a scheduler with all element states zeroed.
    ///
    /// `faults[i]` must describe fault face `i` of `topology`, and
    /// `time_unit` must not exceed `layout.dt_min()`.
    ///
    /// # Errors
    ///
    /// - [`SetupError::ElementOutOfRange`] if the layout and the topology
    ///   disagree on the element count.
    /// - [`SetupError::InvalidFault`] if `faults` does not match the
    ///   topology's fault faces.
    /// - [`SetupError::InvalidTimestep`] if `time_unit` is not positive
    ///   and finite.
    pub fn new(
        kernel: Box<dyn VolumeKernel>,
        topology: MeshTopology,
        layout: ClusterLayout,
        faults: Vec<FaultFace>,
        interface: FaultInterface,
        time_unit: f64,
    ) -> Result<Self, SetupError> {
        let element_count = topology.element_count();
        if layout.element_count() != element_count {
            return Err(SetupError::ElementOutOfRange {
                element: ElementId(layout.element_count() as u32),
                count: element_count,
            });
        }
        if topology.fault_count() != faults.len() {
            return Err(SetupError::InvalidFault {
                fault: FaultId(faults.len().min(topology.fault_count()) as u32),
                reason: format!(
                    "{} fault faces supplied for {} linked faces",
                    faults.len(),
                    topology.fault_count()
                ),
            });
        }
        for (i, face) in faults.iter().enumerate() {
            if face.id() != FaultId(i as u32) || face.link() != topology.fault(face.id()) {
                return Err(SetupError::InvalidFault {
                    fault: FaultId(i as u32),
                    reason: "face does not match the topology".into(),
                });
            }
        }
        if !time_unit.is_finite() || time_unit <= 0.0 {
            return Err(SetupError::InvalidTimestep {
                element: ElementId(0),
                value: time_unit,
            });
        }

        let mut clocks = Vec::new();
        let mut clock_of = vec![0; element_count];
        for c in 0..layout.cluster_count() {
            let level = ClusterLevel(c as u32);
            let members = layout.members(level);
            if members.is_empty() {
                continue;
            }
            for e in members {
                clock_of[e.index()] = clocks.len();
            }
            clocks.push(ClusterClock {
                level,
                step_ticks: layout.step_ticks(level),
                ticks: 0,
                members: members.to_vec(),
                faults: Vec::new(),
            });
        }
        for (i, link) in topology.faults().iter().enumerate() {
            let minus = clock_of[link.minus.element.index()];
            clocks[minus].faults.push(FaultId(i as u32));
            if let Some(plus) = link.plus {
                let plus = clock_of[plus.element.index()];
                if plus != minus {
                    clocks[plus].faults.push(FaultId(i as u32));
                }
            }
        }

        let dofs = kernel.dofs();
        let largest = clocks.iter().map(|c| c.members.len()).max().unwrap_or(0);
        let metrics = RunMetrics::new(layout.cluster_count());
        Ok(Self {
            kernel,
            store: ElementStore::new(element_count, dofs),
            staging: vec![0.0; largest * dofs],
            topology,
            layout,
            clocks,
            clock_of,
            faults,
            interface,
            time_unit,
            stop: StopHandle::new(),
            halted: false,
            metrics,
        })
    }

    /// Overwrite an element's state, e.g. with initial conditions.
    ///
    /// # Errors
    ///
    /// [`SetupError::ElementOutOfRange`] or [`SetupError::StateLength`].
    pub fn set_element_state(
        &mut self,
        element: ElementId,
        state: &[f64],
    ) -> Result<(), SetupError> {
        if element.index() >= self.topology.element_count() {
            return Err(SetupError::ElementOutOfRange {
                element,
                count: self.topology.element_count(),
            });
        }
        if state.len() != self.store.dofs {
            return Err(SetupError::StateLength {
                element,
                expected: self.store.dofs,
                actual: state.len(),
            });
        }
        self.store.reset(element, state);
        Ok(())
    }

    /// Advance every cluster to `target` (snapped down to the lattice).
    ///
    /// Targets at or before the current time return immediately.
    ///
    /// # Errors
    ///
    /// The first fatal [`StepError`]; afterwards [`StepError::Halted`].
    pub fn advance(&mut self, target: f64) -> Result<AdvanceOutcome, StepError> {
        if self.halted {
            return Err(StepError::Halted);
        }
        let started = Instant::now();
        let mut goal = self.ticks_for(target);
        let mut cancelled = false;

        loop {
            if !cancelled && self.stop.is_stopped() {
                cancelled = true;
                goal = self.clocks.iter().map(|c| c.ticks).max().unwrap_or(0);
                debug!(time = goal as f64 * self.time_unit, "stop requested, draining clusters");
            }
            let Some(idx) = self.next_cluster(goal) else {
                break;
            };
            let step = self.clocks[idx].step_ticks.min(goal - self.clocks[idx].ticks);
            if let Err(e) = self.step_cluster(idx, step) {
                self.halted = true;
                return Err(e);
            }
        }

        self.metrics.advance_us += started.elapsed().as_micros() as u64;
        let time = self.time();
        debug!(
            time,
            element_updates = self.metrics.element_updates,
            fault_resolutions = self.metrics.fault_resolutions,
            "advance finished"
        );
        Ok(if cancelled {
            AdvanceOutcome::Cancelled { time }
        } else {
            AdvanceOutcome::Completed { time }
        })
    }

    /// Lagging cluster to move next, coarser first on ties.
    fn next_cluster(&self, goal: u64) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, clock) in self.clocks.iter().enumerate() {
            if clock.ticks >= goal {
                continue;
            }
            best = match best {
                Some(b) => {
                    let current = &self.clocks[b];
                    let earlier = clock.ticks < current.ticks;
                    let coarser_tie = clock.ticks == current.ticks && clock.level > current.level;
                    if earlier || coarser_tie {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
                None => Some(i),
            };
        }
        best
    }

    /// One sub-step of `step` ticks for every member of cluster `idx`,
    /// then resolution of the faces that became synchronized.
    ///
    /// Volume states, the cluster clock and the faces change only once
    /// every update and every resolution of the sub-step has succeeded.
    fn step_cluster(&mut self, idx: usize, step: u64) -> Result<(), StepError> {
        let t_start = self.clocks[idx].ticks;
        let t_end = t_start + step;
        let dt = step as f64 * self.time_unit;
        let time = t_end as f64 * self.time_unit;

        let Self {
            kernel,
            topology,
            store,
            staging,
            clocks,
            clock_of,
            faults,
            interface,
            time_unit,
            metrics,
            ..
        } = self;
        let dofs = store.dofs;
        let clock = &clocks[idx];

        for (k, &element) in clock.members.iter().enumerate() {
            let mut fluxes = BoundaryFluxes::new();
            for link in topology.links(element) {
                let source = match link.target {
                    LinkTarget::Element(other) => {
                        let other_ticks = clocks[clock_of[other.element.index()]].ticks;
                        let state = if other_ticks > t_start {
                            store.previous(other.element)
                        } else {
                            store.current(other.element)
                        };
                        FluxSource::Neighbour {
                            element: other.element,
                            face: other.face,
                            state,
                        }
                    }
                    LinkTarget::Fault { fault, side } => {
                        let face = &faults[fault.index()];
                        FluxSource::Fault {
                            fault,
                            side,
                            traction: face.traction_change(),
                            slip_rate: face.slip_rate(),
                        }
                    }
                };
                fluxes.push(FaceFlux {
                    face: link.face,
                    source,
                });
            }
            let out = &mut staging[k * dofs..(k + 1) * dofs];
            kernel.advance(element, store.current(element), dt, &fluxes, out)?;
            if let Some(dof) = out.iter().position(|v| !v.is_finite()) {
                return Err(NumericalInstabilityError { element, time, dof }.into());
            }
        }

        // Clock and state of an element as they stand after this sub-step.
        let (staged, settled) = (&staging[..], &*store);
        let ticks_after = |element: ElementId| {
            let c = clock_of[element.index()];
            if c == idx {
                t_end
            } else {
                clocks[c].ticks
            }
        };
        let state_after = move |element: ElementId| match clock.members.binary_search(&element) {
            Ok(k) => &staged[k * dofs..(k + 1) * dofs],
            Err(_) => settled.current(element),
        };

        let mut resolved = Vec::new();
        for &fault in &clock.faults {
            let link = *topology.fault(fault);
            let minus_ticks = ticks_after(link.minus.element);
            let plus_ticks = link.plus.map_or(minus_ticks, |p| ticks_after(p.element));
            let last = faults[fault.index()].last_resolved_ticks;
            if minus_ticks != plus_ticks || minus_ticks <= last {
                continue;
            }

            let minus = kernel.face_trace(
                link.minus.element,
                state_after(link.minus.element),
                link.minus.face,
            );
            let plus = link
                .plus
                .map(|p| kernel.face_trace(p.element, state_after(p.element), p.face));
            let t = minus_ticks as f64 * *time_unit;
            let dt = (minus_ticks - last) as f64 * *time_unit;
            let mut face = faults[fault.index()].clone();
            let resolution = interface.resolve_face(&mut face, t, dt, &minus, plus.as_ref())?;
            face.last_resolved_ticks = minus_ticks;
            resolved.push((fault, face, resolution.retried));
        }

        for (k, &element) in clock.members.iter().enumerate() {
            store.commit(element, &staging[k * dofs..(k + 1) * dofs]);
        }
        let clock = &mut clocks[idx];
        clock.ticks = t_end;
        metrics.record_substep(clock.level, clock.members.len());
        for (fault, face, retried) in resolved {
            faults[fault.index()] = face;
            metrics.fault_resolutions += 1;
            if retried {
                metrics.friction_retries += 1;
            }
        }
        Ok(())
    }

    /// Lattice ticks of `target`, snapped down.
    fn ticks_for(&self, target: f64) -> u64 {
        if !target.is_finite() || target <= 0.0 {
            return 0;
        }
        (target / self.time_unit * (1.0 + 1e-12)).floor() as u64
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// Time of the slowest cluster. Between `advance` calls every
    /// cluster shares this time.
    pub fn time(&self) -> f64 {
        let ticks = self.clocks.iter().map(|c| c.ticks).min().unwrap_or(0);
        ticks as f64 * self.time_unit
    }

    /// Time of every non-empty cluster, finest first.
    pub fn cluster_times(&self) -> Vec<(ClusterLevel, f64)> {
        self.clocks
            .iter()
            .map(|c| (c.level, c.ticks as f64 * self.time_unit))
            .collect()
    }

    /// The lattice unit all times are multiples of.
    pub fn time_unit(&self) -> f64 {
        self.time_unit
    }

    /// Current state of `element`.
    ///
    /// # Panics
    ///
    /// Panics if `element` is out of range.
    pub fn element_state(&self, element: ElementId) -> &[f64] {
        self.store.current(element)
    }

    /// Degrees of freedom per element.
    pub fn dofs(&self) -> usize {
        self.store.dofs
    }

    /// All fault faces in ID order.
    pub fn faults(&self) -> &[FaultFace] {
        &self.faults
    }

    /// The cluster layout.
    pub fn layout(&self) -> &ClusterLayout {
        &self.layout
    }

    /// The element connectivity.
    pub fn topology(&self) -> &MeshTopology {
        &self.topology
    }

    /// Name of the volume kernel.
    pub fn kernel_name(&self) -> &str {
        self.kernel.name()
    }

    /// Cumulative metrics.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut RunMetrics {
        &mut self.metrics
    }

    /// A handle that cancels this scheduler.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether a fatal error has halted the scheduler.
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
