//! Scheduling behaviour of the clustered LTS scheduler on chain meshes.

use std::sync::{Arc, Mutex};

use rupture_core::{
    BoundaryFluxes, ClusterLevel, ElementId, FaceFlux, FluxSource, LinkTarget, Traction,
    VolumeKernel,
};
use rupture_engine::{
    AdvanceOutcome, FaultSpec, MeshInput, Simulation, SimulationConfig, StopHandle,
};
use rupture_friction::{FrictionLaw, LinearSlipWeakening};
use rupture_test_utils::fixtures::{RecordingKernel, TriggerKernel};
use rupture_test_utils::{random_lengths, ChainFixture, SpringChainKernel};

fn locked_fault() -> FrictionLaw {
    LinearSlipWeakening::builder().build().unwrap().into()
}

fn mesh(fx: &ChainFixture, initial: Vec<(ElementId, Vec<f64>)>) -> MeshInput {
    MeshInput {
        element_count: fx.element_count(),
        interfaces: fx.interfaces.clone(),
        faults: fx
            .fault_links
            .iter()
            .zip(&fx.fault_centroids)
            .map(|(link, centroid)| FaultSpec {
                link: *link,
                centroid: *centroid,
                friction: locked_fault(),
                background: Traction {
                    shear: 0.0,
                    normal: 1.0,
                },
            })
            .collect(),
        nucleation: Vec::new(),
        initial_state: initial,
    }
}

fn config(rate: u32, end_time: f64) -> SimulationConfig {
    SimulationConfig {
        rate,
        end_time,
        ..Default::default()
    }
}

// ── Two-cluster scenario ─────────────────────────────────────────

#[test]
fn two_clusters_ten_coarse_steps() {
    // dt = [1, 1, 2, 2]; fault between element 1 (fine) and 2 (coarse).
    let fx = ChainFixture::new(&[1.0, 1.0, 2.0, 2.0], &[1]);
    let kernel = RecordingKernel::new(fx.kernel.clone());
    let log = kernel.log();
    let mut sim = Simulation::new(
        config(2, 20.0),
        mesh(&fx, Vec::new()),
        Box::new(kernel),
        &fx.stable_dt,
    )
    .unwrap();

    assert_eq!(sim.layout().level(ElementId(1)), ClusterLevel(0));
    assert_eq!(sim.layout().level(ElementId(2)), ClusterLevel(1));
    assert_eq!(sim.time_unit(), 1.0);

    let outcome = sim.advance(20.0).unwrap();
    assert_eq!(outcome, AdvanceOutcome::Completed { time: 20.0 });

    let m = sim.metrics();
    assert_eq!(m.substeps(ClusterLevel(0)), 20);
    assert_eq!(m.substeps(ClusterLevel(1)), 10);
    assert_eq!(m.fault_resolutions, 10);
    assert_eq!(m.element_updates, 2 * 20 + 2 * 10);

    // Coarse first on the tie, then exactly two fine sub-steps.
    let order: Vec<u32> = log
        .calls()
        .iter()
        .filter(|c| c.element == ElementId(0) || c.element == ElementId(2))
        .map(|c| c.element.0)
        .collect();
    let expected: Vec<u32> = (0..10).flat_map(|_| [2, 0, 0]).collect();
    assert_eq!(order, expected);
    assert!(log.calls_for(ElementId(0)).iter().all(|c| c.dt == 1.0));
    assert!(log.calls_for(ElementId(3)).iter().all(|c| c.dt == 2.0));
}

#[test]
fn fault_inside_one_cluster_resolves_every_substep() {
    let fx = ChainFixture::new(&[1.0, 1.0, 2.0, 2.0], &[0, 2]);
    let mut sim = Simulation::new(
        config(2, 8.0),
        mesh(&fx, Vec::new()),
        Box::new(fx.kernel.clone()),
        &fx.stable_dt,
    )
    .unwrap();
    sim.advance(8.0).unwrap();
    // Fault 0 sits in cluster 0 (8 steps), fault 1 in cluster 1 (4 steps).
    assert_eq!(sim.metrics().fault_resolutions, 8 + 4);
}

// ── GTS equivalence ──────────────────────────────────────────────

/// Synchronous global stepping, written out by hand.
fn reference_gts(
    kernel: &SpringChainKernel,
    sim: &Simulation,
    initial: &[Vec<f64>],
    steps: usize,
) -> Vec<Vec<f64>> {
    let topology = sim.scheduler().topology();
    let dt = sim.time_unit();
    let mut state = initial.to_vec();
    for _ in 0..steps {
        let mut next = state.clone();
        for (i, out) in next.iter_mut().enumerate() {
            let element = ElementId(i as u32);
            let mut fluxes = BoundaryFluxes::new();
            for link in topology.links(element) {
                if let LinkTarget::Element(other) = link.target {
                    fluxes.push(FaceFlux {
                        face: link.face,
                        source: FluxSource::Neighbour {
                            element: other.element,
                            face: other.face,
                            state: &state[other.element.index()],
                        },
                    });
                }
            }
            kernel.advance(element, &state[i], dt, &fluxes, out).unwrap();
        }
        state = next;
    }
    state
}

fn pulse(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            let x = i as f64 - n as f64 / 2.0;
            vec![(-x * x / 4.0).exp(), 0.0]
        })
        .collect()
}

#[test]
fn rate_one_matches_global_time_stepping() {
    let lengths = random_lengths(11, 24, 1.0, 6.0);
    let fx = ChainFixture::new(&lengths, &[]);
    let initial = pulse(lengths.len());
    let init: Vec<_> = initial
        .iter()
        .enumerate()
        .map(|(i, s)| (ElementId(i as u32), s.clone()))
        .collect();
    let end = 40.0;
    let mut sim = Simulation::new(
        config(1, end),
        mesh(&fx, init),
        Box::new(fx.kernel.clone()),
        &fx.stable_dt,
    )
    .unwrap();
    assert_eq!(sim.layout().cluster_count(), 1);

    sim.advance(end).unwrap();
    let steps = sim.metrics().substeps(ClusterLevel(0)) as usize;
    assert_eq!(steps as f64 * sim.time_unit(), sim.time());

    let expected = reference_gts(&fx.kernel, &sim, &initial, steps);
    for (i, want) in expected.iter().enumerate() {
        assert_eq!(sim.element_state(ElementId(i as u32)), want.as_slice(), "element {i}");
    }
}

#[test]
fn uniform_mesh_is_identical_for_any_rate() {
    let lengths = vec![2.0; 16];
    let fx = ChainFixture::new(&lengths, &[]);
    let init: Vec<_> = pulse(16)
        .into_iter()
        .enumerate()
        .map(|(i, s)| (ElementId(i as u32), s))
        .collect();
    let run = |rate| {
        let mut sim = Simulation::new(
            config(rate, 30.0),
            mesh(&fx, init.clone()),
            Box::new(fx.kernel.clone()),
            &fx.stable_dt,
        )
        .unwrap();
        sim.advance(30.0).unwrap();
        (0..16)
            .map(|i| sim.element_state(ElementId(i)).to_vec())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(1), run(2));
    assert_eq!(run(1), run(4));
}

// ── Cancellation ─────────────────────────────────────────────────

#[test]
fn cancellation_leaves_clusters_synchronized() {
    let fx = ChainFixture::new(&[1.0, 1.0, 2.0, 2.0, 4.0, 4.0], &[3]);
    let slot: Arc<Mutex<Option<StopHandle>>> = Arc::new(Mutex::new(None));
    let trigger = Arc::clone(&slot);
    let kernel = TriggerKernel::new(fx.kernel.clone(), 7, move || {
        if let Some(handle) = trigger.lock().unwrap().as_ref() {
            handle.stop();
        }
    });
    let mut sim = Simulation::new(
        config(2, 100.0),
        mesh(&fx, Vec::new()),
        Box::new(kernel),
        &fx.stable_dt,
    )
    .unwrap();
    *slot.lock().unwrap() = Some(sim.stop_handle());

    let outcome = sim.advance(100.0).unwrap();
    let time = match outcome {
        AdvanceOutcome::Cancelled { time } => time,
        other => panic!("expected Cancelled, got {other:?}"),
    };
    assert!(time > 0.0 && time < 100.0);
    for (level, t) in sim.scheduler().cluster_times() {
        assert_eq!(t, time, "cluster {level}");
    }

    // The flag stays raised: further calls do no work.
    let updates = sim.metrics().element_updates;
    assert_eq!(sim.advance(100.0).unwrap(), AdvanceOutcome::Cancelled { time });
    assert_eq!(sim.metrics().element_updates, updates);
}
