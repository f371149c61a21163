//! Fatal error paths: each aborts the run and halts the scheduler.

use std::sync::atomic::Ordering;

use rupture_core::{ClusterLevel, ElementId, FaultId, StepError, Traction};
use rupture_engine::{
    ConfigError, FaultSpec, MemorySink, MeshInput, RunError, Simulation, SimulationConfig,
};
use rupture_friction::{FrictionLaw, LinearSlipWeakening, RateAndState};
use rupture_test_utils::fixtures::{FailingKernel, NanKernel};
use rupture_test_utils::ChainFixture;

fn mesh(fx: &ChainFixture, friction: FrictionLaw, background: Traction) -> MeshInput {
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
                friction: friction.clone(),
                background,
            })
            .collect(),
        ..Default::default()
    }
}

fn lsw() -> FrictionLaw {
    LinearSlipWeakening::builder().build().unwrap().into()
}

fn at_rest() -> Traction {
    Traction {
        shear: 0.0,
        normal: 1.0,
    }
}

fn config(end_time: f64) -> SimulationConfig {
    SimulationConfig {
        rate: 2,
        end_time,
        ..Default::default()
    }
}

#[test]
fn nan_state_is_fatal_and_reports_element_and_time() {
    let fx = ChainFixture::new(&[1.0, 1.0, 2.0, 2.0], &[1]);
    // Element 2 steps with dt = 2; its fourth update ends at t = 8.
    let kernel = NanKernel::new(fx.kernel.clone(), ElementId(2), 3);
    let mut sim = Simulation::new(
        config(20.0),
        mesh(&fx, lsw(), at_rest()),
        Box::new(kernel),
        &fx.stable_dt,
    )
    .unwrap();

    match sim.advance(20.0) {
        Err(StepError::NumericalInstability(e)) => {
            assert_eq!(e.element, ElementId(2));
            assert_eq!(e.time, 8.0);
            assert_eq!(e.dof, 0);
        }
        other => panic!("expected NumericalInstability, got {other:?}"),
    }
    // The failing sub-step was not committed.
    assert!(sim.element_state(ElementId(2)).iter().all(|v| v.is_finite()));
    assert!(sim.scheduler().is_halted());
    assert_eq!(sim.advance(20.0), Err(StepError::Halted));
}

#[test]
fn kernel_failure_propagates_unchanged() {
    let fx = ChainFixture::new(&[1.0, 1.0, 1.0], &[]);
    let kernel = FailingKernel::new(fx.kernel.clone(), 5);
    let counter = kernel.counter();
    let mut sim = Simulation::new(
        config(10.0),
        mesh(&fx, lsw(), at_rest()),
        Box::new(kernel),
        &fx.stable_dt,
    )
    .unwrap();

    match sim.advance(10.0) {
        Err(StepError::Kernel(e)) => assert!(e.reason.contains("deliberate failure")),
        other => panic!("expected Kernel error, got {other:?}"),
    }
    let calls = counter.load(Ordering::Relaxed);
    assert_eq!(sim.advance(10.0), Err(StepError::Halted));
    assert_eq!(counter.load(Ordering::Relaxed), calls);
}

#[test]
fn friction_solve_failure_aborts_run() {
    let fx = ChainFixture::new(&[1.0, 1.0, 2.0, 2.0], &[1]);
    // θ = L / V_ini overflows, so both attempts fail at the first
    // resolution.
    let rs: FrictionLaw = RateAndState::builder()
        .initial_slip_rate(1e-320)
        .build()
        .unwrap()
        .into();
    let background = Traction {
        shear: 0.5,
        normal: 1.0,
    };
    let mut sim = Simulation::new(
        config(20.0),
        mesh(&fx, rs, background),
        Box::new(fx.kernel.clone()),
        &fx.stable_dt,
    )
    .unwrap();
    let sink = MemorySink::new();

    match sim.run(vec![Box::new(sink.clone())]) {
        Err(RunError::Step(StepError::FrictionSolve(e))) => {
            assert_eq!(e.fault, FaultId(0));
            assert_eq!(e.time, 2.0);
        }
        other => panic!("expected FrictionSolve, got {other:?}"),
    }
    // Only the initial snapshot went out; the output stage was joined.
    assert_eq!(sink.len(), 1);
    assert_eq!(sim.metrics().fault_resolutions, 0);

    // The coarse cluster stepped 0 -> 2, then the fine step 1 -> 2 failed
    // on the face. That fine step left no trace.
    assert_eq!(sim.time(), 1.0);
    assert_eq!(
        sim.scheduler().cluster_times(),
        vec![(ClusterLevel(0), 1.0), (ClusterLevel(1), 2.0)]
    );
    assert_eq!(sim.metrics().substeps(ClusterLevel(0)), 1);
    assert_eq!(sim.metrics().substeps(ClusterLevel(1)), 1);
    assert_eq!(sim.metrics().element_updates, 4);
    assert_eq!(sim.faults()[0].slip(), 0.0);
    assert_eq!(sim.faults()[0].rupture_time(), None);
}

#[test]
fn invalid_setup_is_rejected_before_running() {
    let fx = ChainFixture::new(&[1.0, 1.0], &[]);
    let mut dts = fx.stable_dt.clone();
    dts[1] = f64::NAN;
    match Simulation::new(
        config(1.0),
        mesh(&fx, lsw(), at_rest()),
        Box::new(fx.kernel.clone()),
        &dts,
    ) {
        Err(RunError::Setup(e)) => assert!(e.to_string().contains("element 1")),
        Err(other) => panic!("expected Setup error, got {other:?}"),
        Ok(_) => panic!("expected Setup error, got a simulation"),
    }

    let bad = SimulationConfig {
        output_buffer_capacity: 0,
        ..config(1.0)
    };
    let result = Simulation::new(
        bad,
        mesh(&fx, lsw(), at_rest()),
        Box::new(fx.kernel.clone()),
        &fx.stable_dt,
    );
    assert!(matches!(result, Err(RunError::Config(_))));
}

#[test]
fn extreme_timestep_ratio_is_rejected_or_clamped() {
    // 2^100 between the two elements: deeper than any exact level at r = 3.
    let fine = 2f64.powi(-100);
    let fx = ChainFixture::new(&[1.0, 1.0], &[]);
    let dts = vec![fine, 1.0];
    let cfg = SimulationConfig {
        rate: 3,
        ..config(1.0)
    };
    match Simulation::new(cfg.clone(), mesh(&fx, lsw(), at_rest()), Box::new(fx.kernel.clone()), &dts) {
        Err(RunError::Config(ConfigError::TooManySteps { .. })) => {}
        Err(other) => panic!("expected TooManySteps, got {other:?}"),
        Ok(_) => panic!("expected TooManySteps, got a simulation"),
    }

    // A run short enough for the lattice clamps the coarse element at 3^32.
    let short = SimulationConfig {
        end_time: 10.0 * fine,
        ..cfg
    };
    let mut sim =
        Simulation::new(short, mesh(&fx, lsw(), at_rest()), Box::new(fx.kernel.clone()), &dts)
            .unwrap();
    assert_eq!(sim.layout().cluster_count(), 33);
    assert_eq!(sim.layout().level(ElementId(1)).0, 32);

    let summary = sim.run(Vec::new()).unwrap();
    assert!(!summary.cancelled);
    assert_eq!(summary.metrics.cluster_substeps[0], 10);
    assert_eq!(summary.metrics.cluster_substeps[32], 1);
}
