//! Rupture demo: a spontaneous slip-weakening rupture on a graded chain.
//!
//! Demonstrates:
//!   1. Building a chain mesh that is fine near the fault and coarse far away
//!   2. Assigning LTS clusters and reading the theoretical speedup
//!   3. Nucleating the rupture with a reduced static friction patch
//!   4. Running with a CSV sink on stdout and an in-memory sink
//!
//! Run with:
//!   RUST_LOG=info cargo run -p rupture-engine --example rupture_demo

use rupture_core::Traction;
use rupture_engine::{FaultCsvSink, FaultSpec, MemorySink, MeshInput, Simulation, SimulationConfig};
use rupture_friction::{FrictionLaw, LinearSlipWeakening, NucleationPatch, Region};
use rupture_test_utils::ChainFixture;
use tracing_subscriber::EnvFilter;

// ─── Mesh parameters ────────────────────────────────────────────

const FINE: usize = 16;
const COARSE: usize = 24;
const END_TIME: f64 = 60.0;

/// Element lengths doubling with distance from the middle of the chain.
fn graded_lengths() -> Vec<f64> {
    let mut left: Vec<f64> = (0..COARSE).map(|i| 2f64.powi((COARSE - i) as i32 / 8)).collect();
    let right: Vec<f64> = left.iter().rev().copied().collect();
    left.extend(std::iter::repeat(1.0).take(FINE));
    left.extend(right);
    left
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let lengths = graded_lengths();
    let fault_after = COARSE + FINE / 2 - 1;
    let fx = ChainFixture::new(&lengths, &[fault_after]);

    let friction: FrictionLaw = LinearSlipWeakening::builder()
        .static_friction(0.677)
        .dynamic_friction(0.525)
        .critical_slip(0.4)
        .build()?
        .into();
    let background = Traction {
        shear: 0.7,
        normal: 1.2,
    };
    let centroid = fx.fault_centroids[0];

    let mesh = MeshInput {
        element_count: fx.element_count(),
        interfaces: fx.interfaces.clone(),
        faults: vec![FaultSpec {
            link: fx.fault_links[0],
            centroid,
            friction,
            background,
        }],
        nucleation: vec![NucleationPatch::reduced_static_friction(
            Region::Sphere {
                center: centroid,
                radius: 0.5,
            },
            0.55,
        )],
        initial_state: Vec::new(),
    };
    let config = SimulationConfig {
        rate: 2,
        end_time: END_TIME,
        output_interval: Some(10.0),
        ..Default::default()
    };

    let mut sim = Simulation::new(config, mesh, Box::new(fx.kernel.clone()), &fx.stable_dt)?;
    println!(
        "{} elements in {} clusters, theoretical speedup {:.2}x",
        fx.element_count(),
        sim.layout().cluster_count(),
        sim.layout().theoretical_speedup()
    );

    let memory = MemorySink::new();
    let summary = sim.run(vec![
        Box::new(FaultCsvSink::new("stdout", std::io::stdout())),
        Box::new(memory.clone()),
    ])?;

    let face = &sim.faults()[0];
    println!(
        "t = {} ({} snapshots): slip {:.4}, peak slip rate {:.4}, rupture at {:?}",
        summary.final_time,
        memory.len(),
        face.slip(),
        face.peak_slip_rate(),
        face.rupture_time()
    );
    for (c, n) in summary.metrics.cluster_substeps.iter().enumerate() {
        println!("  cluster {c}: {n} sub-steps");
    }
    Ok(())
}
