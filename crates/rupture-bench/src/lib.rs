//! Benchmark profiles for the Rupture engine.
//!
//! Provides pre-built chain meshes for benchmarks and profiling:
//!
//! - [`reference_profile`]: 1K elements, one slip-weakening fault
//! - [`stress_profile`]: 20K elements, 16 faults
//! - [`rate_and_state_profile`]: 1K elements, one rate-and-state fault
//!
//! Element lengths are `2^x` with `x` uniform in `[0, 4)`, so the stable
//! steps span a factor of 16 and a rate-2 layout has four clusters.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rupture_core::Traction;
use rupture_engine::{FaultSpec, MeshInput, RunError, Simulation, SimulationConfig};
use rupture_friction::{FrictionLaw, LinearSlipWeakening, RateAndState};
use rupture_test_utils::{random_lengths, ChainFixture};

/// A chain mesh plus the configuration to run it with.
pub struct BenchProfile {
    /// Mesh, kernel and stable steps.
    pub fixture: ChainFixture,
    /// Run configuration.
    pub config: SimulationConfig,
    /// Friction law on every fault.
    pub friction: FrictionLaw,
    /// Background traction on every fault.
    pub background: Traction,
}

impl BenchProfile {
    /// Mesh input for [`Simulation::new`].
    pub fn mesh(&self) -> MeshInput {
        let fx = &self.fixture;
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
                    friction: self.friction.clone(),
                    background: self.background,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// A fresh simulation at `t = 0`.
    pub fn simulation(&self) -> Result<Simulation, RunError> {
        Simulation::new(
            self.config.clone(),
            self.mesh(),
            Box::new(self.fixture.kernel.clone()),
            &self.fixture.stable_dt,
        )
    }
}

/// Element lengths `2^x`, `x` uniform in `[0, 4)`.
pub fn graded_lengths(seed: u64, n: usize) -> Vec<f64> {
    random_lengths(seed, n, 0.0, 4.0)
        .into_iter()
        .map(|x| x.exp2())
        .collect()
}

fn profile(seed: u64, n: usize, faults: usize, friction: FrictionLaw) -> BenchProfile {
    let lengths = graded_lengths(seed, n);
    let stride = n / (faults + 1);
    let faults_after: Vec<usize> = (1..=faults).map(|i| i * stride).collect();
    BenchProfile {
        fixture: ChainFixture::new(&lengths, &faults_after),
        config: SimulationConfig {
            rate: 2,
            end_time: 64.0,
            ..Default::default()
        },
        friction,
        background: Traction {
            shear: 0.7,
            normal: 1.0,
        },
    }
}

fn weakening() -> FrictionLaw {
    LinearSlipWeakening::builder()
        .static_friction(0.6)
        .dynamic_friction(0.3)
        .critical_slip(0.2)
        .build()
        .map(FrictionLaw::from)
        .unwrap_or_else(|e| panic!("benchmark friction parameters: {e}"))
}

/// 1K elements with one overstressed slip-weakening fault in the middle.
pub fn reference_profile(seed: u64) -> BenchProfile {
    profile(seed, 1_000, 1, weakening())
}

/// 20K elements with 16 faults.
pub fn stress_profile(seed: u64) -> BenchProfile {
    profile(seed, 20_000, 16, weakening())
}

/// 1K elements with one rate-and-state fault, for the Newton solve.
pub fn rate_and_state_profile(seed: u64) -> BenchProfile {
    let friction = RateAndState::builder()
        .build()
        .map(FrictionLaw::from)
        .unwrap_or_else(|e| panic!("benchmark friction parameters: {e}"));
    BenchProfile {
        background: Traction {
            shear: 0.55,
            normal: 1.0,
        },
        ..profile(seed, 1_000, 1, friction)
    }
}
