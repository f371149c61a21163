//! Nucleation patches: parameter overrides that seed rupture.

use crate::law::FrictionLaw;

/// A region of the fault, tested against face centroids.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Region {
    /// Ball of `radius` around `center`.
    Sphere {
        /// Centre point.
        center: [f64; 3],
        /// Radius (inclusive).
        radius: f64,
    },
    /// Axis-aligned box, bounds inclusive.
    Box {
        /// Lower corner.
        min: [f64; 3],
        /// Upper corner.
        max: [f64; 3],
    },
}

impl Region {
    /// Whether `point` lies inside the region.
    pub fn contains(&self, point: [f64; 3]) -> bool {
        match self {
            Self::Sphere { center, radius } => {
                let d2: f64 = point
                    .iter()
                    .zip(center)
                    .map(|(p, c)| (p - c) * (p - c))
                    .sum();
                d2 <= radius * radius
            }
            Self::Box { min, max } => (0..3).all(|i| point[i] >= min[i] && point[i] <= max[i]),
        }
    }
}

/// Overrides applied to every fault face whose centroid lies in `region`.
#[derive(Clone, Debug, PartialEq)]
pub struct NucleationPatch {
    /// Where the patch applies.
    pub region: Region,
    /// Reduced static friction for slip-weakening faces.
    pub static_friction: Option<f64>,
    /// Extra background shear stress, for either law.
    pub shear_stress_perturbation: f64,
}

impl NucleationPatch {
    /// A patch that only lowers slip-weakening static friction.
    pub fn reduced_static_friction(region: Region, static_friction: f64) -> Self {
        Self {
            region,
            static_friction: Some(static_friction),
            shear_stress_perturbation: 0.0,
        }
    }

    /// Whether the patch covers a face with this centroid.
    pub fn contains(&self, centroid: [f64; 3]) -> bool {
        self.region.contains(centroid)
    }

    /// The law with this patch's friction override applied.
    ///
    /// Rate-and-state laws are returned unchanged; they nucleate through
    /// the shear stress perturbation.
    pub fn apply(&self, law: &FrictionLaw) -> FrictionLaw {
        match (law, self.static_friction) {
            (FrictionLaw::LinearSlipWeakening(lsw), Some(mu_s)) => {
                FrictionLaw::LinearSlipWeakening(lsw.with_static_friction(mu_s))
            }
            _ => law.clone(),
        }
    }
}
