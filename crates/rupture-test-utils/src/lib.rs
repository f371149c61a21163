//! Reference kernels and mesh fixtures for Rupture development.
//!
//! [`SpringChainKernel`] is a first-order finite-volume discretization of
//! 1D shear waves on a chain of elements, with Godunov fluxes at elastic
//! interfaces, traction-driven fluxes at fault faces, and free ends. It
//! is stable for `dt <= h / c`, which is what [`ChainFixture::stable_dt`]
//! reports. Wrapper kernels in [`fixtures`] count, record, fail, or
//! inject NaN on top of any kernel.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rupture_core::{
    BoundaryFluxes, ElasticInterface, ElementId, FaceRef, FaceTrace, FaultLink, FluxSource,
    KernelError, LocalFace, VolumeKernel,
};

/// Left face of a chain element.
pub const LEFT: LocalFace = LocalFace(0);
/// Right face of a chain element.
pub const RIGHT: LocalFace = LocalFace(1);

/// 1D shear waves on a chain. State is `[velocity, shear_stress]`.
#[derive(Clone, Debug)]
pub struct SpringChainKernel {
    density: Vec<f64>,
    shear_modulus: Vec<f64>,
    length: Vec<f64>,
}

impl SpringChainKernel {
    /// Homogeneous material over elements of the given lengths.
    pub fn new(lengths: &[f64], density: f64, shear_modulus: f64) -> Self {
        Self {
            density: vec![density; lengths.len()],
            shear_modulus: vec![shear_modulus; lengths.len()],
            length: lengths.to_vec(),
        }
    }

    /// Per-element material.
    pub fn heterogeneous(lengths: &[f64], density: &[f64], shear_modulus: &[f64]) -> Self {
        Self {
            density: density.to_vec(),
            shear_modulus: shear_modulus.to_vec(),
            length: lengths.to_vec(),
        }
    }

    pub fn wave_speed(&self, element: ElementId) -> f64 {
        let i = element.index();
        (self.shear_modulus[i] / self.density[i]).sqrt()
    }

    pub fn impedance(&self, element: ElementId) -> f64 {
        self.density[element.index()] * self.wave_speed(element)
    }

    /// CFL bound `h / c` per element.
    pub fn stable_dt(&self) -> Vec<f64> {
        (0..self.length.len())
            .map(|i| self.length[i] / self.wave_speed(ElementId(i as u32)))
            .collect()
    }

    /// Godunov state `(v*, s*)` on `face` of `element`.
    fn face_state(
        &self,
        element: ElementId,
        v: f64,
        s: f64,
        face: LocalFace,
        fluxes: &BoundaryFluxes<'_>,
    ) -> Result<(f64, f64), KernelError> {
        let z = self.impedance(element);
        let right = face == RIGHT;
        match fluxes.get(face).map(|f| f.source) {
            Some(FluxSource::Neighbour {
                element: other,
                state,
                ..
            }) => {
                if other.index() >= self.length.len() || state.len() < 2 {
                    return Err(KernelError {
                        element,
                        reason: format!("bad neighbour {other}"),
                    });
                }
                let zn = self.impedance(other);
                let ((vl, sl, zl), (vr, sr, zr)) = if right {
                    ((v, s, z), (state[0], state[1], zn))
                } else {
                    ((state[0], state[1], zn), (v, s, z))
                };
                let zsum = zl + zr;
                let s_star = (zr * sl + zl * sr) / zsum + zl * zr * (vr - vl) / zsum;
                let v_star = (zl * vl + zr * vr) / zsum + (sr - sl) / zsum;
                Ok((v_star, s_star))
            }
            Some(FluxSource::Fault { traction, .. }) => {
                let s_star = traction.shear;
                let v_star = if right {
                    v + (s_star - s) / z
                } else {
                    v + (s - s_star) / z
                };
                Ok((v_star, s_star))
            }
            None => {
                let v_star = if right { v - s / z } else { v + s / z };
                Ok((v_star, 0.0))
            }
        }
    }
}

impl VolumeKernel for SpringChainKernel {
    fn name(&self) -> &str {
        "spring_chain"
    }

    fn dofs(&self) -> usize {
        2
    }

    fn advance(
        &self,
        element: ElementId,
        state: &[f64],
        dt: f64,
        fluxes: &BoundaryFluxes<'_>,
        out: &mut [f64],
    ) -> Result<(), KernelError> {
        let i = element.index();
        if i >= self.length.len() {
            return Err(KernelError {
                element,
                reason: "element outside the chain".into(),
            });
        }
        let (v, s) = (state[0], state[1]);
        let (vl, sl) = self.face_state(element, v, s, LEFT, fluxes)?;
        let (vr, sr) = self.face_state(element, v, s, RIGHT, fluxes)?;
        let h = self.length[i];
        out[0] = v + dt / (self.density[i] * h) * (sr - sl);
        out[1] = s + dt * self.shear_modulus[i] / h * (vr - vl);
        Ok(())
    }

    fn face_trace(&self, element: ElementId, state: &[f64], _face: LocalFace) -> FaceTrace {
        FaceTrace {
            velocity: state[0],
            shear_stress: state[1],
            normal_stress: 0.0,
            impedance: self.impedance(element),
        }
    }
}

/// A chain mesh: topology, kernel, and per-element stable steps.
#[derive(Clone, Debug)]
pub struct ChainFixture {
    pub kernel: SpringChainKernel,
    pub stable_dt: Vec<f64>,
    pub interfaces: Vec<ElasticInterface>,
    pub fault_links: Vec<FaultLink>,
    /// Centroid of each fault face, on the x axis.
    pub fault_centroids: Vec<[f64; 3]>,
}

impl ChainFixture {
    /// A unit-material chain. The interface after each index in
    /// `faults_after` is a two-sided fault face; all others are elastic.
    pub fn new(lengths: &[f64], faults_after: &[usize]) -> Self {
        Self::with_kernel(SpringChainKernel::new(lengths, 1.0, 1.0), lengths, faults_after)
    }

    pub fn with_kernel(kernel: SpringChainKernel, lengths: &[f64], faults_after: &[usize]) -> Self {
        let mut interfaces = Vec::new();
        let mut fault_links = Vec::new();
        let mut fault_centroids = Vec::new();
        let mut x = 0.0;
        for i in 0..lengths.len().saturating_sub(1) {
            x += lengths[i];
            let minus = FaceRef::new(i as u32, RIGHT.0);
            let plus = FaceRef::new(i as u32 + 1, LEFT.0);
            if faults_after.contains(&i) {
                fault_links.push(FaultLink {
                    minus,
                    plus: Some(plus),
                });
                fault_centroids.push([x, 0.0, 0.0]);
            } else {
                interfaces.push(ElasticInterface { minus, plus });
            }
        }
        Self {
            stable_dt: kernel.stable_dt(),
            kernel,
            interfaces,
            fault_links,
            fault_centroids,
        }
    }

    /// Add a one-sided fault face on the right end of the chain.
    pub fn with_boundary_fault(mut self) -> Self {
        let last = self.stable_dt.len() - 1;
        let x: f64 = self.kernel.length.iter().sum();
        self.fault_links.push(FaultLink {
            minus: FaceRef::new(last as u32, RIGHT.0),
            plus: None,
        });
        self.fault_centroids.push([x, 0.0, 0.0]);
        self
    }

    pub fn element_count(&self) -> usize {
        self.stable_dt.len()
    }
}

/// Seeded random element lengths in `[min, max)`.
pub fn random_lengths(seed: u64, n: usize, min: f64, max: f64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(min..max)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupture_core::{FaceFlux, FaultId, FaceSide, Traction};

    fn fluxes_with_neighbours<'a>(left: &'a [f64], right: &'a [f64]) -> BoundaryFluxes<'a> {
        let mut f = BoundaryFluxes::new();
        f.push(FaceFlux {
            face: LEFT,
            source: FluxSource::Neighbour {
                element: ElementId(0),
                face: RIGHT,
                state: left,
            },
        });
        f.push(FaceFlux {
            face: RIGHT,
            source: FluxSource::Neighbour {
                element: ElementId(2),
                face: LEFT,
                state: right,
            },
        });
        f
    }

    #[test]
    fn uniform_state_is_steady() {
        let k = SpringChainKernel::new(&[1.0; 3], 2.0, 8.0);
        let state = [0.3, -0.7];
        let mut out = [0.0; 2];
        k.advance(ElementId(1), &state, 0.5, &fluxes_with_neighbours(&state, &state), &mut out)
            .unwrap();
        assert!((out[0] - state[0]).abs() < 1e-15);
        assert!((out[1] - state[1]).abs() < 1e-15);
    }

    #[test]
    fn free_ends_keep_rest_at_rest() {
        let k = SpringChainKernel::new(&[1.0], 1.0, 1.0);
        let mut out = [1.0; 2];
        k.advance(ElementId(0), &[0.0, 0.0], 1.0, &BoundaryFluxes::new(), &mut out)
            .unwrap();
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn fault_traction_drives_velocity() {
        let k = SpringChainKernel::new(&[1.0, 1.0], 1.0, 1.0);
        let mut f = BoundaryFluxes::new();
        f.push(FaceFlux {
            face: RIGHT,
            source: FluxSource::Fault {
                fault: FaultId(0),
                side: FaceSide::Minus,
                traction: Traction {
                    shear: 1.0,
                    normal: 0.0,
                },
                slip_rate: 0.0,
            },
        });
        let mut out = [0.0; 2];
        k.advance(ElementId(0), &[0.0, 0.0], 0.5, &f, &mut out).unwrap();
        // s* = 1 on the right, free left face: v += dt / (ρh) · (1 - 0).
        assert!((out[0] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn stable_dt_is_length_over_speed() {
        let k = SpringChainKernel::new(&[1.0, 2.0], 1.0, 4.0);
        assert_eq!(k.stable_dt(), vec![0.5, 1.0]);
        assert_eq!(k.impedance(ElementId(0)), 2.0);
    }

    #[test]
    fn fixture_places_faults() {
        let fx = ChainFixture::new(&[1.0, 1.0, 2.0, 2.0], &[1]).with_boundary_fault();
        assert_eq!(fx.interfaces.len(), 2);
        assert_eq!(fx.fault_links.len(), 2);
        assert_eq!(fx.fault_links[0].minus, FaceRef::new(1, 1));
        assert_eq!(fx.fault_centroids[0], [2.0, 0.0, 0.0]);
        assert_eq!(fx.fault_links[1].plus, None);
        assert_eq!(fx.fault_centroids[1], [6.0, 0.0, 0.0]);
    }

    #[test]
    fn random_lengths_are_seeded() {
        let a = random_lengths(7, 16, 1.0, 4.0);
        assert_eq!(a, random_lengths(7, 16, 1.0, 4.0));
        assert!(a.iter().all(|&h| (1.0..4.0).contains(&h)));
    }
}
