//! Data exchanged with the volume update kernel.
//!
//! The kernel sees an element's boundary through [`BoundaryFluxes`]: one
//! [`FaceFlux`] per linked local face. Faces that are not linked are the
//! kernel's own prescribed boundary and do not appear.

use smallvec::SmallVec;

use crate::id::{ElementId, FaultId, LocalFace};

/// Which side of a fault face an element sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceSide {
    /// The primary side; owns the face by convention.
    Minus,
    /// The secondary side (absent for one-sided faces).
    Plus,
}

/// A traction on a fault face.
///
/// `normal` is compression-positive: a positive value keeps the fault
/// closed, zero or negative means the fault is open.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Traction {
    /// Shear traction along the slip direction.
    pub shear: f64,
    /// Effective normal stress, compression positive.
    pub normal: f64,
}

/// Field values an element presents at one of its faces.
///
/// Stresses follow the solid-mechanics convention (tension positive),
/// so `normal_stress < 0` is compressive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceTrace {
    /// Particle velocity along the slip direction.
    pub velocity: f64,
    /// Shear stress perturbation at the face.
    pub shear_stress: f64,
    /// Normal stress perturbation at the face, tension positive.
    pub normal_stress: f64,
    /// Shear impedance `ρ·c_s` of the element's material.
    pub impedance: f64,
}

/// Where a face's boundary data comes from.
#[derive(Clone, Copy, Debug)]
pub enum FluxSource<'a> {
    /// An elastic neighbour; `state` is its current or buffered state.
    Neighbour {
        /// The neighbouring element.
        element: ElementId,
        /// The neighbour's local face on the shared interface.
        face: LocalFace,
        /// The neighbour state valid for this sub-step.
        state: &'a [f64],
    },
    /// A fault face; the traction is the one resolved at the last
    /// synchronization of the two abutting clusters.
    Fault {
        /// The fault face.
        fault: FaultId,
        /// The side the advancing element sits on.
        side: FaceSide,
        /// Resolved traction minus the face's background traction,
        /// identical for both sides. Zero before the first resolution.
        traction: Traction,
        /// Resolved slip rate.
        slip_rate: f64,
    },
}

/// Boundary data for one face of the advancing element.
#[derive(Clone, Copy, Debug)]
pub struct FaceFlux<'a> {
    /// The advancing element's local face.
    pub face: LocalFace,
    /// Data source across that face.
    pub source: FluxSource<'a>,
}

/// All boundary data for one element sub-step.
#[derive(Clone, Debug, Default)]
pub struct BoundaryFluxes<'a> {
    faces: SmallVec<[FaceFlux<'a>; 4]>,
}

impl<'a> BoundaryFluxes<'a> {
    /// An empty flux set.
    pub fn new() -> Self {
        Self {
            faces: SmallVec::new(),
        }
    }

    /// Append the flux for one face.
    pub fn push(&mut self, flux: FaceFlux<'a>) {
        self.faces.push(flux);
    }

    /// All linked faces.
    pub fn faces(&self) -> &[FaceFlux<'a>] {
        &self.faces
    }

    /// The flux across `face`, if that face is linked.
    pub fn get(&self, face: LocalFace) -> Option<&FaceFlux<'a>> {
        self.faces.iter().find(|f| f.face == face)
    }

    /// Number of linked faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether no face is linked.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_finds_linked_face_only() {
        let state = [1.0, 2.0];
        let mut fluxes = BoundaryFluxes::new();
        fluxes.push(FaceFlux {
            face: LocalFace(1),
            source: FluxSource::Neighbour {
                element: ElementId(4),
                face: LocalFace(0),
                state: &state,
            },
        });
        assert_eq!(fluxes.len(), 1);
        assert!(fluxes.get(LocalFace(0)).is_none());
        match fluxes.get(LocalFace(1)).map(|f| f.source) {
            Some(FluxSource::Neighbour { element, state, .. }) => {
                assert_eq!(element, ElementId(4));
                assert_eq!(state, &[1.0, 2.0]);
            }
            other => panic!("expected neighbour flux, got {other:?}"),
        }
    }
}
