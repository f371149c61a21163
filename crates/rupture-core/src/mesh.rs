//! Element connectivity as seen by the time-advancement core.
//!
//! [`MeshTopology`] is built once from the elastic interfaces and fault
//! faces delivered by the meshing layer. It validates the linkage and
//! precomputes, per element, the list of linked local faces so the
//! scheduler never searches at run time.

use smallvec::SmallVec;

use crate::error::SetupError;
use crate::id::{ElementId, FaultId, LocalFace};
use crate::kernel::FaceSide;

/// A local face of a specific element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceRef {
    /// The element.
    pub element: ElementId,
    /// The element's local face.
    pub face: LocalFace,
}

impl FaceRef {
    /// Shorthand constructor.
    pub fn new(element: u32, face: u8) -> Self {
        Self {
            element: ElementId(element),
            face: LocalFace(face),
        }
    }
}

/// An ordinary interface with elastic continuity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElasticInterface {
    /// One side.
    pub minus: FaceRef,
    /// The other side.
    pub plus: FaceRef,
}

/// The elements abutting a fault face.
///
/// `plus == None` is a one-sided face against a prescribed boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultLink {
    /// The primary side; its owner resolves the face.
    pub minus: FaceRef,
    /// The secondary side, if any.
    pub plus: Option<FaceRef>,
}

impl FaultLink {
    /// The element on `side`, if present.
    pub fn element(&self, side: FaceSide) -> Option<ElementId> {
        match side {
            FaceSide::Minus => Some(self.minus.element),
            FaceSide::Plus => self.plus.map(|p| p.element),
        }
    }
}

/// What lies across a linked local face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// An elastic neighbour.
    Element(FaceRef),
    /// A fault face, seen from `side`.
    Fault {
        /// The fault face.
        fault: FaultId,
        /// The linking element's side of the fault.
        side: FaceSide,
    },
}

/// One linked local face of an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    /// The element's local face.
    pub face: LocalFace,
    /// What lies across it.
    pub target: LinkTarget,
}

/// Validated element connectivity.
#[derive(Clone, Debug)]
pub struct MeshTopology {
    links: Vec<SmallVec<[Link; 4]>>,
    faults: Vec<FaultLink>,
}

impl MeshTopology {
    /// Build and validate the topology.
    ///
    /// # Errors
    ///
    /// - [`SetupError::NoElements`] if `element_count == 0`.
    /// - [`SetupError::ElementOutOfRange`] for any reference past the end.
    /// - [`SetupError::SelfLink`] for an interface or fault joining an
    ///   element to itself.
    /// - [`SetupError::DuplicateFace`] if a local face is linked twice.
    pub fn new(
        element_count: usize,
        interfaces: &[ElasticInterface],
        faults: &[FaultLink],
    ) -> Result<Self, SetupError> {
        if element_count == 0 {
            return Err(SetupError::NoElements);
        }
        let mut links: Vec<SmallVec<[Link; 4]>> = vec![SmallVec::new(); element_count];

        let mut attach = |at: FaceRef, target: LinkTarget| -> Result<(), SetupError> {
            let slot = links
                .get_mut(at.element.index())
                .ok_or(SetupError::ElementOutOfRange {
                    element: at.element,
                    count: element_count,
                })?;
            if slot.iter().any(|l| l.face == at.face) {
                return Err(SetupError::DuplicateFace {
                    element: at.element,
                    face: at.face,
                });
            }
            slot.push(Link {
                face: at.face,
                target,
            });
            Ok(())
        };

        for iface in interfaces {
            if iface.minus.element == iface.plus.element {
                return Err(SetupError::SelfLink {
                    element: iface.minus.element,
                });
            }
            attach(iface.minus, LinkTarget::Element(iface.plus))?;
            attach(iface.plus, LinkTarget::Element(iface.minus))?;
        }

        for (i, fault) in faults.iter().enumerate() {
            let id = FaultId(i as u32);
            attach(
                fault.minus,
                LinkTarget::Fault {
                    fault: id,
                    side: FaceSide::Minus,
                },
            )?;
            if let Some(plus) = fault.plus {
                if plus.element == fault.minus.element {
                    return Err(SetupError::SelfLink {
                        element: plus.element,
                    });
                }
                attach(
                    plus,
                    LinkTarget::Fault {
                        fault: id,
                        side: FaceSide::Plus,
                    },
                )?;
            }
        }

        Ok(Self {
            links,
            faults: faults.to_vec(),
        })
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.links.len()
    }

    /// Number of fault faces.
    pub fn fault_count(&self) -> usize {
        self.faults.len()
    }

    /// Linked local faces of `element`.
    ///
    /// # Panics
    ///
    /// Panics if `element` is out of range.
    pub fn links(&self, element: ElementId) -> &[Link] {
        &self.links[element.index()]
    }

    /// The elements abutting `fault`.
    ///
    /// # Panics
    ///
    /// Panics if `fault` is out of range.
    pub fn fault(&self, fault: FaultId) -> &FaultLink {
        &self.faults[fault.index()]
    }

    /// All fault faces in ID order.
    pub fn faults(&self) -> &[FaultLink] {
        &self.faults
    }
}
