//! Traits implemented by the discretization layer.

use indexmap::IndexMap;

use crate::error::KernelError;
use crate::id::{ElementId, LocalFace};
use crate::kernel::{BoundaryFluxes, FaceTrace};

/// Supplies each element's maximum stable time step (CFL bound).
///
/// Returning `None` means the element has no finite bound, which fails
/// cluster assignment with [`SetupError::MissingTimestep`](crate::SetupError).
pub trait StableTimestepOracle {
    /// Maximum stable time step of `element`.
    fn stable_dt(&self, element: ElementId) -> Option<f64>;
}

impl StableTimestepOracle for [f64] {
    fn stable_dt(&self, element: ElementId) -> Option<f64> {
        self.get(element.index()).copied()
    }
}

impl StableTimestepOracle for Vec<f64> {
    fn stable_dt(&self, element: ElementId) -> Option<f64> {
        self.as_slice().stable_dt(element)
    }
}

impl StableTimestepOracle for IndexMap<ElementId, f64> {
    fn stable_dt(&self, element: ElementId) -> Option<f64> {
        self.get(&element).copied()
    }
}

/// The volume update operator of the spatial discretization.
///
/// # Contract
///
/// - `advance()` must depend only on the element's own state and the
///   supplied fluxes, so elements can be updated independently.
/// - `&self`: the kernel is stateless; all mutable state is the element
///   state owned by the engine.
/// - `dofs()` is constant for the kernel's lifetime.
///
/// # Object safety
///
/// This trait is object-safe; the engine stores the kernel as
/// `Box<dyn VolumeKernel>`.
pub trait VolumeKernel: Send + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Number of degrees of freedom per element.
    fn dofs(&self) -> usize;

    /// Advance `element` by `dt`, writing the updated state into `out`.
    ///
    /// `state` and `out` both have length [`dofs()`](Self::dofs).
    fn advance(
        &self,
        element: ElementId,
        state: &[f64],
        dt: f64,
        fluxes: &BoundaryFluxes<'_>,
        out: &mut [f64],
    ) -> Result<(), KernelError>;

    /// Velocity, stress and impedance of `element` at its local `face`.
    fn face_trace(&self, element: ElementId, state: &[f64], face: LocalFace) -> FaceTrace;
}
