//! Wrapper kernels for scheduler and error-path tests.
//!
//! Each wrapper delegates to an inner [`VolumeKernel`] and adds one
//! behaviour:
//!
//! - [`RecordingKernel`]: logs every `advance` call.
//! - [`NanKernel`]: writes NaN into one element after N of its updates.
//! - [`FailingKernel`]: returns [`KernelError`] after N calls.
//! - [`TriggerKernel`]: runs a callback once after N calls (e.g. to
//!   raise a stop handle mid-run).
//!
//! Counters are atomics so the wrappers stay `Send`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rupture_core::{BoundaryFluxes, ElementId, FaceTrace, KernelError, LocalFace, VolumeKernel};

/// One recorded `advance` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelCall {
    pub element: ElementId,
    pub dt: f64,
}

/// Shared view of a [`RecordingKernel`]'s log.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<KernelCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<KernelCall> {
        self.0.lock().unwrap().clone()
    }

    /// Calls for one element, in order.
    pub fn calls_for(&self, element: ElementId) -> Vec<KernelCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.element == element)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Logs every `advance` call before delegating.
pub struct RecordingKernel<K> {
    inner: K,
    log: CallLog,
}

impl<K: VolumeKernel> RecordingKernel<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            log: CallLog::default(),
        }
    }

    /// A handle that stays valid after the kernel is boxed.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl<K: VolumeKernel> VolumeKernel for RecordingKernel<K> {
    fn name(&self) -> &str {
        "recording"
    }

    fn dofs(&self) -> usize {
        self.inner.dofs()
    }

    fn advance(
        &self,
        element: ElementId,
        state: &[f64],
        dt: f64,
        fluxes: &BoundaryFluxes<'_>,
        out: &mut [f64],
    ) -> Result<(), KernelError> {
        self.log.0.lock().unwrap().push(KernelCall { element, dt });
        self.inner.advance(element, state, dt, fluxes, out)
    }

    fn face_trace(&self, element: ElementId, state: &[f64], face: LocalFace) -> FaceTrace {
        self.inner.face_trace(element, state, face)
    }
}

/// Writes NaN into DOF 0 of `target` on its `(after + 1)`-th update.
pub struct NanKernel<K> {
    inner: K,
    target: ElementId,
    after: usize,
    updates: AtomicUsize,
}

impl<K: VolumeKernel> NanKernel<K> {
    pub fn new(inner: K, target: ElementId, after: usize) -> Self {
        Self {
            inner,
            target,
            after,
            updates: AtomicUsize::new(0),
        }
    }
}

impl<K: VolumeKernel> VolumeKernel for NanKernel<K> {
    fn name(&self) -> &str {
        "nan_injecting"
    }

    fn dofs(&self) -> usize {
        self.inner.dofs()
    }

    fn advance(
        &self,
        element: ElementId,
        state: &[f64],
        dt: f64,
        fluxes: &BoundaryFluxes<'_>,
        out: &mut [f64],
    ) -> Result<(), KernelError> {
        self.inner.advance(element, state, dt, fluxes, out)?;
        if element == self.target && self.updates.fetch_add(1, Ordering::Relaxed) >= self.after {
            out[0] = f64::NAN;
        }
        Ok(())
    }

    fn face_trace(&self, element: ElementId, state: &[f64], face: LocalFace) -> FaceTrace {
        self.inner.face_trace(element, state, face)
    }
}

/// Fails deterministically after `succeed_count` successful calls.
pub struct FailingKernel<K> {
    inner: K,
    succeed_count: usize,
    calls: Arc<AtomicUsize>,
}

impl<K: VolumeKernel> FailingKernel<K> {
    pub fn new(inner: K, succeed_count: usize) -> Self {
        Self {
            inner,
            succeed_count,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl<K: VolumeKernel> VolumeKernel for FailingKernel<K> {
    fn name(&self) -> &str {
        "failing"
    }

    fn dofs(&self) -> usize {
        self.inner.dofs()
    }

    fn advance(
        &self,
        element: ElementId,
        state: &[f64],
        dt: f64,
        fluxes: &BoundaryFluxes<'_>,
        out: &mut [f64],
    ) -> Result<(), KernelError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(KernelError {
                element,
                reason: format!(
                    "deliberate failure after {} successful calls",
                    self.succeed_count
                ),
            });
        }
        self.inner.advance(element, state, dt, fluxes, out)
    }

    fn face_trace(&self, element: ElementId, state: &[f64], face: LocalFace) -> FaceTrace {
        self.inner.face_trace(element, state, face)
    }
}

/// Runs `on_trigger` once, right after the `after`-th call.
pub struct TriggerKernel<K, F> {
    inner: K,
    after: usize,
    calls: AtomicUsize,
    on_trigger: F,
}

impl<K, F> TriggerKernel<K, F>
where
    K: VolumeKernel,
    F: Fn() + Send + 'static,
{
    pub fn new(inner: K, after: usize, on_trigger: F) -> Self {
        Self {
            inner,
            after,
            calls: AtomicUsize::new(0),
            on_trigger,
        }
    }
}

impl<K, F> VolumeKernel for TriggerKernel<K, F>
where
    K: VolumeKernel,
    F: Fn() + Send + 'static,
{
    fn name(&self) -> &str {
        "trigger"
    }

    fn dofs(&self) -> usize {
        self.inner.dofs()
    }

    fn advance(
        &self,
        element: ElementId,
        state: &[f64],
        dt: f64,
        fluxes: &BoundaryFluxes<'_>,
        out: &mut [f64],
    ) -> Result<(), KernelError> {
        self.inner.advance(element, state, dt, fluxes, out)?;
        if self.calls.fetch_add(1, Ordering::Relaxed) + 1 == self.after {
            (self.on_trigger)();
        }
        Ok(())
    }

    fn face_trace(&self, element: ElementId, state: &[f64], face: LocalFace) -> FaceTrace {
        self.inner.face_trace(element, state, face)
    }
}
