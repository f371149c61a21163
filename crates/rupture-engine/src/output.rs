//! Snapshot output and the asynchronous writer stage.
//!
//! The run driver captures a [`Snapshot`] at every output time and hands
//! it to [`AsyncOutput`], which runs one writer thread per registered
//! [`OutputSink`]. Each writer is fed through a bounded crossbeam
//! channel. When a channel is full the producer logs a backpressure
//! warning, counts it, and blocks until the writer catches up; the time
//! loop is throttled rather than buffering without bound.
//!
//! Sink failures stop only the failing writer. They surface on the next
//! [`submit`](AsyncOutput::submit) to that writer, or at
//! [`finish`](AsyncOutput::finish).

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};
use rupture_core::{ClusterLevel, ElementId, FaultId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scheduler::ClusterScheduler;

// ── Snapshot ───────────────────────────────────────────────────────

/// Element values at a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementRecord {
    /// The element.
    pub element: ElementId,
    /// Its cluster.
    pub cluster: ClusterLevel,
    /// Its DOFs.
    pub values: Vec<f64>,
}

/// Fault face values at a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultRecord {
    /// The face.
    pub fault: FaultId,
    /// Signed slip.
    pub slip: f64,
    /// Slip rate at the last resolution.
    pub slip_rate: f64,
    /// Resolved shear traction.
    pub shear_traction: f64,
    /// Resolved normal stress, compression positive.
    pub normal_stress: f64,
    /// Rate-and-state `θ` (0 for slip weakening).
    pub state_variable: f64,
    /// First time the rupture threshold was reached.
    pub rupture_time: Option<f64>,
    /// Largest slip rate so far.
    pub peak_slip_rate: f64,
}

/// Simulation state at one output time.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Simulation time shared by every cluster.
    pub time: f64,
    /// Every element, in ID order.
    pub elements: Vec<ElementRecord>,
    /// Every fault face, in ID order.
    pub faults: Vec<FaultRecord>,
}

impl Snapshot {
    /// Copy the scheduler's state. Call only between `advance` calls,
    /// when all clusters share one time.
    pub fn capture(scheduler: &ClusterScheduler) -> Self {
        let layout = scheduler.layout();
        let elements = (0..layout.element_count())
            .map(|i| {
                let element = ElementId(i as u32);
                ElementRecord {
                    element,
                    cluster: layout.level(element),
                    values: scheduler.element_state(element).to_vec(),
                }
            })
            .collect();
        let faults = scheduler
            .faults()
            .iter()
            .map(|f| FaultRecord {
                fault: f.id(),
                slip: f.slip(),
                slip_rate: f.slip_rate(),
                shear_traction: f.traction().shear,
                normal_stress: f.traction().normal,
                state_variable: f.friction_state().state_variable,
                rupture_time: f.rupture_time(),
                peak_slip_rate: f.peak_slip_rate(),
            })
            .collect();
        Self {
            time: scheduler.time(),
            elements,
            faults,
        }
    }
}

// ── OutputError ────────────────────────────────────────────────────

/// Errors raised by sinks and the writer stage.
#[derive(Debug, Error)]
pub enum OutputError {
    /// I/O failure inside a sink.
    #[error("sink {sink}: {source}")]
    Io {
        /// The failing sink.
        sink: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A sink rejected a snapshot.
    #[error("sink {sink}: {reason}")]
    Sink {
        /// The failing sink.
        sink: String,
        /// Sink-provided description.
        reason: String,
    },
    /// A writer thread panicked.
    #[error("writer for sink {sink} panicked")]
    WriterPanicked {
        /// The sink whose writer died.
        sink: String,
    },
    /// A writer thread could not be spawned.
    #[error("failed to spawn writer for sink {sink}: {source}")]
    ThreadSpawn {
        /// The sink without a writer.
        sink: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

// ── OutputSink ─────────────────────────────────────────────────────

/// Destination for snapshots. Runs on its own writer thread.
pub trait OutputSink: Send + 'static {
    /// Name used in logs, thread names and errors.
    fn name(&self) -> &str;

    /// Persist one snapshot.
    fn write(&mut self, snapshot: &Snapshot) -> Result<(), OutputError>;

    /// Called once after the last snapshot.
    fn flush(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

// ── AsyncOutput ────────────────────────────────────────────────────

struct Writer {
    sink: String,
    tx: Option<Sender<Arc<Snapshot>>>,
    handle: Option<JoinHandle<Result<u64, OutputError>>>,
}

impl Writer {
    /// Close the channel and collect the writer's result.
    fn join(&mut self) -> Result<u64, OutputError> {
        self.tx = None;
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(OutputError::WriterPanicked {
                    sink: self.sink.clone(),
                })
            }),
            None => Ok(0),
        }
    }
}

/// Summary returned by [`AsyncOutput::finish`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputReport {
    /// Snapshots written, per sink in registration order.
    pub written: Vec<(String, u64)>,
    /// Times a full buffer throttled the producer.
    pub backpressure_events: u64,
}

/// One writer thread per sink, fed through bounded channels.
pub struct AsyncOutput {
    writers: Vec<Writer>,
    backpressure_events: u64,
}

impl AsyncOutput {
    /// Spawn one writer per sink with `capacity` buffered snapshots each.
    ///
    /// # Errors
    ///
    /// [`OutputError::ThreadSpawn`]; writers already spawned are shut
    /// down.
    pub fn spawn(sinks: Vec<Box<dyn OutputSink>>, capacity: usize) -> Result<Self, OutputError> {
        let mut output = Self {
            writers: Vec::with_capacity(sinks.len()),
            backpressure_events: 0,
        };
        for (i, mut sink) in sinks.into_iter().enumerate() {
            let name = sink.name().to_string();
            let (tx, rx) = crossbeam_channel::bounded::<Arc<Snapshot>>(capacity.max(1));
            let handle = thread::Builder::new()
                .name(format!("rupture-output-{i}"))
                .spawn(move || {
                    let mut written = 0;
                    while let Ok(snapshot) = rx.recv() {
                        sink.write(&snapshot)?;
                        written += 1;
                    }
                    sink.flush()?;
                    Ok(written)
                })
                .map_err(|source| OutputError::ThreadSpawn {
                    sink: name.clone(),
                    source,
                })?;
            output.writers.push(Writer {
                sink: name,
                tx: Some(tx),
                handle: Some(handle),
            });
        }
        Ok(output)
    }

    /// Hand `snapshot` to every writer.
    ///
    /// # Errors
    ///
    /// The error of a writer that has stopped.
    pub fn submit(&mut self, snapshot: Snapshot) -> Result<(), OutputError> {
        let snapshot = Arc::new(snapshot);
        for idx in 0..self.writers.len() {
            let writer = &mut self.writers[idx];
            let Some(tx) = writer.tx.as_ref() else {
                continue;
            };
            let delivered = match tx.try_send(Arc::clone(&snapshot)) {
                Ok(()) => true,
                Err(TrySendError::Full(pending)) => {
                    self.backpressure_events += 1;
                    warn!(
                        sink = %writer.sink,
                        time = snapshot.time,
                        "OutputBackpressureWarning: output buffer full, throttling"
                    );
                    tx.send(pending).is_ok()
                }
                Err(TrySendError::Disconnected(_)) => false,
            };
            if !delivered {
                return Err(match writer.join() {
                    Err(e) => e,
                    Ok(_) => OutputError::Sink {
                        sink: writer.sink.clone(),
                        reason: "writer stopped early".into(),
                    },
                });
            }
        }
        Ok(())
    }

    /// Times a full buffer throttled the producer.
    pub fn backpressure_events(&self) -> u64 {
        self.backpressure_events
    }

    /// Close every channel, wait for the writers, and report.
    ///
    /// # Errors
    ///
    /// The first sink error, in registration order. Every writer is
    /// joined regardless.
    pub fn finish(mut self) -> Result<OutputReport, OutputError> {
        let mut report = OutputReport {
            written: Vec::with_capacity(self.writers.len()),
            backpressure_events: self.backpressure_events,
        };
        let mut first_error = None;
        for writer in &mut self.writers {
            match writer.join() {
                Ok(n) => report.written.push((writer.sink.clone(), n)),
                Err(e) => {
                    report.written.push((writer.sink.clone(), 0));
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!(sinks = report.written.len(), "output stage shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

impl Drop for AsyncOutput {
    fn drop(&mut self) {
        for writer in &mut self.writers {
            let _ = writer.join();
        }
    }
}

// ── Built-in sinks ─────────────────────────────────────────────────

/// Keeps every snapshot in a shared vector. Clones share storage.
#[derive(Clone, Default)]
pub struct MemorySink {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of snapshots written so far.
    pub fn len(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&mut self, snapshot: &Snapshot) -> Result<(), OutputError> {
        self.snapshots
            .lock()
            .map_err(|_| OutputError::Sink {
                sink: "memory".into(),
                reason: "storage lock poisoned".into(),
            })?
            .push(snapshot.clone());
        Ok(())
    }
}

/// Writes one CSV row per fault face per snapshot.
///
/// Columns: `time,fault,slip,slip_rate,shear_traction,normal_stress,`
/// `state_variable,rupture_time,peak_slip_rate`. An unruptured face has
/// an empty `rupture_time`.
pub struct FaultCsvSink<W: Write + Send + 'static> {
    name: String,
    out: W,
    header_written: bool,
}

impl<W: Write + Send + 'static> FaultCsvSink<W> {
    /// Wrap a writer.
    pub fn new(name: impl Into<String>, out: W) -> Self {
        Self {
            name: name.into(),
            out,
            header_written: false,
        }
    }

    fn io(&self, source: std::io::Error) -> OutputError {
        OutputError::Io {
            sink: self.name.clone(),
            source,
        }
    }

    fn write_rows(&mut self, snapshot: &Snapshot) -> std::io::Result<()> {
        if !self.header_written {
            writeln!(
                self.out,
                "time,fault,slip,slip_rate,shear_traction,normal_stress,\
                 state_variable,rupture_time,peak_slip_rate"
            )?;
            self.header_written = true;
        }
        for f in &snapshot.faults {
            let rupture = f.rupture_time.map(|t| t.to_string()).unwrap_or_default();
            writeln!(
                self.out,
                "{},{},{},{},{},{},{},{},{}",
                snapshot.time,
                f.fault,
                f.slip,
                f.slip_rate,
                f.shear_traction,
                f.normal_stress,
                f.state_variable,
                rupture,
                f.peak_slip_rate
            )?;
        }
        Ok(())
    }
}

impl<W: Write + Send + 'static> OutputSink for FaultCsvSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, snapshot: &Snapshot) -> Result<(), OutputError> {
        self.write_rows(snapshot).map_err(|e| self.io(e))
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        self.out.flush().map_err(|e| self.io(e))
    }
}
