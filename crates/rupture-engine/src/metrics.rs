//! Cumulative run metrics.
//!
//! [`RunMetrics`] counts the work done by the scheduler and the output
//! stage since the simulation was built. The scheduler updates it after
//! every sub-step; the run driver adds the output counters and wall
//! time before handing it back in the run summary.

use rupture_core::ClusterLevel;

/// Work counters accumulated over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunMetrics {
    /// Sub-steps per cluster level, finest first.
    pub cluster_substeps: Vec<u64>,
    /// Element updates across all clusters.
    pub element_updates: u64,
    /// Fault face resolutions.
    pub fault_resolutions: u64,
    /// Friction solves that needed the relaxed retry.
    pub friction_retries: u64,
    /// Snapshots that found a sink's buffer full.
    pub backpressure_events: u64,
    /// Snapshots delivered to the output stage.
    pub snapshots_emitted: u64,
    /// Wall-clock time spent advancing, in microseconds.
    pub advance_us: u64,
}

impl RunMetrics {
    /// Metrics for a layout with `cluster_count` levels.
    pub fn new(cluster_count: usize) -> Self {
        Self {
            cluster_substeps: vec![0; cluster_count],
            ..Default::default()
        }
    }

    /// Sub-steps taken by `level` (0 for unknown levels).
    pub fn substeps(&self, level: ClusterLevel) -> u64 {
        self.cluster_substeps
            .get(level.index())
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn record_substep(&mut self, level: ClusterLevel, elements: usize) {
        if let Some(n) = self.cluster_substeps.get_mut(level.index()) {
            *n += 1;
        }
        self.element_updates += elements as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = RunMetrics::default();
        assert!(m.cluster_substeps.is_empty());
        assert_eq!(m.element_updates, 0);
        assert_eq!(m.fault_resolutions, 0);
        assert_eq!(m.friction_retries, 0);
        assert_eq!(m.backpressure_events, 0);
        assert_eq!(m.snapshots_emitted, 0);
        assert_eq!(m.advance_us, 0);
    }

    #[test]
    fn substeps_counted_per_level() {
        let mut m = RunMetrics::new(2);
        m.record_substep(ClusterLevel(0), 3);
        m.record_substep(ClusterLevel(0), 3);
        m.record_substep(ClusterLevel(1), 5);
        assert_eq!(m.substeps(ClusterLevel(0)), 2);
        assert_eq!(m.substeps(ClusterLevel(1)), 1);
        assert_eq!(m.substeps(ClusterLevel(7)), 0);
        assert_eq!(m.element_updates, 11);
    }
}
