//! Static assignment of elements to time-step clusters.
//!
//! With rate `r` and the global minimum stable step `Δt_min`, cluster
//! `c` steps with `Δt_c = r^c · Δt_min`. Each element joins the largest
//! `c` with `Δt_c <= Δt_e`, so it never steps past its own stability
//! bound. An element whose bound lands exactly on a cluster boundary
//! joins the coarser cluster. Level 0 is the finest cluster.
//!
//! Assignment happens once, before the time loop; the layout is
//! immutable afterwards.

use rupture_core::{ClusterLevel, ElementId, SetupError, StableTimestepOracle};
use tracing::info;

/// Largest step in ticks. `r^c` must stay exact in `f64` and `u64`.
const MAX_STEP_TICKS: u64 = 1 << 52;

/// Deepest level with `r^c <= 2^52` for this rate.
fn level_limit(rate: u32) -> u32 {
    if rate < 2 {
        return 0;
    }
    let r = u64::from(rate);
    let mut level = 0;
    let mut ticks = 1;
    while ticks <= MAX_STEP_TICKS / r {
        ticks *= r;
        level += 1;
    }
    level
}

/// Element-to-cluster assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterLayout {
    rate: u32,
    dt_min: f64,
    levels: Vec<ClusterLevel>,
    members: Vec<Vec<ElementId>>,
}

/// Per-cluster summary for setup logging.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterStats {
    /// The cluster.
    pub level: ClusterLevel,
    /// Number of member elements.
    pub elements: usize,
    /// The cluster's time step `r^c · Δt_min`.
    pub dt: f64,
}

/// Assign every element of a mesh to a cluster.
///
/// `max_level` caps the coarsest cluster; elements that would land
/// coarser are clamped onto it (still stable, just not maximally
/// coarse). Without a cap the level stops where `r^c` would pass
/// `2^52`. `rate == 1` puts every element in cluster 0, which is
/// global time stepping.
///
/// # Errors
///
/// - [`SetupError::NoElements`] if `element_count == 0`.
/// - [`SetupError::InvalidRate`] if `rate == 0`.
/// - [`SetupError::MissingTimestep`] if the oracle has no value for an
///   element.
/// - [`SetupError::InvalidTimestep`] for a non-positive or non-finite
///   value.
pub fn assign_clusters<O>(
    oracle: &O,
    element_count: usize,
    rate: u32,
    max_level: Option<u32>,
) -> Result<ClusterLayout, SetupError>
where
    O: StableTimestepOracle + ?Sized,
{
    if element_count == 0 {
        return Err(SetupError::NoElements);
    }
    if rate == 0 {
        return Err(SetupError::InvalidRate { rate });
    }

    let mut dts = Vec::with_capacity(element_count);
    for i in 0..element_count {
        let element = ElementId(i as u32);
        let dt = oracle
            .stable_dt(element)
            .ok_or(SetupError::MissingTimestep { element })?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SetupError::InvalidTimestep { element, value: dt });
        }
        dts.push(dt);
    }
    let dt_min = dts.iter().copied().fold(f64::INFINITY, f64::min);

    let limit = level_limit(rate);
    let cap = max_level.map_or(limit, |m| m.min(limit));
    let ratio = f64::from(rate);
    let mut levels = Vec::with_capacity(element_count);
    let mut coarsest = 0;
    for &dt in &dts {
        let mut level = 0;
        if rate > 1 {
            // Powers of an integer rate are exact, so the comparison has
            // a single rounding (in the product) and ties stay ties.
            let mut factor = 1.0;
            while level < cap && factor * ratio * dt_min <= dt {
                factor *= ratio;
                level += 1;
            }
        }
        coarsest = coarsest.max(level);
        levels.push(ClusterLevel(level));
    }

    let mut members = vec![Vec::new(); coarsest as usize + 1];
    for (i, level) in levels.iter().enumerate() {
        members[level.index()].push(ElementId(i as u32));
    }

    Ok(ClusterLayout {
        rate,
        dt_min,
        levels,
        members,
    })
}

impl ClusterLayout {
    /// The LTS rate `r`.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Global minimum stable time step.
    pub fn dt_min(&self) -> f64 {
        self.dt_min
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of cluster levels, including empty intermediate ones.
    pub fn cluster_count(&self) -> usize {
        self.members.len()
    }

    /// The coarsest level, `C_max`.
    pub fn coarsest(&self) -> ClusterLevel {
        ClusterLevel(self.members.len() as u32 - 1)
    }

    /// Cluster of `element`.
    ///
    /// # Panics
    ///
    /// Panics if `element` is out of range.
    pub fn level(&self, element: ElementId) -> ClusterLevel {
        self.levels[element.index()]
    }

    /// Members of `level` in ascending element order. Empty for levels
    /// past the coarsest.
    pub fn members(&self, level: ClusterLevel) -> &[ElementId] {
        self.members
            .get(level.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ticks of the finest step per step of `level`, i.e. `r^level`.
    pub fn step_ticks(&self, level: ClusterLevel) -> u64 {
        u64::from(self.rate).pow(level.0)
    }

    /// Time step of `level` in units of `Δt_min`.
    pub fn dt(&self, level: ClusterLevel) -> f64 {
        self.step_ticks(level) as f64 * self.dt_min
    }

    /// Per-level summary, finest first.
    pub fn stats(&self) -> Vec<ClusterStats> {
        self.members
            .iter()
            .enumerate()
            .map(|(c, m)| ClusterStats {
                level: ClusterLevel(c as u32),
                elements: m.len(),
                dt: self.dt(ClusterLevel(c as u32)),
            })
            .collect()
    }

    /// Element updates saved relative to global time stepping.
    ///
    /// Over one coarsest step, GTS performs `N · r^C_max` element updates
    /// while LTS performs `Σ_c N_c · r^(C_max - c)`.
    pub fn theoretical_speedup(&self) -> f64 {
        let top = self.coarsest();
        let gts = self.element_count() as f64 * self.step_ticks(top) as f64;
        let lts: f64 = self
            .members
            .iter()
            .enumerate()
            .map(|(c, m)| {
                let per_coarse = self.step_ticks(top) / self.step_ticks(ClusterLevel(c as u32));
                m.len() as f64 * per_coarse as f64
            })
            .sum();
        gts / lts
    }

    /// Log the per-cluster distribution at `info`.
    pub fn log_summary(&self) {
        for s in self.stats() {
            info!(
                level = s.level.0,
                elements = s.elements,
                dt = s.dt,
                "time-step cluster"
            );
        }
        info!(
            rate = self.rate,
            clusters = self.cluster_count(),
            dt_min = self.dt_min,
            speedup = self.theoretical_speedup(),
            "cluster assignment complete"
        );
    }
}
