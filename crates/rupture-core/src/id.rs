//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a volume element.
///
/// Elements are created at setup from mesh data and assigned sequential
/// IDs. `ElementId(n)` indexes the n-th entry of every per-element table
/// (stable time step, initial state, topology links).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

impl ElementId {
    /// The element's position in per-element tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ElementId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a fault face.
///
/// `FaultId(n)` corresponds to the n-th fault face passed at setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultId(pub u32);

impl FaultId {
    /// The face's position in per-fault tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FaultId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Rate level of a time-step cluster.
///
/// Level 0 is the finest cluster (`Δt_min`); level `c` steps with
/// `rate^c · Δt_min`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterLevel(pub u32);

impl ClusterLevel {
    /// The cluster's position in per-cluster tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a face local to its element (0..faces-per-element).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalFace(pub u8);

impl fmt::Display for LocalFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
