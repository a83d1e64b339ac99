//! Error types for adoptsim.
//!
//! All errors are strongly typed using thiserror. The taxonomy is layered:
//! configuration problems are rejected before any simulation runs, simulation
//! problems carry the member/trial that caused them, and oracle problems are
//! always recovered locally by the explorer (a branch with no proposals),
//! never fatal to a run.

use thiserror::Error;

use crate::explore::NodeId;
use crate::scorecard::Dimension;

/// Configuration errors detected at run start, before any simulation.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigurationError {
    #[error("beam_width must be >= 1, got {value}")]
    InvalidBeamWidth { value: usize },

    #[error("max_depth must be >= 1, got {value}")]
    InvalidMaxDepth { value: usize },

    #[error("branch_factor must be >= 1, got {value}")]
    InvalidBranchFactor { value: usize },

    #[error("trial_count {value} is outside [{min}, {max}]")]
    TrialCountOutOfRange {
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("dimension score {value} for {dimension} is out of range [0.0, 1.0]")]
    ScoreOutOfRange { dimension: Dimension, value: f64 },

    #[error("bounds for {dimension} are inconsistent: lower {lower} > upper {upper}")]
    InvalidBounds {
        dimension: Dimension,
        lower: f64,
        upper: f64,
    },

    #[error("score {value} for {dimension} violates declared bounds [{lower}, {upper}]")]
    ScoreOutsideBounds {
        dimension: Dimension,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("task_criticality {value} is out of range [0.0, 1.0]")]
    CriticalityOutOfRange { value: f64 },
}

/// Errors raised while simulating a population.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SimError {
    #[error("population has no members to simulate")]
    EmptyPopulation,

    #[error("trial failed for member {member_id}: {reason}")]
    Trial { member_id: u64, reason: String },

    #[error("population '{population_id}' could not be loaded: {reason}")]
    PopulationUnavailable {
        population_id: String,
        reason: String,
    },
}

/// Errors from the action-proposal oracle.
///
/// Both variants are recovered by the explorer as "no candidate from this
/// branch"; they carry the node context so a failed branch can be
/// reconstructed from logs.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum OracleError {
    #[error("oracle call for node {node_id} at depth {depth} timed out after {waited_ms}ms")]
    Timeout {
        node_id: NodeId,
        depth: usize,
        waited_ms: u64,
    },

    #[error("oracle call for node {node_id} at depth {depth} failed: {reason}")]
    Failure {
        node_id: NodeId,
        depth: usize,
        reason: String,
    },
}

/// Top-level error type for exploration runs.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ExploreError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Run {run_id} not found")]
    RunNotFound { run_id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ExploreError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a simulation error.
    #[must_use]
    pub const fn is_simulation(&self) -> bool {
        matches!(self, Self::Simulation(_))
    }

    /// Returns true if the explorer recovers from this error locally
    /// instead of failing the run.
    #[must_use]
    pub const fn is_branch_local(&self) -> bool {
        matches!(self, Self::Oracle(_))
    }
}

/// Result type alias for exploration operations.
pub type ExploreResult<T> = Result<T, ExploreError>;
