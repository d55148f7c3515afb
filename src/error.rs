//! Error types and divergence handling policy.

use thiserror::Error;

/// Errors raised while wiring the signal graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node id does not belong to this simulator.
    #[error("unknown node id {0}")]
    UnknownNode(usize),
    /// The target block is a source and accepts no input connections.
    #[error("node '{0}' is a source and has no input ports")]
    NoInputPorts(String),
    /// An explicit port index is past the block's fan-in capacity.
    #[error("port {port} out of range for node '{node}' (capacity {capacity})")]
    PortOutOfRange {
        node: String,
        port: usize,
        capacity: usize,
    },
}

/// Errors raised by `initialize`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitError {
    /// The fixed step size must be strictly positive.
    #[error("step size {0} is not positive")]
    NonPositiveStep(f64),
    /// A cycle of combinational blocks with no state block to break it.
    #[error("algebraic loop through: {}", nodes.join(" -> "))]
    AlgebraicLoop {
        /// Node names along the loop, in evaluation order.
        nodes: Vec<String>,
    },
}

/// Numeric failure detected after a committed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Divergence {
    #[error("signal diverged to +infinity")]
    PositiveInfinity,
    #[error("signal diverged to -infinity")]
    NegativeInfinity,
    #[error("signal became NaN")]
    NotANumber,
}

/// What `simulate` does when the divergence monitor trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DivergencePolicy {
    /// Log the failure and abort the process.
    #[default]
    Abort,
    /// Log a warning on every diverged step and keep going.
    WarnContinue,
    /// Keep going silently.
    Continue,
    /// Stop the run and log the failure.
    StopReport,
    /// Stop the run silently.
    Stop,
}
