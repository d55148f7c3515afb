//! blocksim - Block-diagram time-domain simulation engine
//!
//! Models lumped dynamical systems as directed graphs of scalar blocks
//! (sources, gains, sums, integrators, delays, recorders) and simulates them
//! with a fixed-step hybrid RK4 stepper: continuous states advance through
//! the classic four stages while sampled blocks stay frozen between committed
//! steps. Evaluation order is precomputed once into per-endpoint sequence
//! tables, and algebraic loops are rejected at initialize.
//!
//! # Example
//!
//! ```rust,ignore
//! use blocksim::prelude::*;
//!
//! // dx/dt = -x, x(0) = 1
//! let mut sim = Simulator::new();
//! let int = sim.add(Integrator::new(1.0));
//! let fb = sim.add(Gain::new(-1.0));
//! let rec = sim.add(Recorder::new());
//! sim.connect(int, fb)?;
//! sim.connect(fb, int)?;
//! sim.connect(int, rec)?;
//! sim.set_step_size(0.001);
//! sim.set_end_time(5.0);
//! sim.initialize()?;
//! sim.simulate();
//! ```

pub mod block;
pub mod block_kind;
pub mod blocks;
pub mod error;
pub mod graph;
mod sequence;
pub mod simulator;

pub use block::Block;
pub use block_kind::{BlockKind, Role};
pub use blocks::*;
pub use error::{Divergence, DivergencePolicy, GraphError, InitError};
pub use graph::{Graph, NodeId};
pub use simulator::Simulator;

/// Tolerance for comparing simulation times and sample boundaries.
pub const TIME_EPSILON: f64 = 1e-6;

/// Any endpoint output beyond this magnitude trips the divergence monitor.
pub const DIVERGENCE_LIMIT: f64 = 1e16;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::block::Block;
    pub use crate::blocks::*;
    pub use crate::error::{Divergence, DivergencePolicy, GraphError, InitError};
    pub use crate::graph::NodeId;
    pub use crate::simulator::Simulator;
}
