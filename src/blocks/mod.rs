//! Leaf-block library: the elementary operators wired into the signal graph.

mod delay;
mod integrator;
mod math;
mod recorder;
mod sources;

pub use delay::{TransportDelay, UnitDelay, ZeroOrderHold};
pub use integrator::Integrator;
pub use math::{Function, Gain, MisoFunction, Product, Sum};
pub use recorder::Recorder;
#[cfg(feature = "rand-support")]
pub use sources::Noise;
pub use sources::{Constant, Source};
