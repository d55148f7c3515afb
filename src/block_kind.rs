//! BlockKind: closed dispatch enum over all leaf-block types.
//!
//! The engine stores heterogeneous blocks in one arena and special-cases
//! integrators, unit delays and recorders during scheduling and stepping.
//! Instead of runtime type inspection, every node carries this closed enum
//! and a [`Role`] derived from it, dispatched via exhaustive matching.

use crate::block::Block;
use crate::blocks::*;

/// Delegates a Block method to the wrapped concrete block.
macro_rules! dispatch_method {
    ($self:ident, $method:ident $(, $args:expr)*) => {
        match $self {
            BlockKind::Constant(b) => b.$method($($args),*),
            BlockKind::Source(b) => b.$method($($args),*),
            #[cfg(feature = "rand-support")]
            BlockKind::Noise(b) => b.$method($($args),*),
            BlockKind::Gain(b) => b.$method($($args),*),
            BlockKind::Sum(b) => b.$method($($args),*),
            BlockKind::Product(b) => b.$method($($args),*),
            BlockKind::Function(b) => b.$method($($args),*),
            BlockKind::MisoFunction(b) => b.$method($($args),*),
            BlockKind::Integrator(b) => b.$method($($args),*),
            BlockKind::UnitDelay(b) => b.$method($($args),*),
            BlockKind::ZeroOrderHold(b) => b.$method($($args),*),
            BlockKind::TransportDelay(b) => b.$method($($args),*),
            BlockKind::Recorder(b) => b.$method($($args),*),
        }
    };
}

/// Scheduling class of a node, fixed at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Pure pass-through; evaluated through sequence tables.
    Ordinary,
    /// Integrator; endpoint advanced by the RK4 stepper.
    ContinuousState,
    /// Unit delay; endpoint committed at sample instants.
    DiscreteState,
    /// Recorder; endpoint evaluated once per committed step.
    Sink,
}

/// Type-erased enum wrapping all block types.
#[derive(Debug)]
pub enum BlockKind {
    // Sources
    Constant(Constant),
    Source(Source),
    #[cfg(feature = "rand-support")]
    Noise(Noise),

    // Combinational
    Gain(Gain),
    Sum(Sum),
    Product(Product),
    Function(Function),
    MisoFunction(MisoFunction),

    // State
    Integrator(Integrator),
    UnitDelay(UnitDelay),
    ZeroOrderHold(ZeroOrderHold),
    TransportDelay(TransportDelay),

    // Sinks
    Recorder(Recorder),
}

impl BlockKind {
    /// Scheduling class. Everything except integrators, unit delays and
    /// recorders is combinational from the scheduler's point of view.
    pub fn role(&self) -> Role {
        match self {
            BlockKind::Integrator(_) => Role::ContinuousState,
            BlockKind::UnitDelay(_) => Role::DiscreteState,
            BlockKind::Recorder(_) => Role::Sink,
            _ => Role::Ordinary,
        }
    }

    /// Short kind name, used for auto-generated node names and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BlockKind::Constant(_) => "const",
            BlockKind::Source(_) => "source",
            #[cfg(feature = "rand-support")]
            BlockKind::Noise(_) => "noise",
            BlockKind::Gain(_) => "gain",
            BlockKind::Sum(_) => "sum",
            BlockKind::Product(_) => "product",
            BlockKind::Function(_) => "fcn",
            BlockKind::MisoFunction(_) => "miso",
            BlockKind::Integrator(_) => "integrator",
            BlockKind::UnitDelay(_) => "unitdelay",
            BlockKind::ZeroOrderHold(_) => "zoh",
            BlockKind::TransportDelay(_) => "transportdelay",
            BlockKind::Recorder(_) => "recorder",
        }
    }

    /// True for blocks frozen during RK sub-stages: sample-and-hold and
    /// sampled (non-deterministic or data-replaying) sources.
    pub fn is_sampled(&self) -> bool {
        match self {
            BlockKind::ZeroOrderHold(_) => true,
            BlockKind::Source(src) => src.is_sampled(),
            #[cfg(feature = "rand-support")]
            BlockKind::Noise(_) => true,
            _ => false,
        }
    }
}

impl Block for BlockKind {
    fn output(&self) -> f64 {
        dispatch_method!(self, output)
    }

    fn update(&mut self, t: f64, inputs: &[f64]) {
        dispatch_method!(self, update, t, inputs)
    }

    fn reset(&mut self) {
        dispatch_method!(self, reset)
    }

    fn set_enabled(&mut self, enabled: bool) {
        dispatch_method!(self, set_enabled, enabled)
    }

    fn max_inputs(&self) -> Option<usize> {
        dispatch_method!(self, max_inputs)
    }
}

// From implementations so `sim.add(Gain::new(2.0))` reads naturally.

macro_rules! impl_from_block {
    ($($(#[$attr:meta])* $block:ident),* $(,)?) => {
        $(
            $(#[$attr])*
            impl From<$block> for BlockKind {
                fn from(block: $block) -> Self {
                    BlockKind::$block(block)
                }
            }
        )*
    };
}

impl_from_block!(
    Constant,
    Source,
    #[cfg(feature = "rand-support")]
    Noise,
    Gain,
    Sum,
    Product,
    Function,
    MisoFunction,
    Integrator,
    UnitDelay,
    ZeroOrderHold,
    TransportDelay,
    Recorder,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_follow_block_type() {
        assert_eq!(BlockKind::from(Gain::new(1.0)).role(), Role::Ordinary);
        assert_eq!(
            BlockKind::from(Integrator::new(0.0)).role(),
            Role::ContinuousState
        );
        assert_eq!(
            BlockKind::from(UnitDelay::new(0.0, 1.0)).role(),
            Role::DiscreteState
        );
        assert_eq!(BlockKind::from(Recorder::new()).role(), Role::Sink);
    }

    #[test]
    fn sampled_set_covers_holds_and_discrete_sources() {
        assert!(BlockKind::from(ZeroOrderHold::new(1.0)).is_sampled());
        assert!(BlockKind::from(Source::discrete(vec![1.0], 1.0)).is_sampled());
        assert!(!BlockKind::from(Source::new(|t| t)).is_sampled());
        assert!(!BlockKind::from(Constant::new(1.0)).is_sampled());
    }

    #[test]
    fn dispatch_reaches_wrapped_block() {
        let mut block = BlockKind::from(Gain::new(3.0));
        block.update(0.0, &[2.0]);
        assert_eq!(block.output(), 6.0);
    }
}
