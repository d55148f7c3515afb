//! Core Block trait: the interface every leaf block exposes to the engine.

/// Interface between the scheduler and a leaf block.
///
/// Blocks are pure or stateful scalar operators. The engine owns the signal
/// graph; a block never holds references to other blocks. On every evaluation
/// the engine gathers the current outputs of the block's fan-in (in connection
/// order) and passes them as `inputs`.
///
/// # Example
///
/// ```ignore
/// pub struct Gain { gain: f64, output: f64 }
///
/// impl Block for Gain {
///     fn output(&self) -> f64 { self.output }
///     fn update(&mut self, _t: f64, inputs: &[f64]) {
///         self.output = self.gain * inputs[0];
///     }
///     fn reset(&mut self) { self.output = 0.0; }
///     fn max_inputs(&self) -> Option<usize> { Some(1) }
/// }
/// ```
pub trait Block {
    /// Current output value. Reading never recomputes.
    fn output(&self) -> f64;

    /// Evaluate the block at time `t` from the current fan-in values.
    ///
    /// State blocks (integrator) ignore this: the stepper writes their state
    /// directly. Sampled blocks only act at their sample boundaries.
    fn update(&mut self, t: f64, inputs: &[f64]);

    /// Restore the block to its pre-simulation state.
    fn reset(&mut self);

    /// Enable or disable a sampled block.
    ///
    /// The stepper disables sampled blocks during RK sub-stages so that
    /// sample-and-hold outputs and non-deterministic sources stay frozen
    /// between real time boundaries. Non-sampled blocks ignore this.
    fn set_enabled(&mut self, _enabled: bool) {}

    /// Fan-in capacity: `Some(0)` for sources, `Some(1)` for single-input
    /// blocks (reconnecting replaces the edge), `None` for unbounded
    /// (connecting appends a port).
    fn max_inputs(&self) -> Option<usize>;
}
