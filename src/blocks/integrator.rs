//! Integrator block: dy/dt = u

use crate::block::Block;

/// Integrator: dy/dt = u
///
/// The only continuous-state block. Its output *is* its state; the hybrid
/// stepper reads the derivative from the block wired to its input and writes
/// the state back through [`set_value`](Integrator::set_value) during the RK4
/// sub-stages, so `update` is intentionally a no-op.
#[derive(Debug, Clone)]
pub struct Integrator {
    value: f64,
    initial: f64,
}

impl Integrator {
    /// Create an integrator with the given initial value.
    pub fn new(initial: f64) -> Self {
        Self {
            value: initial,
            initial,
        }
    }

    /// Current state value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Overwrite the state. Called by the stepper between RK stages.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}

impl Block for Integrator {
    fn output(&self) -> f64 {
        self.value
    }

    fn update(&mut self, _t: f64, _inputs: &[f64]) {
        // State advances only through set_value in the stepper.
    }

    fn reset(&mut self) {
        self.value = self.initial;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_leaves_state_untouched() {
        let mut int = Integrator::new(5.0);
        int.update(0.0, &[100.0]);
        assert_eq!(int.output(), 5.0);
    }

    #[test]
    fn reset_restores_initial() {
        let mut int = Integrator::new(3.0);
        int.set_value(7.5);
        assert_eq!(int.output(), 7.5);
        int.reset();
        assert_eq!(int.output(), 3.0);
    }
}
