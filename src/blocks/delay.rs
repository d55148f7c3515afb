//! Discrete-time delay blocks: unit delay, zero-order hold, transport delay.

use std::collections::VecDeque;

use crate::block::Block;
use crate::TIME_EPSILON;

/// Unit delay: y[k] = u[k-1] at sample period T.
///
/// The only discrete-state block. It is updated in two phases per committed
/// step: [`commit_output`](UnitDelay::commit_output) publishes the value held
/// from the previous sample instant, then `update` (run through the sequence
/// table) samples the current input for the next instant. The commit is
/// independent of the enable state.
#[derive(Debug, Clone)]
pub struct UnitDelay {
    output: f64,
    held: f64,
    initial: f64,
    period: f64,
    last_sample: f64,
}

impl UnitDelay {
    /// Unit delay with initial output and sample period.
    pub fn new(initial: f64, period: f64) -> Self {
        assert!(period > 0.0, "sample period must be positive");
        Self {
            output: initial,
            held: initial,
            initial,
            period,
            last_sample: -period,
        }
    }

    /// Publish the held value if `t` is at or past the next sample instant.
    pub(crate) fn commit_output(&mut self, t: f64) {
        if t - self.last_sample < self.period - TIME_EPSILON {
            return;
        }
        self.output = self.held;
    }
}

impl Block for UnitDelay {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, t: f64, inputs: &[f64]) {
        if t - self.last_sample < self.period - TIME_EPSILON {
            return;
        }
        self.last_sample += self.period;
        self.held = inputs[0];
    }

    fn reset(&mut self) {
        self.output = self.initial;
        self.held = self.initial;
        self.last_sample = -self.period;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}

/// Zero-order hold: samples its input every `period` and holds it.
///
/// Frozen (via `set_enabled(false)`) during RK sub-stages so downstream
/// continuous dynamics see one constant value per step.
#[derive(Debug, Clone)]
pub struct ZeroOrderHold {
    output: f64,
    period: f64,
    last_sample: f64,
    enabled: bool,
}

impl ZeroOrderHold {
    pub fn new(period: f64) -> Self {
        assert!(period > 0.0, "sample period must be positive");
        Self {
            output: 0.0,
            period,
            last_sample: -period,
            enabled: true,
        }
    }
}

impl Block for ZeroOrderHold {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, t: f64, inputs: &[f64]) {
        if !self.enabled {
            return;
        }
        if t - self.last_sample < self.period - TIME_EPSILON {
            return;
        }
        self.last_sample += self.period;
        self.output = inputs[0];
    }

    fn reset(&mut self) {
        self.output = 0.0;
        self.last_sample = -self.period;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}

/// Transport delay: y(t) = u(t - delay), quantized to whole steps.
///
/// The delay is resolved to `round(delay / step)` FIFO slots against the
/// final step size at initialize, so it must be added before `initialize`
/// and sees the step size actually used. The FIFO shifts once per committed
/// step; during RK sub-stages the output holds.
#[derive(Debug, Clone)]
pub struct TransportDelay {
    output: f64,
    initial: f64,
    delay: f64,
    queue: VecDeque<f64>,
    step: f64,
    next_shift: f64,
}

impl TransportDelay {
    /// Delay `delay` seconds, outputting `initial` until the first delayed
    /// sample emerges.
    pub fn new(delay: f64, initial: f64) -> Self {
        assert!(delay >= 0.0, "delay must be non-negative");
        Self {
            output: initial,
            initial,
            delay,
            queue: VecDeque::new(),
            step: 0.0,
            next_shift: 0.0,
        }
    }

    /// Size the FIFO against the simulation step. Called at initialize.
    pub(crate) fn resolve(&mut self, step: f64) {
        let slots = (self.delay / step + 0.5) as usize;
        if slots == 0 {
            log::warn!("transport delay shorter than one step; acting as pass-through");
        }
        self.queue = std::iter::repeat(self.initial).take(slots).collect();
        self.step = step;
        self.next_shift = step;
        self.output = self.initial;
    }
}

impl Block for TransportDelay {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, t: f64, inputs: &[f64]) {
        // Fires once per full step even though integrator tables re-evaluate
        // it during sub-stages.
        if t < self.next_shift - TIME_EPSILON {
            return;
        }
        self.next_shift += self.step;
        match self.queue.pop_front() {
            Some(value) => {
                self.output = value;
                self.queue.push_back(inputs[0]);
            }
            None => self.output = inputs[0],
        }
    }

    fn reset(&mut self) {
        for slot in self.queue.iter_mut() {
            *slot = self.initial;
        }
        self.next_shift = self.step;
        self.output = self.initial;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_delay_publishes_previous_sample() {
        let mut ud = UnitDelay::new(0.0, 1.0);

        // t = 0: commit publishes the initial value, update samples 5.0.
        ud.commit_output(0.0);
        assert_eq!(ud.output(), 0.0);
        ud.update(0.0, &[5.0]);
        assert_eq!(ud.output(), 0.0);

        // Mid-period: neither phase fires.
        ud.commit_output(0.5);
        ud.update(0.5, &[9.0]);
        assert_eq!(ud.output(), 0.0);

        // t = 1: the value sampled at t = 0 appears.
        ud.commit_output(1.0);
        assert_eq!(ud.output(), 5.0);
    }

    #[test]
    fn zoh_holds_between_samples() {
        let mut zoh = ZeroOrderHold::new(1.0);
        zoh.update(0.0, &[3.0]);
        assert_eq!(zoh.output(), 3.0);
        zoh.update(0.5, &[8.0]);
        assert_eq!(zoh.output(), 3.0);
        zoh.update(1.0, &[8.0]);
        assert_eq!(zoh.output(), 8.0);
    }

    #[test]
    fn zoh_frozen_while_disabled() {
        let mut zoh = ZeroOrderHold::new(1.0);
        zoh.update(0.0, &[3.0]);
        zoh.set_enabled(false);
        zoh.update(1.0, &[8.0]);
        assert_eq!(zoh.output(), 3.0);
    }

    #[test]
    fn transport_delay_shifts_whole_steps() {
        let mut td = TransportDelay::new(0.3, 0.0);
        td.resolve(0.1);

        // Three slots: input emerges three shifts later.
        let inputs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut out = Vec::new();
        for (k, &u) in inputs.iter().enumerate() {
            td.update((k + 1) as f64 * 0.1, &[u]);
            out.push(td.output());
        }
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn transport_delay_reset_rewinds_clock() {
        let mut td = TransportDelay::new(0.2, 0.0);
        td.resolve(0.1);
        td.update(0.1, &[1.0]);
        td.update(0.2, &[2.0]);
        td.update(0.3, &[3.0]);
        assert_eq!(td.output(), 1.0);

        td.reset();
        assert_eq!(td.output(), 0.0);
        // The shift clock restarts from one step.
        td.update(0.1, &[7.0]);
        assert_eq!(td.output(), 0.0);
        td.update(0.2, &[8.0]);
        td.update(0.3, &[9.0]);
        assert_eq!(td.output(), 7.0);
    }
}
