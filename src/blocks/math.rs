//! Combinational math blocks: gain, sum, product, user functions.

use std::fmt;

use crate::block::Block;

/// Gain: y = k * u
#[derive(Debug, Clone)]
pub struct Gain {
    gain: f64,
    output: f64,
}

impl Gain {
    pub fn new(gain: f64) -> Self {
        Self { gain, output: 0.0 }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl Block for Gain {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, _t: f64, inputs: &[f64]) {
        self.output = self.gain * inputs[0];
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}

/// Weighted sum: y = sum(gains[i] * inputs[i])
///
/// Port gains default to 1.0 and grow with each connection; use
/// [`Simulator::connect_weighted`](crate::Simulator::connect_weighted) or
/// [`Simulator::set_input_gain`](crate::Simulator::set_input_gain) to change
/// them. With `prune_zero_gain` set, ports whose gain is exactly 0.0 are
/// removed at initialize so they cost nothing per step.
#[derive(Debug, Clone, Default)]
pub struct Sum {
    gains: Vec<f64>,
    output: f64,
    prune_zero_gain: bool,
}

impl Sum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove zero-gain ports at initialize.
    pub fn prune_zero_gain(mut self) -> Self {
        self.prune_zero_gain = true;
        self
    }

    pub(crate) fn should_prune(&self) -> bool {
        self.prune_zero_gain
    }

    pub(crate) fn gains(&self) -> &[f64] {
        &self.gains
    }

    pub(crate) fn gains_mut(&mut self) -> &mut Vec<f64> {
        &mut self.gains
    }

    pub(crate) fn push_port(&mut self) {
        self.gains.push(1.0);
    }
}

impl Block for Sum {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, _t: f64, inputs: &[f64]) {
        let mut acc = 0.0;
        for (gain, value) in self.gains.iter().zip(inputs) {
            acc += gain * value;
        }
        self.output = acc;
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }

    fn max_inputs(&self) -> Option<usize> {
        None
    }
}

/// Weighted product: y = prod(gains[i] * inputs[i])
#[derive(Debug, Clone, Default)]
pub struct Product {
    gains: Vec<f64>,
    output: f64,
}

impl Product {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gains_mut(&mut self) -> &mut Vec<f64> {
        &mut self.gains
    }

    pub(crate) fn push_port(&mut self) {
        self.gains.push(1.0);
    }
}

impl Block for Product {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, _t: f64, inputs: &[f64]) {
        let mut acc = 1.0;
        for (gain, value) in self.gains.iter().zip(inputs) {
            acc *= gain * value;
        }
        self.output = acc;
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }

    fn max_inputs(&self) -> Option<usize> {
        None
    }
}

/// Single-input user function: y = f(u)
///
/// # Example
///
/// ```ignore
/// let sq = sim.add(Function::new(|u| u * u));
/// ```
pub struct Function {
    f: Box<dyn Fn(f64) -> f64 + Send + Sync>,
    output: f64,
}

impl Function {
    pub fn new(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            f: Box::new(f),
            output: 0.0,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Block for Function {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, _t: f64, inputs: &[f64]) {
        self.output = (self.f)(inputs[0]);
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}

/// Multi-input user function: y = f(inputs)
///
/// Inputs arrive in connection order.
pub struct MisoFunction {
    f: Box<dyn Fn(&[f64]) -> f64 + Send + Sync>,
    output: f64,
}

impl MisoFunction {
    pub fn new(f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            f: Box::new(f),
            output: 0.0,
        }
    }
}

impl fmt::Debug for MisoFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MisoFunction")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Block for MisoFunction {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, _t: f64, inputs: &[f64]) {
        self.output = (self.f)(inputs);
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }

    fn max_inputs(&self) -> Option<usize> {
        None
    }
}
