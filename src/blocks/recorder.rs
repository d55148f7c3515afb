//! Data recorder (sink) block.

use crate::block::Block;
use crate::TIME_EPSILON;

/// Recorder: stores gained samples of its input in memory.
///
/// The engine evaluates recorders once per committed step; with the default
/// negative sample period every step is stored, otherwise only sample
/// boundaries are. `max_len` bounds memory by dropping the oldest samples.
///
/// # Example
///
/// ```ignore
/// let probe = sim.add(Recorder::new());
/// sim.connect(signal, probe)?;
/// sim.initialize()?;
/// sim.simulate();
/// let samples = sim.recorder_data(probe).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Recorder {
    output: f64,
    input_gain: f64,
    period: f64,
    last_sample: f64,
    store: bool,
    max_len: Option<usize>,
    values: Vec<f64>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    /// Recorder storing every committed step.
    pub fn new() -> Self {
        Self {
            output: 0.0,
            input_gain: 1.0,
            period: -1.0,
            last_sample: 1.0,
            store: true,
            max_len: None,
            values: Vec::new(),
        }
    }

    /// Scale samples by `gain` before storing.
    pub fn with_input_gain(mut self, gain: f64) -> Self {
        self.input_gain = gain;
        self
    }

    /// Store only every `period` seconds.
    pub fn with_period(mut self, period: f64) -> Self {
        assert!(period > 0.0, "sample period must be positive");
        self.period = period;
        self.last_sample = -period;
        self
    }

    /// Keep at most `max_len` samples, dropping the oldest.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Stored samples, oldest first.
    pub fn data(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn set_period(&mut self, period: f64) {
        self.period = period;
        self.last_sample = if period > 0.0 { -period } else { 1.0 };
    }

    pub(crate) fn set_store(&mut self, store: bool) {
        self.store = store;
    }
}

impl Block for Recorder {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, t: f64, inputs: &[f64]) {
        if t - self.last_sample < self.period - TIME_EPSILON {
            return;
        }
        self.last_sample += self.period;
        self.output = self.input_gain * inputs[0];
        if !self.store {
            return;
        }
        self.values.push(self.output);
        if let Some(max) = self.max_len {
            if self.values.len() > max {
                self.values.remove(0);
            }
        }
    }

    fn reset(&mut self) {
        self.output = 0.0;
        self.last_sample = if self.period > 0.0 {
            -self.period
        } else {
            1.0
        };
        self.values.clear();
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(1)
    }
}
