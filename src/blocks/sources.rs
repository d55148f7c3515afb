//! Source blocks: constants, time functions, sampled data, noise.

use std::fmt;

use crate::block::Block;
use crate::TIME_EPSILON;

/// Constant source: y = value
#[derive(Debug, Clone)]
pub struct Constant {
    value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Block for Constant {
    fn output(&self) -> f64 {
        self.value
    }

    fn update(&mut self, _t: f64, _inputs: &[f64]) {}

    fn reset(&mut self) {}

    fn max_inputs(&self) -> Option<usize> {
        Some(0)
    }
}

enum SourceKind {
    /// y = f(t), re-evaluated at every evaluation including RK sub-stages.
    Continuous(Box<dyn Fn(f64) -> f64 + Send + Sync>),
    /// Replays `data` one sample per `period`, holding between samples.
    /// Frozen during RK sub-stages.
    Discrete { data: Vec<f64>, period: f64, index: isize },
}

/// Signal source, either a continuous function of time or sampled data.
///
/// # Example
///
/// ```ignore
/// let sine = sim.add(Source::new(|t| (2.0 * PI * t).sin()));
/// let steps = sim.add(Source::discrete(vec![0.0, 1.0, 4.0], 0.5));
/// ```
pub struct Source {
    output: f64,
    kind: SourceKind,
    enabled: bool,
}

impl Source {
    /// Continuous source from a function of time.
    pub fn new(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            output: 0.0,
            kind: SourceKind::Continuous(Box::new(f)),
            enabled: true,
        }
    }

    /// Discrete source replaying `data` at sample period `period`.
    pub fn discrete(data: Vec<f64>, period: f64) -> Self {
        assert!(period > 0.0, "sample period must be positive");
        Self {
            output: 0.0,
            kind: SourceKind::Discrete {
                data,
                period,
                index: -1,
            },
            enabled: true,
        }
    }

    pub(crate) fn is_sampled(&self) -> bool {
        matches!(self.kind, SourceKind::Discrete { .. })
    }

    pub(crate) fn has_data(&self) -> bool {
        match &self.kind {
            SourceKind::Continuous(_) => true,
            SourceKind::Discrete { data, .. } => !data.is_empty(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("output", &self.output)
            .field("sampled", &self.is_sampled())
            .finish_non_exhaustive()
    }
}

impl Block for Source {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, t: f64, _inputs: &[f64]) {
        match &mut self.kind {
            SourceKind::Continuous(f) => self.output = f(t),
            SourceKind::Discrete {
                data,
                period,
                index,
            } => {
                if !self.enabled {
                    return;
                }
                if t - *index as f64 * *period < *period - TIME_EPSILON {
                    return;
                }
                *index += 1;
                if let Some(&value) = data.get(*index as usize) {
                    self.output = value;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.output = 0.0;
        if let SourceKind::Discrete { index, .. } = &mut self.kind {
            *index = -1;
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(0)
    }
}

/// Gaussian noise source.
///
/// Generates `std_dev * N(0, 1) + mean`. With a sample period the value is
/// redrawn only at sample boundaries (zero-order hold between them); with a
/// negative period (the default) it is redrawn at every committed step. In
/// both cases the source is frozen during RK sub-stages so a step sees one
/// consistent draw.
///
/// A seeded source reseeds on reset, so a reset-and-rerun reproduces the same
/// sequence bit for bit. An unseeded source keeps its entropy stream.
#[cfg(feature = "rand-support")]
pub struct Noise {
    output: f64,
    mean: f64,
    std_dev: f64,
    period: f64,
    last_sample: f64,
    enabled: bool,
    seed: Option<u64>,
    rng: rand::rngs::StdRng,
}

#[cfg(feature = "rand-support")]
impl Noise {
    /// Noise with the given mean and standard deviation, redrawn every step.
    pub fn new(mean: f64, std_dev: f64, seed: Option<u64>) -> Self {
        use rand::SeedableRng;

        assert!(std_dev >= 0.0, "standard deviation must be non-negative");
        let rng = match seed {
            Some(s) => rand::rngs::StdRng::seed_from_u64(s),
            None => rand::rngs::StdRng::from_entropy(),
        };
        Self {
            output: 0.0,
            mean,
            std_dev,
            period: -1.0,
            last_sample: 1.0,
            enabled: true,
            seed,
            rng,
        }
    }

    /// Redraw only every `period` seconds instead of every step.
    pub fn with_period(mut self, period: f64) -> Self {
        assert!(period > 0.0, "sample period must be positive");
        self.period = period;
        self.last_sample = -period;
        self
    }
}

#[cfg(feature = "rand-support")]
impl fmt::Debug for Noise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Noise")
            .field("mean", &self.mean)
            .field("std_dev", &self.std_dev)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "rand-support")]
impl Block for Noise {
    fn output(&self) -> f64 {
        self.output
    }

    fn update(&mut self, t: f64, _inputs: &[f64]) {
        use rand::Rng;
        use rand_distr::StandardNormal;

        if !self.enabled {
            return;
        }
        if t - self.last_sample < self.period - TIME_EPSILON {
            return;
        }
        self.last_sample += self.period;
        let draw: f64 = self.rng.sample(StandardNormal);
        self.output = self.std_dev * draw + self.mean;
    }

    fn reset(&mut self) {
        use rand::SeedableRng;

        self.output = 0.0;
        self.last_sample = if self.period > 0.0 { -self.period } else { 1.0 };
        if let Some(s) = self.seed {
            self.rng = rand::rngs::StdRng::seed_from_u64(s);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn max_inputs(&self) -> Option<usize> {
        Some(0)
    }
}
