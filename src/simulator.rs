//! Simulator: graph construction, initialization, and the hybrid stepper.
//!
//! The stepper advances continuous states with classic fixed-step RK4 while
//! discrete blocks (sample-and-holds, sampled sources, noise) are frozen
//! during the intermediate stages, so every sub-stage of a step sees one
//! consistent discrete value. The step is split into two half-steps `h`:
//! stages are evaluated at `t`, `t + h` (twice) and `t + 2h`, and the state
//! commits as `x + h/3 * (k0 + 2*k1 + 2*k2 + k3)`.
//!
//! # Example
//!
//! ```ignore
//! let mut sim = Simulator::new();
//! let src = sim.add(Source::new(|t| t.sin()));
//! let int = sim.add(Integrator::new(0.0));
//! let rec = sim.add(Recorder::new());
//! sim.connect(src, int)?;
//! sim.connect(int, rec)?;
//! sim.set_step_size(0.001);
//! sim.set_end_time(5.0);
//! sim.initialize()?;
//! sim.simulate();
//! ```

use nalgebra::DVector;

use crate::block_kind::BlockKind;
use crate::blocks::Recorder;
use crate::error::{Divergence, DivergencePolicy, GraphError, InitError};
use crate::graph::{Graph, NodeId};
use crate::sequence::{build_tables, SequenceTables};
use crate::{DIVERGENCE_LIMIT, TIME_EPSILON};

/// Block-diagram simulation engine.
pub struct Simulator {
    graph: Graph,
    /// Half of the committed step size.
    h: f64,
    end_time: f64,
    t: f64,
    record_period: f64,
    last_record: f64,
    store: bool,
    policy: DivergencePolicy,
    initialized: bool,
    diverged: Option<Divergence>,
    times: Vec<f64>,
    tables: SequenceTables,
    /// Nodes frozen during RK sub-stages.
    sampled: Vec<NodeId>,
    /// State values at the start of the current step.
    outref: DVector<f64>,
    /// RK stage slopes k0..k3.
    slopes: [DVector<f64>; 4],
    /// Scratch for fan-in gathering; reused so stepping never allocates.
    vals: Vec<f64>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Simulator with a 1 ms step over 10 seconds, storing every step.
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            h: 0.0005,
            end_time: 10.0,
            t: 0.0,
            record_period: -1.0,
            last_record: 1.0,
            store: true,
            policy: DivergencePolicy::default(),
            initialized: false,
            diverged: None,
            times: Vec::new(),
            tables: SequenceTables::default(),
            sampled: Vec::new(),
            outref: DVector::zeros(0),
            slopes: [
                DVector::zeros(0),
                DVector::zeros(0),
                DVector::zeros(0),
                DVector::zeros(0),
            ],
            vals: Vec::new(),
        }
    }

    /// Insert a block, returning its handle. The name is auto-generated.
    pub fn add(&mut self, block: impl Into<BlockKind>) -> NodeId {
        self.graph.add(block)
    }

    /// Insert a block under an explicit name.
    pub fn add_named(&mut self, block: impl Into<BlockKind>, name: impl Into<String>) -> NodeId {
        self.graph.add_named(block, name)
    }

    /// Wire `from` into `to`. See [`Graph::connect`] for port semantics.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.graph.connect(from, to)
    }

    /// Wire `from` into a sum or product with the given port gain. Fails
    /// without modifying the graph when the target is neither.
    pub fn connect_weighted(
        &mut self,
        from: NodeId,
        to: NodeId,
        gain: f64,
    ) -> Result<(), GraphError> {
        self.graph.connect_weighted(from, to, gain)
    }

    /// Change the gain of an existing sum or product port.
    pub fn set_input_gain(
        &mut self,
        node: NodeId,
        port: usize,
        gain: f64,
    ) -> Result<(), GraphError> {
        self.graph.set_input_gain(node, port, gain)
    }

    /// Committed step size.
    pub fn step_size(&self) -> f64 {
        2.0 * self.h
    }

    pub fn set_step_size(&mut self, step: f64) {
        self.h = 0.5 * step;
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn set_end_time(&mut self, end_time: f64) {
        self.end_time = end_time;
    }

    /// Store time and recorder samples only every `period` seconds.
    pub fn set_record_period(&mut self, period: f64) {
        self.record_period = period;
        self.last_record = if period > 0.0 { -period } else { 1.0 };
        self.graph.for_each_recorder(|rec: &mut Recorder| rec.set_period(period));
    }

    /// Disable or re-enable sample storage entirely.
    pub fn set_store(&mut self, store: bool) {
        self.store = store;
        self.graph.for_each_recorder(|rec: &mut Recorder| rec.set_store(store));
    }

    pub fn set_divergence_policy(&mut self, policy: DivergencePolicy) {
        self.policy = policy;
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    /// Committed time points, aligned with recorder samples.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Current output of any node.
    pub fn output(&self, id: NodeId) -> f64 {
        self.graph.output(id)
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.graph.name(id)
    }

    /// Input connections of a node, in connection order.
    pub fn fan_in(&self, id: NodeId) -> &[NodeId] {
        self.graph.fan_in(id)
    }

    /// Samples stored by a recorder node, oldest first.
    pub fn recorder_data(&self, id: NodeId) -> Option<&[f64]> {
        self.graph.recorder(id).map(|rec| rec.data())
    }

    /// First divergence seen since the last reset, if any.
    pub fn diverged(&self) -> Option<Divergence> {
        self.diverged
    }

    /// Freeze the graph: prune ports, size delay lines against the step,
    /// build the sequence tables and allocate stepper state.
    ///
    /// Calling it again is a warned no-op; [`reset`](Simulator::reset) rewinds
    /// time without rebuilding.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        if self.initialized {
            log::warn!("simulator already initialized; ignoring");
            return Ok(());
        }
        let step = self.step_size();
        if step <= 0.0 {
            return Err(InitError::NonPositiveStep(step));
        }

        self.graph.prune_zero_gain_ports();
        self.graph.warn_unconnected();
        self.graph.for_each_transport_delay(|td| td.resolve(step));

        self.tables = build_tables(&self.graph)?;
        if self.tables.sinks.is_empty() {
            log::warn!("no recorder in the graph; nothing will be stored");
        }

        self.sampled = self
            .graph
            .ids()
            .filter(|&id| self.graph.node(id).block.is_sampled())
            .collect();

        let n = self.tables.integrators.len();
        self.outref = DVector::zeros(n);
        self.slopes = [
            DVector::zeros(n),
            DVector::zeros(n),
            DVector::zeros(n),
            DVector::zeros(n),
        ];
        self.diverged = None;
        self.initialized = true;
        log::debug!(
            "initialized: {} nodes, {} integrators, {} delays, {} sinks, step {}",
            self.graph.len(),
            n,
            self.tables.delays.len(),
            self.tables.sinks.len(),
            step
        );
        Ok(())
    }

    /// Rewind to `t = 0`: every block returns to its pre-simulation state and
    /// stored samples are cleared. Tables and structure are kept.
    pub fn reset(&mut self) {
        self.t = 0.0;
        self.times.clear();
        self.diverged = None;
        self.last_record = if self.record_period > 0.0 {
            -self.record_period
        } else {
            1.0
        };
        self.graph.reset_all();
    }

    /// Run from the current time to the end time, then evaluate the final
    /// point. Returns the first divergence seen (for non-stopping policies)
    /// or the one that stopped the run.
    pub fn simulate(&mut self) -> Option<Divergence> {
        if !self.initialized {
            log::error!("simulate called before initialize");
            return None;
        }
        let mut first = None;
        while self.t < self.end_time - TIME_EPSILON {
            let Some(div) = self.simulate_one_step() else {
                continue;
            };
            match self.policy {
                DivergencePolicy::Abort => {
                    log::error!("{} at t = {}; aborting", div, self.t);
                    std::process::abort();
                }
                DivergencePolicy::WarnContinue => {
                    if first.is_none() {
                        log::warn!("{} at t = {}", div, self.t);
                    }
                    first.get_or_insert(div);
                }
                DivergencePolicy::Continue => {
                    first.get_or_insert(div);
                }
                DivergencePolicy::StopReport => {
                    log::error!("{} at t = {}; stopping", div, self.t);
                    return Some(div);
                }
                DivergencePolicy::Stop => return Some(div),
            }
        }
        self.simulate_final_step();
        first
    }

    /// Evaluate every table at the current time and store the initial point,
    /// without advancing state. For manual stepping loops.
    pub fn simulate_first_step(&mut self) -> Option<Divergence> {
        if !self.initialized {
            log::error!("simulate_first_step called before initialize");
            return None;
        }
        let t = self.t;
        self.record_time(t);
        self.eval_integ_tables(t, 0);
        self.eval_endpoint_tables(t);
        self.check_outputs()
    }

    /// Advance one committed step of `2h`.
    pub fn simulate_one_step(&mut self) -> Option<Divergence> {
        if !self.initialized {
            log::error!("simulate_one_step called before initialize");
            return None;
        }
        let h = self.h;

        // Stage 0 at t: publish unit-delay outputs, evaluate everything,
        // sample k0 and remember the states being advanced.
        let t = self.t;
        self.record_time(t);
        for &id in &self.tables.delays {
            self.graph.commit_delay_output(id, t);
        }
        for i in 0..self.tables.integrators.len() {
            self.outref[i] = self.graph.integrator_value(self.tables.integrators[i]);
        }
        self.eval_integ_tables(t, 0);
        self.eval_endpoint_tables(t);

        // Intermediate stages run with discrete blocks frozen.
        self.t += h;
        self.set_sampled_enabled(false);

        let t = self.t;
        self.set_states(h, 0);
        self.eval_integ_tables(t, 1);
        self.set_states(h, 1);
        self.eval_integ_tables(t, 2);

        self.t += h;
        let t = self.t;
        self.set_states(2.0 * h, 2);
        self.eval_integ_tables(t, 3);

        for i in 0..self.tables.integrators.len() {
            let ks = self.slopes[0][i]
                + 2.0 * self.slopes[1][i]
                + 2.0 * self.slopes[2][i]
                + self.slopes[3][i];
            let id = self.tables.integrators[i];
            self.graph.set_integrator_value(id, self.outref[i] + h / 3.0 * ks);
        }
        self.set_sampled_enabled(true);

        self.check_outputs()
    }

    /// Publish delays and evaluate every table at the end time, storing the
    /// final point. State does not advance.
    pub fn simulate_final_step(&mut self) -> Option<Divergence> {
        if !self.initialized {
            log::error!("simulate_final_step called before initialize");
            return None;
        }
        let t = self.t;
        if self.store {
            self.times.push(t);
        }
        for &id in &self.tables.delays {
            self.graph.commit_delay_output(id, t);
        }
        self.eval_integ_tables(t, 0);
        self.eval_endpoint_tables(t);
        self.check_outputs()
    }

    fn record_time(&mut self, t: f64) {
        if !self.store {
            return;
        }
        if t - self.last_record < self.record_period - TIME_EPSILON {
            return;
        }
        self.last_record += self.record_period;
        self.times.push(t);
    }

    /// Evaluate every integrator table back-to-front (skipping the endpoint
    /// itself) and sample the stage slope from each integrator's input.
    fn eval_integ_tables(&mut self, t: f64, slope: usize) {
        for i in 0..self.tables.integrators.len() {
            for k in (1..self.tables.integ_tables[i].len()).rev() {
                let id = self.tables.integ_tables[i][k];
                self.graph.update_node(id, t, &mut self.vals);
            }
            let k = self.derivative(i);
            self.slopes[slope][i] = k;
        }
    }

    /// Evaluate delay tables, then sink tables, endpoints included.
    fn eval_endpoint_tables(&mut self, t: f64) {
        for i in 0..self.tables.delay_tables.len() {
            for k in (0..self.tables.delay_tables[i].len()).rev() {
                let id = self.tables.delay_tables[i][k];
                self.graph.update_node(id, t, &mut self.vals);
            }
        }
        for i in 0..self.tables.sink_tables.len() {
            for k in (0..self.tables.sink_tables[i].len()).rev() {
                let id = self.tables.sink_tables[i][k];
                self.graph.update_node(id, t, &mut self.vals);
            }
        }
    }

    fn derivative(&self, i: usize) -> f64 {
        let id = self.tables.integrators[i];
        self.graph
            .fan_in(id)
            .first()
            .map(|&input| self.graph.output(input))
            .unwrap_or(0.0)
    }

    fn set_states(&mut self, scale: f64, slope: usize) {
        for i in 0..self.tables.integrators.len() {
            let id = self.tables.integrators[i];
            let value = self.outref[i] + scale * self.slopes[slope][i];
            self.graph.set_integrator_value(id, value);
        }
    }

    fn set_sampled_enabled(&mut self, enabled: bool) {
        for &id in &self.sampled {
            self.graph.set_enabled(id, enabled);
        }
    }

    /// Scan every endpoint output for the divergence monitor.
    fn check_outputs(&mut self) -> Option<Divergence> {
        let endpoints = self
            .tables
            .integrators
            .iter()
            .chain(&self.tables.delays)
            .chain(&self.tables.sinks);
        for &id in endpoints {
            let value = self.graph.output(id);
            let div = if value > DIVERGENCE_LIMIT {
                Divergence::PositiveInfinity
            } else if value < -DIVERGENCE_LIMIT {
                Divergence::NegativeInfinity
            } else if value.is_nan() {
                Divergence::NotANumber
            } else {
                continue;
            };
            self.diverged.get_or_insert(div);
            return Some(div);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Constant, Integrator, Recorder};
    use approx::assert_relative_eq;

    #[test]
    fn constant_integration_is_exact() {
        let mut sim = Simulator::new();
        let c = sim.add(Constant::new(2.0));
        let int = sim.add(Integrator::new(1.0));
        sim.connect(c, int).unwrap();
        sim.set_step_size(0.01);
        sim.set_end_time(1.0);
        sim.initialize().unwrap();
        assert!(sim.simulate().is_none());
        // x(1) = 1 + 2*1, exact for RK4 on a constant slope.
        assert_relative_eq!(sim.output(int), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn times_align_with_recorder_samples() {
        let mut sim = Simulator::new();
        let c = sim.add(Constant::new(1.0));
        let rec = sim.add(Recorder::new());
        sim.connect(c, rec).unwrap();
        sim.set_step_size(0.1);
        sim.set_end_time(1.0);
        sim.initialize().unwrap();
        sim.simulate();
        let times = sim.times();
        let data = sim.recorder_data(rec).unwrap();
        assert_eq!(times.len(), data.len());
        assert_eq!(times.len(), 11);
        assert_relative_eq!(times[0], 0.0);
        assert_relative_eq!(*times.last().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn simulate_before_initialize_is_refused() {
        let mut sim = Simulator::new();
        let c = sim.add(Constant::new(1.0));
        let int = sim.add(Integrator::new(0.0));
        sim.connect(c, int).unwrap();
        sim.set_end_time(1.0);
        assert!(sim.simulate().is_none());
        assert_eq!(sim.time(), 0.0);
    }
}
