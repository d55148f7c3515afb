//! Signal graph: arena of nodes and their input edges.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::block::Block;
use crate::block_kind::{BlockKind, Role};
use crate::blocks::{Recorder, TransportDelay};
use crate::error::GraphError;

static NEXT_GRAPH_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Dense handle to a node in the graph arena.
///
/// Handles carry the token of the graph that issued them, so a handle from
/// one simulator cannot silently alias a node in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    token: u64,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

/// A named block plus its fan-in, in connection order.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) block: BlockKind,
    pub(crate) inputs: Vec<NodeId>,
}

/// Arena of nodes. Edges point from a node to its inputs, so evaluation
/// walks *backwards* through fan-in lists.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    token: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            token: NEXT_GRAPH_TOKEN.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Insert a block with an auto-generated name like `gain3`.
    pub fn add(&mut self, block: impl Into<BlockKind>) -> NodeId {
        let block = block.into();
        let name = format!("{}{}", block.kind_name(), self.nodes.len());
        self.add_named(block, name)
    }

    /// Insert a block under an explicit name.
    pub fn add_named(&mut self, block: impl Into<BlockKind>, name: impl Into<String>) -> NodeId {
        let id = NodeId {
            index: self.nodes.len(),
            token: self.token,
        };
        self.nodes.push(Node {
            name: name.into(),
            block: block.into(),
            inputs: Vec::new(),
        });
        id
    }

    /// Wire `from`'s output into `to`.
    ///
    /// Single-input blocks replace any existing edge; unbounded blocks grow a
    /// new port per connection. Sources reject connections.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.check_id(from)?;
        self.check_id(to)?;
        let node = &mut self.nodes[to.index];
        match node.block.max_inputs() {
            Some(0) => return Err(GraphError::NoInputPorts(node.name.clone())),
            Some(1) => {
                node.inputs.clear();
                node.inputs.push(from);
            }
            Some(_) | None => {
                node.inputs.push(from);
                match &mut node.block {
                    BlockKind::Sum(sum) => sum.push_port(),
                    BlockKind::Product(prod) => prod.push_port(),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Wire `from` into a sum or product, setting the new port's gain.
    ///
    /// The target kind is checked before the edge is added, so a failed call
    /// leaves the graph untouched.
    pub fn connect_weighted(
        &mut self,
        from: NodeId,
        to: NodeId,
        gain: f64,
    ) -> Result<(), GraphError> {
        self.check_id(from)?;
        self.check_id(to)?;
        let target = &self.nodes[to.index];
        if !matches!(target.block, BlockKind::Sum(_) | BlockKind::Product(_)) {
            return Err(GraphError::PortOutOfRange {
                node: target.name.clone(),
                port: target.inputs.len(),
                capacity: 0,
            });
        }
        self.connect(from, to)?;
        let port = self.nodes[to.index].inputs.len() - 1;
        self.set_input_gain(to, port, gain)
    }

    /// Set the gain of an existing input port on a sum or product node.
    pub fn set_input_gain(
        &mut self,
        node: NodeId,
        port: usize,
        gain: f64,
    ) -> Result<(), GraphError> {
        self.check_id(node)?;
        let node = &mut self.nodes[node.index];
        let gains = match &mut node.block {
            BlockKind::Sum(sum) => sum.gains_mut(),
            BlockKind::Product(prod) => prod.gains_mut(),
            _ => {
                return Err(GraphError::PortOutOfRange {
                    node: node.name.clone(),
                    port,
                    capacity: 0,
                })
            }
        };
        if port >= gains.len() {
            return Err(GraphError::PortOutOfRange {
                node: node.name.clone(),
                port,
                capacity: gains.len(),
            });
        }
        gains[port] = gain;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        let token = self.token;
        (0..self.nodes.len()).map(move |index| NodeId { index, token })
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.index].name
    }

    pub fn fan_in(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index].inputs
    }

    pub fn output(&self, id: NodeId) -> f64 {
        self.nodes[id.index].block.output()
    }

    pub fn role(&self, id: NodeId) -> Role {
        self.nodes[id.index].block.role()
    }

    /// Evaluate one node: gather fan-in outputs into `vals`, then update.
    ///
    /// `vals` is caller-owned scratch so the hot loop never allocates.
    pub(crate) fn update_node(&mut self, id: NodeId, t: f64, vals: &mut Vec<f64>) {
        vals.clear();
        for &input in &self.nodes[id.index].inputs {
            vals.push(self.nodes[input.index].block.output());
        }
        self.nodes[id.index].block.update(t, vals);
    }

    pub(crate) fn integrator_value(&self, id: NodeId) -> f64 {
        match &self.nodes[id.index].block {
            BlockKind::Integrator(int) => int.value(),
            _ => unreachable!("node {} is not an integrator", self.nodes[id.index].name),
        }
    }

    pub(crate) fn set_integrator_value(&mut self, id: NodeId, value: f64) {
        if let BlockKind::Integrator(int) = &mut self.nodes[id.index].block {
            int.set_value(value);
        }
    }

    pub(crate) fn commit_delay_output(&mut self, id: NodeId, t: f64) {
        if let BlockKind::UnitDelay(ud) = &mut self.nodes[id.index].block {
            ud.commit_output(t);
        }
    }

    pub(crate) fn recorder(&self, id: NodeId) -> Option<&Recorder> {
        match &self.nodes[id.index].block {
            BlockKind::Recorder(rec) => Some(rec),
            _ => None,
        }
    }

    pub(crate) fn for_each_recorder(&mut self, mut f: impl FnMut(&mut Recorder)) {
        for node in &mut self.nodes {
            if let BlockKind::Recorder(rec) = &mut node.block {
                f(rec);
            }
        }
    }

    pub(crate) fn for_each_transport_delay(&mut self, mut f: impl FnMut(&mut TransportDelay)) {
        for node in &mut self.nodes {
            if let BlockKind::TransportDelay(td) = &mut node.block {
                f(td);
            }
        }
    }

    pub(crate) fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        self.nodes[id.index].block.set_enabled(enabled);
    }

    pub(crate) fn reset_all(&mut self) {
        for node in &mut self.nodes {
            node.block.reset();
        }
    }

    /// Drop zero-gain ports on sums that opted in, together with their edges.
    pub(crate) fn prune_zero_gain_ports(&mut self) {
        for node in &mut self.nodes {
            let BlockKind::Sum(sum) = &mut node.block else {
                continue;
            };
            if !sum.should_prune() {
                continue;
            }
            let keep: Vec<bool> = sum.gains().iter().map(|&g| g != 0.0).collect();
            if keep.iter().all(|&k| k) {
                continue;
            }
            let dropped = keep.iter().filter(|&&k| !k).count();
            log::debug!("pruning {} zero-gain port(s) on '{}'", dropped, node.name);
            let mut keep_iter = keep.iter();
            sum.gains_mut().retain(|_| *keep_iter.next().unwrap_or(&true));
            let mut keep_iter = keep.iter();
            node.inputs.retain(|_| *keep_iter.next().unwrap_or(&true));
        }
    }

    /// Log structural warnings: stateful or combinational blocks left with an
    /// empty fan-in, and discrete sources with no data to replay.
    pub(crate) fn warn_unconnected(&self) {
        for node in &self.nodes {
            match node.block.max_inputs() {
                Some(0) => {
                    if let BlockKind::Source(src) = &node.block {
                        if !src.has_data() {
                            log::warn!("source '{}' has no data to replay", node.name);
                        }
                    }
                }
                _ => {
                    if node.inputs.is_empty() {
                        log::warn!("node '{}' has no input connections", node.name);
                    }
                }
            }
        }
    }

    fn check_id(&self, id: NodeId) -> Result<(), GraphError> {
        if id.token != self.token || id.index >= self.nodes.len() {
            return Err(GraphError::UnknownNode(id.index));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Constant, Gain, Sum};

    #[test]
    fn auto_names_follow_kind_and_id() {
        let mut g = Graph::new();
        let c = g.add(Constant::new(1.0));
        let k = g.add(Gain::new(2.0));
        assert_eq!(g.name(c), "const0");
        assert_eq!(g.name(k), "gain1");
    }

    #[test]
    fn single_input_connect_replaces() {
        let mut g = Graph::new();
        let a = g.add(Constant::new(1.0));
        let b = g.add(Constant::new(2.0));
        let k = g.add(Gain::new(1.0));
        g.connect(a, k).unwrap();
        g.connect(b, k).unwrap();
        assert_eq!(g.fan_in(k), &[b]);
    }

    #[test]
    fn unbounded_connect_appends_ports() {
        let mut g = Graph::new();
        let a = g.add(Constant::new(1.0));
        let s = g.add(Sum::new());
        g.connect(a, s).unwrap();
        g.connect(a, s).unwrap();
        assert_eq!(g.fan_in(s), &[a, a]);
        g.set_input_gain(s, 1, -1.0).unwrap();
        assert!(g.set_input_gain(s, 2, 1.0).is_err());
    }

    #[test]
    fn handles_are_bound_to_their_graph() {
        let mut donor = Graph::new();
        let stray = donor.add(Constant::new(1.0));

        let mut g = Graph::new();
        let k = g.add(Gain::new(1.0));
        // Same index as `k`, but issued by the donor graph.
        assert_eq!(stray.index(), k.index());
        assert!(matches!(
            g.connect(k, stray),
            Err(GraphError::UnknownNode(_))
        ));
        assert!(g.connect(stray, k).is_err());
        assert!(g.fan_in(k).is_empty());
    }

    #[test]
    fn failed_weighted_connect_leaves_graph_untouched() {
        let mut g = Graph::new();
        let a = g.add(Constant::new(1.0));
        let b = g.add(Constant::new(2.0));
        let k = g.add(Gain::new(1.0));
        g.connect(a, k).unwrap();
        assert!(matches!(
            g.connect_weighted(b, k, 2.0),
            Err(GraphError::PortOutOfRange { capacity: 0, .. })
        ));
        // The existing edge survives the rejected call.
        assert_eq!(g.fan_in(k), &[a]);
    }

    #[test]
    fn sources_reject_connections() {
        let mut g = Graph::new();
        let a = g.add(Constant::new(1.0));
        let b = g.add(Constant::new(2.0));
        assert_eq!(
            g.connect(a, b),
            Err(GraphError::NoInputPorts("const1".into()))
        );
    }

    #[test]
    fn zero_gain_ports_pruned_with_edges() {
        let mut g = Graph::new();
        let a = g.add(Constant::new(1.0));
        let b = g.add(Constant::new(2.0));
        let s = g.add(Sum::new().prune_zero_gain());
        g.connect(a, s).unwrap();
        g.connect(b, s).unwrap();
        g.set_input_gain(s, 0, 0.0).unwrap();
        g.prune_zero_gain_ports();
        assert_eq!(g.fan_in(s), &[b]);
    }
}
