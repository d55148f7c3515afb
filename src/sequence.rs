//! Sequence tables: per-endpoint evaluation order, built once at initialize.
//!
//! Every integrator, unit delay and recorder is an *endpoint* that owns one
//! table. A table lists the endpoint first and its combinational dependencies
//! after it, so evaluating a table back-to-front refreshes every dependency
//! before the endpoint reads it. State-block children terminate the walk:
//! their outputs are states, already valid when a step begins. A node claimed
//! by one table is skipped by later tables, so shared sub-expressions are
//! evaluated exactly once per stage.

use std::collections::HashSet;

use crate::block_kind::Role;
use crate::error::InitError;
use crate::graph::{Graph, NodeId};

/// Evaluation order for one committed step, grouped by endpoint class.
///
/// `tables[i]` belongs to `endpoints[i]`. Integrator tables are evaluated
/// once per RK stage; delay and sink tables once per committed step.
#[derive(Debug, Default)]
pub(crate) struct SequenceTables {
    pub integrators: Vec<NodeId>,
    pub integ_tables: Vec<Vec<NodeId>>,
    pub delays: Vec<NodeId>,
    pub delay_tables: Vec<Vec<NodeId>>,
    pub sinks: Vec<NodeId>,
    pub sink_tables: Vec<Vec<NodeId>>,
}

pub(crate) fn build_tables(graph: &Graph) -> Result<SequenceTables, InitError> {
    let mut tables = SequenceTables::default();
    for id in graph.ids() {
        match graph.role(id) {
            Role::ContinuousState => tables.integrators.push(id),
            Role::DiscreteState => tables.delays.push(id),
            Role::Sink => tables.sinks.push(id),
            Role::Ordinary => {}
        }
    }

    // Endpoints are claimed up front so no table absorbs another's root.
    let mut slotted: HashSet<NodeId> = tables
        .integrators
        .iter()
        .chain(&tables.delays)
        .chain(&tables.sinks)
        .copied()
        .collect();

    for &id in &tables.integrators {
        tables.integ_tables.push(build_one(graph, id, &mut slotted)?);
    }
    for &id in &tables.delays {
        tables.delay_tables.push(build_one(graph, id, &mut slotted)?);
    }
    for &id in &tables.sinks {
        tables.sink_tables.push(build_one(graph, id, &mut slotted)?);
    }
    Ok(tables)
}

/// Walk one endpoint's combinational fan-in cone with a work list.
///
/// A child already in this table is moved to the back (its consumers were
/// discovered after it, and back-to-front evaluation must refresh it first),
/// unless that child can reach the current node through combinational edges,
/// which is an algebraic loop.
fn build_one(
    graph: &Graph,
    endpoint: NodeId,
    slotted: &mut HashSet<NodeId>,
) -> Result<Vec<NodeId>, InitError> {
    let mut table = vec![endpoint];
    let mut stack = vec![endpoint];
    let mut on_stack: HashSet<NodeId> = stack.iter().copied().collect();

    while let Some(node) = stack.pop() {
        on_stack.remove(&node);
        for &child in graph.fan_in(node) {
            // State outputs are valid at step start; the walk stops there.
            if matches!(
                graph.role(child),
                Role::ContinuousState | Role::DiscreteState
            ) {
                continue;
            }
            if slotted.contains(&child) {
                if !matches!(
                    graph.role(node),
                    Role::ContinuousState | Role::DiscreteState
                ) {
                    if let Some(path) = reaches(graph, child, node) {
                        let mut nodes = vec![graph.name(node).to_owned()];
                        nodes.extend(path.iter().map(|&id| graph.name(id).to_owned()));
                        return Err(InitError::AlgebraicLoop { nodes });
                    }
                }
                if let Some(pos) = table.iter().position(|&id| id == child) {
                    table.remove(pos);
                    table.push(child);
                    if on_stack.insert(child) {
                        stack.push(child);
                    }
                }
                // Owned by another table: evaluated there, skip here.
            } else {
                slotted.insert(child);
                table.push(child);
                if on_stack.insert(child) {
                    stack.push(child);
                }
            }
        }
    }
    Ok(table)
}

/// Combinational reachability from `from` back to `target`, with the path
/// taken. State blocks break the search.
fn reaches(graph: &Graph, from: NodeId, target: NodeId) -> Option<Vec<NodeId>> {
    let mut visited = HashSet::new();
    let mut path = vec![from];
    if dfs(graph, from, target, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn dfs(
    graph: &Graph,
    node: NodeId,
    target: NodeId,
    visited: &mut HashSet<NodeId>,
    path: &mut Vec<NodeId>,
) -> bool {
    if !visited.insert(node) {
        return false;
    }
    for &input in graph.fan_in(node) {
        if input == target {
            path.push(input);
            return true;
        }
        if matches!(
            graph.role(input),
            Role::ContinuousState | Role::DiscreteState
        ) {
            continue;
        }
        path.push(input);
        if dfs(graph, input, target, visited, path) {
            return true;
        }
        path.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Constant, Gain, Integrator, Recorder, Sum, UnitDelay};

    #[test]
    fn chain_orders_dependencies_after_consumers() {
        let mut g = Graph::new();
        let c = g.add(Constant::new(1.0));
        let k = g.add(Gain::new(2.0));
        let int = g.add(Integrator::new(0.0));
        g.connect(c, k).unwrap();
        g.connect(k, int).unwrap();

        let tables = build_tables(&g).unwrap();
        assert_eq!(tables.integrators, vec![int]);
        // Back-to-front evaluation hits the constant, then the gain.
        assert_eq!(tables.integ_tables[0], vec![int, k, c]);
    }

    #[test]
    fn state_feedback_is_not_a_loop() {
        let mut g = Graph::new();
        let int = g.add(Integrator::new(1.0));
        let k = g.add(Gain::new(-1.0));
        g.connect(int, k).unwrap();
        g.connect(k, int).unwrap();

        let tables = build_tables(&g).unwrap();
        assert_eq!(tables.integ_tables[0], vec![int, k]);
    }

    #[test]
    fn unit_delay_breaks_combinational_cycle() {
        let mut g = Graph::new();
        let sum = g.add(Sum::new());
        let ud = g.add(UnitDelay::new(0.0, 1.0));
        let rec = g.add(Recorder::new());
        g.connect(sum, ud).unwrap();
        g.connect(ud, sum).unwrap();
        g.connect(sum, rec).unwrap();

        assert!(build_tables(&g).is_ok());
    }

    #[test]
    fn pure_combinational_cycle_is_rejected() {
        let mut g = Graph::new();
        let sum = g.add(Sum::new());
        let k = g.add(Gain::new(0.5));
        let rec = g.add(Recorder::new());
        g.connect(sum, k).unwrap();
        g.connect(k, sum).unwrap();
        g.connect(sum, rec).unwrap();

        match build_tables(&g) {
            Err(InitError::AlgebraicLoop { nodes }) => {
                assert_eq!(nodes.first(), nodes.last());
                assert!(nodes.len() >= 3);
            }
            other => panic!("expected algebraic loop, got {other:?}"),
        }
    }

    #[test]
    fn shared_subexpression_claimed_once() {
        let mut g = Graph::new();
        let c = g.add(Constant::new(1.0));
        let k = g.add(Gain::new(2.0));
        let i1 = g.add(Integrator::new(0.0));
        let i2 = g.add(Integrator::new(0.0));
        g.connect(c, k).unwrap();
        g.connect(k, i1).unwrap();
        g.connect(k, i2).unwrap();

        let tables = build_tables(&g).unwrap();
        assert_eq!(tables.integ_tables[0], vec![i1, k, c]);
        // The second integrator reads the gain without re-evaluating it.
        assert_eq!(tables.integ_tables[1], vec![i2]);
    }

    #[test]
    fn diamond_dependency_is_reordered_last() {
        let mut g = Graph::new();
        let c = g.add(Constant::new(1.0));
        let a = g.add(Gain::new(2.0));
        let b = g.add(Gain::new(3.0));
        let sum = g.add(Sum::new());
        let int = g.add(Integrator::new(0.0));
        g.connect(c, a).unwrap();
        g.connect(c, b).unwrap();
        g.connect(a, sum).unwrap();
        g.connect(b, sum).unwrap();
        g.connect(sum, int).unwrap();

        let tables = build_tables(&g).unwrap();
        let table = &tables.integ_tables[0];
        let pos = |id: NodeId| table.iter().position(|&n| n == id).unwrap();
        // Consumers sit before their dependencies in the stored table.
        assert!(pos(sum) < pos(a));
        assert!(pos(sum) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(c));
    }
}
