//! Hierarchy queries exposed to emitters.
//!
//! Emitters consume finalized graphs: they need every edge of a component,
//! the distinct components its children instantiate, and a dependency order
//! in which to declare components (leaves first). Iteration order is
//! deterministic and derived from insertion order throughout.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use crate::error::{IrError, Result};
use crate::world::{EdgeId, GraphId, NodeId, World};

/// The distinct components referenced by a component's child instances, in
/// child order.
pub fn child_components(w: &World, comp: GraphId) -> Vec<GraphId> {
    let mut out = Vec::new();
    for child in w.children_of(comp) {
        if let Ok(c) = w.instance_component(child) {
            if !out.contains(&c) {
                out.push(c);
            }
        }
    }
    out
}

/// Every edge touching the nodes and array elements of a graph, and of its
/// child instances, deduplicated in first-seen order.
pub fn all_edges(w: &World, graph: GraphId) -> Vec<EdgeId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_edges(w, graph, &mut seen, &mut out);
    out
}

fn collect_edges(w: &World, graph: GraphId, seen: &mut HashSet<EdgeId>, out: &mut Vec<EdgeId>) {
    let mut push = |e: EdgeId, seen: &mut HashSet<EdgeId>, out: &mut Vec<EdgeId>| {
        if seen.insert(e) {
            out.push(e);
        }
    };
    for n in w.nodes_of(graph) {
        for e in w.sinks(n) {
            push(e, seen, out);
        }
        for e in w.sources(n) {
            push(e, seen, out);
        }
    }
    for a in w.arrays_of(graph, None) {
        for n in w.array(a).children.clone() {
            for e in w.sinks(n) {
                push(e, seen, out);
            }
            for e in w.sources(n) {
                push(e, seen, out);
            }
        }
    }
    for child in w.children_of(graph) {
        collect_edges(w, child, seen, out);
    }
}

/// Nodes sourcing this graph's nodes without belonging to any graph:
/// literals and loose expressions, in first-seen order.
pub fn implicit_nodes(w: &World, graph: GraphId) -> Vec<NodeId> {
    let mut out = Vec::new();
    for n in w.nodes_of(graph) {
        for e in w.sources(n) {
            let src = w.edge(e).src;
            if w.node(src).parent.is_none() && !out.contains(&src) {
                out.push(src);
            }
        }
    }
    out
}

/// Dependency order over all components reachable from `top`: every
/// component appears after the components its children instantiate, so
/// emitters can declare leaves first.
pub fn component_order(w: &World, top: GraphId) -> Result<Vec<GraphId>> {
    let mut dag: DiGraph<GraphId, ()> = DiGraph::new();
    let mut index: HashMap<GraphId, NodeIndex> = HashMap::new();

    fn visit(
        w: &World,
        comp: GraphId,
        dag: &mut DiGraph<GraphId, ()>,
        index: &mut HashMap<GraphId, NodeIndex>,
    ) -> NodeIndex {
        if let Some(i) = index.get(&comp) {
            return *i;
        }
        let i = dag.add_node(comp);
        index.insert(comp, i);
        for child in child_components(w, comp) {
            let ci = visit(w, child, dag, index);
            dag.add_edge(i, ci, ());
        }
        i
    }
    visit(w, top, &mut dag, &mut index);

    let order = toposort(&dag, None).map_err(|_| {
        IrError::Structure(format!(
            "component hierarchy below {} is cyclic",
            w.graph(top).name
        ))
    })?;
    Ok(order.into_iter().rev().map(|i| dag[i]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Dir;

    fn leaf(w: &mut World, name: &str) -> GraphId {
        let comp = w.component(name).unwrap();
        let b = w.bit("bit");
        let dom = w.default_domain();
        let port = w.port("p", b, Dir::In, dom);
        w.add_node(comp, port).unwrap();
        comp
    }

    #[test]
    fn child_components_are_distinct() {
        let mut w = World::new();
        let a = leaf(&mut w, "a");
        let top = w.component("top").unwrap();
        w.add_instance_of(top, a, "a0").unwrap();
        w.add_instance_of(top, a, "a1").unwrap();
        assert_eq!(child_components(&w, top), vec![a]);
    }

    #[test]
    fn component_order_puts_leaves_first() {
        let mut w = World::new();
        let a = leaf(&mut w, "a");
        let mid = w.component("mid").unwrap();
        w.add_instance_of(mid, a, "").unwrap();
        let top = w.component("top").unwrap();
        w.add_instance_of(top, mid, "").unwrap();
        w.add_instance_of(top, a, "a_direct").unwrap();

        let order = component_order(&w, top).unwrap();
        let pos = |g: GraphId| order.iter().position(|x| *x == g).unwrap();
        assert!(pos(a) < pos(mid));
        assert!(pos(mid) < pos(top));
        assert_eq!(order.len(), 3);
    }
}
