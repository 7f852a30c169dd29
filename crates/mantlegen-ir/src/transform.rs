//! Structural transforms: signal interposition and port signalization.
//!
//! RTL back-ends cannot put generic expressions on the left-hand side of a
//! port association, so before emission a locally named signal is interposed
//! between every instance port and whatever it connects to. The same applies
//! element-wise to port arrays.

use std::collections::HashMap;

use tracing::debug;

use crate::array::ArrayKind;
use crate::error::Result;
use crate::graph::ObjectId;
use crate::world::{ArrayId, GraphId, NodeId, World};

impl World {
    /// A name not yet used on a graph: `base`, or `base_1`, `base_2`, ...
    pub fn unique_name(&self, graph: GraphId, base: &str) -> String {
        if !self.graph_has(graph, base) {
            return base.to_string();
        }
        let mut i = 1;
        loop {
            let candidate = format!("{base}_{i}");
            if !self.graph_has(graph, &candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    fn interposed_name(&self, comp: GraphId, node_name: &str, parent: Option<GraphId>) -> String {
        let mut name = node_name.to_string();
        if let Some(p) = parent {
            if self.graph(p).is_instance() {
                name = format!("{}_{}", self.graph(p).name, name);
            }
        }
        self.unique_name(comp, &name)
    }

    /// Interpose a signal on the component between `node` and everything it
    /// connects to. Generic types are rebound to component-side nodes first.
    pub fn attach_signal(
        &mut self,
        comp: GraphId,
        node: NodeId,
        rebinding: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        let mut ty = self.node(node).ty;
        if self.is_generic_type(ty) {
            for g in self.type_generics(ty) {
                self.rebind_generic(comp, g, rebinding)?;
            }
            ty = self.copy_type(ty, rebinding);
        }
        let domain = self.node(node).domain().unwrap_or(self.default_domain());
        let name = self.interposed_name(comp, &self.node(node).name.clone(), self.node(node).parent);
        let sig = self.signal(&name, ty, domain);
        self.add_node(comp, sig)?;

        let mut had_sinks = false;
        for e in self.sinks(node) {
            let dst = self.edge(e).dst;
            self.remove_edge_unchecked(e);
            self.connect(dst, sig)?;
            had_sinks = true;
        }
        let mut had_sources = false;
        for e in self.sources(node) {
            let src = self.edge(e).src;
            self.remove_edge_unchecked(e);
            self.connect(sig, src)?;
            had_sources = true;
        }
        if had_sinks {
            self.connect(sig, node)?;
        }
        if had_sources {
            self.connect(node, sig)?;
        }
        Ok(sig)
    }

    /// Interpose a signal array on the component between a node array and
    /// everything its elements connect to, reconnecting element-wise.
    pub fn attach_signal_array(
        &mut self,
        comp: GraphId,
        array: ArrayId,
        rebinding: &mut HashMap<NodeId, NodeId>,
    ) -> Result<ArrayId> {
        let base = self.array(array).base;
        let mut ty = self.node(base).ty;
        if self.is_generic_type(ty) {
            for g in self.type_generics(ty) {
                self.rebind_generic(comp, g, rebinding)?;
            }
            ty = self.copy_type(ty, rebinding);
        }
        // The size node must be available on the component as well.
        let size = self.array(array).size;
        let new_size = if self.node(size).is_literal() || self.node(size).is_expression() {
            size
        } else {
            self.rebind_generic(comp, size, rebinding)?;
            rebinding.get(&size).copied().unwrap_or(size)
        };

        let domain = self
            .node(base)
            .domain()
            .unwrap_or(self.default_domain());
        let name =
            self.interposed_name(comp, &self.array(array).name.clone(), self.array(array).parent);
        let sig_array = self.signal_array(&name, ty, new_size, domain)?;
        self.add_array(comp, sig_array)?;

        for index in 0..self.array(array).children.len() {
            let element = self.array_node(array, index)?;
            let new_sig = self.array_append(sig_array, false)?;

            let mut had_sinks = false;
            for e in self.sinks(element) {
                let dst = self.edge(e).dst;
                self.remove_edge_unchecked(e);
                self.connect(dst, new_sig)?;
                had_sinks = true;
            }
            let mut had_sources = false;
            for e in self.sources(element) {
                let src = self.edge(e).src;
                self.remove_edge_unchecked(e);
                self.connect(new_sig, src)?;
                had_sources = true;
            }
            if had_sinks {
                self.connect(new_sig, element)?;
            }
            if had_sources {
                self.connect(element, new_sig)?;
            }
        }
        Ok(sig_array)
    }

    /// True if the node has edges and every one of them already leads to a
    /// signal owned by `comp`. Such a node needs no further interposition.
    fn peers_are_signals_of(&self, comp: GraphId, node: NodeId) -> bool {
        let mut edges = self.sinks(node);
        edges.extend(self.sources(node));
        if edges.is_empty() {
            return false;
        }
        edges.iter().all(|e| {
            let peer = if self.edge(*e).src == node {
                self.edge(*e).dst
            } else {
                self.edge(*e).src
            };
            self.node(peer).is_signal() && self.node(peer).parent == Some(comp)
        })
    }

    /// Interpose a signal between every instance port (and port array) of a
    /// component's children and the rest of the graph. Ports whose edges all
    /// reach component signals already are left alone. Returns the created
    /// objects.
    pub fn signalize_ports(&mut self, comp: GraphId) -> Result<Vec<ObjectId>> {
        let mut resolved = Vec::new();
        let mut rebinding: HashMap<NodeId, NodeId> = HashMap::new();
        for inst in self.children_of(comp) {
            for port in self.ports_of(inst) {
                if self.peers_are_signals_of(comp, port) {
                    continue;
                }
                let sig = self.attach_signal(comp, port, &mut rebinding)?;
                resolved.push(ObjectId::Node(sig));
            }
            for pa in self.arrays_of(inst, Some(ArrayKind::Port)) {
                let sa = self.attach_signal_array(comp, pa, &mut rebinding)?;
                resolved.push(ObjectId::Array(sa));
            }
        }
        debug!(
            component = %self.graph(comp).name,
            resolved = resolved.len(),
            rebound = rebinding.len(),
            "signalized instance ports"
        );
        Ok(resolved)
    }
}
