//! Edges and the connect algorithm.
//!
//! An edge is a directed connection from a source node to a destination
//! node, jointly referenced by both endpoints. [`World::connect`] is the only
//! way to create one: it checks clock domains (a mismatch warns, it does not
//! abort), requires a type mapper between the endpoint types (auto-generating
//! implicit mappers when possible), and enforces the directional rules of
//! component and instance ports.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{IrError, Result};
use crate::node::{Dir, NodeKind};
use crate::world::{EdgeId, NodeId, World};

/// A directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    /// Edge name, `<src>_to_<dst>`.
    pub name: String,
    /// Driving node.
    pub src: NodeId,
    /// Driven node.
    pub dst: NodeId,
}

impl World {
    /// Connect `src` to `dst`, creating an edge.
    ///
    /// If the destination is a normal node that already has a source, the old
    /// source edge is dropped first; this is how parameter defaults are
    /// overridden. Connecting into a parameter also updates its value.
    pub fn connect(&mut self, dst: NodeId, src: NodeId) -> Result<EdgeId> {
        self.check_domains(src, dst);

        // The types must be mappable onto each other.
        let src_ty = self.node(src).ty;
        let dst_ty = self.node(dst).ty;
        if self.get_mapper(src_ty, dst_ty, true).is_none() {
            return Err(IrError::Type(format!(
                "no known type mapping available for connection between node [{}:{}] and [{}:{}]",
                self.node(dst).name,
                self.type_to_string(dst_ty),
                self.node(src).name,
                self.type_to_string(src_ty)
            )));
        }

        self.check_directions(src, dst)?;

        match self.node(dst).kind {
            NodeKind::Literal(_) | NodeKind::Expression { .. } => {
                return Err(IrError::Structure(format!(
                    "cannot drive {} node {}",
                    if self.node(dst).is_literal() {
                        "literal"
                    } else {
                        "expression"
                    },
                    self.node(dst).name
                )))
            }
            NodeKind::Parameter { .. } => {
                // Reassignment: drop the previous source and track the new
                // value on the parameter itself.
                for e in self.sources(dst) {
                    self.remove_edge_unchecked(e);
                }
                self.set_param_value(dst, src)?;
            }
            NodeKind::Signal { .. } | NodeKind::Port { .. } => {
                for e in self.sources(dst) {
                    self.remove_edge_unchecked(e);
                }
            }
        }

        let name = format!("{}_to_{}", self.node(src).name, self.node(dst).name);
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(EdgeData { name, src, dst });
        self.node_mut(src).sinks.push(id);
        self.node_mut(dst).sources.push(id);
        Ok(id)
    }

    /// Remove an edge from both of its endpoints. Removing the incoming edge
    /// of a parameter that still sources other nodes is rejected.
    pub fn disconnect(&mut self, edge: EdgeId) -> Result<()> {
        let dst = self.edge(edge).dst;
        if self.node(dst).is_parameter() && !self.node(dst).sinks.is_empty() {
            return Err(IrError::Generic(format!(
                "cannot remove the incoming edge of parameter {} while it still sources other nodes",
                self.node(dst).name
            )));
        }
        self.remove_edge_unchecked(edge);
        Ok(())
    }

    pub(crate) fn remove_edge_unchecked(&mut self, edge: EdgeId) {
        let src = self.edge(edge).src;
        let dst = self.edge(edge).dst;
        self.node_mut(src).sinks.retain(|e| *e != edge);
        self.node_mut(dst).sources.retain(|e| *e != edge);
    }

    fn check_domains(&self, src: NodeId, dst: NodeId) {
        let (sn, dn) = (self.node(src), self.node(dst));
        if let (Some(sd), Some(dd)) = (sn.domain(), dn.domain()) {
            if sd != dd {
                warn!(
                    src = %sn.name,
                    src_domain = %self.domain(sd).name,
                    dst = %dn.name,
                    dst_domain = %self.domain(dd).name,
                    "connecting synchronous nodes from different clock domains; \
                     no crossing logic is inserted"
                );
            }
        }
    }

    fn check_directions(&self, src: NodeId, dst: NodeId) -> Result<()> {
        if let NodeKind::Port { dir, .. } = self.node(dst).kind {
            if let Some(parent) = self.node(dst).parent {
                let parent_graph = self.graph(parent);
                if parent_graph.is_instance() && dir == Dir::Out {
                    return Err(IrError::Direction(format!(
                        "cannot drive port {} of mode output on instance {} with {}",
                        self.node(dst).name,
                        parent_graph.name,
                        self.node(src).name
                    )));
                }
                if parent_graph.is_component() && dir == Dir::In {
                    return Err(IrError::Direction(format!(
                        "cannot drive port {} of mode input on component {} with {}",
                        self.node(dst).name,
                        parent_graph.name,
                        self.node(src).name
                    )));
                }
            }
        }
        if let NodeKind::Port { dir, .. } = self.node(src).kind {
            if let Some(parent) = self.node(src).parent {
                let parent_graph = self.graph(parent);
                if parent_graph.is_instance() && dir == Dir::In {
                    return Err(IrError::Direction(format!(
                        "cannot source from port {} of mode input on instance {}",
                        self.node(src).name,
                        parent_graph.name
                    )));
                }
                if parent_graph.is_component() && dir == Dir::Out {
                    return Err(IrError::Direction(format!(
                        "cannot source from port {} of mode output on component {}",
                        self.node(src).name,
                        parent_graph.name
                    )));
                }
            }
        }
        Ok(())
    }
}
