//! Graph vertices.
//!
//! A node is a literal, parameter, signal, port or expression. Edge
//! cardinality differs per kind: signals and ports are *normal* (at most one
//! driving edge, any number of sinks); literals, parameters and expressions
//! are *multi-output* (they may source many consumers). Ports carry a
//! direction and a clock domain; parameters carry a default value node that
//! can be traced to a literal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};
use crate::expr::BinOp;
use crate::types::TypeKind;
use crate::world::{ArrayId, DomainId, EdgeId, GraphId, NodeId, TypeId, World};

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dir {
    In,
    Out,
}

impl Dir {
    /// The opposite direction.
    pub fn invert(self) -> Dir {
        match self {
            Dir::In => Dir::Out,
            Dir::Out => Dir::In,
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LitValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

/// The kind of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// A pool-interned constant. Never owned by a graph.
    Literal(LitValue),
    /// A named constant with a default value node; may size a node array.
    Parameter {
        value: NodeId,
        array: Option<ArrayId>,
    },
    /// An internal wire of a component.
    Signal { domain: DomainId },
    /// A directed connection point on a graph boundary.
    Port { dir: Dir, domain: DomainId },
    /// A non-evaluated binary operation over two operand nodes.
    Expression { op: BinOp, lhs: NodeId, rhs: NodeId },
}

/// A node in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    /// Node name.
    pub name: String,
    /// Node type.
    pub ty: TypeId,
    /// Kind and payload.
    pub kind: NodeKind,
    /// Owning graph, if any.
    pub parent: Option<GraphId>,
    /// Owning node array, if any.
    pub array: Option<ArrayId>,
    /// Edges this node is the destination of.
    pub(crate) sources: Vec<EdgeId>,
    /// Edges this node is the source of.
    pub(crate) sinks: Vec<EdgeId>,
    /// Metadata for transforms and back-ends.
    pub meta: IndexMap<String, String>,
}

impl NodeData {
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, NodeKind::Parameter { .. })
    }

    pub fn is_signal(&self) -> bool {
        matches!(self.kind, NodeKind::Signal { .. })
    }

    pub fn is_port(&self) -> bool {
        matches!(self.kind, NodeKind::Port { .. })
    }

    pub fn is_expression(&self) -> bool {
        matches!(self.kind, NodeKind::Expression { .. })
    }

    /// True for nodes carrying a clock domain.
    pub fn is_synchronous(&self) -> bool {
        self.is_signal() || self.is_port()
    }

    /// Port direction, if this is a port.
    pub fn dir(&self) -> Option<Dir> {
        match self.kind {
            NodeKind::Port { dir, .. } => Some(dir),
            _ => None,
        }
    }

    /// Clock domain, if this node is synchronous.
    pub fn domain(&self) -> Option<DomainId> {
        match self.kind {
            NodeKind::Signal { domain } | NodeKind::Port { domain, .. } => Some(domain),
            _ => None,
        }
    }
}

impl World {
    /// Create a parameter. Without an explicit value the default is derived
    /// from the type: integer zero, the empty string, or false.
    pub fn parameter(&mut self, name: &str, ty: TypeId, value: Option<NodeId>) -> Result<NodeId> {
        let value = match value {
            Some(v) => {
                let vk = &self.node(v).kind;
                if matches!(vk, NodeKind::Signal { .. } | NodeKind::Port { .. }) {
                    return Err(IrError::Structure(format!(
                        "parameter {name} value cannot be a signal or port node"
                    )));
                }
                v
            }
            None => match self.ty(ty).kind {
                TypeKind::Integer => self.lit_int(0),
                TypeKind::String => self.lit_str(""),
                TypeKind::Boolean => self.lit_bool(false),
                _ => {
                    return Err(IrError::Type(format!(
                        "parameter {name} value cannot be set implicitly for type {}",
                        self.ty(ty).name
                    )))
                }
            },
        };
        Ok(self.new_node(name, ty, NodeKind::Parameter { value, array: None }))
    }

    /// Create an integer parameter with a literal default.
    pub fn int_parameter(&mut self, name: &str, default: i64) -> NodeId {
        let value = self.lit_int(default);
        let ty = self.integer();
        self.new_node(name, ty, NodeKind::Parameter { value, array: None })
    }

    /// Create a signal.
    pub fn signal(&mut self, name: &str, ty: TypeId, domain: DomainId) -> NodeId {
        self.new_node(name, ty, NodeKind::Signal { domain })
    }

    /// Create a port.
    pub fn port(&mut self, name: &str, ty: TypeId, dir: Dir, domain: DomainId) -> NodeId {
        self.new_node(name, ty, NodeKind::Port { dir, domain })
    }

    /// The value node of a parameter.
    pub fn param_value(&self, param: NodeId) -> Result<NodeId> {
        match self.node(param).kind {
            NodeKind::Parameter { value, .. } => Ok(value),
            _ => Err(IrError::Structure(format!(
                "{} is not a parameter",
                self.node(param).name
            ))),
        }
    }

    /// Set the value of a parameter. The value may be a literal, parameter or
    /// expression.
    pub fn set_param_value(&mut self, param: NodeId, value: NodeId) -> Result<()> {
        let vk = &self.node(value).kind;
        if matches!(vk, NodeKind::Signal { .. } | NodeKind::Port { .. }) {
            return Err(IrError::Structure(format!(
                "parameter {} value cannot be or refer to signal or port nodes",
                self.node(param).name
            )));
        }
        match &mut self.node_mut(param).kind {
            NodeKind::Parameter { value: v, .. } => {
                *v = value;
                Ok(())
            }
            _ => Err(IrError::Structure(format!(
                "{} is not a parameter",
                self.node(param).name
            ))),
        }
    }

    /// Append the value trace of a parameter: its value, the value's value if
    /// it is a parameter itself, and so on.
    pub fn param_trace(&self, param: NodeId, out: &mut Vec<NodeId>) {
        if let NodeKind::Parameter { value, .. } = self.node(param).kind {
            out.push(value);
            if self.node(value).is_parameter() {
                self.param_trace(value, out);
            }
        }
    }

    /// Append every node this node references: its type generics, a
    /// parameter's value chain, an expression's operands.
    pub fn node_references(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for g in self.type_generics(self.node(node).ty) {
            out.push(g);
        }
        match self.node(node).kind {
            NodeKind::Parameter { value, .. } => {
                out.push(value);
                self.node_references(value, out);
            }
            NodeKind::Expression { lhs, rhs, .. } => {
                out.push(lhs);
                self.node_references(lhs, out);
                out.push(rhs);
                self.node_references(rhs, out);
            }
            _ => {}
        }
    }

    /// Edges sourcing this node.
    pub fn sources(&self, node: NodeId) -> Vec<EdgeId> {
        self.node(node).sources.clone()
    }

    /// Edges sinking this node.
    pub fn sinks(&self, node: NodeId) -> Vec<EdgeId> {
        self.node(node).sinks.clone()
    }

    /// The node driving this node, if any.
    pub fn source_node(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)
            .sources
            .first()
            .map(|e| self.edge(*e).src)
    }

    /// Plain copy of a node: same type, same metadata, no parent and no
    /// edges. Literals are interned and returned as-is.
    pub fn copy_node(&mut self, node: NodeId) -> NodeId {
        let data = self.node(node).clone();
        match data.kind {
            NodeKind::Literal(_) => node,
            NodeKind::Parameter { value, .. } => {
                let copy = self.new_node(&data.name, data.ty, NodeKind::Parameter { value, array: None });
                self.node_mut(copy).meta = data.meta;
                copy
            }
            NodeKind::Signal { domain } => {
                let copy = self.new_node(&data.name, data.ty, NodeKind::Signal { domain });
                self.node_mut(copy).meta = data.meta;
                copy
            }
            NodeKind::Port { dir, domain } => {
                let copy = self.new_node(&data.name, data.ty, NodeKind::Port { dir, domain });
                self.node_mut(copy).meta = data.meta;
                copy
            }
            NodeKind::Expression { op, lhs, rhs } => {
                let copy = self.new_node(&data.name, data.ty, NodeKind::Expression { op, lhs, rhs });
                self.node_mut(copy).meta = data.meta;
                copy
            }
        }
    }

    /// Copy a port, flipping its direction.
    pub fn copy_port_inverted(&mut self, port: NodeId) -> Result<NodeId> {
        let copy = self.copy_node(port);
        match &mut self.node_mut(copy).kind {
            NodeKind::Port { dir, .. } => {
                *dir = dir.invert();
                Ok(copy)
            }
            _ => Err(IrError::Structure(format!(
                "{} is not a port",
                self.node(port).name
            ))),
        }
    }

    /// Rewire every edge of `node` onto `replacement`, and hand over array
    /// size duty if `node` sizes an array.
    pub fn replace_node(&mut self, node: NodeId, replacement: NodeId) -> Result<()> {
        for e in self.sources(node) {
            let src = self.edge(e).src;
            self.remove_edge_unchecked(e);
            self.connect(replacement, src)?;
        }
        for e in self.sinks(node) {
            let dst = self.edge(e).dst;
            self.remove_edge_unchecked(e);
            self.connect(dst, replacement)?;
        }
        if let Some(graph) = self.node(node).parent {
            self.remove_object_from(graph, node);
            self.add_node(graph, replacement)?;
        }
        if let NodeKind::Parameter {
            array: Some(array), ..
        } = self.node(node).kind
        {
            self.array_set_size(array, replacement)?;
        }
        Ok(())
    }

    /// Change the type of a node.
    pub fn set_node_type(&mut self, node: NodeId, ty: TypeId) {
        self.node_mut(node).ty = ty;
    }

    /// Rename a node.
    pub fn set_node_name(&mut self, node: NodeId, name: &str) {
        self.node_mut(node).name = name.to_string();
    }

    /// Set the clock domain of a signal or port.
    pub fn set_node_domain(&mut self, node: NodeId, domain: DomainId) -> Result<()> {
        match &mut self.node_mut(node).kind {
            NodeKind::Signal { domain: d } | NodeKind::Port { domain: d, .. } => {
                *d = domain;
                Ok(())
            }
            _ => Err(IrError::Structure(format!(
                "{} has no clock domain",
                self.node(node).name
            ))),
        }
    }

    /// Set a metadata key on a node.
    pub fn set_node_meta(&mut self, node: NodeId, key: &str, value: &str) {
        self.node_mut(node)
            .meta
            .insert(key.to_string(), value.to_string());
    }

    /// Render a node for diagnostics: literals by value, expressions by their
    /// serialized form, everything else by name.
    pub fn node_to_string(&self, node: NodeId) -> String {
        match &self.node(node).kind {
            NodeKind::Literal(LitValue::Int(v)) => v.to_string(),
            NodeKind::Literal(LitValue::Str(v)) => format!("\"{v}\""),
            NodeKind::Literal(LitValue::Bool(v)) => v.to_string(),
            NodeKind::Expression { .. } => self.expr_to_string(node),
            _ => self.node(node).name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_interned() {
        let mut w = World::new();
        let a = w.lit_int(42);
        let b = w.lit_int(42);
        let c = w.lit_int(43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(w.lit_str("x"), w.lit_str("x"));
        assert_eq!(w.lit_bool(true), w.lit_bool(true));
        assert!(w.node(a).parent.is_none());
    }

    #[test]
    fn parameter_default_values() {
        let mut w = World::new();
        let int_ty = w.integer();
        let p = w.parameter("p", int_ty, None).unwrap();
        let v = w.param_value(p).unwrap();
        assert_eq!(v, w.lit_int(0));

        let str_ty = w.string_type();
        let q = w.parameter("q", str_ty, None).unwrap();
        assert_eq!(w.param_value(q).unwrap(), w.lit_str(""));
    }

    #[test]
    fn parameter_trace_reaches_literal() {
        let mut w = World::new();
        let lit = w.lit_int(8);
        let inner = w.parameter("inner", w.integer(), Some(lit)).unwrap();
        let outer = w.parameter("outer", w.integer(), Some(inner)).unwrap();
        let mut trace = Vec::new();
        w.param_trace(outer, &mut trace);
        assert_eq!(trace, vec![inner, lit]);
    }
}
