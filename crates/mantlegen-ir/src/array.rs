//! Node arrays.
//!
//! A node array is a size-parameterized vector of structurally identical
//! nodes: a base node that is cloned on every append, a size node (literal,
//! parameter or expression), and the appended children. A parameter used as
//! an array's size is exclusively bound to that array.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};
use crate::node::{Dir, NodeKind};
use crate::world::{ArrayId, DomainId, GraphId, NodeId, TypeId, World};

/// What kind of nodes an array holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayKind {
    Port,
    Signal,
}

/// A node array in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeArrayData {
    /// Array name.
    pub name: String,
    /// Kind of the base node.
    pub kind: ArrayKind,
    /// The node cloned for every appended element.
    pub base: NodeId,
    /// The size node.
    pub size: NodeId,
    /// Appended elements, in append order.
    pub children: Vec<NodeId>,
    /// Owning graph, if any.
    pub parent: Option<GraphId>,
}

impl World {
    /// Create a port array from a fresh base port.
    pub fn port_array(
        &mut self,
        name: &str,
        ty: TypeId,
        size: NodeId,
        dir: Dir,
        domain: DomainId,
    ) -> Result<ArrayId> {
        let base = self.port(name, ty, dir, domain);
        self.node_array(name, ArrayKind::Port, base, size)
    }

    /// Create a port array from an existing base port.
    pub fn port_array_from(&mut self, base: NodeId, size: NodeId) -> Result<ArrayId> {
        if !self.node(base).is_port() {
            return Err(IrError::Structure(format!(
                "port array base {} is not a port",
                self.node(base).name
            )));
        }
        let name = self.node(base).name.clone();
        self.node_array(&name, ArrayKind::Port, base, size)
    }

    /// Create a signal array from a fresh base signal.
    pub fn signal_array(
        &mut self,
        name: &str,
        ty: TypeId,
        size: NodeId,
        domain: DomainId,
    ) -> Result<ArrayId> {
        let base = self.signal(name, ty, domain);
        self.node_array(name, ArrayKind::Signal, base, size)
    }

    fn node_array(&mut self, name: &str, kind: ArrayKind, base: NodeId, size: NodeId) -> Result<ArrayId> {
        let id = ArrayId(self.arrays.len() as u32);
        self.arrays.push(NodeArrayData {
            name: name.to_string(),
            kind,
            base,
            size,
            children: Vec::new(),
            parent: None,
        });
        self.node_mut(base).array = Some(id);
        self.array_set_size(id, size)?;
        Ok(id)
    }

    /// Set the size node of an array. The size must be a literal, parameter
    /// or expression; a parameter may size only one array.
    pub fn array_set_size(&mut self, array: ArrayId, size: NodeId) -> Result<()> {
        match self.node(size).kind {
            NodeKind::Literal(_) | NodeKind::Expression { .. } => {}
            NodeKind::Parameter {
                array: bound_to, ..
            } => {
                if let Some(other) = bound_to {
                    if other != array {
                        return Err(IrError::Generic(format!(
                            "parameter {} already sizes another node array",
                            self.node(size).name
                        )));
                    }
                }
                if let NodeKind::Parameter { array: a, .. } = &mut self.node_mut(size).kind {
                    *a = Some(array);
                }
            }
            _ => {
                return Err(IrError::Generic(format!(
                    "node array size must be a literal, parameter or expression, got {}",
                    self.node(size).name
                )))
            }
        }
        self.array_mut(array).size = size;
        Ok(())
    }

    /// Append a cloned element to an array. With `increment_size`, the size
    /// node is replaced by the expression `size + 1`.
    pub fn array_append(&mut self, array: ArrayId, increment_size: bool) -> Result<NodeId> {
        let base = self.array(array).base;
        let parent = self.array(array).parent;
        let element = self.copy_node(base);
        self.node_mut(element).parent = parent;
        self.node_mut(element).array = Some(array);
        self.array_mut(array).children.push(element);
        if increment_size {
            let size = self.array(array).size;
            let one = self.lit_int(1);
            let incremented = self.add(size, one);
            self.array_set_size(array, incremented)?;
        }
        Ok(element)
    }

    /// Element at a given index.
    pub fn array_node(&self, array: ArrayId, index: usize) -> Result<NodeId> {
        self.array(array).children.get(index).copied().ok_or_else(|| {
            IrError::Structure(format!(
                "index {index} out of bounds for node array {}",
                self.array(array).name
            ))
        })
    }

    /// Index of an element.
    pub fn array_index_of(&self, array: ArrayId, node: NodeId) -> Result<usize> {
        self.array(array)
            .children
            .iter()
            .position(|n| *n == node)
            .ok_or_else(|| {
                IrError::Structure(format!(
                    "node {} is not an element of array {}",
                    self.node(node).name,
                    self.array(array).name
                ))
            })
    }

    /// Change the type of the base node and every element.
    pub fn array_set_type(&mut self, array: ArrayId, ty: TypeId) {
        let base = self.array(array).base;
        self.node_mut(base).ty = ty;
        for child in self.array(array).children.clone() {
            self.node_mut(child).ty = ty;
        }
    }

    pub(crate) fn array_set_parent(&mut self, array: ArrayId, graph: GraphId) {
        self.array_mut(array).parent = Some(graph);
        let base = self.array(array).base;
        self.node_mut(base).parent = Some(graph);
        for child in self.array(array).children.clone() {
            self.node_mut(child).parent = Some(graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_clones_base_and_grows_size() {
        let mut w = World::new();
        let ty = w.vector_of(8);
        let size = w.int_parameter("n", 0);
        let dom = w.default_domain();
        let arr = w.port_array("slots", ty, size, Dir::In, dom).unwrap();
        let e0 = w.array_append(arr, true).unwrap();
        let e1 = w.array_append(arr, true).unwrap();
        assert_ne!(e0, e1);
        assert_eq!(w.array(arr).children.len(), 2);
        // Size is now the expression ((n + 1) + 1).
        let size_node = w.array(arr).size;
        assert_eq!(w.expr_to_string(size_node), "n + 1 + 1");
    }

    #[test]
    fn size_parameter_is_exclusive() {
        let mut w = World::new();
        let ty = w.bit("b");
        let size = w.int_parameter("n", 0);
        let dom = w.default_domain();
        let _a = w.port_array("a", ty, size, Dir::In, dom).unwrap();
        let ty2 = w.bit("b2");
        let err = w.port_array("b", ty2, size, Dir::In, dom);
        assert!(matches!(err, Err(IrError::Generic(_))));
    }
}
