//! Graphs: components and instances.
//!
//! A component is a full-featured named container: it may own parameters,
//! ports, signals, node arrays and child instances. An instance is a
//! structurally copied, parameter-rebound view of a component: it owns copies
//! of the component's parameters and ports (never signals) and remembers the
//! component-to-instance node mapping built during construction.
//!
//! Adding an object checks that every node it references (type generics,
//! array sizes) is already owned by the same graph, is a pool literal, or is
//! an expression. A component's ports and parameters become immutable once it
//! has been instantiated; violations are reported but do not abort.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::array::ArrayKind;
use crate::error::{IrError, Result};
use crate::node::NodeKind;
use crate::world::{ArrayId, GraphId, NodeId, World};

/// An object owned by a graph, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectId {
    Node(NodeId),
    Array(ArrayId),
}

/// The kind of a graph.
#[derive(Debug, Clone)]
pub enum GraphKind {
    /// A reusable design unit.
    Component {
        /// Child instances, in instantiation order.
        children: Vec<GraphId>,
        /// Set once the first instance of this component is constructed.
        instantiated: bool,
    },
    /// A placed copy of a component.
    Instance {
        /// The component this instantiates.
        component: GraphId,
        /// The component graph this instance is placed in.
        parent: Option<GraphId>,
        /// Mapping from component nodes to their instance copies.
        comp_to_inst: HashMap<NodeId, NodeId>,
    },
}

/// A graph in the arena.
#[derive(Debug, Clone)]
pub struct GraphData {
    /// Graph name.
    pub name: String,
    /// Kind and payload.
    pub kind: GraphKind,
    /// Owned objects, in insertion order.
    pub objects: Vec<ObjectId>,
    /// Metadata for transforms and back-ends.
    pub meta: IndexMap<String, String>,
}

impl GraphData {
    pub fn is_component(&self) -> bool {
        matches!(self.kind, GraphKind::Component { .. })
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, GraphKind::Instance { .. })
    }
}

impl World {
    /// Create an empty component and register it in the component pool.
    pub fn component(&mut self, name: &str) -> Result<GraphId> {
        let id = GraphId(self.graphs.len() as u32);
        self.pool_register_component(name, id)?;
        self.graphs.push(GraphData {
            name: name.to_string(),
            kind: GraphKind::Component {
                children: Vec::new(),
                instantiated: false,
            },
            objects: Vec::new(),
            meta: IndexMap::new(),
        });
        Ok(id)
    }

    /// Add a node to a graph.
    pub fn add_node(&mut self, graph: GraphId, node: NodeId) -> Result<()> {
        if self.node(node).is_literal() {
            return Err(IrError::Structure(format!(
                "literal {} is owned by the pool and cannot be added to graph {}",
                self.node(node).name,
                self.graph(graph).name
            )));
        }
        if self.graph(graph).is_instance() && self.node(node).is_signal() {
            return Err(IrError::Structure(format!(
                "instance graph {} cannot own signal nodes ({})",
                self.graph(graph).name,
                self.node(node).name
            )));
        }
        let name = self.node(node).name.clone();
        if let Some(existing) = self.object_named(graph, &name) {
            if existing == ObjectId::Node(node) {
                // The graph already owns this object.
                return Ok(());
            }
            return Err(IrError::Structure(format!(
                "graph {} already contains an object named {name}",
                self.graph(graph).name
            )));
        }
        let mut refs = Vec::new();
        for g in self.type_generics(self.node(node).ty) {
            refs.push(g);
        }
        self.check_sub_objects(graph, &name, &refs)?;
        self.report_mutation(graph, node);
        self.graph_mut(graph).objects.push(ObjectId::Node(node));
        self.node_mut(node).parent = Some(graph);
        Ok(())
    }

    /// Add a node array to a graph.
    pub fn add_array(&mut self, graph: GraphId, array: ArrayId) -> Result<()> {
        if self.graph(graph).is_instance() && self.array(array).kind == ArrayKind::Signal {
            return Err(IrError::Structure(format!(
                "instance graph {} cannot own signal arrays ({})",
                self.graph(graph).name,
                self.array(array).name
            )));
        }
        let name = self.array(array).name.clone();
        if let Some(existing) = self.object_named(graph, &name) {
            if existing == ObjectId::Array(array) {
                return Ok(());
            }
            return Err(IrError::Structure(format!(
                "graph {} already contains an object named {name}",
                self.graph(graph).name
            )));
        }
        let base = self.array(array).base;
        let mut refs = Vec::new();
        for g in self.type_generics(self.node(base).ty) {
            refs.push(g);
        }
        refs.push(self.array(array).size);
        self.check_sub_objects(graph, &name, &refs)?;
        let base_kind_is_port = self.array(array).kind == ArrayKind::Port;
        if base_kind_is_port {
            self.report_mutation_array(graph, array);
        }
        self.graph_mut(graph).objects.push(ObjectId::Array(array));
        self.array_set_parent(array, graph);
        Ok(())
    }

    fn check_sub_objects(&self, graph: GraphId, owner: &str, refs: &[NodeId]) -> Result<()> {
        for r in refs {
            let n = self.node(*r);
            if n.is_literal() || n.is_expression() {
                continue;
            }
            if n.parent == Some(graph) {
                continue;
            }
            return Err(IrError::Structure(format!(
                "object [{}] bound to object [{owner}] is not present on graph {}",
                n.name,
                self.graph(graph).name
            )));
        }
        Ok(())
    }

    fn report_mutation(&self, graph: GraphId, node: NodeId) {
        if let GraphKind::Component {
            instantiated: true, ..
        } = self.graph(graph).kind
        {
            if self.node(node).is_port() || self.node(node).is_parameter() {
                error!(
                    graph = %self.graph(graph).name,
                    node = %self.node(node).name,
                    "modifying the interface of a component that was already instantiated"
                );
            }
        }
    }

    fn report_mutation_array(&self, graph: GraphId, array: ArrayId) {
        if let GraphKind::Component {
            instantiated: true, ..
        } = self.graph(graph).kind
        {
            error!(
                graph = %self.graph(graph).name,
                array = %self.array(array).name,
                "modifying the interface of a component that was already instantiated"
            );
        }
    }

    fn object_named(&self, graph: GraphId, name: &str) -> Option<ObjectId> {
        for obj in &self.graph(graph).objects {
            let obj_name = match obj {
                ObjectId::Node(n) => &self.node(*n).name,
                ObjectId::Array(a) => &self.array(*a).name,
            };
            if obj_name == name {
                return Some(*obj);
            }
        }
        None
    }

    /// True if the graph owns an object with this name.
    pub fn graph_has(&self, graph: GraphId, name: &str) -> bool {
        self.object_named(graph, name).is_some()
    }

    /// Remove an object from its graph.
    pub fn remove_object_from(&mut self, graph: GraphId, node: NodeId) {
        self.graph_mut(graph)
            .objects
            .retain(|o| *o != ObjectId::Node(node));
        if self.node(node).parent == Some(graph) {
            self.node_mut(node).parent = None;
        }
    }

    /// Find a node by name.
    pub fn get_node(&self, graph: GraphId, name: &str) -> Option<NodeId> {
        match self.object_named(graph, name) {
            Some(ObjectId::Node(n)) => Some(n),
            _ => None,
        }
    }

    /// Find a port by name; missing ports are a structure error.
    pub fn get_port(&self, graph: GraphId, name: &str) -> Result<NodeId> {
        self.get_node(graph, name)
            .filter(|n| self.node(*n).is_port())
            .ok_or_else(|| {
                IrError::Structure(format!(
                    "port {name} does not exist on graph {}",
                    self.graph(graph).name
                ))
            })
    }

    /// Find a signal by name; missing signals are a structure error.
    pub fn get_signal(&self, graph: GraphId, name: &str) -> Result<NodeId> {
        self.get_node(graph, name)
            .filter(|n| self.node(*n).is_signal())
            .ok_or_else(|| {
                IrError::Structure(format!(
                    "signal {name} does not exist on graph {}",
                    self.graph(graph).name
                ))
            })
    }

    /// Find a parameter by name; missing parameters are a structure error.
    pub fn get_parameter(&self, graph: GraphId, name: &str) -> Result<NodeId> {
        self.get_node(graph, name)
            .filter(|n| self.node(*n).is_parameter())
            .ok_or_else(|| {
                IrError::Structure(format!(
                    "parameter {name} does not exist on graph {}",
                    self.graph(graph).name
                ))
            })
    }

    /// Find a port array by name; missing arrays are a structure error.
    pub fn get_port_array(&self, graph: GraphId, name: &str) -> Result<ArrayId> {
        match self.object_named(graph, name) {
            Some(ObjectId::Array(a)) if self.array(a).kind == ArrayKind::Port => Ok(a),
            _ => Err(IrError::Structure(format!(
                "port array {name} does not exist on graph {}",
                self.graph(graph).name
            ))),
        }
    }

    /// All nodes of a graph, in insertion order.
    pub fn nodes_of(&self, graph: GraphId) -> Vec<NodeId> {
        self.graph(graph)
            .objects
            .iter()
            .filter_map(|o| match o {
                ObjectId::Node(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// All ports of a graph, in insertion order.
    pub fn ports_of(&self, graph: GraphId) -> Vec<NodeId> {
        self.nodes_of(graph)
            .into_iter()
            .filter(|n| self.node(*n).is_port())
            .collect()
    }

    /// All parameters of a graph, in insertion order.
    pub fn parameters_of(&self, graph: GraphId) -> Vec<NodeId> {
        self.nodes_of(graph)
            .into_iter()
            .filter(|n| self.node(*n).is_parameter())
            .collect()
    }

    /// All signals of a graph, in insertion order.
    pub fn signals_of(&self, graph: GraphId) -> Vec<NodeId> {
        self.nodes_of(graph)
            .into_iter()
            .filter(|n| self.node(*n).is_signal())
            .collect()
    }

    /// All node arrays of a graph, optionally restricted to one kind.
    pub fn arrays_of(&self, graph: GraphId, kind: Option<ArrayKind>) -> Vec<ArrayId> {
        self.graph(graph)
            .objects
            .iter()
            .filter_map(|o| match o {
                ObjectId::Array(a) => Some(*a),
                _ => None,
            })
            .filter(|a| kind.map_or(true, |k| self.array(*a).kind == k))
            .collect()
    }

    /// Child instances of a component, in instantiation order.
    pub fn children_of(&self, graph: GraphId) -> Vec<GraphId> {
        match &self.graph(graph).kind {
            GraphKind::Component { children, .. } => children.clone(),
            GraphKind::Instance { .. } => Vec::new(),
        }
    }

    /// The component an instance instantiates.
    pub fn instance_component(&self, inst: GraphId) -> Result<GraphId> {
        match self.graph(inst).kind {
            GraphKind::Instance { component, .. } => Ok(component),
            _ => Err(IrError::Structure(format!(
                "graph {} is not an instance",
                self.graph(inst).name
            ))),
        }
    }

    /// Look up the instance copy of a component node.
    pub fn comp_to_inst(&self, inst: GraphId, comp_node: NodeId) -> Option<NodeId> {
        match &self.graph(inst).kind {
            GraphKind::Instance { comp_to_inst, .. } => comp_to_inst.get(&comp_node).copied(),
            _ => None,
        }
    }

    /// Instantiate a component inside another component.
    ///
    /// Copies every parameter, then every port (rebinding generic types to
    /// the instance-side parameter copies), then every port array (finding or
    /// copying its size node idempotently). Marks the component immutable.
    pub fn add_instance_of(&mut self, parent: GraphId, comp: GraphId, name: &str) -> Result<GraphId> {
        if !self.graph(comp).is_component() {
            return Err(IrError::Structure(format!(
                "cannot instantiate non-component graph {}",
                self.graph(comp).name
            )));
        }
        if !self.graph(parent).is_component() {
            return Err(IrError::Structure(format!(
                "cannot place an instance inside non-component graph {}",
                self.graph(parent).name
            )));
        }
        let inst_name = if name.is_empty() {
            format!("{}_inst", self.graph(comp).name)
        } else {
            name.to_string()
        };
        let inst = GraphId(self.graphs.len() as u32);
        self.graphs.push(GraphData {
            name: inst_name,
            kind: GraphKind::Instance {
                component: comp,
                parent: Some(parent),
                comp_to_inst: HashMap::new(),
            },
            objects: Vec::new(),
            meta: IndexMap::new(),
        });

        let mut rebind: HashMap<NodeId, NodeId> = HashMap::new();

        for param in self.parameters_of(comp) {
            let copy = self.copy_node(param);
            self.add_node(inst, copy)?;
            rebind.insert(param, copy);
        }

        for port in self.ports_of(comp) {
            let copy = self.copy_node(port);
            let ty = self.node(port).ty;
            if self.is_generic_type(ty) {
                let new_ty = self.copy_type(ty, &rebind);
                self.set_node_type(copy, new_ty);
            }
            self.add_node(inst, copy)?;
            rebind.insert(port, copy);
        }

        for pa in self.arrays_of(comp, Some(ArrayKind::Port)) {
            let pa_name = self.array(pa).name.clone();
            let base = self.array(pa).base;
            let size = self.array(pa).size;
            let new_base = self.copy_node(base);
            let ty = self.node(base).ty;
            if self.is_generic_type(ty) {
                let new_ty = self.copy_type(ty, &rebind);
                self.set_node_type(new_base, new_ty);
            }
            // The size node is usually a parameter copied above; otherwise
            // copy it over once.
            let inst_size = if let Some(s) = rebind.get(&size) {
                *s
            } else if self.node(size).is_literal() {
                size
            } else {
                let copy = self.copy_node(size);
                self.add_node(inst, copy)?;
                rebind.insert(size, copy);
                copy
            };
            let new_pa = self.port_array_from(new_base, inst_size)?;
            self.array_mut(new_pa).name = pa_name;
            self.add_array(inst, new_pa)?;
        }

        if let GraphKind::Instance { comp_to_inst, .. } = &mut self.graph_mut(inst).kind {
            *comp_to_inst = rebind;
        }
        if let GraphKind::Component { children, .. } = &mut self.graph_mut(parent).kind {
            children.push(inst);
        }
        if let GraphKind::Component { instantiated, .. } = &mut self.graph_mut(comp).kind {
            *instantiated = true;
        }
        Ok(inst)
    }

    /// Make a type generic node available on a component.
    ///
    /// If the generic is a parameter whose value trace already reaches a node
    /// on the component, or a literal, the binding points there. Otherwise
    /// the generic is copied onto the component, prefixed with its original
    /// parent's name for disambiguation.
    pub fn rebind_generic(
        &mut self,
        comp: GraphId,
        generic: NodeId,
        rebinding: &mut HashMap<NodeId, NodeId>,
    ) -> Result<()> {
        if rebinding.contains_key(&generic) {
            return Ok(());
        }
        // Literals and expressions are valid on any graph as-is.
        if self.node(generic).is_literal() || self.node(generic).is_expression() {
            return Ok(());
        }
        if self.node(generic).parent == Some(comp) {
            return Ok(());
        }
        if self.node(generic).is_parameter() {
            let mut trace = Vec::new();
            self.param_trace(generic, &mut trace);
            for ps in trace {
                if self.node(ps).parent == Some(comp) || self.node(ps).is_literal() {
                    rebinding.insert(generic, ps);
                    return Ok(());
                }
            }
        }
        let copy = self.copy_node(generic);
        let mut new_name = self.node(generic).name.clone();
        if let Some(p) = self.node(generic).parent {
            new_name = format!("{}_{}", self.graph(p).name, new_name);
        }
        self.set_node_name(copy, &new_name);
        self.add_node(comp, copy)?;
        rebinding.insert(generic, copy);
        Ok(())
    }

    /// Deep-copy a component under a new name: objects, children and edges.
    pub fn copy_component(&mut self, comp: GraphId, name: &str) -> Result<GraphId> {
        let new = self.component(name)?;
        let mut rebind: HashMap<NodeId, NodeId> = HashMap::new();

        for obj in self.graph(comp).objects.clone() {
            match obj {
                ObjectId::Node(n) => {
                    let copy = self.copy_node(n);
                    let ty = self.node(n).ty;
                    if self.is_generic_type(ty) {
                        let new_ty = self.copy_type(ty, &rebind);
                        self.set_node_type(copy, new_ty);
                    }
                    self.add_node(new, copy)?;
                    rebind.insert(n, copy);
                }
                ObjectId::Array(a) => {
                    let a_name = self.array(a).name.clone();
                    let a_kind = self.array(a).kind;
                    let base = self.array(a).base;
                    let size = self.array(a).size;
                    let mut base_ty = self.node(base).ty;
                    if self.is_generic_type(base_ty) {
                        base_ty = self.copy_type(base_ty, &rebind);
                    }
                    let new_size = if let Some(s) = rebind.get(&size) {
                        *s
                    } else if self.node(size).is_literal() || self.node(size).is_expression() {
                        size
                    } else {
                        let c = self.copy_node(size);
                        self.add_node(new, c)?;
                        rebind.insert(size, c);
                        c
                    };
                    let new_array = match a_kind {
                        ArrayKind::Port => {
                            let new_base = self.copy_node(base);
                            self.set_node_type(new_base, base_ty);
                            self.port_array_from(new_base, new_size)?
                        }
                        ArrayKind::Signal => {
                            let dom = self.node(base).domain().unwrap_or(self.default_domain());
                            let base_name = self.node(base).name.clone();
                            self.signal_array(&base_name, base_ty, new_size, dom)?
                        }
                    };
                    self.array_mut(new_array).name = a_name;
                    self.add_array(new, new_array)?;
                    for child in self.array(a).children.clone() {
                        let new_child = self.array_append(new_array, false)?;
                        rebind.insert(child, new_child);
                    }
                }
            }
        }

        // Parameter values that referenced copied nodes follow the copies.
        for (old, newn) in rebind.clone() {
            if self.node(newn).is_parameter() {
                let value = self.param_value(old)?;
                if let Some(mapped) = rebind.get(&value) {
                    let mapped = *mapped;
                    self.set_param_value(newn, mapped)?;
                }
            }
        }

        for child in self.children_of(comp) {
            let child_comp = self.instance_component(child)?;
            let child_name = self.graph(child).name.clone();
            let ci = self.add_instance_of(new, child_comp, &child_name)?;
            for n in self.nodes_of(child) {
                let n_name = self.node(n).name.clone();
                if let Some(nn) = self.get_node(ci, &n_name) {
                    rebind.insert(n, nn);
                }
            }
            for a in self.arrays_of(child, None) {
                let a_name = self.array(a).name.clone();
                if let Ok(na) = self.get_port_array(ci, &a_name) {
                    for old_child in self.array(a).children.clone() {
                        let new_child = self.array_append(na, false)?;
                        rebind.insert(old_child, new_child);
                    }
                }
            }
        }

        let edges = crate::hierarchy::all_edges(self, comp);
        for e in edges {
            let src = self.edge(e).src;
            let dst = self.edge(e).dst;
            if !rebind.contains_key(&dst) {
                continue;
            }
            let src_ok = rebind.contains_key(&src)
                || self.node(src).is_literal()
                || self.node(src).is_expression();
            if !src_ok {
                continue;
            }
            let nsrc = rebind.get(&src).copied().unwrap_or(src);
            let ndst = rebind[&dst];
            self.connect(ndst, nsrc)?;
        }

        self.graph_mut(new).meta = self.graph(comp).meta.clone();
        Ok(new)
    }

    /// Set a metadata key on a graph.
    pub fn set_graph_meta(&mut self, graph: GraphId, key: &str, value: &str) {
        self.graph_mut(graph)
            .meta
            .insert(key.to_string(), value.to_string());
    }
}
