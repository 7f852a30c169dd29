//! The central arena owning every IR entity.
//!
//! All types, nodes, edges, graphs, node arrays, type mappers and clock
//! domains live in typed stores on a [`World`], and are referred to by `u32`
//! handle newtypes. Ownership is flat: back-references (node to graph, edge to
//! both endpoints, type to mapper to type) are plain handles, so structural
//! cycles in the hardware graph are harmless.
//!
//! The literal pool, type pool and component pool are members of the `World`
//! rather than process-wide state; constructing a fresh `World` per generator
//! run replaces "clearing the pools between runs".

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::array::NodeArrayData;
use crate::domain::ClockDomainData;
use crate::edge::EdgeData;
use crate::error::{IrError, Result};
use crate::graph::GraphData;
use crate::mapper::TypeMapperData;
use crate::meta;
use crate::node::{LitValue, NodeData, NodeKind};
use crate::types::{TypeData, TypeKind};

/// Handle to a [`TypeData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Handle to a [`NodeData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Handle to an [`EdgeData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Handle to a [`GraphData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u32);

/// Handle to a [`NodeArrayData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayId(pub u32);

/// Handle to a [`TypeMapperData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapperId(pub u32);

/// Handle to a [`ClockDomainData`] in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub u32);

/// Arena for one generator run.
pub struct World {
    pub(crate) types: Vec<TypeData>,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) edges: Vec<EdgeData>,
    pub(crate) graphs: Vec<GraphData>,
    pub(crate) arrays: Vec<NodeArrayData>,
    pub(crate) mappers: Vec<TypeMapperData>,
    pub(crate) domains: Vec<ClockDomainData>,

    // Literal interning, keyed by value.
    pub(crate) lit_ints: HashMap<i64, NodeId>,
    pub(crate) lit_strs: HashMap<String, NodeId>,
    pub(crate) lit_bools: HashMap<bool, NodeId>,

    // Named pools. Insertion order is observable by emitters.
    pub(crate) type_pool: IndexMap<String, TypeId>,
    pub(crate) component_pool: IndexMap<String, GraphId>,

    // Shared singleton types.
    nul: TypeId,
    integer: TypeId,
    string: TypeId,
    boolean: TypeId,
    valid: TypeId,
    ready: TypeId,

    default_domain: DomainId,
}

impl World {
    /// Construct an empty world with its singleton types and default domain.
    pub fn new() -> Self {
        let mut w = World {
            types: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            graphs: Vec::new(),
            arrays: Vec::new(),
            mappers: Vec::new(),
            domains: Vec::new(),
            lit_ints: HashMap::new(),
            lit_strs: HashMap::new(),
            lit_bools: HashMap::new(),
            type_pool: IndexMap::new(),
            component_pool: IndexMap::new(),
            nul: TypeId(0),
            integer: TypeId(0),
            string: TypeId(0),
            boolean: TypeId(0),
            valid: TypeId(0),
            ready: TypeId(0),
            default_domain: DomainId(0),
        };
        w.default_domain = w.clock_domain("default");
        w.nul = w.new_type("null", TypeKind::Nul);
        w.integer = w.new_type("integer", TypeKind::Integer);
        w.string = w.new_type("string", TypeKind::String);
        w.boolean = w.new_type("boolean", TypeKind::Boolean);
        // Handshake leaf types used by stream expansion. The expansion tags
        // let the mapper rewrite recognize them in flattened sequences.
        w.valid = w.new_type("valid", TypeKind::Bit);
        w.types[w.valid.0 as usize]
            .meta
            .insert(meta::EXPAND_TYPE.to_string(), "valid".to_string());
        w.ready = w.new_type("ready", TypeKind::Bit);
        w.types[w.ready.0 as usize]
            .meta
            .insert(meta::EXPAND_TYPE.to_string(), "ready".to_string());
        // Pre-intern the literals the type algebra hands out by reference.
        w.lit_int(0);
        w.lit_int(1);
        w
    }

    pub(crate) fn new_type(&mut self, name: &str, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeData {
            name: name.to_string(),
            kind,
            meta: IndexMap::new(),
            mappers: Vec::new(),
        });
        id
    }

    pub(crate) fn new_node(&mut self, name: &str, ty: TypeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            name: name.to_string(),
            ty,
            kind,
            parent: None,
            array: None,
            sources: Vec::new(),
            sinks: Vec::new(),
            meta: IndexMap::new(),
        });
        id
    }

    /// Access a type.
    pub fn ty(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    pub(crate) fn ty_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.0 as usize]
    }

    /// Access a node.
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }

    /// Access an edge.
    pub fn edge(&self, id: EdgeId) -> &EdgeData {
        &self.edges[id.0 as usize]
    }

    /// Access a graph.
    pub fn graph(&self, id: GraphId) -> &GraphData {
        &self.graphs[id.0 as usize]
    }

    pub(crate) fn graph_mut(&mut self, id: GraphId) -> &mut GraphData {
        &mut self.graphs[id.0 as usize]
    }

    /// Access a node array.
    pub fn array(&self, id: ArrayId) -> &NodeArrayData {
        &self.arrays[id.0 as usize]
    }

    pub(crate) fn array_mut(&mut self, id: ArrayId) -> &mut NodeArrayData {
        &mut self.arrays[id.0 as usize]
    }

    /// Access a type mapper.
    pub fn mapper(&self, id: MapperId) -> &TypeMapperData {
        &self.mappers[id.0 as usize]
    }

    pub(crate) fn mapper_mut(&mut self, id: MapperId) -> &mut TypeMapperData {
        &mut self.mappers[id.0 as usize]
    }

    /// Access a clock domain.
    pub fn domain(&self, id: DomainId) -> &ClockDomainData {
        &self.domains[id.0 as usize]
    }

    /// The domain used when none is specified.
    pub fn default_domain(&self) -> DomainId {
        self.default_domain
    }

    /// The shared null type.
    pub fn nul(&self) -> TypeId {
        self.nul
    }

    /// The shared integer type.
    pub fn integer(&self) -> TypeId {
        self.integer
    }

    /// The shared string type.
    pub fn string_type(&self) -> TypeId {
        self.string
    }

    /// The shared boolean type.
    pub fn boolean(&self) -> TypeId {
        self.boolean
    }

    /// The shared handshake valid bit type.
    pub fn valid(&self) -> TypeId {
        self.valid
    }

    /// The shared handshake ready bit type.
    pub fn ready(&self) -> TypeId {
        self.ready
    }

    /// Look up a component in the component pool.
    pub fn pool_component(&self, name: &str) -> Option<GraphId> {
        self.component_pool.get(name).copied()
    }

    pub(crate) fn pool_register_component(&mut self, name: &str, id: GraphId) -> Result<()> {
        if self.component_pool.contains_key(name) {
            return Err(IrError::Structure(format!(
                "component pool already contains a component named {name}"
            )));
        }
        self.component_pool.insert(name.to_string(), id);
        Ok(())
    }

    /// Look up a type in the type pool.
    pub fn pool_type(&self, name: &str) -> Option<TypeId> {
        self.type_pool.get(name).copied()
    }

    /// Register a type in the type pool under its own name.
    pub fn pool_add_type(&mut self, id: TypeId) -> Result<()> {
        let name = self.ty(id).name.clone();
        if self.type_pool.contains_key(&name) {
            return Err(IrError::Structure(format!(
                "type pool already contains a type named {name}"
            )));
        }
        self.type_pool.insert(name, id);
        Ok(())
    }

    /// All components registered in the pool, in registration order.
    pub fn pool_components(&self) -> Vec<GraphId> {
        self.component_pool.values().copied().collect()
    }

    /// Intern an integer literal.
    pub fn lit_int(&mut self, value: i64) -> NodeId {
        if let Some(id) = self.lit_ints.get(&value) {
            return *id;
        }
        let ty = self.integer;
        let id = self.new_node(&value.to_string(), ty, NodeKind::Literal(LitValue::Int(value)));
        self.lit_ints.insert(value, id);
        id
    }

    /// Intern a string literal.
    pub fn lit_str(&mut self, value: &str) -> NodeId {
        if let Some(id) = self.lit_strs.get(value) {
            return *id;
        }
        let ty = self.string;
        let id = self.new_node(value, ty, NodeKind::Literal(LitValue::Str(value.to_string())));
        self.lit_strs.insert(value.to_string(), id);
        id
    }

    /// Intern a boolean literal.
    pub fn lit_bool(&mut self, value: bool) -> NodeId {
        if let Some(id) = self.lit_bools.get(&value) {
            return *id;
        }
        let ty = self.boolean;
        let id = self.new_node(
            &value.to_string(),
            ty,
            NodeKind::Literal(LitValue::Bool(value)),
        );
        self.lit_bools.insert(value, id);
        id
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
