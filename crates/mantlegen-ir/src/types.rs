//! The type algebra.
//!
//! Types classify along three orthogonal axes:
//!
//! - *physical*: representable as bits in hardware (bit, vector, and records
//!   or streams of physical types);
//! - *nested*: containing sub-types (records and streams);
//! - *generic*: parameterized by a node (a vector width, possibly indirectly
//!   through record fields).
//!
//! Equality is structural and deliberately does not compare vector widths;
//! widths may be symbolic and their compatibility is the mapper's concern.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};
use crate::node::NodeKind;
use crate::world::{MapperId, NodeId, TypeId, World};

/// A named field of a record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Field name. May be empty, in which case name generation skips it.
    pub name: String,
    /// Field type.
    pub ty: TypeId,
    /// Whether this field flips direction relative to its parent record.
    pub invert: bool,
    /// Whether a separator is placed after this field's name fragment.
    pub sep: bool,
    /// Metadata for back-end implementations.
    pub meta: IndexMap<String, String>,
}

impl Field {
    /// A plain field.
    pub fn new(name: &str, ty: TypeId) -> Self {
        Field {
            name: name.to_string(),
            ty,
            invert: false,
            sep: true,
            meta: IndexMap::new(),
        }
    }

    /// A field whose direction is flipped relative to the parent record.
    pub fn inverted(name: &str, ty: TypeId) -> Self {
        Field {
            invert: true,
            ..Field::new(name, ty)
        }
    }

    /// Disable the separator after this field's name fragment.
    pub fn no_sep(mut self) -> Self {
        self.sep = false;
        self
    }
}

/// The kind of a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeKind {
    /// A single wire.
    Bit,
    /// The empty type, useful for e.g. data-less streams.
    Nul,
    /// Non-physical integer, used for parameter values.
    Integer,
    /// Non-physical string, used for parameter values.
    String,
    /// Non-physical boolean, used for parameter values.
    Boolean,
    /// A bit vector whose width is a literal, parameter or expression node.
    Vector { width: NodeId },
    /// An ordered collection of named fields.
    Record { fields: Vec<Field> },
    /// A handshaked transport of elements, abstract until expanded.
    Stream { element: TypeId, element_name: String },
}

/// A type in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeData {
    /// Identifying name.
    pub name: String,
    /// Type kind and payload.
    pub kind: TypeKind,
    /// Metadata for transforms and back-ends.
    pub meta: IndexMap<String, String>,
    /// Mappers installed on this type, in installation order.
    pub(crate) mappers: Vec<MapperId>,
}

impl TypeData {
    /// True if this is a stream type.
    pub fn is_stream(&self) -> bool {
        matches!(self.kind, TypeKind::Stream { .. })
    }

    /// True if this is a record type.
    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record { .. })
    }

    /// True if this is a vector type.
    pub fn is_vector(&self) -> bool {
        matches!(self.kind, TypeKind::Vector { .. })
    }
}

impl World {
    /// Create a new bit type.
    pub fn bit(&mut self, name: &str) -> TypeId {
        self.new_type(name, TypeKind::Bit)
    }

    /// Create a new vector type. The width must be a literal, parameter or
    /// expression node.
    pub fn vector(&mut self, name: &str, width: NodeId) -> Result<TypeId> {
        match self.node(width).kind {
            NodeKind::Literal(_) | NodeKind::Parameter { .. } | NodeKind::Expression { .. } => {}
            _ => {
                return Err(IrError::Type(format!(
                    "vector width can only be a parameter, literal or expression node, got {}",
                    self.node(width).name
                )))
            }
        }
        Ok(self.new_type(name, TypeKind::Vector { width }))
    }

    /// Create a vector of a fixed width, named `vec_<width>`.
    pub fn vector_of(&mut self, width: u64) -> TypeId {
        let w = self.lit_int(width as i64);
        self.new_type(&format!("vec_{width}"), TypeKind::Vector { width: w })
    }

    /// Create a new record type.
    pub fn record(&mut self, name: &str, fields: Vec<Field>) -> TypeId {
        self.new_type(name, TypeKind::Record { fields })
    }

    /// Append a field to a record type.
    pub fn add_field(&mut self, record: TypeId, field: Field) -> Result<()> {
        match &mut self.ty_mut(record).kind {
            TypeKind::Record { fields } => {
                fields.push(field);
                Ok(())
            }
            _ => Err(IrError::Type(format!(
                "cannot add a field to non-record type {}",
                self.ty(record).name
            ))),
        }
    }

    /// Create a new stream type with a named element.
    pub fn stream(&mut self, name: &str, element: TypeId, element_name: &str) -> TypeId {
        self.new_type(
            name,
            TypeKind::Stream {
                element,
                element_name: element_name.to_string(),
            },
        )
    }

    /// Create a stream named after its element type, with an anonymous
    /// element.
    pub fn stream_of(&mut self, element: TypeId) -> TypeId {
        let name = format!("{}_stream", self.ty(element).name);
        self.stream(&name, element, "")
    }

    /// The element type of a stream.
    pub fn stream_element(&self, stream: TypeId) -> Result<TypeId> {
        match self.ty(stream).kind {
            TypeKind::Stream { element, .. } => Ok(element),
            _ => Err(IrError::Type(format!(
                "{} is not a stream type",
                self.ty(stream).name
            ))),
        }
    }

    /// Replace the element type of a stream. All mappers installed on the
    /// stream, and mappers pointing back at it, are forgotten.
    pub fn set_stream_element(&mut self, stream: TypeId, element: TypeId) -> Result<()> {
        let installed = self.ty(stream).mappers.clone();
        for m in installed {
            let b = self.mapper(m).b;
            self.remove_mappers_to(b, stream);
        }
        self.ty_mut(stream).mappers.clear();
        match &mut self.ty_mut(stream).kind {
            TypeKind::Stream { element: e, .. } => {
                *e = element;
                Ok(())
            }
            _ => Err(IrError::Type(format!(
                "{} is not a stream type",
                self.ty(stream).name
            ))),
        }
    }

    /// True if the type has an immediate bit representation.
    pub fn is_physical(&self, ty: TypeId) -> bool {
        match &self.ty(ty).kind {
            TypeKind::Bit | TypeKind::Vector { .. } => true,
            TypeKind::Nul | TypeKind::Integer | TypeKind::String | TypeKind::Boolean => false,
            TypeKind::Record { fields } => fields.iter().all(|f| self.is_physical(f.ty)),
            TypeKind::Stream { element, .. } => self.is_physical(*element),
        }
    }

    /// True if the type contains sub-types.
    pub fn is_nested(&self, ty: TypeId) -> bool {
        matches!(
            self.ty(ty).kind,
            TypeKind::Record { .. } | TypeKind::Stream { .. }
        )
    }

    /// True if the type references a node, directly or through its fields.
    pub fn is_generic_type(&self, ty: TypeId) -> bool {
        match &self.ty(ty).kind {
            TypeKind::Vector { .. } => true,
            TypeKind::Record { fields } => fields.iter().any(|f| self.is_generic_type(f.ty)),
            TypeKind::Stream { element, .. } => self.is_generic_type(*element),
            _ => false,
        }
    }

    /// The width node of a type, if it has one. A bit is one wide.
    pub fn type_width(&self, ty: TypeId) -> Option<NodeId> {
        match self.ty(ty).kind {
            TypeKind::Bit => self.lit_ints.get(&1).copied(),
            TypeKind::Vector { width } => Some(width),
            _ => None,
        }
    }

    /// Structural type equality.
    ///
    /// Vector widths are not compared; records compare field count and
    /// pairwise field types (not names); streams compare element types.
    pub fn types_equal(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (&self.ty(a).kind, &self.ty(b).kind) {
            (TypeKind::Bit, TypeKind::Bit)
            | (TypeKind::Nul, TypeKind::Nul)
            | (TypeKind::Integer, TypeKind::Integer)
            | (TypeKind::String, TypeKind::String)
            | (TypeKind::Boolean, TypeKind::Boolean)
            | (TypeKind::Vector { .. }, TypeKind::Vector { .. }) => true,
            (TypeKind::Record { fields: fa }, TypeKind::Record { fields: fb }) => {
                fa.len() == fb.len()
                    && fa
                        .iter()
                        .zip(fb.iter())
                        .all(|(x, y)| self.types_equal(x.ty, y.ty))
            }
            (TypeKind::Stream { element: ea, .. }, TypeKind::Stream { element: eb, .. }) => {
                self.types_equal(*ea, *eb)
            }
            _ => false,
        }
    }

    /// All nodes this type uses as generics, in field order.
    pub fn type_generics(&self, ty: TypeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_generics(ty, &mut out);
        out
    }

    fn collect_generics(&self, ty: TypeId, out: &mut Vec<NodeId>) {
        match &self.ty(ty).kind {
            TypeKind::Vector { width } => out.push(*width),
            TypeKind::Record { fields } => {
                for f in fields {
                    self.collect_generics(f.ty, out);
                }
            }
            TypeKind::Stream { element, .. } => self.collect_generics(*element, out),
            _ => {}
        }
    }

    /// All nested types, depth-first, excluding the type itself.
    pub fn nested_types(&self, ty: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        self.collect_nested(ty, &mut out);
        out
    }

    fn collect_nested(&self, ty: TypeId, out: &mut Vec<TypeId>) {
        match &self.ty(ty).kind {
            TypeKind::Record { fields } => {
                for f in fields {
                    out.push(f.ty);
                    self.collect_nested(f.ty, out);
                }
            }
            TypeKind::Stream { element, .. } => {
                out.push(*element);
                self.collect_nested(*element, out);
            }
            _ => {}
        }
    }

    /// Copy a type, substituting any generic node present in the rebinding
    /// map. Shared non-physical singletons are returned as-is; other kinds
    /// produce fresh types carrying the original metadata and mappers.
    pub fn copy_type(&mut self, ty: TypeId, rebinding: &HashMap<NodeId, NodeId>) -> TypeId {
        let data = self.ty(ty).clone();
        let copy = match &data.kind {
            TypeKind::Nul => return self.nul(),
            TypeKind::Integer => return self.integer(),
            TypeKind::String => return self.string_type(),
            TypeKind::Boolean => return self.boolean(),
            TypeKind::Bit => self.new_type(&data.name, TypeKind::Bit),
            TypeKind::Vector { width } => {
                let new_width = rebinding.get(width).copied().unwrap_or(*width);
                self.new_type(&data.name, TypeKind::Vector { width: new_width })
            }
            TypeKind::Record { fields } => {
                let mut new_fields = Vec::with_capacity(fields.len());
                for f in fields {
                    let fty = if self.is_generic_type(f.ty) {
                        self.copy_type(f.ty, rebinding)
                    } else {
                        f.ty
                    };
                    new_fields.push(Field {
                        name: f.name.clone(),
                        ty: fty,
                        invert: f.invert,
                        sep: f.sep,
                        meta: f.meta.clone(),
                    });
                }
                self.new_type(&data.name, TypeKind::Record { fields: new_fields })
            }
            TypeKind::Stream {
                element,
                element_name,
            } => {
                let new_element = self.copy_type(*element, rebinding);
                self.new_type(
                    &data.name,
                    TypeKind::Stream {
                        element: new_element,
                        element_name: element_name.clone(),
                    },
                )
            }
        };
        self.ty_mut(copy).meta = data.meta.clone();
        // Re-install the original's mappers, sourced from the copy.
        for m in &data.mappers {
            let b = self.mapper(*m).b;
            let matrix = self.mapper(*m).matrix.clone();
            let new_mapper = self.new_mapper(copy, b);
            self.mapper_mut(new_mapper).matrix = matrix;
            // install_mapper with remove_existing cannot fail.
            let _ = self.install_mapper(new_mapper, true);
        }
        copy
    }

    /// Set a metadata key on a type.
    pub fn set_type_meta(&mut self, ty: TypeId, key: &str, value: &str) {
        self.ty_mut(ty)
            .meta
            .insert(key.to_string(), value.to_string());
    }

    /// Human-readable rendering of a type.
    pub fn type_to_string(&self, ty: TypeId) -> String {
        let data = self.ty(ty);
        let tag = match data.kind {
            TypeKind::Bit => "Bit",
            TypeKind::Nul => "Nul",
            TypeKind::Integer => "Int",
            TypeKind::String => "Str",
            TypeKind::Boolean => "Bool",
            TypeKind::Vector { .. } => "Vec",
            TypeKind::Record { .. } => "Rec",
            TypeKind::Stream { .. } => "Stm",
        };
        format!("{}:{}", data.name, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_vector_width() {
        let mut w = World::new();
        let v8 = w.vector_of(8);
        let v16 = w.vector_of(16);
        assert!(w.types_equal(v8, v16));
    }

    #[test]
    fn equality_compares_record_structure_not_names() {
        let mut w = World::new();
        let b = w.bit("b");
        let v = w.vector_of(4);
        let r1 = w.record("r1", vec![Field::new("x", b), Field::new("y", v)]);
        let b2 = w.bit("other");
        let v2 = w.vector_of(9);
        let r2 = w.record("r2", vec![Field::new("p", b2), Field::new("q", v2)]);
        assert!(w.types_equal(r1, r2));

        let r3 = w.record("r3", vec![Field::new("p", b2)]);
        assert!(!w.types_equal(r1, r3));
    }

    #[test]
    fn physical_and_generic_predicates() {
        let mut w = World::new();
        let b = w.bit("b");
        let v = w.vector_of(8);
        let r = w.record("r", vec![Field::new("a", b), Field::new("b", v)]);
        let s = w.stream_of(r);
        assert!(w.is_physical(s));
        assert!(w.is_generic_type(s));
        assert!(!w.is_generic_type(b));
        assert!(!w.is_physical(w.integer()));
    }

    #[test]
    fn copy_rebinds_vector_width() {
        let mut w = World::new();
        let p = w.int_parameter("w", 8);
        let q = w.int_parameter("w2", 16);
        let v = w.vector("v", p).unwrap();
        let mut rebinding = HashMap::new();
        rebinding.insert(p, q);
        let copy = w.copy_type(v, &rebinding);
        match w.ty(copy).kind {
            TypeKind::Vector { width } => assert_eq!(width, q),
            _ => panic!("copy is not a vector"),
        }
    }
}
