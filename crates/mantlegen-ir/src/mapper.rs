//! Type flattening and type mappers.
//!
//! Flattening is the single source of truth for turning a nested type into
//! its ordered leaf sequence: a deterministic depth-first pre-order walk that
//! pushes the type itself, then recurses into record fields and stream
//! elements. Name fragments and inversion flags accumulate along the path.
//!
//! A [`TypeMapperData`] relates the flattened sequences of two types through
//! a 0/1 matrix: `matrix[i][j] == 1` pairs leaf `i` of type A with leaf `j`
//! of type B. Emitters turn pairings into wire-level assignments.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};
use crate::types::TypeKind;
use crate::world::{MapperId, TypeId, World};

/// One fragment of a flattened name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePart {
    /// Fragment text. Empty fragments are skipped during joining.
    pub name: String,
    /// Whether a separator follows this fragment.
    pub sep: bool,
}

impl NamePart {
    pub fn new(name: &str) -> Self {
        NamePart {
            name: name.to_string(),
            sep: true,
        }
    }
}

/// A leaf of a flattened type: the accumulated path, the type at that
/// position, and the accumulated field inversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatType {
    /// The type at this position of the pre-order walk.
    pub ty: TypeId,
    /// Name fragments accumulated from ancestors.
    pub path: Vec<NamePart>,
    /// XOR of field inversion flags along the path.
    pub invert: bool,
}

impl FlatType {
    /// Join the path into an identifier, prefixed and separated as requested.
    /// A fragment contributes a separator after itself only when its `sep`
    /// flag is set and a non-empty fragment follows.
    pub fn name(&self, prefix: &str, sep: &str) -> String {
        let mut out = String::new();
        let mut pending_sep = false;
        let prefix_part = NamePart::new(prefix);
        let all = std::iter::once(&prefix_part).chain(self.path.iter());
        for part in all {
            if part.name.is_empty() {
                continue;
            }
            if !out.is_empty() && pending_sep {
                out.push_str(sep);
            }
            out.push_str(&part.name);
            pending_sep = part.sep;
        }
        out
    }
}

/// Flatten a type depth-first, pre-order.
pub fn flatten(w: &World, ty: TypeId) -> Vec<FlatType> {
    let mut out = Vec::new();
    flatten_into(w, ty, Vec::new(), false, &mut out);
    out
}

fn flatten_into(w: &World, ty: TypeId, path: Vec<NamePart>, invert: bool, out: &mut Vec<FlatType>) {
    out.push(FlatType {
        ty,
        path: path.clone(),
        invert,
    });
    match &w.ty(ty).kind {
        TypeKind::Record { fields } => {
            for f in fields {
                let mut sub = path.clone();
                sub.push(NamePart {
                    name: f.name.clone(),
                    sep: f.sep,
                });
                flatten_into(w, f.ty, sub, invert ^ f.invert, out);
            }
        }
        TypeKind::Stream {
            element,
            element_name,
        } => {
            let mut sub = path;
            if !element_name.is_empty() {
                sub.push(NamePart::new(element_name));
            }
            flatten_into(w, *element, sub, invert, out);
        }
        _ => {}
    }
}

/// A dense 0/1 matrix pairing flattened leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMatrix {
    height: usize,
    width: usize,
    bits: Vec<u8>,
}

impl MapMatrix {
    /// An all-zero matrix.
    pub fn zero(height: usize, width: usize) -> Self {
        MapMatrix {
            height,
            width,
            bits: vec![0; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.bits[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.bits[row * self.width + col] = value;
    }

    /// The transposed matrix.
    pub fn transposed(&self) -> MapMatrix {
        let mut t = MapMatrix::zero(self.width, self.height);
        for r in 0..self.height {
            for c in 0..self.width {
                t.set(c, r, self.get(r, c));
            }
        }
        t
    }
}

/// A mapping between the flattened leaves of two types.
#[derive(Debug, Clone)]
pub struct TypeMapperData {
    /// Source type.
    pub a: TypeId,
    /// Destination type.
    pub b: TypeId,
    /// Flattened leaves of `a`.
    pub flat_a: Vec<FlatType>,
    /// Flattened leaves of `b`.
    pub flat_b: Vec<FlatType>,
    /// `flat_a.len() x flat_b.len()` pairing matrix.
    pub matrix: MapMatrix,
    /// Metadata for transforms.
    pub meta: IndexMap<String, String>,
}

impl World {
    /// Create an empty mapper from `a` to `b`. Not installed on `a`.
    pub fn new_mapper(&mut self, a: TypeId, b: TypeId) -> MapperId {
        let flat_a = flatten(self, a);
        let flat_b = flatten(self, b);
        let matrix = MapMatrix::zero(flat_a.len(), flat_b.len());
        let id = MapperId(self.mappers.len() as u32);
        self.mappers.push(TypeMapperData {
            a,
            b,
            flat_a,
            flat_b,
            matrix,
            meta: IndexMap::new(),
        });
        id
    }

    /// Identity mapper of a type onto itself: every leaf pairs with itself.
    pub fn identity_mapper(&mut self, a: TypeId) -> MapperId {
        let id = self.new_mapper(a, a);
        let n = self.mapper(id).flat_a.len();
        for i in 0..n {
            self.mapper_mut(id).matrix.set(i, i, 1);
        }
        id
    }

    /// Equal-structure mapper between two structurally equal types: leaves
    /// pair at matching indices.
    pub fn implicit_mapper(&mut self, a: TypeId, b: TypeId) -> Result<MapperId> {
        if !self.types_equal(a, b) {
            return Err(IrError::Type(format!(
                "cannot generate an implicit mapper between unequal types {} and {}",
                self.type_to_string(a),
                self.type_to_string(b)
            )));
        }
        let id = self.new_mapper(a, b);
        let n = self.mapper(id).flat_a.len().min(self.mapper(id).flat_b.len());
        for i in 0..n {
            self.mapper_mut(id).matrix.set(i, i, 1);
        }
        Ok(id)
    }

    /// Pair leaf `i` of A with leaf `j` of B.
    pub fn mapper_add(&mut self, m: MapperId, i: usize, j: usize) {
        self.mapper_mut(m).matrix.set(i, j, 1);
    }

    /// A new mapper with A and B swapped and the matrix transposed.
    pub fn mapper_inverse(&mut self, m: MapperId) -> MapperId {
        let data = self.mapper(m);
        let (a, b) = (data.b, data.a);
        let matrix = data.matrix.transposed();
        let meta = data.meta.clone();
        let id = self.new_mapper(a, b);
        self.mapper_mut(id).matrix = matrix;
        self.mapper_mut(id).meta = meta;
        id
    }

    /// Install a mapper on its source type. An existing mapper to the same
    /// destination is either replaced or rejected. If the destination lacks a
    /// mapper back, the transposed inverse is installed there as well.
    pub fn install_mapper(&mut self, m: MapperId, remove_existing: bool) -> Result<()> {
        let a = self.mapper(m).a;
        let b = self.mapper(m).b;
        if self.find_installed(a, b).is_some() {
            if remove_existing {
                self.remove_mappers_to(a, b);
            } else {
                return Err(IrError::Type(format!(
                    "a mapper from {} to {} already exists",
                    self.type_to_string(a),
                    self.type_to_string(b)
                )));
            }
        }
        self.ty_mut(a).mappers.push(m);
        if self.find_installed(b, a).is_none() {
            let inv = self.mapper_inverse(m);
            self.ty_mut(b).mappers.push(inv);
        }
        Ok(())
    }

    /// Remove all installed mappers from `a` to `b`. Returns how many were
    /// removed.
    pub fn remove_mappers_to(&mut self, a: TypeId, b: TypeId) -> usize {
        let before = self.ty(a).mappers.len();
        let kept: Vec<MapperId> = self
            .ty(a)
            .mappers
            .iter()
            .copied()
            .filter(|m| self.mapper(*m).b != b)
            .collect();
        let removed = before - kept.len();
        self.ty_mut(a).mappers = kept;
        removed
    }

    /// Mappers installed on a type, in installation order.
    pub fn installed_mappers(&self, ty: TypeId) -> Vec<MapperId> {
        self.ty(ty).mappers.clone()
    }

    fn find_installed(&self, a: TypeId, b: TypeId) -> Option<MapperId> {
        self.ty(a)
            .mappers
            .iter()
            .copied()
            .find(|m| self.mapper(*m).a == a && self.mapper(*m).b == b)
    }

    /// Find or generate a mapper from `a` to `b`.
    ///
    /// The search order is: installed mappers, the identity (same type
    /// object), a custom generator (streams can map to matching streams and
    /// to data-less streams), and finally the equal-structure implicit
    /// mapper. Generated custom mappers are installed; identity and implicit
    /// mappers are returned without installation.
    pub fn get_mapper(&mut self, a: TypeId, b: TypeId, generate_implicit: bool) -> Option<MapperId> {
        if let Some(m) = self.find_installed(a, b) {
            return Some(m);
        }
        if !generate_implicit {
            return None;
        }
        if a == b {
            return Some(self.identity_mapper(a));
        }
        if self.can_generate_stream_mapper(a, b) {
            let m = self.generate_stream_mapper(a, b)?;
            self.install_mapper(m, true).ok()?;
            return Some(m);
        }
        if self.types_equal(a, b) {
            return self.implicit_mapper(a, b).ok();
        }
        None
    }

    /// Unique `(i, j)` pairs set in the mapping matrix, row-major.
    pub fn mapping_pairs(&self, m: MapperId) -> Vec<(usize, usize)> {
        let data = self.mapper(m);
        let mut out = Vec::new();
        for i in 0..data.matrix.height() {
            for j in 0..data.matrix.width() {
                if data.matrix.get(i, j) != 0 {
                    out.push((i, j));
                }
            }
        }
        out
    }

    /// Set a metadata key on a mapper.
    pub fn set_mapper_meta(&mut self, m: MapperId, key: &str, value: &str) {
        self.mapper_mut(m)
            .meta
            .insert(key.to_string(), value.to_string());
    }

    fn can_generate_stream_mapper(&self, a: TypeId, b: TypeId) -> bool {
        match (&self.ty(a).kind, &self.ty(b).kind) {
            (TypeKind::Stream { element: ea, .. }, TypeKind::Stream { element: eb, .. }) => {
                // Equal streams map leaf-for-leaf. A data-less stream can
                // also map onto any stream: back-ends still connect the
                // handshake but no data elements.
                self.types_equal(a, b) || *ea == self.nul() || *eb == self.nul()
            }
            _ => false,
        }
    }

    fn generate_stream_mapper(&mut self, a: TypeId, b: TypeId) -> Option<MapperId> {
        if self.types_equal(a, b) {
            return self.implicit_mapper(a, b).ok();
        }
        let m = self.new_mapper(a, b);
        self.mapper_mut(m).matrix.set(0, 0, 1);
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    /// Build the nested reference type of the flattening contract:
    /// outer{d: inner{a: bit, b: vec8, c: stream<vec8>}, e: stream<stream<vec8>>}
    fn nested_record(w: &mut World) -> (TypeId, Vec<TypeId>) {
        let a = w.bit("a");
        let b = w.vector_of(8);
        let c = w.stream_of(b);
        let inner = w.record(
            "inner",
            vec![Field::new("a", a), Field::new("b", b), Field::new("c", c)],
        );
        let e = w.stream_of(c);
        let outer = w.record("outer", vec![Field::new("d", inner), Field::new("e", e)]);
        (outer, vec![outer, inner, a, b, c, e])
    }

    #[test]
    fn flatten_is_preorder() {
        let mut w = World::new();
        let (outer, ids) = nested_record(&mut w);
        let flat = flatten(&w, outer);
        let expect = [
            ids[0], // outer
            ids[1], // d: inner
            ids[2], // d.a
            ids[3], // d.b
            ids[4], // d.c
            ids[3], // d.c element
            ids[5], // e
            ids[4], // e element stream
            ids[3], // e element element
        ];
        assert_eq!(flat.len(), expect.len());
        for (f, e) in flat.iter().zip(expect.iter()) {
            assert_eq!(f.ty, *e);
        }
        assert_eq!(flat[0].ty, outer);
    }

    #[test]
    fn flatten_names_join_with_separators() {
        let mut w = World::new();
        let (outer, _) = nested_record(&mut w);
        let flat = flatten(&w, outer);
        let names: Vec<String> = flat.iter().map(|f| f.name("x", "_")).collect();
        assert_eq!(
            names,
            vec!["x", "x_d", "x_d_a", "x_d_b", "x_d_c", "x_d_c", "x_e", "x_e", "x_e"]
        );
    }

    #[test]
    fn flatten_is_stable_on_reflatten() {
        let mut w = World::new();
        let (outer, _) = nested_record(&mut w);
        let first: Vec<TypeId> = flatten(&w, outer).iter().map(|f| f.ty).collect();
        let second: Vec<TypeId> = flatten(&w, outer).iter().map(|f| f.ty).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn no_sep_fields_join_tightly() {
        let mut w = World::new();
        let v = w.vector_of(32);
        let inner = w.record("aw", vec![Field::new("addr", v)]);
        let rec = w.record("bus", vec![Field::new("aw", inner).no_sep()]);
        let flat = flatten(&w, rec);
        assert_eq!(flat[2].name("mmio", "_"), "mmio_awaddr");
    }

    #[test]
    fn inversion_accumulates_along_path() {
        let mut w = World::new();
        let b = w.bit("b");
        let inner = w.record("inner", vec![Field::inverted("r", b)]);
        let outer = w.record("outer", vec![Field::inverted("i", inner)]);
        let flat = flatten(&w, outer);
        assert!(!flat[0].invert);
        assert!(flat[1].invert);
        assert!(!flat[2].invert); // double inversion cancels
    }

    #[test]
    fn inverse_of_inverse_restores_matrix() {
        let mut w = World::new();
        let bit_a = w.bit("a");
        let v = w.vector_of(8);
        let ra = w.record("ra", vec![Field::new("x", bit_a), Field::new("y", v)]);
        let rb = w.record("rb", vec![Field::new("p", bit_a), Field::new("q", v)]);
        let m = w.new_mapper(ra, rb);
        w.mapper_add(m, 0, 0);
        w.mapper_add(m, 1, 2);
        w.mapper_add(m, 2, 1);
        let inv = w.mapper_inverse(m);
        let inv_inv = w.mapper_inverse(inv);
        assert_eq!(w.mapper(m).matrix, w.mapper(inv_inv).matrix);
        assert_eq!(w.mapper(m).a, w.mapper(inv_inv).a);
        assert_eq!(w.mapper(m).b, w.mapper(inv_inv).b);
    }

    #[test]
    fn identity_mapper_pairs_every_leaf_with_itself() {
        let mut w = World::new();
        let b = w.bit("a");
        let v = w.vector_of(8);
        let r = w.record("r", vec![Field::new("a", b), Field::new("b", v)]);
        let m = w.identity_mapper(r);
        assert_eq!(w.mapping_pairs(m), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn install_also_installs_inverse() {
        let mut w = World::new();
        let b = w.bit("a");
        let r1 = w.record("r1", vec![Field::new("a", b)]);
        let r2 = w.record("r2", vec![Field::new("a", b)]);
        let m = w.implicit_mapper(r1, r2).unwrap();
        w.install_mapper(m, true).unwrap();
        assert_eq!(w.installed_mappers(r1).len(), 1);
        let back = w.installed_mappers(r2);
        assert_eq!(back.len(), 1);
        assert_eq!(w.mapper(back[0]).a, r2);
        assert_eq!(w.mapper(back[0]).b, r1);
    }
}
