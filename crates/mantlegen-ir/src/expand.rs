//! Stream expansion.
//!
//! Streams are abstract until lowered: expansion rewrites `Stream<E>` into
//! `Stream<Record{valid, ready (inverted), <elem>: E}>`, recursively for
//! nested streams, and rewrites every mapper that was installed on an
//! expanded type so that the new valid/ready leaves pair one-to-one between
//! matched streams while the original pairings are preserved.
//!
//! Expansion is idempotent: visited types and rewritten mappers are marked
//! `was-expanded`, and streams that already carry an `expand-type` tag are
//! skipped.

use tracing::debug;

use crate::error::Result;
use crate::mapper::{flatten, MapMatrix};
use crate::meta;
use crate::types::Field;
use crate::world::{GraphId, TypeId, World};

/// Snapshot of a mapper taken before its types were expanded.
struct SavedMapper {
    b: TypeId,
    matrix: MapMatrix,
    had_stream: bool,
    was_expanded: bool,
}

impl World {
    /// Expand every stream type reachable from a component and rewrite the
    /// mappers installed on the expanded types.
    pub fn expand_streams(&mut self, comp: GraphId) -> Result<()> {
        debug!(component = %self.graph(comp).name, "materializing stream abstraction");
        let types = self.graph_types(comp);

        // Remember the pre-expansion mappers; replacing a stream's element
        // type forgets the mappers installed on it.
        let mut saved: Vec<(TypeId, Vec<SavedMapper>)> = Vec::new();
        for ty in &types {
            let mappers = self.installed_mappers(*ty);
            if !mappers.is_empty() {
                let snapshot = mappers
                    .iter()
                    .map(|m| {
                        let data = self.mapper(*m);
                        SavedMapper {
                            b: data.b,
                            matrix: data.matrix.clone(),
                            had_stream: data.flat_a.iter().any(|f| self.ty(f.ty).is_stream())
                                || data.flat_b.iter().any(|f| self.ty(f.ty).is_stream()),
                            was_expanded: data.meta.contains_key(meta::WAS_EXPANDED),
                        }
                    })
                    .collect();
                saved.push((*ty, snapshot));
            }
            self.expand_stream_type(*ty)?;
        }

        for (ty, snapshot) in saved {
            self.expand_mappers(ty, snapshot)?;
        }
        Ok(())
    }

    /// All types referenced by a component's objects and its children's
    /// objects, including nested types, in first-seen order.
    pub fn graph_types(&self, comp: GraphId) -> Vec<TypeId> {
        let mut out: Vec<TypeId> = Vec::new();
        let mut push = |out: &mut Vec<TypeId>, ty: TypeId| {
            if !out.contains(&ty) {
                out.push(ty);
            }
        };
        let mut graphs = vec![comp];
        graphs.extend(self.children_of(comp));
        for g in graphs {
            for n in self.nodes_of(g) {
                let ty = self.node(n).ty;
                push(&mut out, ty);
                for nested in self.nested_types(ty) {
                    push(&mut out, nested);
                }
            }
            for a in self.arrays_of(g, None) {
                let base = self.array(a).base;
                let ty = self.node(base).ty;
                push(&mut out, ty);
                for nested in self.nested_types(ty) {
                    push(&mut out, nested);
                }
            }
        }
        out
    }

    fn expand_stream_type(&mut self, ty: TypeId) -> Result<()> {
        if self.ty(ty).meta.contains_key(meta::WAS_EXPANDED) {
            return Ok(());
        }
        self.set_type_meta(ty, meta::WAS_EXPANDED, "true");
        let flat = flatten(self, ty);
        if !flat.iter().any(|f| self.ty(f.ty).is_stream()) {
            return Ok(());
        }
        debug!(ty = %self.type_to_string(ty), "expanding type");
        for entry in flat {
            let stream = entry.ty;
            if !self.ty(stream).is_stream() {
                continue;
            }
            if self.ty(stream).meta.contains_key(meta::EXPAND_TYPE) {
                continue;
            }
            let element = self.stream_element(stream)?;
            let element_name = match &self.ty(stream).kind {
                crate::types::TypeKind::Stream { element_name, .. } => element_name.clone(),
                _ => String::new(),
            };
            let record_name = format!("{}_vr", self.ty(stream).name);
            let valid = self.valid();
            let ready = self.ready();
            let record = self.record(
                &record_name,
                vec![
                    Field::new("valid", valid),
                    Field::inverted("ready", ready),
                    Field::new(&element_name, element),
                ],
            );
            self.set_type_meta(record, meta::EXPAND_TYPE, "record");
            self.set_stream_element(stream, record)?;
            self.set_type_meta(stream, meta::EXPAND_TYPE, "stream");
        }
        Ok(())
    }

    fn expand_tag(&self, ty: TypeId) -> Option<&str> {
        self.ty(ty).meta.get(meta::EXPAND_TYPE).map(|s| s.as_str())
    }

    /// Rewrite the saved mappers of an expanded type.
    ///
    /// The walk advances through the new (expanded) flat sequences while
    /// tracking the corresponding position in the old matrix. For matching
    /// expansion tags on both sides the old bit is copied and the column
    /// advances by the width of that expansion (stream 4, record 3, valid 2,
    /// ready 1); for mismatched sides only the non-expanded side advances.
    fn expand_mappers(&mut self, ty: TypeId, saved: Vec<SavedMapper>) -> Result<()> {
        for old in saved {
            if !old.had_stream || old.was_expanded {
                continue;
            }
            // The far side may live outside the component being expanded
            // (e.g. a probe on a child instance); the rewrite needs both
            // sides in expanded form.
            self.expand_stream_type(old.b)?;
            let new_mapper = self.new_mapper(ty, old.b);
            let flat_a = self.mapper(new_mapper).flat_a.clone();
            let flat_b = self.mapper(new_mapper).flat_b.clone();
            let mut matrix = self.mapper(new_mapper).matrix.clone();

            let mut old_row: usize = 0;
            let mut new_row: usize = 0;
            while new_row < matrix.height() {
                let at = flat_a[new_row].ty;
                let a_tag = self.expand_tag(at).map(|s| s.to_string());
                let mut old_col: usize = 0;
                let mut new_col: usize = 0;
                while new_col < matrix.width() {
                    let bt = flat_b[new_col].ty;
                    let b_tag = self.expand_tag(bt).map(|s| s.to_string());
                    match (a_tag.as_deref(), b_tag.as_deref()) {
                        (Some("stream"), Some("stream")) => {
                            matrix.set(new_row, new_col, old.matrix.get(old_row, old_col));
                            new_col += 4; // skip over record, valid and ready
                            old_col += 1;
                        }
                        (Some("record"), Some("record")) => {
                            matrix.set(new_row, new_col, old.matrix.get(old_row, old_col));
                            new_col += 3; // skip over valid and ready
                            old_col += 1;
                        }
                        (Some("valid"), Some("valid")) => {
                            matrix.set(new_row, new_col, old.matrix.get(old_row, old_col));
                            new_col += 2; // skip over ready
                            old_col += 1;
                        }
                        (Some("ready"), Some("ready")) => {
                            matrix.set(new_row, new_col, old.matrix.get(old_row, old_col));
                            new_col += 1;
                            old_col += 1;
                        }
                        _ => {
                            // Mismatched sides: a copy only happens from a
                            // non-expanded row; expanded rows find their
                            // match on another row.
                            if a_tag.is_none() {
                                matrix.set(new_row, new_col, old.matrix.get(old_row, old_col));
                            }
                            new_col += 1;
                            if b_tag.is_none() || b_tag.as_deref() == Some("ready") {
                                old_col += 1;
                            }
                        }
                    }
                }
                if a_tag.is_none() || a_tag.as_deref() == Some("ready") {
                    old_row += 1;
                }
                new_row += 1;
            }

            self.mapper_mut(new_mapper).matrix = matrix;
            self.set_mapper_meta(new_mapper, meta::WAS_EXPANDED, "true");
            self.install_mapper(new_mapper, true)?;
        }
        Ok(())
    }
}
