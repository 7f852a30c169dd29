//! AXI4-Lite control bus.
//!
//! The five-channel record is cached in the type pool under a name derived
//! from its dimensions, so every port over the same dimensions shares one
//! type object and connections between them collapse to identity mappings.

use mantlegen_ir::{Dir, DomainId, Field, NodeId, TypeId, World};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// AXI4-Lite dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axi4LiteSpec {
    pub addr_width: u64,
    pub data_width: u64,
}

impl Default for Axi4LiteSpec {
    fn default() -> Self {
        Axi4LiteSpec {
            addr_width: 32,
            data_width: 32,
        }
    }
}

impl Axi4LiteSpec {
    /// Pool name for the record type of these dimensions.
    pub fn type_name(&self) -> String {
        format!("MMIO_A{}_D{}", self.addr_width, self.data_width)
    }
}

/// The pooled AXI4-Lite record type.
pub fn axi4_lite_type(w: &mut World, spec: Axi4LiteSpec) -> Result<TypeId> {
    let name = spec.type_name();
    if let Some(t) = w.pool_type(&name) {
        return Ok(t);
    }
    let aw_addr = w.vector_of(spec.addr_width);
    let aw_rec = w.record("aw", vec![Field::new("addr", aw_addr)]);
    let aw = w.stream("aw", aw_rec, "");

    let w_data = w.vector_of(spec.data_width);
    let w_strb = w.vector_of(spec.data_width / 8);
    let w_rec = w.record(
        "w",
        vec![Field::new("data", w_data), Field::new("strb", w_strb)],
    );
    let wch = w.stream("w", w_rec, "");

    let b_resp = w.vector_of(2);
    let b_rec = w.record("b", vec![Field::new("resp", b_resp)]);
    let b = w.stream("b", b_rec, "");

    let ar_addr = w.vector_of(spec.addr_width);
    let ar_rec = w.record("ar", vec![Field::new("addr", ar_addr)]);
    let ar = w.stream("ar", ar_rec, "");

    let r_data = w.vector_of(spec.data_width);
    let r_resp = w.vector_of(2);
    let r_rec = w.record(
        "r",
        vec![Field::new("data", r_data), Field::new("resp", r_resp)],
    );
    let r = w.stream("r", r_rec, "");

    let ty = w.record(
        &name,
        vec![
            Field::new("aw", aw).no_sep(),
            Field::new("w", wch).no_sep(),
            Field::inverted("b", b).no_sep(),
            Field::new("ar", ar).no_sep(),
            Field::inverted("r", r).no_sep(),
        ],
    );
    w.pool_add_type(ty)?;
    Ok(ty)
}

/// An AXI4-Lite port named `mmio`.
pub fn axi4_lite_port(
    w: &mut World,
    dir: Dir,
    domain: DomainId,
    spec: Axi4LiteSpec,
) -> Result<NodeId> {
    let ty = axi4_lite_type(w, spec)?;
    Ok(w.port("mmio", ty, dir, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_is_pooled_by_dimensions() {
        let mut w = World::new();
        let a = axi4_lite_type(&mut w, Axi4LiteSpec::default()).unwrap();
        let b = axi4_lite_type(&mut w, Axi4LiteSpec::default()).unwrap();
        assert_eq!(a, b);
        let c = axi4_lite_type(
            &mut w,
            Axi4LiteSpec {
                addr_width: 64,
                data_width: 32,
            },
        )
        .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn channel_names_join_without_separator() {
        let mut w = World::new();
        let ty = axi4_lite_type(&mut w, Axi4LiteSpec::default()).unwrap();
        let flat = mantlegen_ir::flatten(&w, ty);
        let names: Vec<String> = flat.iter().map(|f| f.name("mmio", "_")).collect();
        assert!(names.contains(&"mmio_awaddr".to_string()));
        assert!(names.contains(&"mmio_wstrb".to_string()));
        assert!(names.contains(&"mmio_rresp".to_string()));
    }
}
