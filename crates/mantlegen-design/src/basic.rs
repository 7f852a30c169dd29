//! Basic types shared by the whole design library.
//!
//! Every graph boundary carries a `cr` clock/reset record per clock domain.
//! The marker bit types (`dvalid`, `last`) are pooled so that stream mappers
//! and profilers can recognize them in flattened sequences by identity.

use mantlegen_ir::{Dir, DomainId, Field, GraphId, NodeId, TypeId, World};

use crate::error::Result;

/// Metadata key marking the data vector of an array data stream.
pub const ARRAY_DATA: &str = "array-data";

/// Kernel-side clock domain.
pub fn kernel_cd(w: &mut World) -> DomainId {
    w.domain_named("kcd")
}

/// Bus-side clock domain.
pub fn bus_cd(w: &mut World) -> DomainId {
    w.domain_named("bcd")
}

fn pooled_bit(w: &mut World, name: &str) -> TypeId {
    if let Some(t) = w.pool_type(name) {
        return t;
    }
    let t = w.bit(name);
    let _ = w.pool_add_type(t);
    t
}

/// The pooled clock/reset record.
pub fn cr(w: &mut World) -> TypeId {
    if let Some(t) = w.pool_type("cr") {
        return t;
    }
    let clk = pooled_bit(w, "clk");
    let reset = pooled_bit(w, "reset");
    let t = w.record("cr", vec![Field::new("clk", clk), Field::new("reset", reset)]);
    let _ = w.pool_add_type(t);
    t
}

/// The pooled dvalid marker bit.
pub fn dvalid(w: &mut World) -> TypeId {
    pooled_bit(w, "dvalid")
}

/// The pooled last marker bit.
pub fn last(w: &mut World) -> TypeId {
    pooled_bit(w, "last")
}

/// An input clock/reset port for a domain.
pub fn clock_reset_port(w: &mut World, name: &str, domain: DomainId) -> NodeId {
    let ty = cr(w);
    w.port(name, ty, Dir::In, domain)
}

/// Find the clock/reset port of a component for a given domain.
pub fn find_clock_reset_port(w: &World, comp: GraphId, domain: DomainId) -> Option<NodeId> {
    w.ports_of(comp).into_iter().find(|p| {
        w.ty(w.node(*p).ty).name == "cr" && w.node(*p).domain() == Some(domain)
    })
}

/// Ceil(log2(n)), used for count-field widths.
pub fn log2_ceil(n: u64) -> u64 {
    let mut bits = 0;
    while (1u64 << bits) < n {
        bits += 1;
    }
    bits
}

/// Connect equally named parameters of two graphs, destination from source.
pub fn connect_named_params(
    w: &mut World,
    dst: GraphId,
    src: GraphId,
    names: &[&str],
) -> Result<()> {
    for name in names {
        let d = w.get_parameter(dst, name)?;
        let s = w.get_parameter(src, name)?;
        w.connect(d, s)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cr_is_pooled() {
        let mut w = World::new();
        assert_eq!(cr(&mut w), cr(&mut w));
        assert_eq!(dvalid(&mut w), dvalid(&mut w));
    }

    #[test]
    fn log2_ceil_widths() {
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(3), 2);
        assert_eq!(log2_ceil(8), 3);
    }
}
