//! Array reader/writer primitives and their stream plumbing.
//!
//! An array reader (or writer) is a pool-cached primitive configured by a
//! schema-derived `CFG` string. Toward the kernel it exposes a command
//! stream, an unlock stream and a canonical data stream; toward memory it
//! exposes a bus port. Field-specific stream types are mapped onto the
//! canonical data stream by [`stream_type_mapper`].

use mantlegen_ir::{flatten, meta, Dir, GraphId, MapperId, NodeId, TypeId, World};

use crate::basic::{bus_cd, clock_reset_port, dvalid, kernel_cd, last, ARRAY_DATA};
use crate::bus::{bus_port, BusFunction, BusParams};
use crate::error::Result;
use crate::schema::Mode;

/// Width of the first/last index fields of a command stream.
pub const INDEX_WIDTH: u64 = 32;

/// The command stream type: index range, optional buffer-address ctrl field,
/// and a tag.
pub fn cmd_type(w: &mut World, tag_width: NodeId, ctrl_width: Option<NodeId>) -> Result<TypeId> {
    let first = w.vector_of(INDEX_WIDTH);
    let lastidx = w.vector_of(INDEX_WIDTH);
    let mut fields = vec![
        mantlegen_ir::Field::new("firstIdx", first),
        mantlegen_ir::Field::new("lastIdx", lastidx),
    ];
    if let Some(cw) = ctrl_width {
        let ctrl = w.vector("ctrl", cw)?;
        fields.push(mantlegen_ir::Field::new("ctrl", ctrl));
    }
    let tag = w.vector("tag", tag_width)?;
    fields.push(mantlegen_ir::Field::new("tag", tag));
    let rec = w.record("cmd_rec", fields);
    Ok(w.stream("cmd", rec, ""))
}

/// The unlock stream type: a tag handed back when a command completes.
pub fn unlock_type(w: &mut World, tag_width: NodeId) -> Result<TypeId> {
    let tag = w.vector("tag", tag_width)?;
    Ok(w.stream("unl", tag, ""))
}

/// The canonical data stream of an array reader/writer.
pub fn array_data_type(w: &mut World, data_width: NodeId) -> Result<TypeId> {
    let dv = dvalid(w);
    let l = last(w);
    let data = w.vector("data", data_width)?;
    w.set_type_meta(data, ARRAY_DATA, "true");
    let rec = w.record(
        "data_rec",
        vec![
            mantlegen_ir::Field::new("dvalid", dv),
            mantlegen_ir::Field::new("last", l),
            mantlegen_ir::Field::new("data", data),
        ],
    );
    Ok(w.stream("data", rec, ""))
}

fn array_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Read => "ArrayReader",
        Mode::Write => "ArrayWriter",
    }
}

/// The array reader/writer primitive for a mode. Pool-cached.
pub fn array(w: &mut World, mode: Mode) -> Result<GraphId> {
    let name = array_name(mode);
    if let Some(existing) = w.pool_component(name) {
        return Ok(existing);
    }
    let comp = w.component(name)?;

    let bus = BusParams::new(w);
    bus.add_to(w, comp)?;
    let index_width = w.int_parameter("INDEX_WIDTH", INDEX_WIDTH as i64);
    let string_ty = w.string_type();
    let empty = w.lit_str("");
    let cfg = w.parameter("CFG", string_ty, Some(empty))?;
    let bool_ty = w.boolean();
    let no = w.lit_bool(false);
    let cmd_tag_enable = w.parameter("CMD_TAG_ENABLE", bool_ty, Some(no))?;
    let cmd_tag_width = w.int_parameter("CMD_TAG_WIDTH", 1);
    let ctrl_width = w.int_parameter("CTRL_WIDTH", 64);
    let data_width = w.int_parameter("DATA_WIDTH", 64);
    for p in [
        index_width,
        cfg,
        cmd_tag_enable,
        cmd_tag_width,
        ctrl_width,
        data_width,
    ] {
        w.add_node(comp, p)?;
    }

    let bcd_dom = bus_cd(w);
    let kcd_dom = kernel_cd(w);
    let bcd = clock_reset_port(w, "bcd", bcd_dom);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, bcd)?;
    w.add_node(comp, kcd)?;

    let function = match mode {
        Mode::Read => BusFunction::Read,
        Mode::Write => BusFunction::Write,
    };
    let bus_prt = bus_port(w, "bus", Dir::Out, &bus, function, bcd_dom)?;
    w.add_node(comp, bus_prt)?;

    let cmd_ty = cmd_type(w, cmd_tag_width, Some(ctrl_width))?;
    let cmd = w.port("cmd", cmd_ty, Dir::In, kcd_dom);
    w.add_node(comp, cmd)?;

    let unl_ty = unlock_type(w, cmd_tag_width)?;
    let unl = w.port("unl", unl_ty, Dir::Out, kcd_dom);
    w.add_node(comp, unl)?;

    let data_ty = array_data_type(w, data_width)?;
    let data = match mode {
        Mode::Read => w.port("out", data_ty, Dir::Out, kcd_dom),
        Mode::Write => w.port("in", data_ty, Dir::In, kcd_dom),
    };
    w.add_node(comp, data)?;

    w.set_graph_meta(comp, meta::PRIMITIVE, "true");
    w.set_graph_meta(comp, meta::LIBRARY, "work");
    w.set_graph_meta(comp, meta::PACKAGE, "Array_pkg");
    Ok(comp)
}

/// The data port name of the primitive for a mode.
pub fn array_data_port_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Read => "out",
        Mode::Write => "in",
    }
}

/// Build a mapper from a field stream type onto the canonical array data
/// stream: every stream leaf pairs with the canonical stream, `dvalid` and
/// `last` leaves pair with their counterparts, and every other physical leaf
/// (data, lengths, counts) pairs with the packed data vector.
pub fn stream_type_mapper(w: &mut World, field_ty: TypeId, array_ty: TypeId) -> Result<MapperId> {
    let flat_b = flatten(w, array_ty);
    let mut b_stream = 0;
    let mut b_dvalid = 0;
    let mut b_last = 0;
    let mut b_data = 0;
    for (j, fb) in flat_b.iter().enumerate() {
        let name = &w.ty(fb.ty).name;
        if w.ty(fb.ty).is_stream() {
            b_stream = j;
        } else if name == "dvalid" {
            b_dvalid = j;
        } else if name == "last" {
            b_last = j;
        } else if w.ty(fb.ty).meta.contains_key(ARRAY_DATA) {
            b_data = j;
        }
    }

    let mapper = w.new_mapper(field_ty, array_ty);
    let flat_a = w.mapper(mapper).flat_a.clone();
    let dv = dvalid(w);
    let l = last(w);
    for (i, fa) in flat_a.iter().enumerate() {
        let is_stream = w.ty(fa.ty).is_stream();
        let is_vector = w.ty(fa.ty).is_vector();
        if is_stream {
            w.mapper_add(mapper, i, b_stream);
        } else if fa.ty == dv {
            w.mapper_add(mapper, i, b_dvalid);
        } else if fa.ty == l {
            w.mapper_add(mapper, i, b_last);
        } else if is_vector {
            w.mapper_add(mapper, i, b_data);
        }
    }
    Ok(mapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{field_stream_type, BatchField, LogicalType};

    #[test]
    fn array_primitives_are_pool_cached() {
        let mut w = World::new();
        let a = array(&mut w, Mode::Read).unwrap();
        let b = array(&mut w, Mode::Read).unwrap();
        assert_eq!(a, b);
        w.get_port(a, "out").unwrap();
        w.get_port(a, "cmd").unwrap();
        w.get_port(a, "unl").unwrap();
        w.get_port(a, "bus").unwrap();
        let wr = array(&mut w, Mode::Write).unwrap();
        w.get_port(wr, "in").unwrap();
    }

    #[test]
    fn stream_mapper_covers_every_physical_leaf() {
        let mut w = World::new();
        let field = BatchField::new("name", LogicalType::Utf8);
        let field_ty = field_stream_type(&mut w, &field).unwrap();
        let width = w.int_parameter("DATA_WIDTH", 64);
        let array_ty = array_data_type(&mut w, width).unwrap();
        let m = stream_type_mapper(&mut w, field_ty, array_ty).unwrap();
        let pairs = w.mapping_pairs(m);
        // Two streams, each with dvalid/last and a payload vector, plus the
        // wrapping record rows are unmapped.
        let flat_a = mantlegen_ir::flatten(&w, field_ty);
        for (i, fa) in flat_a.iter().enumerate() {
            let is_stream = w.ty(fa.ty).is_stream();
            let is_leaf = w.ty(fa.ty).is_vector() || w.ty(fa.ty).name == "dvalid" || w.ty(fa.ty).name == "last";
            if is_stream || is_leaf {
                assert!(pairs.iter().any(|(a, _)| *a == i), "leaf {i} unmapped");
            }
        }
    }
}
