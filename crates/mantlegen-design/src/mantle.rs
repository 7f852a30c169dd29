//! The mantle: nucleus, record batches and bus arbitration.
//!
//! The mantle is the generated top level. It instantiates the nucleus and
//! one instance per record batch, wires every record-batch bus port to an
//! appended slave slot of the matching arbiter, and exports each arbiter
//! master as a top-level bus port. Read and write arbiters are instantiated
//! on demand, one per bus function present.

use mantlegen_ir::{Dir, GraphId, World};
use tracing::debug;

use crate::axi4_lite::{axi4_lite_port, Axi4LiteSpec};
use crate::basic::{bus_cd, clock_reset_port, kernel_cd};
use crate::bus::{bus_arbiter, bus_port, connect_bus_params, BusFunction, BusParams};
use crate::error::Result;
use crate::nucleus::Nucleus;
use crate::recordbatch::{FieldFunction, RecordBatch};

/// A generated mantle.
#[derive(Debug, Clone)]
pub struct Mantle {
    pub comp: GraphId,
    pub nucleus_inst: GraphId,
    pub recordbatch_insts: Vec<GraphId>,
}

fn arbiter_master_name(function: BusFunction) -> &'static str {
    match function {
        BusFunction::Read => "rd_mst",
        BusFunction::Write => "wr_mst",
    }
}

/// Build the mantle component.
pub fn mantle(
    w: &mut World,
    name: &str,
    recordbatches: &[RecordBatch],
    nucleus: &Nucleus,
) -> Result<Mantle> {
    let comp = w.component(name)?;
    let bus_params = BusParams::new(w);
    bus_params.add_to(w, comp)?;

    let bcd_dom = bus_cd(w);
    let kcd_dom = kernel_cd(w);
    let bcd = clock_reset_port(w, "bcd", bcd_dom);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, bcd)?;
    w.add_node(comp, kcd)?;
    let regs = axi4_lite_port(w, Dir::In, kcd_dom, Axi4LiteSpec::default())?;
    w.add_node(comp, regs)?;

    let nucleus_inst = w.add_instance_of(comp, nucleus.comp, "")?;
    let n_kcd = w.get_port(nucleus_inst, "kcd")?;
    w.connect(n_kcd, kcd)?;
    let n_mmio = w.get_port(nucleus_inst, "mmio")?;
    w.connect(n_mmio, regs)?;

    // Instantiate the record batches and wire their field ports through the
    // nucleus.
    let mut rb_insts = Vec::new();
    for rb in recordbatches {
        let rbi = w.add_instance_of(comp, rb.comp, "")?;
        rb_insts.push(rbi);

        let rbi_bcd = w.get_port(rbi, "bcd")?;
        w.connect(rbi_bcd, bcd)?;
        let rbi_kcd = w.get_port(rbi, "kcd")?;
        w.connect(rbi_kcd, kcd)?;

        for fp in &rb.field_ports {
            let rb_port = w.get_port(rbi, &fp.name)?;
            let nucleus_port = w.get_port(nucleus_inst, &fp.name)?;
            match fp.function {
                FieldFunction::Arrow => {
                    if w.node(rb_port).dir() == Some(Dir::Out) {
                        w.connect(nucleus_port, rb_port)?;
                    } else {
                        w.connect(rb_port, nucleus_port)?;
                    }
                }
                FieldFunction::Command => {
                    w.connect(rb_port, nucleus_port)?;
                }
                FieldFunction::Unlock => {
                    w.connect(nucleus_port, rb_port)?;
                }
            }
        }
    }

    // One arbiter per bus function present among the record batches.
    for function in [BusFunction::Read, BusFunction::Write] {
        let used: Vec<(usize, String)> = recordbatches
            .iter()
            .enumerate()
            .flat_map(|(i, rb)| {
                rb.bus_ports
                    .iter()
                    .filter(|bp| bp.function == function)
                    .map(move |bp| (i, bp.name.clone()))
            })
            .collect();
        if used.is_empty() {
            continue;
        }
        debug!(function = ?function, slaves = used.len(), "adding bus arbiter");

        let arbiter_comp = bus_arbiter(w, function)?;
        let arbiter = w.add_instance_of(comp, arbiter_comp, "")?;
        connect_bus_params(w, arbiter, comp)?;
        let arb_bcd = w.get_port(arbiter, "bcd")?;
        w.connect(arb_bcd, bcd)?;

        let master = bus_port(
            w,
            arbiter_master_name(function),
            Dir::Out,
            &bus_params,
            function,
            bcd_dom,
        )?;
        w.add_node(comp, master)?;
        let arb_mst = w.get_port(arbiter, "mst")?;
        w.connect(master, arb_mst)?;

        let slaves = w.get_port_array(arbiter, "bsv")?;
        for (rb_idx, port_name) in used {
            let slot = w.array_append(slaves, true)?;
            let rb_bus = w.get_port(rb_insts[rb_idx], &port_name)?;
            w.connect(slot, rb_bus)?;
        }
    }

    Ok(Mantle {
        comp,
        nucleus_inst,
        recordbatch_insts: rb_insts,
    })
}
