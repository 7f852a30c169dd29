//! The nucleus: kernel plus MMIO infrastructure.
//!
//! The nucleus wraps the user kernel and the register file. Between them it
//! places an `ArrayCmdCtrlMerger` per command stream, which splices the
//! MMIO-provided buffer addresses into the command's ctrl field so the
//! kernel never handles raw addresses. Stream profilers are inserted here as
//! well, probing the data streams that the schema marked for profiling.

use mantlegen_ir::{Dir, GraphId, NodeId, World};

use crate::arrays::cmd_type;
use crate::axi4_lite::{axi4_lite_port, Axi4LiteSpec};
use crate::basic::{clock_reset_port, kernel_cd};
use crate::error::{DesignError, Result};
use crate::kernel::Kernel;
use crate::mmio::{expose_to_kernel, MmioFunction, MmioPortInfo};
use crate::profiler::{enable_stream_profiling, COUNTER_PORTS};
use crate::recordbatch::{FieldFunction, RecordBatch};

/// A generated nucleus.
#[derive(Debug, Clone)]
pub struct Nucleus {
    pub comp: GraphId,
    pub kernel_inst: GraphId,
    pub mmio_inst: GraphId,
}

/// The command/ctrl merger primitive. Pool-cached.
fn array_cmd_ctrl_merger(w: &mut World) -> Result<GraphId> {
    if let Some(existing) = w.pool_component("ArrayCmdCtrlMerger") {
        return Ok(existing);
    }
    let comp = w.component("ArrayCmdCtrlMerger")?;
    let baw = w.int_parameter("bus_addr_width", 64);
    let idw = w.int_parameter("index_width", 32);
    let tw = w.int_parameter("tag_width", 1);
    let num_addr = w.int_parameter("num_addr", 0);
    for p in [baw, idw, tw, num_addr] {
        w.add_node(comp, p)?;
    }

    let kcd_dom = kernel_cd(w);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, kcd)?;

    let sixty_four = w.lit_int(64);
    let ctrl_width = w.mul(num_addr, sixty_four);
    let nucleus_cmd_ty = cmd_type(w, tw, Some(ctrl_width))?;
    let nucleus_cmd = w.port("nucleus_cmd", nucleus_cmd_ty, Dir::Out, kcd_dom);
    w.add_node(comp, nucleus_cmd)?;

    let kernel_cmd_ty = cmd_type(w, tw, None)?;
    let kernel_cmd = w.port("kernel_cmd", kernel_cmd_ty, Dir::In, kcd_dom);
    w.add_node(comp, kernel_cmd)?;

    let reg64 = w.vector_of(64);
    let ctrl = w.port_array("ctrl", reg64, num_addr, Dir::In, kcd_dom)?;
    w.add_array(comp, ctrl)?;

    w.set_graph_meta(comp, mantlegen_ir::meta::PRIMITIVE, "true");
    w.set_graph_meta(comp, mantlegen_ir::meta::LIBRARY, "work");
    w.set_graph_meta(comp, mantlegen_ir::meta::PACKAGE, "Array_pkg");
    Ok(comp)
}

/// Build the nucleus component.
pub fn nucleus(
    w: &mut World,
    name: &str,
    recordbatches: &[RecordBatch],
    kernel: &Kernel,
    mmio_comp: GraphId,
    mmio_ports: &[MmioPortInfo],
) -> Result<Nucleus> {
    let comp = w.component(name)?;
    let baw = w.int_parameter("BUS_ADDR_WIDTH", 64);
    w.add_node(comp, baw)?;

    let kcd_dom = kernel_cd(w);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, kcd)?;
    let axi = axi4_lite_port(w, Dir::In, kcd_dom, Axi4LiteSpec::default())?;
    w.add_node(comp, axi)?;

    let kernel_inst = w.add_instance_of(comp, kernel.comp, "")?;
    let kernel_kcd = w.get_port(kernel_inst, "kcd")?;
    w.connect(kernel_kcd, kcd)?;

    let mmio_inst = w.add_instance_of(comp, mmio_comp, "")?;
    let mmio_bus = w.get_port(mmio_inst, "mmio")?;
    w.connect(mmio_bus, axi)?;
    let mmio_kcd = w.get_port(mmio_inst, "kcd")?;
    w.connect(mmio_kcd, kcd)?;

    // The buffer-address ports of the register file, in register order.
    let buffer_ports: Vec<NodeId> = mmio_ports
        .iter()
        .filter(|info| info.reg.function == MmioFunction::Buffer)
        .map(|info| w.get_port(mmio_inst, &info.port_name))
        .collect::<mantlegen_ir::Result<_>>()?;

    let merger_comp = array_cmd_ctrl_merger(w)?;

    // Copy the field-derived ports of every record batch, inverted, and
    // place one ctrl merger per command stream.
    let mut accms: Vec<GraphId> = Vec::new();
    for rb in recordbatches {
        for fp in rb.field_ports(FieldFunction::Arrow) {
            let copy = w.copy_port_inverted(fp.node)?;
            w.add_node(comp, copy)?;
        }
        for fp in rb.field_ports(FieldFunction::Unlock) {
            let copy = w.copy_port_inverted(fp.node)?;
            w.add_node(comp, copy)?;
        }
        for fp in rb.field_ports(FieldFunction::Command) {
            let copy = w.copy_port_inverted(fp.node)?;
            w.add_node(comp, copy)?;
            let accm = w.add_instance_of(comp, merger_comp, &format!("{}_accm_inst", fp.name))?;
            accms.push(accm);
        }
    }

    // Wire the record-batch facing ports through to the kernel, commands
    // through their mergers, and buffer addresses into the mergers.
    let mut accm_idx = 0;
    let mut buf_idx = 0;
    for rb in recordbatches {
        for fp in rb.field_ports(FieldFunction::Arrow) {
            let kernel_data = w.get_port(kernel_inst, &fp.name)?;
            let nucleus_data = w.get_port(comp, &fp.name)?;
            if w.node(fp.node).dir() == Some(Dir::Out) {
                // Read batch: data flows in through the nucleus boundary.
                w.connect(kernel_data, nucleus_data)?;
            } else {
                w.connect(nucleus_data, kernel_data)?;
            }
        }
        for fp in rb.field_ports(FieldFunction::Unlock) {
            let kernel_unl = w.get_port(kernel_inst, &fp.name)?;
            let nucleus_unl = w.get_port(comp, &fp.name)?;
            w.connect(kernel_unl, nucleus_unl)?;
        }
        for fp in rb.field_ports(FieldFunction::Command) {
            let accm = accms[accm_idx];
            let accm_nucleus_cmd = w.get_port(accm, "nucleus_cmd")?;
            let accm_kernel_cmd = w.get_port(accm, "kernel_cmd")?;
            let accm_ctrl = w.get_port_array(accm, "ctrl")?;
            let nucleus_cmd = w.get_port(comp, &fp.name)?;
            let kernel_cmd = w.get_port(kernel_inst, &fp.name)?;

            w.connect(nucleus_cmd, accm_nucleus_cmd)?;
            w.connect(accm_kernel_cmd, kernel_cmd)?;

            let field_buffers = rb
                .desc
                .fields
                .get(fp.desc_index)
                .map(|f| f.buffers.len())
                .unwrap_or(0);
            for _ in 0..field_buffers {
                let slot = w.array_append(accm_ctrl, true)?;
                let buffer_port = *buffer_ports.get(buf_idx).ok_or_else(|| {
                    DesignError::Mmio(format!(
                        "register file has no buffer register for {} buffer {buf_idx}",
                        fp.name
                    ))
                })?;
                w.connect(slot, buffer_port)?;
                buf_idx += 1;
            }
            accm_idx += 1;
        }
    }

    // Registers exposed to the kernel bypass the mergers entirely.
    for info in mmio_ports {
        if !expose_to_kernel(info.reg.function) {
            continue;
        }
        let mmio_port = w.get_port(mmio_inst, &info.port_name)?;
        let kernel_port = w.get_port(kernel_inst, &info.reg.name)?;
        if w.node(mmio_port).dir() == Some(Dir::Out) {
            w.connect(kernel_port, mmio_port)?;
        } else {
            w.connect(mmio_port, kernel_port)?;
        }
    }

    insert_profilers(w, comp, recordbatches, mmio_inst, mmio_ports)?;

    Ok(Nucleus {
        comp,
        kernel_inst,
        mmio_inst,
    })
}

/// Interpose a signal on every profiled data port and hang profilers off it,
/// wiring shared enable/clear controls and the counter status registers.
fn insert_profilers(
    w: &mut World,
    comp: GraphId,
    recordbatches: &[RecordBatch],
    mmio_inst: GraphId,
    mmio_ports: &[MmioPortInfo],
) -> Result<()> {
    let mut probes: Vec<NodeId> = Vec::new();
    let mut rebinding = std::collections::HashMap::new();
    for rb in recordbatches {
        for fp in rb.field_ports(FieldFunction::Arrow) {
            if !fp.profile {
                continue;
            }
            let nucleus_port = w.get_port(comp, &fp.name)?;
            let sig = w.attach_signal(comp, nucleus_port, &mut rebinding)?;
            probes.push(sig);
        }
    }
    if probes.is_empty() {
        return Ok(());
    }

    let profiled = enable_stream_profiling(w, comp, &probes)?;

    let enable_src = w.get_port(mmio_inst, "f_profile_enable_data")?;
    let clear_src = w.get_port(mmio_inst, "f_profile_clear_data")?;

    // Counter status registers follow the same generation order as the
    // profiler instances.
    let status_ports: Vec<NodeId> = mmio_ports
        .iter()
        .filter(|info| {
            info.reg.function == MmioFunction::Profile
                && info.reg.name.ends_with(|c: char| c.is_ascii_digit())
        })
        .map(|info| w.get_port(mmio_inst, &info.port_name))
        .collect::<mantlegen_ir::Result<_>>()?;

    let mut status_idx = 0;
    for (_node, instances) in profiled {
        for inst in instances {
            let enable = w.get_port(inst, "enable")?;
            let clear = w.get_port(inst, "clear")?;
            w.connect(enable, enable_src)?;
            w.connect(clear, clear_src)?;
            for counter in COUNTER_PORTS {
                let out = w.get_port(inst, counter)?;
                let status = *status_ports.get(status_idx).ok_or_else(|| {
                    DesignError::Mmio(format!(
                        "register file has no status register for profiler counter {counter}"
                    ))
                })?;
                w.connect(status, out)?;
                status_idx += 1;
            }
        }
    }
    Ok(())
}
