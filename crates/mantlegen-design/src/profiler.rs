//! Stream profilers.
//!
//! A profiler instance watches one stream and accumulates five counters
//! (elements, ready cycles, valid cycles, transfers, packets), each surfaced
//! as a status register. The probe is sized by the stream's count field when
//! one exists; plain one-element streams use the default probe width of 1.

use mantlegen_ir::{flatten, meta, Dir, GraphId, NodeId, World};
use tracing::debug;

use crate::basic::{clock_reset_port, find_clock_reset_port, kernel_cd};
use crate::error::{DesignError, Result};
use crate::mmio::{MmioBehavior, MmioFunction, MmioReg};
use crate::recordbatch::{FieldFunction, RecordBatch};

/// Width of the counter registers.
pub const COUNT_WIDTH: u32 = 32;

/// The five counter port names, in register order.
pub const COUNTER_PORTS: [&str; 5] = ["ecount", "rcount", "vcount", "tcount", "pcount"];

const ECOUNT_DOC: &str = "Element count. Accumulates the number of elements transferred on the \
                          stream. Writing to the register subtracts the written value.";
const RCOUNT_DOC: &str = "Ready count. Increments each cycle that the stream is ready. Writing \
                          to the register subtracts the written value.";
const VCOUNT_DOC: &str = "Valid count. Increments each cycle that the stream is valid. Writing \
                          to the register subtracts the written value.";
const TCOUNT_DOC: &str = "Transfer count. Increments for each transfer on the stream, i.e. when \
                          it is handshaked. Writing to the register subtracts the written value.";
const PCOUNT_DOC: &str = "Packet count. Increments each time the last signal is set during a \
                          handshake. Writing to the register subtracts the written value.";

/// The registers the MMIO component must reserve for profiling: shared
/// enable and clear controls, then five counters per profiled stream, in
/// record-batch, field and stream order.
pub fn profiling_regs(w: &World, recordbatches: &[RecordBatch]) -> Vec<MmioReg> {
    use MmioBehavior as B;
    use MmioFunction as F;
    let mut regs = Vec::new();
    if !recordbatches
        .iter()
        .any(|rb| rb.field_ports.iter().any(|fp| fp.profile))
    {
        return regs;
    }
    regs.push(MmioReg::new(
        F::Profile,
        B::Control,
        "profile_enable",
        "Activates profiler counting when this bit is high.",
        1,
    ));
    regs.push(MmioReg::new(
        F::Profile,
        B::Strobe,
        "profile_clear",
        "Resets profiler counters when this bit is asserted.",
        1,
    ));
    for rb in recordbatches {
        for fp in rb.field_ports(FieldFunction::Arrow) {
            if !fp.profile {
                continue;
            }
            let flat = flatten(w, w.node(fp.node).ty);
            for (fti, entry) in flat.iter().enumerate() {
                if !w.ty(entry.ty).is_stream() {
                    continue;
                }
                let prefix = entry.name(&fp.name, "_");
                let docs = [ECOUNT_DOC, RCOUNT_DOC, VCOUNT_DOC, TCOUNT_DOC, PCOUNT_DOC];
                for (port, doc) in COUNTER_PORTS.iter().zip(docs.iter()) {
                    regs.push(MmioReg::new(
                        F::Profile,
                        B::Status,
                        &format!("{prefix}_{port}{fti}"),
                        doc,
                        COUNT_WIDTH,
                    ));
                }
            }
        }
    }
    regs
}

/// The probe stream type: a count vector transported per transfer.
pub fn stream_probe_type(w: &mut World, count_width: NodeId) -> Result<mantlegen_ir::TypeId> {
    let count = w.vector("count", count_width)?;
    Ok(w.stream("probe", count, ""))
}

/// The stream profiler primitive. Pool-cached.
pub fn profiler(w: &mut World) -> Result<GraphId> {
    if let Some(existing) = w.pool_component("ProfilerStreams") {
        return Ok(existing);
    }
    let comp = w.component("ProfilerStreams")?;

    let in_count_width = w.int_parameter("PROBE_COUNT_WIDTH", 1);
    let out_count_width = w.int_parameter("OUT_COUNT_WIDTH", COUNT_WIDTH as i64);
    w.add_node(comp, in_count_width)?;
    w.add_node(comp, out_count_width)?;

    let kcd_dom = kernel_cd(w);
    let pcd = clock_reset_port(w, "pcd", kcd_dom);
    w.add_node(comp, pcd)?;

    let probe_ty = stream_probe_type(w, in_count_width)?;
    let probe = w.port("probe", probe_ty, Dir::In, kcd_dom);
    w.add_node(comp, probe)?;

    let enable_ty = w.bit("bit");
    let enable = w.port("enable", enable_ty, Dir::In, kcd_dom);
    w.add_node(comp, enable)?;
    let clear_ty = w.bit("bit");
    let clear = w.port("clear", clear_ty, Dir::In, kcd_dom);
    w.add_node(comp, clear)?;

    let out_ty = w.vector("out_count", out_count_width)?;
    for name in COUNTER_PORTS {
        let port = w.port(name, out_ty, Dir::Out, kcd_dom);
        w.add_node(comp, port)?;
    }

    w.set_graph_meta(comp, meta::PRIMITIVE, "true");
    w.set_graph_meta(comp, meta::LIBRARY, "work");
    w.set_graph_meta(comp, meta::PACKAGE, "Profile_pkg");
    Ok(comp)
}

/// Insert a profiler for every stream inside the flattened types of the
/// given signals. Returns the profiler instances per signal, in insertion
/// order.
pub fn enable_stream_profiling(
    w: &mut World,
    comp: GraphId,
    nodes: &[NodeId],
) -> Result<Vec<(NodeId, Vec<GraphId>)>> {
    let profiler_comp = profiler(w)?;
    let mut result = Vec::new();
    for node in nodes {
        let node = *node;
        let domain = w.node(node).domain().ok_or_else(|| {
            DesignError::Schema(format!(
                "no clock domain specified for stream node {}",
                w.node(node).name
            ))
        })?;
        let cr_port = find_clock_reset_port(w, comp, domain).ok_or_else(|| {
            DesignError::Schema(format!(
                "no clock/reset port on component {} for the domain of node {}",
                w.graph(comp).name,
                w.node(node).name
            ))
        })?;

        let host_ty = w.node(node).ty;
        let flat = flatten(w, host_ty);
        let mut instances = Vec::new();
        let mut stream_index = 0;
        for fti in 0..flat.len() {
            if !w.ty(flat[fti].ty).is_stream() {
                continue;
            }
            debug!(
                node = %w.node(node).name,
                stream = stream_index,
                index = fti,
                "inserting stream profiler"
            );
            let node_name = w.node(node).name.clone();
            let base = flat[fti].name(&node_name, "_");
            let inst_name = w.unique_name(comp, &format!("{base}_inst"));
            let inst = w.add_instance_of(comp, profiler_comp, &inst_name)?;

            let probe = w.get_port(inst, "probe")?;
            let pcd = w.get_port(inst, "pcd")?;
            w.set_node_domain(probe, domain)?;
            w.set_node_domain(pcd, domain)?;

            // Pair the stream with the probe stream, and its count field
            // with the probe count when one follows before the next stream.
            let mapper = w.new_mapper(host_ty, w.node(probe).ty);
            w.mapper_add(mapper, fti, 0);
            let mut j = fti + 1;
            while j < flat.len() && !w.ty(flat[j].ty).is_stream() {
                if let Some(width) = w.ty(flat[j].ty).meta.get(meta::COUNT) {
                    let width: i64 = width.parse().unwrap_or(1);
                    let count_param = w.get_parameter(inst, "PROBE_COUNT_WIDTH")?;
                    let width_lit = w.lit_int(width);
                    w.connect(count_param, width_lit)?;
                    w.mapper_add(mapper, j, 1);
                    break;
                }
                j += 1;
            }
            w.install_mapper(mapper, true)?;

            w.connect(pcd, cr_port)?;
            w.connect(probe, node)?;

            for counter in COUNTER_PORTS {
                let port = w.get_port(inst, counter)?;
                w.set_node_domain(port, domain)?;
            }
            instances.push(inst);
            stream_index += 1;
        }
        result.push((node, instances));
    }
    Ok(result)
}
