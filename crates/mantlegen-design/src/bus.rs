//! Bus interface parameters, ports and arbiters.
//!
//! A bus interface is described by six parameters. A read bundle is a
//! request stream plus a reversed data stream; a write bundle is a request
//! stream plus a data stream. The strobe width parameter is constructed
//! unconditionally and simply unused by read bundles.

use mantlegen_ir::{meta, Dir, DomainId, Field, GraphId, NodeId, TypeId, World};
use serde::{Deserialize, Serialize};

use crate::basic::{bus_cd, clock_reset_port, connect_named_params, last};
use crate::error::Result;

/// Function of a bus interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusFunction {
    /// The interface reads from memory.
    Read,
    /// The interface writes to memory.
    Write,
}

/// The canonical bus parameter names, in declaration order.
pub const BUS_PARAM_NAMES: [&str; 6] = [
    "BUS_ADDR_WIDTH",
    "BUS_DATA_WIDTH",
    "BUS_STROBE_WIDTH",
    "BUS_LEN_WIDTH",
    "BUS_BURST_STEP_LEN",
    "BUS_BURST_MAX_LEN",
];

/// The six parameters describing a bus interface.
#[derive(Debug, Clone, Copy)]
pub struct BusParams {
    pub addr_width: NodeId,
    pub data_width: NodeId,
    pub strobe_width: NodeId,
    pub len_width: NodeId,
    pub burst_step: NodeId,
    pub burst_max: NodeId,
}

impl BusParams {
    /// Fresh parameter nodes with the default bus dimensions.
    pub fn new(w: &mut World) -> Self {
        BusParams {
            addr_width: w.int_parameter(BUS_PARAM_NAMES[0], 64),
            data_width: w.int_parameter(BUS_PARAM_NAMES[1], 512),
            strobe_width: w.int_parameter(BUS_PARAM_NAMES[2], 64),
            len_width: w.int_parameter(BUS_PARAM_NAMES[3], 8),
            burst_step: w.int_parameter(BUS_PARAM_NAMES[4], 1),
            burst_max: w.int_parameter(BUS_PARAM_NAMES[5], 16),
        }
    }

    /// All six parameter nodes, in declaration order.
    pub fn all(&self) -> [NodeId; 6] {
        [
            self.addr_width,
            self.data_width,
            self.strobe_width,
            self.len_width,
            self.burst_step,
            self.burst_max,
        ]
    }

    /// Add all six parameters to a graph.
    pub fn add_to(&self, w: &mut World, graph: GraphId) -> Result<()> {
        for p in self.all() {
            w.add_node(graph, p)?;
        }
        Ok(())
    }
}

/// The bus bundle type for a function, built over a parameter set.
pub fn bus_type(w: &mut World, params: &BusParams, function: BusFunction) -> Result<TypeId> {
    match function {
        BusFunction::Read => {
            let addr = w.vector("addr", params.addr_width)?;
            let len = w.vector("len", params.len_width)?;
            let rreq_rec = w.record("rreq_rec", vec![Field::new("addr", addr), Field::new("len", len)]);
            let rreq = w.stream("rreq", rreq_rec, "");
            let data = w.vector("data", params.data_width)?;
            let l = last(w);
            let rdat_rec = w.record("rdat_rec", vec![Field::new("data", data), Field::new("last", l)]);
            let rdat = w.stream("rdat", rdat_rec, "");
            Ok(w.record(
                "BusRead",
                vec![Field::new("rreq", rreq), Field::inverted("rdat", rdat)],
            ))
        }
        BusFunction::Write => {
            let addr = w.vector("addr", params.addr_width)?;
            let len = w.vector("len", params.len_width)?;
            let wreq_rec = w.record("wreq_rec", vec![Field::new("addr", addr), Field::new("len", len)]);
            let wreq = w.stream("wreq", wreq_rec, "");
            let data = w.vector("data", params.data_width)?;
            let strobe = w.vector("strobe", params.strobe_width)?;
            let l = last(w);
            let wdat_rec = w.record(
                "wdat_rec",
                vec![
                    Field::new("data", data),
                    Field::new("strobe", strobe),
                    Field::new("last", l),
                ],
            );
            let wdat = w.stream("wdat", wdat_rec, "");
            Ok(w.record(
                "BusWrite",
                vec![Field::new("wreq", wreq), Field::new("wdat", wdat)],
            ))
        }
    }
}

/// A directed bus port over a parameter set.
pub fn bus_port(
    w: &mut World,
    name: &str,
    dir: Dir,
    params: &BusParams,
    function: BusFunction,
    domain: DomainId,
) -> Result<NodeId> {
    let ty = bus_type(w, params, function)?;
    Ok(w.port(name, ty, dir, domain))
}

/// Wire the six equally named bus parameters of two graphs.
pub fn connect_bus_params(w: &mut World, dst: GraphId, src: GraphId) -> Result<()> {
    connect_named_params(w, dst, src, &BUS_PARAM_NAMES)
}

fn arbiter_name(function: BusFunction) -> &'static str {
    match function {
        BusFunction::Read => "BusReadArbiterVec",
        BusFunction::Write => "BusWriteArbiterVec",
    }
}

/// The bus arbiter primitive for a function: one master port, an appendable
/// array of slave ports, and the arbitration configuration parameters.
/// Pool-cached; repeated calls return the same component.
pub fn bus_arbiter(w: &mut World, function: BusFunction) -> Result<GraphId> {
    let name = arbiter_name(function);
    if let Some(existing) = w.pool_component(name) {
        return Ok(existing);
    }
    let comp = w.component(name)?;

    let params = BusParams::new(w);
    params.add_to(w, comp)?;
    let num_slv = w.int_parameter("NUM_SLAVE_PORTS", 0);
    w.add_node(comp, num_slv)?;

    let string_ty = w.string_type();
    let rr = w.lit_str("RR-STICKY");
    let arb_method = w.parameter("ARB_METHOD", string_ty, Some(rr))?;
    let max_outstanding = w.int_parameter("MAX_OUTSTANDING", 4);
    let empty = w.lit_str("");
    let ram_config = w.parameter("RAM_CONFIG", string_ty, Some(empty))?;
    let bool_ty = w.boolean();
    let yes = w.lit_bool(true);
    let slv_req_slices = w.parameter("SLV_REQ_SLICES", bool_ty, Some(yes))?;
    let mst_req_slice = w.parameter("MST_REQ_SLICE", bool_ty, Some(yes))?;
    let mst_dat_slice = w.parameter("MST_DAT_SLICE", bool_ty, Some(yes))?;
    let slv_dat_slices = w.parameter("SLV_DAT_SLICES", bool_ty, Some(yes))?;
    for p in [
        arb_method,
        max_outstanding,
        ram_config,
        slv_req_slices,
        mst_req_slice,
        mst_dat_slice,
        slv_dat_slices,
    ] {
        w.add_node(comp, p)?;
    }

    let bcd = bus_cd(w);
    let clk_rst = clock_reset_port(w, "bcd", bcd);
    w.add_node(comp, clk_rst)?;

    let mst = bus_port(w, "mst", Dir::Out, &params, function, bcd)?;
    w.add_node(comp, mst)?;

    let slv_base = w.copy_port_inverted(mst)?;
    w.set_node_name(slv_base, "bsv");
    let slv_arr = w.port_array_from(slv_base, num_slv)?;
    w.add_array(comp, slv_arr)?;

    w.set_graph_meta(comp, meta::PRIMITIVE, "true");
    w.set_graph_meta(comp, meta::LIBRARY, "work");
    w.set_graph_meta(comp, meta::PACKAGE, "Interconnect_pkg");
    Ok(comp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write_bundles_differ() {
        let mut w = World::new();
        let params = BusParams::new(&mut w);
        let r = bus_type(&mut w, &params, BusFunction::Read).unwrap();
        let wr = bus_type(&mut w, &params, BusFunction::Write).unwrap();
        assert!(!w.types_equal(r, wr));
        // Same-function bundles over different parameters are equal in
        // structure; widths are symbolic.
        let params2 = BusParams::new(&mut w);
        let r2 = bus_type(&mut w, &params2, BusFunction::Read).unwrap();
        assert!(w.types_equal(r, r2));
    }

    #[test]
    fn arbiter_is_pool_cached() {
        let mut w = World::new();
        let a = bus_arbiter(&mut w, BusFunction::Read).unwrap();
        let b = bus_arbiter(&mut w, BusFunction::Read).unwrap();
        assert_eq!(a, b);
        let c = bus_arbiter(&mut w, BusFunction::Write).unwrap();
        assert_ne!(a, c);
        // Master port and appendable slave array are present.
        w.get_port(a, "mst").unwrap();
        w.get_port_array(a, "bsv").unwrap();
    }

    #[test]
    fn read_bundle_reverses_data_stream() {
        let mut w = World::new();
        let params = BusParams::new(&mut w);
        let r = bus_type(&mut w, &params, BusFunction::Read).unwrap();
        let flat = mantlegen_ir::flatten(&w, r);
        // Every leaf under rdat is inverted.
        for f in &flat {
            let name = f.name("bus", "_");
            if name.starts_with("bus_rdat") {
                assert!(f.invert, "{name} should be inverted");
            }
        }
    }
}
