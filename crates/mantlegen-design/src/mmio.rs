//! Memory-mapped register file.
//!
//! The register file is described by an ordered list of [`MmioReg`]
//! descriptors and returned as a primitive component stub with one port per
//! register plus an AXI4-Lite bus; a separate generator produces the actual
//! implementation from the same list. Address allocation packs registers at
//! consecutive 4-byte boundaries unless a register pins its own address.

use indexmap::IndexMap;
use mantlegen_ir::{meta, Dir, GraphId, World};
use serde::{Deserialize, Serialize};

use crate::axi4_lite::{axi4_lite_port, Axi4LiteSpec};
use crate::basic::{clock_reset_port, kernel_cd};
use crate::error::{DesignError, Result};
use crate::schema::RecordBatchDescription;

/// Intended use of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MmioFunction {
    /// Kernel run control and status.
    Default,
    /// Record-batch index ranges.
    Batch,
    /// Buffer addresses.
    Buffer,
    /// User-defined kernel registers.
    Kernel,
    /// Profiler counters and control.
    Profile,
}

/// Who writes the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MmioBehavior {
    /// Host software writes, hardware reads.
    Control,
    /// Hardware writes, host software reads.
    Status,
    /// Host software pulses; reads as zero.
    Strobe,
}

/// One memory-mapped register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmioReg {
    pub function: MmioFunction,
    pub behavior: MmioBehavior,
    /// Register name.
    pub name: String,
    /// Documentation string.
    pub desc: String,
    /// Bit width.
    pub width: u32,
    /// LSB index within the addressed word.
    pub index: u32,
    /// Pinned byte address, filled in by allocation when absent.
    pub addr: Option<u32>,
    /// Metadata preserved for downstream generators.
    pub meta: IndexMap<String, String>,
}

impl MmioReg {
    pub fn new(
        function: MmioFunction,
        behavior: MmioBehavior,
        name: &str,
        desc: &str,
        width: u32,
    ) -> Self {
        MmioReg {
            function,
            behavior,
            name: name.to_string(),
            desc: desc.to_string(),
            width,
            index: 0,
            addr: None,
            meta: IndexMap::new(),
        }
    }

    fn at(mut self, addr: u32, index: u32) -> Self {
        self.addr = Some(addr);
        self.index = index;
        self
    }
}

/// Registers with these functions surface as kernel ports.
pub fn expose_to_kernel(function: MmioFunction) -> bool {
    matches!(
        function,
        MmioFunction::Default | MmioFunction::Batch | MmioFunction::Kernel
    )
}

fn addr_space_used(width: u32) -> u32 {
    4 * (width / 32 + u32::from(width % 32 != 0))
}

/// Assign a byte address to every register without one, packing consecutively
/// at 4-byte boundaries. Pinned addresses must be ordered and come first.
/// Returns the next free byte address.
pub fn allocate_addresses(regs: &mut [MmioReg]) -> u32 {
    let mut next_free: u32 = 0;
    for reg in regs.iter_mut() {
        match reg.addr {
            Some(addr) => {
                next_free = addr + addr_space_used(reg.width);
            }
            None => {
                reg.addr = Some(next_free);
                next_free += addr_space_used(reg.width);
            }
        }
    }
    next_free
}

/// A port of the register-file stub and the register it came from.
#[derive(Debug, Clone)]
pub struct MmioPortInfo {
    /// Port name on the component.
    pub port_name: String,
    /// The originating register.
    pub reg: MmioReg,
}

/// Build the register-file component stub: one port per register plus the
/// AXI4-Lite bus. The component is primitive; a downstream generator emits
/// its implementation from the same register list.
pub fn mmio(w: &mut World, regs: &[MmioReg]) -> Result<(GraphId, Vec<MmioPortInfo>)> {
    let comp = w.component("mmio")?;
    let kcd_dom = kernel_cd(w);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, kcd)?;

    let mut ports = Vec::new();
    for reg in regs {
        if reg.width == 0 {
            return Err(DesignError::Mmio(format!(
                "register {} has zero width",
                reg.name
            )));
        }
        let dir = match reg.behavior {
            MmioBehavior::Control | MmioBehavior::Strobe => Dir::Out,
            MmioBehavior::Status => Dir::In,
        };
        let ty = if reg.width == 1 {
            w.bit("bit")
        } else {
            w.vector_of(reg.width as u64)
        };
        let port_name = match dir {
            Dir::Out => format!("f_{}_data", reg.name),
            Dir::In => format!("f_{}_write_data", reg.name),
        };
        let port = w.port(&port_name, ty, dir, kcd_dom);
        w.add_node(comp, port)?;
        ports.push(MmioPortInfo {
            port_name,
            reg: reg.clone(),
        });
    }

    let bus = axi4_lite_port(w, Dir::In, kcd_dom, Axi4LiteSpec::default())?;
    w.add_node(comp, bus)?;

    w.set_graph_meta(comp, meta::PRIMITIVE, "true");
    w.set_graph_meta(comp, meta::LIBRARY, "work");
    w.set_graph_meta(comp, meta::PACKAGE, "mmio_pkg");
    Ok((comp, ports))
}

/// The run-control registers every kernel gets.
pub fn default_regs() -> Vec<MmioReg> {
    use MmioBehavior as B;
    use MmioFunction as F;
    vec![
        MmioReg::new(F::Default, B::Strobe, "start", "Start the kernel.", 1).at(0, 0),
        MmioReg::new(F::Default, B::Strobe, "stop", "Stop the kernel.", 1).at(0, 1),
        MmioReg::new(F::Default, B::Strobe, "reset", "Reset the kernel.", 1).at(0, 2),
        MmioReg::new(F::Default, B::Status, "idle", "Kernel idle status.", 1).at(4, 0),
        MmioReg::new(F::Default, B::Status, "busy", "Kernel busy status.", 1).at(4, 1),
        MmioReg::new(F::Default, B::Status, "done", "Kernel done status.", 1).at(4, 2),
        MmioReg::new(F::Default, B::Status, "result", "Result.", 64).at(8, 0),
    ]
}

/// Index-range and buffer-address registers for a set of record batches.
/// Ranges come first for every batch, then every buffer address, matching
/// the control-flow order the rest of the design assumes.
pub fn recordbatch_regs(descs: &[RecordBatchDescription]) -> Vec<MmioReg> {
    use MmioBehavior as B;
    use MmioFunction as F;
    let mut out = Vec::new();
    for d in descs {
        out.push(MmioReg::new(
            F::Batch,
            B::Control,
            &format!("{}_firstidx", d.name),
            &format!("{} first index.", d.name),
            32,
        ));
        out.push(MmioReg::new(
            F::Batch,
            B::Control,
            &format!("{}_lastidx", d.name),
            &format!("{} last index (exclusive).", d.name),
            32,
        ));
    }
    for d in descs {
        for f in &d.fields {
            for b in &f.buffers {
                out.push(MmioReg::new(
                    F::Buffer,
                    B::Control,
                    &format!("{}_{}", d.name, b.name),
                    &format!("Buffer address for {} {}", d.name, b.name),
                    64,
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_packs_at_word_boundaries() {
        let mut regs = vec![
            MmioReg::new(MmioFunction::Kernel, MmioBehavior::Control, "a", "", 32),
            MmioReg::new(MmioFunction::Kernel, MmioBehavior::Control, "b", "", 64),
            MmioReg::new(MmioFunction::Kernel, MmioBehavior::Status, "c", "", 1),
        ];
        let next = allocate_addresses(&mut regs);
        assert_eq!(regs[0].addr, Some(0));
        assert_eq!(regs[1].addr, Some(4));
        assert_eq!(regs[2].addr, Some(12));
        assert_eq!(next, 16);
    }

    #[test]
    fn pinned_addresses_are_honored() {
        let mut regs = default_regs();
        regs.push(MmioReg::new(
            MmioFunction::Kernel,
            MmioBehavior::Control,
            "custom",
            "",
            32,
        ));
        let next = allocate_addresses(&mut regs);
        // start/stop/reset share word 0, idle/busy/done word 4, result 8..16.
        assert_eq!(regs[6].addr, Some(8));
        assert_eq!(regs[7].addr, Some(16));
        assert_eq!(next, 20);
    }

    #[test]
    fn stub_has_one_port_per_register_plus_bus() {
        let mut w = World::new();
        let regs = default_regs();
        let (comp, ports) = mmio(&mut w, &regs).unwrap();
        assert_eq!(ports.len(), regs.len());
        // kcd + one per register + mmio bus.
        assert_eq!(w.ports_of(comp).len(), regs.len() + 2);
        // Control-like registers drive outward, status inward.
        assert_eq!(w.node(w.get_port(comp, "f_start_data").unwrap()).dir(), Some(Dir::Out));
        assert_eq!(
            w.node(w.get_port(comp, "f_idle_write_data").unwrap()).dir(),
            Some(Dir::In)
        );
        assert!(w.graph(comp).meta.contains_key(meta::PRIMITIVE));
    }
}
