//! The user kernel shell.
//!
//! The kernel component is the boundary the user implements behind. It
//! carries inverted copies of every record batch's data and unlock ports, a
//! ctrl-less version of every command port (buffer addresses are merged in
//! above the kernel, so the user never sees them), and one port per
//! kernel-exposed MMIO register.

use mantlegen_ir::{Dir, GraphId, World};

use crate::arrays::cmd_type;
use crate::basic::{clock_reset_port, kernel_cd};
use crate::error::Result;
use crate::mmio::{expose_to_kernel, MmioBehavior, MmioPortInfo};
use crate::recordbatch::{FieldFunction, RecordBatch};

/// A generated kernel shell.
#[derive(Debug, Clone)]
pub struct Kernel {
    pub comp: GraphId,
}

/// Build the kernel component.
pub fn kernel(
    w: &mut World,
    name: &str,
    recordbatches: &[RecordBatch],
    mmio_ports: &[MmioPortInfo],
) -> Result<Kernel> {
    let comp = w.component(name)?;
    let kcd_dom = kernel_cd(w);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, kcd)?;

    for rb in recordbatches {
        for fp in rb.field_ports(FieldFunction::Arrow) {
            let copy = w.copy_port_inverted(fp.node)?;
            w.add_node(comp, copy)?;
        }
        for fp in rb.field_ports(FieldFunction::Unlock) {
            let copy = w.copy_port_inverted(fp.node)?;
            w.add_node(comp, copy)?;
        }
        // Command ports lose their ctrl field at the kernel boundary.
        for fp in rb.field_ports(FieldFunction::Command) {
            let field = &rb.schema.fields[fp.field_index];
            let tag = w.lit_int(field.tag_width as i64);
            let ty = cmd_type(w, tag, None)?;
            let dir = w.node(fp.node).dir().map(Dir::invert).unwrap_or(Dir::Out);
            let port = w.port(&fp.name, ty, dir, kcd_dom);
            w.add_node(comp, port)?;
        }
    }

    for info in mmio_ports {
        if !expose_to_kernel(info.reg.function) {
            continue;
        }
        let dir = match info.reg.behavior {
            MmioBehavior::Control | MmioBehavior::Strobe => Dir::In,
            MmioBehavior::Status => Dir::Out,
        };
        let ty = if info.reg.width == 1 {
            w.bit("bit")
        } else {
            w.vector_of(info.reg.width as u64)
        };
        let port = w.port(&info.reg.name, ty, dir, kcd_dom);
        w.add_node(comp, port)?;
    }

    Ok(Kernel { comp })
}
