//! Whole-design generation.

use mantlegen_design::{
    BatchField, BatchSchema, Design, DesignOptions, LogicalType, MmioBehavior, MmioFunction,
    MmioReg, Mode,
};
use mantlegen_ir::World;

fn options() -> DesignOptions {
    let mut profiled = BatchField::new("num", LogicalType::Prim { width: 32 });
    profiled.profile = true;
    DesignOptions {
        kernel_name: "Sum".to_string(),
        schemas: vec![BatchSchema {
            name: "in".to_string(),
            mode: Mode::Read,
            fields: vec![profiled, BatchField::new("name", LogicalType::Utf8)],
        }],
        descriptions: Vec::new(),
        custom_regs: vec![MmioReg::new(
            MmioFunction::Kernel,
            MmioBehavior::Control,
            "threshold",
            "Custom register threshold",
            32,
        )],
    }
}

#[test]
fn generates_the_full_hierarchy() {
    let mut w = World::new();
    let design = Design::generate(&mut w, options()).unwrap();

    assert_eq!(w.graph(design.mantle.comp).name, "Sum_Mantle");
    assert_eq!(w.graph(design.nucleus.comp).name, "Sum_Nucleus");
    assert_eq!(w.graph(design.kernel.comp).name, "Sum");
    assert_eq!(design.recordbatches.len(), 1);

    // Read-only designs get a read arbiter master and no write master.
    w.get_port(design.mantle.comp, "rd_mst").unwrap();
    assert!(w.get_port(design.mantle.comp, "wr_mst").is_err());

    // The mantle hosts the nucleus, the record batch and the arbiter.
    assert_eq!(w.children_of(design.mantle.comp).len(), 3);
}

#[test]
fn register_list_is_complete_and_allocated() {
    let mut w = World::new();
    let design = Design::generate(&mut w, options()).unwrap();

    // Defaults: start stop reset idle busy done result.
    // Batch: firstidx lastidx. Buffers: num values, name offsets, name values.
    // Custom: threshold. Profile: enable clear + 5 counters for one stream.
    let defaults = 7;
    let batch = 2;
    let buffers = 3;
    let custom = 1;
    let profile = 2 + 5;
    assert_eq!(
        design.regs.len(),
        defaults + batch + buffers + custom + profile
    );
    for reg in &design.regs {
        assert!(reg.addr.is_some(), "register {} unallocated", reg.name);
    }
    // The custom register surfaces on the kernel shell.
    w.get_port(design.kernel.comp, "threshold").unwrap();
    w.get_port(design.kernel.comp, "start").unwrap();
}

#[test]
fn command_streams_pass_through_mergers() {
    let mut w = World::new();
    let design = Design::generate(&mut w, options()).unwrap();

    // One merger per command stream.
    let mergers: Vec<_> = w
        .children_of(design.nucleus.comp)
        .into_iter()
        .filter(|c| {
            let comp = w.instance_component(*c).unwrap();
            w.graph(comp).name == "ArrayCmdCtrlMerger"
        })
        .collect();
    assert_eq!(mergers.len(), 2);

    // The first field has one buffer, the second (a string) two; the ctrl
    // arrays grew accordingly.
    let ctrl0 = w.get_port_array(mergers[0], "ctrl").unwrap();
    assert_eq!(w.array(ctrl0).children.len(), 1);
    let ctrl1 = w.get_port_array(mergers[1], "ctrl").unwrap();
    assert_eq!(w.array(ctrl1).children.len(), 2);
}

#[test]
fn profilers_watch_marked_streams() {
    let mut w = World::new();
    let design = Design::generate(&mut w, options()).unwrap();

    let profilers: Vec<_> = w
        .children_of(design.nucleus.comp)
        .into_iter()
        .filter(|c| {
            let comp = w.instance_component(*c).unwrap();
            w.graph(comp).name == "ProfilerStreams"
        })
        .collect();
    // One profiled primitive field, one stream.
    assert_eq!(profilers.len(), 1);
}

#[test]
fn mixed_modes_get_both_arbiters() {
    let mut w = World::new();
    let opts = DesignOptions {
        kernel_name: "Copy".to_string(),
        schemas: vec![
            BatchSchema {
                name: "src".to_string(),
                mode: Mode::Read,
                fields: vec![BatchField::new("num", LogicalType::Prim { width: 32 })],
            },
            BatchSchema {
                name: "dst".to_string(),
                mode: Mode::Write,
                fields: vec![BatchField::new("num", LogicalType::Prim { width: 32 })],
            },
        ],
        descriptions: Vec::new(),
        custom_regs: Vec::new(),
    };
    let design = Design::generate(&mut w, opts).unwrap();

    w.get_port(design.mantle.comp, "rd_mst").unwrap();
    w.get_port(design.mantle.comp, "wr_mst").unwrap();
    // Nucleus, two record batches, two arbiters.
    assert_eq!(w.children_of(design.mantle.comp).len(), 5);

    // Batches are ordered by name: dst before src.
    assert_eq!(design.recordbatches[0].schema.name, "dst");
    assert_eq!(design.recordbatches[1].schema.name, "src");
}

#[test]
fn lowering_expands_and_signalizes() {
    let mut w = World::new();
    let design = Design::generate(&mut w, options()).unwrap();
    design.lower(&mut w).unwrap();

    // Every instance port of the mantle reaches the graph through a signal.
    for inst in w.children_of(design.mantle.comp) {
        for port in w.ports_of(inst) {
            let mut edges = w.sinks(port);
            edges.extend(w.sources(port));
            for e in edges {
                let peer = if w.edge(e).src == port {
                    w.edge(e).dst
                } else {
                    w.edge(e).src
                };
                assert!(
                    w.node(peer).is_signal(),
                    "instance port {} still reaches a non-signal",
                    w.node(port).name
                );
            }
        }
    }

    // Stream types have been rewritten with handshake leaves.
    let rb = &design.recordbatches[0];
    let arrow = &rb.field_ports(mantlegen_design::FieldFunction::Arrow)[0];
    let flat = mantlegen_ir::flatten(&w, w.node(arrow.node).ty);
    assert!(flat.iter().any(|f| w.ty(f.ty).name == "valid"));
    assert!(flat.iter().any(|f| w.ty(f.ty).name == "ready"));
}
