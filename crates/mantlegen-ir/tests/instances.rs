//! Instantiation, generic rebinding and component copying.

use mantlegen_ir::{flatten, Dir, TypeKind, World};

/// An instance port's generic vector width resolves to the instance's own
/// parameter copy, not the component's.
#[test]
fn generic_width_rebinds_to_instance_parameter() {
    let mut w = World::new();
    let dom = w.default_domain();

    let c = w.component("C").unwrap();
    let p = w.int_parameter("w", 8);
    w.add_node(c, p).unwrap();
    let v = w.vector("v", p).unwrap();
    let port = w.port("p", v, Dir::In, dom);
    w.add_node(c, port).unwrap();

    let top = w.component("top").unwrap();
    let ci = w.add_instance_of(top, c, "ci").unwrap();

    let ip = w.get_port(ci, "p").unwrap();
    let inst_param = w.get_parameter(ci, "w").unwrap();
    assert_ne!(inst_param, p);
    match w.ty(w.node(ip).ty).kind {
        TypeKind::Vector { width } => {
            assert_eq!(width, inst_param);
            assert_eq!(w.node(width).parent, Some(ci));
        }
        _ => panic!("instance port lost its vector type"),
    }
    // The rebinding map remembers the copies.
    assert_eq!(w.comp_to_inst(ci, p), Some(inst_param));
    assert_eq!(w.comp_to_inst(ci, port), Some(ip));
}

/// Instances mirror the component interface: same port and parameter counts,
/// and no signals.
#[test]
fn instance_interface_matches_component() {
    let mut w = World::new();
    let dom = w.default_domain();

    let c = w.component("C").unwrap();
    let p1 = w.int_parameter("w", 8);
    let p2 = w.int_parameter("n", 4);
    w.add_node(c, p1).unwrap();
    w.add_node(c, p2).unwrap();
    let v = w.vector("v", p1).unwrap();
    let din = w.port("din", v, Dir::In, dom);
    w.add_node(c, din).unwrap();
    let b = w.bit("bit");
    let dout = w.port("dout", b, Dir::Out, dom);
    w.add_node(c, dout).unwrap();
    let internal_ty = w.bit("bit");
    let internal = w.signal("tmp", internal_ty, dom);
    w.add_node(c, internal).unwrap();

    let top = w.component("top").unwrap();
    let ci = w.add_instance_of(top, c, "ci").unwrap();

    assert_eq!(w.ports_of(ci).len(), w.ports_of(c).len());
    assert_eq!(w.parameters_of(ci).len(), w.parameters_of(c).len());
    assert!(w.signals_of(ci).is_empty());
}

/// Signals cannot be added to instances.
#[test]
fn instances_reject_signals() {
    let mut w = World::new();
    let dom = w.default_domain();
    let c = w.component("C").unwrap();
    let top = w.component("top").unwrap();
    let ci = w.add_instance_of(top, c, "ci").unwrap();

    let b = w.bit("bit");
    let sig = w.signal("s", b, dom);
    assert!(w.add_node(ci, sig).is_err());
}

/// A port array on an instance shares the instance-side size parameter.
#[test]
fn port_array_size_rebinds_once() {
    let mut w = World::new();
    let dom = w.default_domain();

    let c = w.component("C").unwrap();
    let n = w.int_parameter("n", 0);
    w.add_node(c, n).unwrap();
    let v = w.vector_of(8);
    let pa = w.port_array("slots", v, n, Dir::In, dom).unwrap();
    w.add_array(c, pa).unwrap();

    let top = w.component("top").unwrap();
    let ci = w.add_instance_of(top, c, "ci").unwrap();

    let ipa = w.get_port_array(ci, "slots").unwrap();
    let inst_n = w.get_parameter(ci, "n").unwrap();
    assert_eq!(w.array(ipa).size, inst_n);
}

/// Cloning a component with an empty rebinding preserves the flattened type
/// signature of every port.
#[test]
fn copy_preserves_port_signatures() {
    let mut w = World::new();
    let dom = w.default_domain();

    let c = w.component("C").unwrap();
    let p = w.int_parameter("w", 8);
    w.add_node(c, p).unwrap();
    let v = w.vector("v", p).unwrap();
    let b = w.bit("bit");
    let rec = w.record(
        "rec",
        vec![
            mantlegen_ir::Field::new("flag", b),
            mantlegen_ir::Field::new("data", v),
        ],
    );
    let s = w.stream("s", rec, "el");
    let din = w.port("din", s, Dir::In, dom);
    w.add_node(c, din).unwrap();
    let b2 = w.bit("bit");
    let dout = w.port("dout", b2, Dir::Out, dom);
    w.add_node(c, dout).unwrap();

    let copy = w.copy_component(c, "C_copy").unwrap();

    assert_eq!(w.ports_of(copy).len(), w.ports_of(c).len());
    for (orig, copied) in w.ports_of(c).iter().zip(w.ports_of(copy).iter()) {
        assert_eq!(w.node(*orig).name, w.node(*copied).name);
        let fa = flatten(&w, w.node(*orig).ty);
        let fb = flatten(&w, w.node(*copied).ty);
        assert_eq!(fa.len(), fb.len());
        for (x, y) in fa.iter().zip(fb.iter()) {
            assert_eq!(x.name("p", "_"), y.name("p", "_"));
            assert_eq!(x.invert, y.invert);
            assert!(w.types_equal(x.ty, y.ty));
        }
    }
}
