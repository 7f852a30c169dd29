//! Connection and signalization scenarios.

use mantlegen_ir::{all_edges, Dir, IrError, World};

/// Two instances, one connection, then port signalization.
#[test]
fn simple_port_connection() {
    let mut w = World::new();
    let dom = w.default_domain();

    let a_comp = w.component("A").unwrap();
    let bit_a = w.bit("bit");
    let a_port = w.port("a", bit_a, Dir::In, dom);
    w.add_node(a_comp, a_port).unwrap();

    let b_comp = w.component("B").unwrap();
    let bit_b = w.bit("bit");
    let b_port = w.port("b", bit_b, Dir::Out, dom);
    w.add_node(b_comp, b_port).unwrap();

    let top = w.component("top").unwrap();
    let ai = w.add_instance_of(top, a_comp, "A_i").unwrap();
    let bi = w.add_instance_of(top, b_comp, "B_i").unwrap();

    let ia = w.get_port(ai, "a").unwrap();
    let ib = w.get_port(bi, "b").unwrap();
    let edge = w.connect(ia, ib).unwrap();

    assert_eq!(w.edge(edge).name, "b_to_a");
    assert_eq!(all_edges(&w, top).len(), 1);
    // The edge is registered on both endpoints.
    assert!(w.sinks(ib).contains(&edge));
    assert!(w.sources(ia).contains(&edge));

    w.signalize_ports(top).unwrap();

    // One intervening signal, two edges.
    assert_eq!(all_edges(&w, top).len(), 2);
    assert_eq!(w.signals_of(top).len(), 1);
    let sig = w.get_signal(top, "A_i_a").unwrap();
    assert_eq!(w.source_node(sig), Some(ib));
    assert_eq!(w.source_node(ia), Some(sig));
}

/// Every instance port reaches the rest of the graph through a component
/// signal after signalization.
#[test]
fn signalization_leaves_no_port_to_port_edges() {
    let mut w = World::new();
    let dom = w.default_domain();

    let producer = w.component("producer").unwrap();
    let v1 = w.vector_of(8);
    let out = w.port("data", v1, Dir::Out, dom);
    w.add_node(producer, out).unwrap();

    let consumer = w.component("consumer").unwrap();
    let v2 = w.vector_of(8);
    let inp = w.port("data", v2, Dir::In, dom);
    w.add_node(consumer, inp).unwrap();

    let top = w.component("top").unwrap();
    let pi = w.add_instance_of(top, producer, "p").unwrap();
    let ci = w.add_instance_of(top, consumer, "c").unwrap();
    let src = w.get_port(pi, "data").unwrap();
    let dst = w.get_port(ci, "data").unwrap();
    w.connect(dst, src).unwrap();

    w.signalize_ports(top).unwrap();

    for inst in [pi, ci] {
        for port in w.ports_of(inst) {
            let mut edges = w.sinks(port);
            edges.extend(w.sources(port));
            assert!(!edges.is_empty());
            for e in edges {
                let peer = if w.edge(e).src == port {
                    w.edge(e).dst
                } else {
                    w.edge(e).src
                };
                assert!(w.node(peer).is_signal());
                assert_eq!(w.node(peer).parent, Some(top));
            }
        }
    }
}

/// Driving an instance output port is a direction error.
#[test]
fn driving_instance_output_is_rejected() {
    let mut w = World::new();
    let dom = w.default_domain();

    let c = w.component("C").unwrap();
    let b = w.bit("bit");
    let o = w.port("o", b, Dir::Out, dom);
    w.add_node(c, o).unwrap();

    let top = w.component("top").unwrap();
    let ci = w.add_instance_of(top, c, "ci").unwrap();
    let io = w.get_port(ci, "o").unwrap();

    let b2 = w.bit("bit");
    let sig = w.signal("s", b2, dom);
    w.add_node(top, sig).unwrap();

    let err = w.connect(io, sig);
    assert!(matches!(err, Err(IrError::Direction(_))));
}

/// Driving a component's own input from the inside is a direction error.
#[test]
fn driving_component_input_is_rejected() {
    let mut w = World::new();
    let dom = w.default_domain();

    let top = w.component("top").unwrap();
    let b = w.bit("bit");
    let inp = w.port("i", b, Dir::In, dom);
    w.add_node(top, inp).unwrap();

    let b2 = w.bit("bit");
    let sig = w.signal("s", b2, dom);
    w.add_node(top, sig).unwrap();

    let err = w.connect(inp, sig);
    assert!(matches!(err, Err(IrError::Direction(_))));
}

/// Unmappable types are a type error.
#[test]
fn connect_requires_a_mapper() {
    let mut w = World::new();
    let dom = w.default_domain();
    let top = w.component("top").unwrap();

    let b = w.bit("bit");
    let v = w.vector_of(8);
    let s1 = w.signal("s1", b, dom);
    let s2 = w.signal("s2", v, dom);
    w.add_node(top, s1).unwrap();
    w.add_node(top, s2).unwrap();

    let err = w.connect(s2, s1);
    assert!(matches!(err, Err(IrError::Type(_))));
}

/// Reconnecting a driven node replaces its source edge.
#[test]
fn reconnect_replaces_source() {
    let mut w = World::new();
    let dom = w.default_domain();
    let top = w.component("top").unwrap();

    let b = w.bit("bit");
    let s1 = w.signal("s1", b, dom);
    let b2 = w.bit("bit");
    let s2 = w.signal("s2", b2, dom);
    let b3 = w.bit("bit");
    let dst = w.signal("dst", b3, dom);
    w.add_node(top, s1).unwrap();
    w.add_node(top, s2).unwrap();
    w.add_node(top, dst).unwrap();

    w.connect(dst, s1).unwrap();
    w.connect(dst, s2).unwrap();
    assert_eq!(w.sources(dst).len(), 1);
    assert_eq!(w.source_node(dst), Some(s2));
    assert!(w.sinks(s1).is_empty());
}

/// Duplicate object names on one graph are rejected.
#[test]
fn duplicate_names_are_rejected() {
    let mut w = World::new();
    let dom = w.default_domain();
    let top = w.component("top").unwrap();

    let b = w.bit("bit");
    let s1 = w.signal("x", b, dom);
    let b2 = w.bit("bit");
    let s2 = w.signal("x", b2, dom);
    w.add_node(top, s1).unwrap();
    let err = w.add_node(top, s2);
    assert!(matches!(err, Err(IrError::Structure(_))));
    // Re-adding the same object is fine.
    w.add_node(top, s1).unwrap();
}
