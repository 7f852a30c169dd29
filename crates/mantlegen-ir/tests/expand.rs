//! Stream expansion and mapper rewriting.

use mantlegen_ir::{flatten, meta, Dir, Field, TypeKind, World};

/// Identity mapper over a record: every leaf pairs with itself.
#[test]
fn identity_mapper_on_shared_record() {
    let mut w = World::new();
    let b = w.bit("bit");
    let v = w.vector_of(8);
    let r = w.record("R", vec![Field::new("a", b), Field::new("b", v)]);
    let m = w.get_mapper(r, r, true).unwrap();
    assert_eq!(w.mapping_pairs(m), vec![(0, 0), (1, 1), (2, 2)]);
}

fn build_stream_component(w: &mut World) -> (mantlegen_ir::GraphId, mantlegen_ir::TypeId) {
    let dom = w.default_domain();
    let b = w.bit("bit");
    let rec = w.record("xrec", vec![Field::new("x", b)]);
    let s = w.stream("xs", rec, "el");

    // An explicit one-to-one mapper from the stream to itself.
    let m = w.identity_mapper(s);
    w.install_mapper(m, true).unwrap();

    let comp = w.component("top").unwrap();
    let port = w.port("p", s, Dir::In, dom);
    w.add_node(comp, port).unwrap();
    (comp, s)
}

/// Expansion rewrites `Stream<E>` into `Stream<Record{valid, ready, el: E}>`
/// and injects valid/ready pairings into the installed mapper.
#[test]
fn expansion_rewrites_stream_and_mapper() {
    let mut w = World::new();
    let (comp, s) = build_stream_component(&mut w);

    w.expand_streams(comp).unwrap();

    // Type rewrite: the element is now a valid/ready record wrapping the
    // original element.
    let vr = w.stream_element(s).unwrap();
    match &w.ty(vr).kind {
        TypeKind::Record { fields } => {
            assert_eq!(fields.len(), 3);
            assert_eq!(fields[0].name, "valid");
            assert_eq!(fields[1].name, "ready");
            assert!(fields[1].invert);
            assert_eq!(fields[2].name, "el");
            assert_eq!(w.ty(fields[2].ty).name, "xrec");
        }
        _ => panic!("expanded element is not a record"),
    }
    assert_eq!(
        w.ty(s).meta.get(meta::EXPAND_TYPE).map(|s| s.as_str()),
        Some("stream")
    );

    // Mapper rewrite: flattened order is
    // [stream, vr-record, valid, ready, xrec, x], paired diagonally.
    let mappers = w.installed_mappers(s);
    assert_eq!(mappers.len(), 1);
    let pairs = w.mapping_pairs(mappers[0]);
    assert_eq!(
        pairs,
        vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]
    );
    let flat = flatten(&w, s);
    assert_eq!(flat.len(), 6);
    assert_eq!(w.ty(flat[2].ty).name, "valid");
    assert_eq!(w.ty(flat[3].ty).name, "ready");
    assert!(flat[3].invert);
}

/// Expansion is idempotent.
#[test]
fn expansion_is_idempotent() {
    let mut w = World::new();
    let (comp, s) = build_stream_component(&mut w);

    w.expand_streams(comp).unwrap();
    let first_flat: Vec<String> = flatten(&w, s)
        .iter()
        .map(|f| w.type_to_string(f.ty))
        .collect();
    let first_mappers = w.installed_mappers(s).len();

    w.expand_streams(comp).unwrap();
    let second_flat: Vec<String> = flatten(&w, s)
        .iter()
        .map(|f| w.type_to_string(f.ty))
        .collect();

    assert_eq!(first_flat, second_flat);
    assert_eq!(w.installed_mappers(s).len(), first_mappers);
}

/// Nested streams are expanded recursively.
#[test]
fn nested_streams_expand_recursively() {
    let mut w = World::new();
    let dom = w.default_domain();
    let b = w.bit("bit");
    let inner = w.stream("inner", b, "d");
    let outer = w.stream("outer", inner, "i");
    let comp = w.component("top").unwrap();
    let port = w.port("p", outer, Dir::In, dom);
    w.add_node(comp, port).unwrap();

    w.expand_streams(comp).unwrap();

    let outer_vr = w.stream_element(outer).unwrap();
    assert!(w.ty(outer_vr).is_record());
    let inner_vr = w.stream_element(inner).unwrap();
    assert!(w.ty(inner_vr).is_record());
    // Both streams are tagged.
    assert!(w.ty(outer).meta.contains_key(meta::EXPAND_TYPE));
    assert!(w.ty(inner).meta.contains_key(meta::EXPAND_TYPE));
}
