//! RecordBatch generation scenarios.

use mantlegen_design::recordbatch::record_batch;
use mantlegen_design::{
    BatchField, BatchSchema, FieldFunction, LogicalType, Mode, RecordBatchDescription,
};
use mantlegen_ir::World;

fn three_field_schema() -> BatchSchema {
    BatchSchema {
        name: "batch".to_string(),
        mode: Mode::Read,
        fields: vec![
            BatchField::new("num", LogicalType::Prim { width: 32 }),
            BatchField::new("name", LogicalType::Utf8),
            BatchField::new("flag", LogicalType::Prim { width: 1 }),
        ],
    }
}

/// Three non-ignored fields yield three data, three command, three unlock
/// and three bus ports.
#[test]
fn three_fields_three_port_triples() {
    let mut w = World::new();
    let schema = three_field_schema();
    let desc = RecordBatchDescription::from_schema(&schema);
    let rb = record_batch(&mut w, "kernel_batch", &schema, &desc).unwrap();

    assert_eq!(rb.field_ports(FieldFunction::Arrow).len(), 3);
    assert_eq!(rb.field_ports(FieldFunction::Command).len(), 3);
    assert_eq!(rb.field_ports(FieldFunction::Unlock).len(), 3);
    assert!(rb.bus_ports.len() >= 3);
    // One array reader per field.
    assert_eq!(w.children_of(rb.comp).len(), 3);
    // All ports exist on the component under their recorded names.
    for fp in &rb.field_ports {
        w.get_port(rb.comp, &fp.name).unwrap();
    }
    for bp in &rb.bus_ports {
        w.get_port(rb.comp, &bp.name).unwrap();
    }
}

/// Ignored fields generate nothing.
#[test]
fn ignored_fields_are_skipped() {
    let mut w = World::new();
    let mut schema = three_field_schema();
    schema.fields[1].ignore = true;
    let desc = RecordBatchDescription::from_schema(&schema);
    let rb = record_batch(&mut w, "kernel_batch", &schema, &desc).unwrap();

    assert_eq!(rb.field_ports(FieldFunction::Arrow).len(), 2);
    assert_eq!(w.children_of(rb.comp).len(), 2);
}

/// The array primitive's CFG parameter carries the schema-derived config
/// string.
#[test]
fn cfg_parameter_is_configured() {
    let mut w = World::new();
    let schema = three_field_schema();
    let desc = RecordBatchDescription::from_schema(&schema);
    let rb = record_batch(&mut w, "kernel_batch", &schema, &desc).unwrap();

    let insts = w.children_of(rb.comp);
    let cfg = w.get_parameter(insts[0], "CFG").unwrap();
    let value = w.param_value(cfg).unwrap();
    assert_eq!(w.node_to_string(value), "\"prim(32)\"");
    let cfg1 = w.get_parameter(insts[1], "CFG").unwrap();
    let value1 = w.param_value(cfg1).unwrap();
    assert_eq!(w.node_to_string(value1), "\"listprim(8)\"");
}

/// Write-mode batches use the writer primitive and reverse the data flow.
#[test]
fn write_mode_uses_array_writer() {
    let mut w = World::new();
    let schema = BatchSchema {
        name: "sink".to_string(),
        mode: Mode::Write,
        fields: vec![BatchField::new("num", LogicalType::Prim { width: 64 })],
    };
    let desc = RecordBatchDescription::from_schema(&schema);
    let rb = record_batch(&mut w, "kernel_sink", &schema, &desc).unwrap();

    let insts = w.children_of(rb.comp);
    let comp = w.instance_component(insts[0]).unwrap();
    assert_eq!(w.graph(comp).name, "ArrayWriter");
    // The arrow port faces inward on a writer.
    let fp = &rb.field_ports(FieldFunction::Arrow)[0];
    assert_eq!(w.node(fp.node).dir(), Some(mantlegen_ir::Dir::In));
}
