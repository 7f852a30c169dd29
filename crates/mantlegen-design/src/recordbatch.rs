//! RecordBatch components.
//!
//! A RecordBatch component fronts one schema: for every non-ignored field it
//! carries a data stream port, a command port and an unlock port toward the
//! kernel side, instantiates an array reader/writer configured from the
//! schema, and forwards the primitive's bus port as a prefixed top-level bus
//! port.

use mantlegen_ir::{Dir, GraphId, NodeId, World};
use tracing::{debug, warn};

use crate::arrays::{array, array_data_port_name, cmd_type, stream_type_mapper, unlock_type};
use crate::basic::{bus_cd, clock_reset_port, kernel_cd};
use crate::bus::{bus_port, connect_bus_params, BusFunction, BusParams};
use crate::error::Result;
use crate::schema::{config_string, field_stream_type, BatchField, BatchSchema, Mode, RecordBatchDescription};

/// What role a field-derived port plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFunction {
    /// Data stream derived from the field type.
    Arrow,
    /// Command stream starting an operation on the field's buffers.
    Command,
    /// Unlock stream signalling command completion.
    Unlock,
}

/// A field-derived port on a RecordBatch component.
#[derive(Debug, Clone)]
pub struct FieldPort {
    /// The port node.
    pub node: NodeId,
    /// Port name, `<schema>_<field>` plus a function suffix.
    pub name: String,
    pub function: FieldFunction,
    /// Index of the field in the schema.
    pub field_index: usize,
    /// Index of the field in the record-batch description (ignored fields
    /// excluded).
    pub desc_index: usize,
    /// Whether this data stream should be profiled.
    pub profile: bool,
}

/// A forwarded bus port on a RecordBatch component.
#[derive(Debug, Clone)]
pub struct BusPortRef {
    pub name: String,
    pub function: BusFunction,
}

/// A generated RecordBatch component with its side tables.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub comp: GraphId,
    pub schema: BatchSchema,
    pub desc: RecordBatchDescription,
    pub field_ports: Vec<FieldPort>,
    pub bus_ports: Vec<BusPortRef>,
}

impl RecordBatch {
    /// Field ports with a given function, in field order.
    pub fn field_ports(&self, function: FieldFunction) -> Vec<&FieldPort> {
        self.field_ports
            .iter()
            .filter(|p| p.function == function)
            .collect()
    }
}

/// The direction of a RecordBatch data port: inverted relative to the
/// kernel's view, because the RecordBatch sits on the other end.
fn arrow_dir(mode: Mode) -> Dir {
    mode.dir().invert()
}

fn bus_function(mode: Mode) -> BusFunction {
    match mode {
        Mode::Read => BusFunction::Read,
        Mode::Write => BusFunction::Write,
    }
}

/// Build a RecordBatch component for a schema and its buffer description.
pub fn record_batch(
    w: &mut World,
    name: &str,
    schema: &BatchSchema,
    desc: &RecordBatchDescription,
) -> Result<RecordBatch> {
    let comp = w.component(name)?;
    let bus_params = BusParams::new(w);
    bus_params.add_to(w, comp)?;

    let bcd_dom = bus_cd(w);
    let kcd_dom = kernel_cd(w);
    let bcd = clock_reset_port(w, "bcd", bcd_dom);
    let kcd = clock_reset_port(w, "kcd", kcd_dom);
    w.add_node(comp, bcd)?;
    w.add_node(comp, kcd)?;

    if schema.mode == Mode::Write {
        warn!(
            schema = %schema.name,
            "array writers are experimental; handshakes on empty value streams \
             and per-list last signalling are not implemented"
        );
    }

    let mut rb = RecordBatch {
        comp,
        schema: schema.clone(),
        desc: desc.clone(),
        field_ports: Vec::new(),
        bus_ports: Vec::new(),
    };

    let mut desc_index = 0;
    for (field_index, field) in schema.fields.iter().enumerate() {
        if field.ignore {
            debug!(field = %field.name, "ignoring field");
            continue;
        }
        debug!(
            schema = %schema.name,
            field = %field.name,
            mode = ?schema.mode,
            "instantiating array primitive"
        );
        let buffers = desc
            .fields
            .get(desc_index)
            .map(|f| f.buffers.len())
            .unwrap_or(1);
        add_field(
            w,
            &mut rb,
            field,
            field_index,
            desc_index,
            buffers,
            &bus_params,
            bcd,
            kcd,
        )?;
        desc_index += 1;
    }
    Ok(rb)
}

#[allow(clippy::too_many_arguments)]
fn add_field(
    w: &mut World,
    rb: &mut RecordBatch,
    field: &BatchField,
    field_index: usize,
    desc_index: usize,
    buffers: usize,
    bus_params: &BusParams,
    bcd: NodeId,
    kcd: NodeId,
) -> Result<()> {
    let comp = rb.comp;
    let schema_name = rb.schema.name.clone();
    let mode = rb.schema.mode;
    let kcd_dom = kernel_cd(w);
    let bcd_dom = bus_cd(w);

    // Field-derived ports toward the kernel side.
    let arrow_name = format!("{}_{}", schema_name, field.name);
    let arrow_ty = field_stream_type(w, field)?;
    let arrow = w.port(&arrow_name, arrow_ty, arrow_dir(mode), kcd_dom);
    w.add_node(comp, arrow)?;
    rb.field_ports.push(FieldPort {
        node: arrow,
        name: arrow_name.clone(),
        function: FieldFunction::Arrow,
        field_index,
        desc_index,
        profile: field.profile,
    });

    let cmd_name = format!("{arrow_name}_cmd");
    let tag = w.lit_int(field.tag_width as i64);
    let ctrl_width = w.lit_int(64 * buffers as i64);
    let cmd_ty = cmd_type(w, tag, Some(ctrl_width))?;
    let cmd = w.port(&cmd_name, cmd_ty, Dir::In, kcd_dom);
    w.add_node(comp, cmd)?;
    rb.field_ports.push(FieldPort {
        node: cmd,
        name: cmd_name.clone(),
        function: FieldFunction::Command,
        field_index,
        desc_index,
        profile: false,
    });

    let unl_name = format!("{arrow_name}_unl");
    let unl_ty = unlock_type(w, tag)?;
    let unl = w.port(&unl_name, unl_ty, Dir::Out, kcd_dom);
    w.add_node(comp, unl)?;
    rb.field_ports.push(FieldPort {
        node: unl,
        name: unl_name.clone(),
        function: FieldFunction::Unlock,
        field_index,
        desc_index,
        profile: false,
    });

    // The array primitive doing the actual memory work.
    let array_comp = array(w, mode)?;
    let inst = w.add_instance_of(comp, array_comp, &format!("{}_inst", field.name))?;

    let cfg = w.get_parameter(inst, "CFG")?;
    let cfg_value = w.lit_str(&config_string(field));
    w.connect(cfg, cfg_value)?;

    connect_bus_params(w, inst, comp)?;

    let inst_kcd = w.get_port(inst, "kcd")?;
    let inst_bcd = w.get_port(inst, "bcd")?;
    w.connect(inst_kcd, kcd)?;
    w.connect(inst_bcd, bcd)?;

    // Route the data stream between the field port and the primitive,
    // installing the field-to-canonical stream mapper.
    let data_port = w.get_port(inst, array_data_port_name(mode))?;
    let data_ty = w.node(data_port).ty;
    let mapper = stream_type_mapper(w, arrow_ty, data_ty)?;
    w.install_mapper(mapper, true)?;
    match mode {
        Mode::Read => {
            w.connect(arrow, data_port)?;
        }
        Mode::Write => {
            w.connect(data_port, arrow)?;
        }
    }

    let inst_cmd = w.get_port(inst, "cmd")?;
    w.connect(inst_cmd, cmd)?;
    let inst_unl = w.get_port(inst, "unl")?;
    w.connect(unl, inst_unl)?;

    // Forward the primitive's bus port as a prefixed top-level bus port.
    let bus_name = format!("{arrow_name}_bus");
    let function = bus_function(mode);
    let top_bus = bus_port(w, &bus_name, Dir::Out, bus_params, function, bcd_dom)?;
    w.add_node(comp, top_bus)?;
    let inst_bus = w.get_port(inst, "bus")?;
    w.connect(top_bus, inst_bus)?;
    rb.bus_ports.push(BusPortRef {
        name: bus_name,
        function,
    });
    Ok(())
}
