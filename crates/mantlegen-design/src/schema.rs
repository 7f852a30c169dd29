//! The interface consumed from the schema front-end.
//!
//! The front-end hands the design library a list of fields with logical
//! types, an access mode, and a record-batch description listing how many
//! buffers each field occupies in memory. Mapping a foreign schema format
//! onto these structures is the front-end's job; everything here is already
//! hardware-facing.

use mantlegen_ir::{meta, Dir, Field, TypeId, World};
use serde::{Deserialize, Serialize};

use crate::basic::{dvalid, last, log2_ceil, ARRAY_DATA};
use crate::error::{DesignError, Result};

/// Whether a record batch is read from or written to memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Read,
    Write,
}

impl Mode {
    /// The direction of a field data port as seen from the kernel: read
    /// batches feed the kernel, write batches drain it.
    pub fn dir(self) -> Dir {
        match self {
            Mode::Read => Dir::In,
            Mode::Write => Dir::Out,
        }
    }
}

/// Logical type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalType {
    /// Fixed-width primitive.
    Prim { width: u64 },
    /// Variable-length UTF-8 string; a list of bytes.
    Utf8,
    /// Variable-length binary; a list of bytes.
    Binary,
    /// Variable-length list of another logical type.
    List(Box<LogicalType>),
}

/// One field of a batch schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchField {
    /// Field name.
    pub name: String,
    /// Logical type.
    pub logical: LogicalType,
    /// Skip this field entirely.
    pub ignore: bool,
    /// Insert stream profilers for this field's data port.
    pub profile: bool,
    /// Maximum elements per cycle.
    pub epc: u64,
    /// Command/unlock tag width.
    pub tag_width: u64,
}

impl BatchField {
    pub fn new(name: &str, logical: LogicalType) -> Self {
        BatchField {
            name: name.to_string(),
            logical,
            ignore: false,
            profile: false,
            epc: 1,
            tag_width: 1,
        }
    }
}

/// A named, moded schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSchema {
    pub name: String,
    pub mode: Mode,
    pub fields: Vec<BatchField>,
}

/// A buffer backing part of a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferDescription {
    pub name: String,
}

/// Buffers of one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    pub buffers: Vec<BufferDescription>,
}

/// Buffer layout of a whole record batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBatchDescription {
    pub name: String,
    pub fields: Vec<FieldDescription>,
}

impl RecordBatchDescription {
    /// Derive a description from a schema alone: one values buffer per
    /// primitive, plus an offsets buffer per list nesting level.
    pub fn from_schema(schema: &BatchSchema) -> Self {
        fn buffers(logical: &LogicalType, prefix: &str, out: &mut Vec<BufferDescription>) {
            match logical {
                LogicalType::Prim { .. } => out.push(BufferDescription {
                    name: format!("{prefix}_values"),
                }),
                LogicalType::Utf8 | LogicalType::Binary => {
                    out.push(BufferDescription {
                        name: format!("{prefix}_offsets"),
                    });
                    out.push(BufferDescription {
                        name: format!("{prefix}_values"),
                    });
                }
                LogicalType::List(child) => {
                    out.push(BufferDescription {
                        name: format!("{prefix}_offsets"),
                    });
                    buffers(child, prefix, out);
                }
            }
        }
        let mut fields = Vec::new();
        for f in &schema.fields {
            if f.ignore {
                continue;
            }
            let mut bufs = Vec::new();
            buffers(&f.logical, &f.name, &mut bufs);
            fields.push(FieldDescription {
                name: f.name.clone(),
                buffers: bufs,
            });
        }
        RecordBatchDescription {
            name: schema.name.clone(),
            fields,
        }
    }
}

fn element_record(w: &mut World, name: &str, field: &BatchField, data_width: u64) -> TypeId {
    let dv = dvalid(w);
    let l = last(w);
    let data_vec = w.vector_of(data_width);
    w.set_type_meta(data_vec, ARRAY_DATA, "true");
    w.set_type_meta(data_vec, meta::FORCE_VECTOR, "true");
    let mut fields = vec![
        Field::new("dvalid", dv),
        Field::new("last", l),
        Field::new("data", data_vec),
    ];
    if field.epc > 1 {
        let count_width = log2_ceil(field.epc) + 1;
        let count_vec = w.vector_of(count_width);
        w.set_type_meta(count_vec, meta::COUNT, &count_width.to_string());
        fields.push(Field::new("count", count_vec));
    }
    w.record(name, fields)
}

/// The hardware stream type carrying one schema field.
///
/// Primitives become a single element stream; lists become a record of a
/// length stream and a values stream.
pub fn field_stream_type(w: &mut World, field: &BatchField) -> Result<TypeId> {
    match &field.logical {
        LogicalType::Prim { width } => {
            let rec = element_record(w, &format!("{}_rec", field.name), field, *width);
            Ok(w.stream(&field.name, rec, ""))
        }
        LogicalType::Utf8 | LogicalType::Binary => {
            let byte_field = BatchField {
                logical: LogicalType::Prim { width: 8 },
                ..field.clone()
            };
            list_stream_type(w, field, &byte_field, 8)
        }
        LogicalType::List(child) => match child.as_ref() {
            LogicalType::Prim { width } => {
                let value_field = BatchField {
                    logical: (**child).clone(),
                    ..field.clone()
                };
                list_stream_type(w, field, &value_field, *width)
            }
            _ => Err(DesignError::Schema(format!(
                "field {}: nested lists are not supported",
                field.name
            ))),
        },
    }
}

fn list_stream_type(
    w: &mut World,
    field: &BatchField,
    value_field: &BatchField,
    value_width: u64,
) -> Result<TypeId> {
    let dv = dvalid(w);
    let l = last(w);
    let length_vec = w.vector_of(32);
    let len_rec = w.record(
        &format!("{}_len_rec", field.name),
        vec![
            Field::new("dvalid", dv),
            Field::new("last", l),
            Field::new("length", length_vec),
        ],
    );
    let len_stream = w.stream(&format!("{}_len", field.name), len_rec, "");
    let val_rec = element_record(
        w,
        &format!("{}_val_rec", field.name),
        value_field,
        value_width,
    );
    let val_stream = w.stream(&format!("{}_val", field.name), val_rec, "");
    Ok(w.record(
        &field.name,
        vec![
            Field::new("len", len_stream),
            Field::new("val", val_stream),
        ],
    ))
}

/// The configuration string handed to an array reader/writer primitive.
pub fn config_string(field: &BatchField) -> String {
    fn inner(logical: &LogicalType, epc: u64) -> String {
        match logical {
            LogicalType::Prim { width } => {
                if epc > 1 {
                    format!("prim({width};epc={epc})")
                } else {
                    format!("prim({width})")
                }
            }
            LogicalType::Utf8 | LogicalType::Binary => {
                if epc > 1 {
                    format!("listprim(8;epc={epc})")
                } else {
                    "listprim(8)".to_string()
                }
            }
            LogicalType::List(child) => match child.as_ref() {
                LogicalType::Prim { width } => format!("listprim({width})"),
                _ => format!("list({})", inner(child, 1)),
            },
        }
    }
    inner(&field.logical, field.epc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prim_field_is_a_single_stream() {
        let mut w = World::new();
        let f = BatchField::new("num", LogicalType::Prim { width: 32 });
        let ty = field_stream_type(&mut w, &f).unwrap();
        assert!(w.ty(ty).is_stream());
        let flat = mantlegen_ir::flatten(&w, ty);
        let streams = flat.iter().filter(|t| w.ty(t.ty).is_stream()).count();
        assert_eq!(streams, 1);
    }

    #[test]
    fn string_field_has_length_and_values_streams() {
        let mut w = World::new();
        let f = BatchField::new("name", LogicalType::Utf8);
        let ty = field_stream_type(&mut w, &f).unwrap();
        let flat = mantlegen_ir::flatten(&w, ty);
        let streams = flat.iter().filter(|t| w.ty(t.ty).is_stream()).count();
        assert_eq!(streams, 2);
    }

    #[test]
    fn epc_adds_a_count_field() {
        let mut w = World::new();
        let mut f = BatchField::new("num", LogicalType::Prim { width: 8 });
        f.epc = 4;
        let ty = field_stream_type(&mut w, &f).unwrap();
        let flat = mantlegen_ir::flatten(&w, ty);
        assert!(flat
            .iter()
            .any(|t| w.ty(t.ty).meta.contains_key(meta::COUNT)));
    }

    #[test]
    fn config_strings() {
        let f = BatchField::new("a", LogicalType::Prim { width: 64 });
        assert_eq!(config_string(&f), "prim(64)");
        let s = BatchField::new("b", LogicalType::Utf8);
        assert_eq!(config_string(&s), "listprim(8)");
        let l = BatchField::new("c", LogicalType::List(Box::new(LogicalType::Prim { width: 16 })));
        assert_eq!(config_string(&l), "listprim(16)");
    }

    #[test]
    fn description_counts_buffers() {
        let schema = BatchSchema {
            name: "batch".to_string(),
            mode: Mode::Read,
            fields: vec![
                BatchField::new("num", LogicalType::Prim { width: 32 }),
                BatchField::new("name", LogicalType::Utf8),
            ],
        };
        let desc = RecordBatchDescription::from_schema(&schema);
        assert_eq!(desc.fields.len(), 2);
        assert_eq!(desc.fields[0].buffers.len(), 1);
        assert_eq!(desc.fields[1].buffers.len(), 2);
    }
}
