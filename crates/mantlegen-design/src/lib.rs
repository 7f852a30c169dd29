#![allow(dead_code, unused_variables, unused_imports)]
//! mantlegen design library
//!
//! This crate handles:
//! - Bus interface parameters, ports and arbiters
//! - AXI4-Lite and the memory-mapped register file
//! - Array reader/writer primitives and field stream plumbing
//! - RecordBatch, Kernel, Nucleus and Mantle composition
//! - Stream profiler insertion
//!
//! It builds on the structural graph IR in `mantlegen-ir`; schema ingestion
//! and RTL text emission live outside this workspace and consume the
//! interfaces defined here.

pub mod arrays;
pub mod axi4_lite;
pub mod basic;
pub mod bus;
pub mod design;
pub mod error;
pub mod kernel;
pub mod mantle;
pub mod mmio;
pub mod nucleus;
pub mod profiler;
pub mod recordbatch;
pub mod schema;

// Re-export main types
pub use design::{Design, DesignOptions};
pub use error::{DesignError, Result};
pub use mmio::{MmioBehavior, MmioFunction, MmioPortInfo, MmioReg};
pub use recordbatch::{BusPortRef, FieldFunction, FieldPort, RecordBatch};
pub use schema::{
    BatchField, BatchSchema, BufferDescription, FieldDescription, LogicalType, Mode,
    RecordBatchDescription,
};
