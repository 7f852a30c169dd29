//! Top-level orchestration.
//!
//! A design is generated bottom up: one RecordBatch component per schema,
//! the register file from the assembled register list, then the kernel
//! shell, the nucleus, and finally the mantle. The register list is the
//! concatenation of the default run-control registers, the record-batch
//! index and buffer registers, the user's custom kernel registers, and the
//! profiling registers, in that order; the rest of the design depends on
//! that ordering.

use mantlegen_ir::{GraphId, World};
use tracing::info;

use crate::error::{DesignError, Result};
use crate::kernel::{kernel, Kernel};
use crate::mantle::{mantle, Mantle};
use crate::mmio::{allocate_addresses, default_regs, mmio, recordbatch_regs, MmioPortInfo, MmioReg};
use crate::nucleus::{nucleus, Nucleus};
use crate::profiler::profiling_regs;
use crate::recordbatch::{record_batch, RecordBatch};
use crate::schema::{BatchSchema, RecordBatchDescription};

/// Input to design generation.
#[derive(Debug, Clone)]
pub struct DesignOptions {
    /// Name of the user kernel; component names derive from it.
    pub kernel_name: String,
    /// Schemas, one record batch each.
    pub schemas: Vec<BatchSchema>,
    /// Buffer descriptions matching the schemas; derived from the schema
    /// when absent.
    pub descriptions: Vec<Option<RecordBatchDescription>>,
    /// User-defined kernel registers.
    pub custom_regs: Vec<MmioReg>,
}

/// A fully generated design.
pub struct Design {
    pub recordbatches: Vec<RecordBatch>,
    /// The complete, address-allocated register list.
    pub regs: Vec<MmioReg>,
    pub mmio_comp: GraphId,
    pub mmio_ports: Vec<MmioPortInfo>,
    pub kernel: Kernel,
    pub nucleus: Nucleus,
    pub mantle: Mantle,
}

impl Design {
    /// Generate the whole design into a world.
    pub fn generate(w: &mut World, opts: DesignOptions) -> Result<Design> {
        if !opts.descriptions.is_empty() && opts.descriptions.len() != opts.schemas.len() {
            return Err(DesignError::Schema(
                "number of schemas and record-batch descriptions does not match".to_string(),
            ));
        }

        // Order batches by name, then mode; the register file layout and the
        // buffer-address control flow depend on a stable order.
        let mut inputs: Vec<(BatchSchema, RecordBatchDescription)> = opts
            .schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| {
                let desc = opts
                    .descriptions
                    .get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| RecordBatchDescription::from_schema(schema));
                (schema.clone(), desc)
            })
            .collect();
        inputs.sort_by(|a, b| (&a.0.name, a.0.mode as u8).cmp(&(&b.0.name, b.0.mode as u8)));

        info!(kernel = %opts.kernel_name, batches = inputs.len(), "generating design");

        let mut recordbatches = Vec::new();
        for (schema, desc) in &inputs {
            let rb_name = format!("{}_{}", opts.kernel_name, schema.name);
            recordbatches.push(record_batch(w, &rb_name, schema, desc)?);
        }

        let mut regs = default_regs();
        let descs: Vec<RecordBatchDescription> =
            inputs.iter().map(|(_, d)| d.clone()).collect();
        regs.extend(recordbatch_regs(&descs));
        regs.extend(opts.custom_regs.iter().cloned());
        regs.extend(profiling_regs(w, &recordbatches));
        allocate_addresses(&mut regs);

        let (mmio_comp, mmio_ports) = mmio(w, &regs)?;
        let kernel = kernel(w, &opts.kernel_name, &recordbatches, &mmio_ports)?;
        let nucleus = nucleus(
            w,
            &format!("{}_Nucleus", opts.kernel_name),
            &recordbatches,
            &kernel,
            mmio_comp,
            &mmio_ports,
        )?;
        let mantle = mantle(
            w,
            &format!("{}_Mantle", opts.kernel_name),
            &recordbatches,
            &nucleus,
        )?;

        Ok(Design {
            recordbatches,
            regs,
            mmio_comp,
            mmio_ports,
            kernel,
            nucleus,
            mantle,
        })
    }

    /// The components an emitter should write out, top level first.
    pub fn output_components(&self) -> Vec<GraphId> {
        let mut out = vec![self.mantle.comp, self.nucleus.comp, self.kernel.comp];
        out.extend(self.recordbatches.iter().map(|rb| rb.comp));
        out
    }

    /// Prepare every output component for emission: materialize the stream
    /// abstraction and interpose signals on all instance ports.
    pub fn lower(&self, w: &mut World) -> Result<()> {
        for comp in self.output_components() {
            w.expand_streams(comp)?;
            w.signalize_ports(comp)?;
        }
        Ok(())
    }
}
