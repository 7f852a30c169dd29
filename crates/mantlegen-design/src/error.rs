//! Error types for the design library.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DesignError>;

#[derive(Debug, Error)]
pub enum DesignError {
    #[error(transparent)]
    Ir(#[from] mantlegen_ir::IrError),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("mmio error: {0}")]
    Mmio(String),
}
