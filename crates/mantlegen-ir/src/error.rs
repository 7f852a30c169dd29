//! Error types for the graph IR.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IrError>;

/// Fatal diagnostics raised while constructing or transforming a graph.
///
/// Clock-domain mismatches and post-instantiation mutation are deliberately
/// not variants here; they are reported through `tracing` and do not abort
/// generation.
#[derive(Debug, Error)]
pub enum IrError {
    /// Duplicate names, foreign sub-objects, re-parenting pooled literals.
    #[error("structure error: {0}")]
    Structure(String),

    /// Illegal drive of an instance output or a component input.
    #[error("direction error: {0}")]
    Direction(String),

    /// No mapper available between two types, or an ill-typed construction.
    #[error("type error: {0}")]
    Type(String),

    /// Generic rebinding failures and array-size misuse.
    #[error("generic error: {0}")]
    Generic(String),
}
