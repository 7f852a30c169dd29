//! Metadata keys recognized by the IR and its back-ends.
//!
//! Metadata is free-form string key/value storage on types, nodes and graphs.
//! These keys are the ones the transforms and emitters interpret; arbitrary
//! user keys are preserved across copies.

/// The component is a primitive; emitters declare but never define it.
pub const PRIMITIVE: &str = "primitive";

/// Library an emitter should import the primitive from.
pub const LIBRARY: &str = "library";

/// Package an emitter should import the primitive from.
pub const PACKAGE: &str = "package";

/// Emitter hint to render a single bit as a one-element vector.
pub const FORCE_VECTOR: &str = "force-vector";

/// Stream-expansion tag: `stream`, `record`, `valid` or `ready`.
pub const EXPAND_TYPE: &str = "expand-type";

/// Set on types and mappers that stream expansion already visited.
pub const WAS_EXPANDED: &str = "was-expanded";

/// Width of a count field belonging to the preceding stream.
pub const COUNT: &str = "count";
