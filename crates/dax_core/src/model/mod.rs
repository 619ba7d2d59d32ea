//! Domain model for DAX financial metrics.
//!
//! # Responsibility
//! - Define the stored record shape and its business key.
//! - Define query inputs and the response envelopes returned to callers.
//!
//! # Invariants
//! - Envelopes are computed from repository results, never stored.
//!
//! # See also
//! - docs/architecture/dax-data-layer.md

pub mod envelope;
pub mod record;
