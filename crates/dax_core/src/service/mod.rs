//! Use-case services.
//!
//! # Responsibility
//! - Turn caller input (CSV streams, raw query parameters) into repository
//!   calls and shape the results into response envelopes.
//! - Keep callers decoupled from which store is wired in.

pub mod dax_service;
