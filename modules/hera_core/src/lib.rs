//! HERA Core
//!
//! Schema-less multi-tenant business data core. A fixed set of generic tables
//! (entities, typed dynamic fields, relationships, transactions) represents
//! any business domain. Smart codes classify every record and select its
//! validation rules; workflows are stored as relationship edges.

// Public exports
pub mod contract;
pub use contract::{BusinessDataApi, CoreError};

pub mod module;
pub use module::HeraCoreModule;

pub mod config;
pub use config::Config;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
