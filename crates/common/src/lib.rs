//! Shared identifiers for the superkey forge worker.

pub mod types;

pub use types::{ForgeId, TenantId};
