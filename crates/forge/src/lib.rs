//! Forge/teardown saga for superkey provisioning.
//!
//! The forge engine walks a pipeline of resource-creation steps, feeding each
//! step's outputs into later steps. If any step fails, everything created so
//! far is handed to the teardown engine, which deletes it in reverse creation
//! order and keeps going past individual delete failures.
//!
//! Cloud access goes through the [`ProviderDriver`] capability trait; one
//! driver is built per request by the [`ProviderFactory`] registered for the
//! request's provider.

pub mod engine;
pub mod error;
pub mod provider;
pub mod providers;
pub mod teardown;

pub use engine::ForgeEngine;
pub use error::{ForgeError, ProviderError};
pub use provider::{
    AccessKeySpec, AttachmentSpec, PolicySpec, ProviderDriver, ProviderFactory, ProviderRegistry,
    Provisioned, ResourceSpec, RoleSpec, create_resource, delete_resource,
};
pub use providers::{InMemoryProvider, ProviderCall};
pub use teardown::{TeardownEngine, TeardownOutcome, TeardownReport};
