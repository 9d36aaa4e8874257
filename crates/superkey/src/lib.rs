//! Data model for superkey forging.
//!
//! This crate holds everything the forge and teardown engines pass around:
//! - `CreateRequest`, decoded from a `create_application` event payload
//! - `StepDefinition` and `Pipeline`, the static per-application-type recipe
//! - `CreatedResource`, the bookkeeping record that drives teardown
//! - `ForgedApplication`, the result of a fully successful pipeline run

pub mod application;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod resource;

pub use application::{Credential, ForgedApplication};
pub use error::{Result, SuperkeyError};
pub use pipeline::{
    InputSource, Pipeline, PipelineCatalog, ResolvedInputs, StepDefinition, StepInput, StepOutputs,
};
pub use request::CreateRequest;
pub use resource::{CreatedResource, ResourceHandle, ResourceKind};
