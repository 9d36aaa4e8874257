//! Provider driver implementations that ship with the forge crate.

pub mod memory;

pub use memory::{InMemoryProvider, ProviderCall};
