//! Endpoint pool - Endpoint state machine, selection policy, registry and persistence

pub mod document;
pub mod endpoint;
pub mod registry;
pub mod selection;
pub mod store;

pub use document::{CallPolicy, PoolDocument};
pub use endpoint::{Endpoint, EndpointState};
pub use registry::{EndpointRegistry, SelectedEndpoint};
pub use store::{JsonFileStore, MemoryStore, PoolStore};
