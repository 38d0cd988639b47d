//! Provider credential registry library.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod observability;
pub mod probes;
pub mod registry;
pub mod resilience;
pub mod startup;
pub mod store;

pub use config::schema::RegistryConfig;
pub use registry::{ProviderRegistry, RegistryError};
pub use startup::Services;
