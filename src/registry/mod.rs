//! Provider registry subsystem.
//!
//! # Data Flow
//! ```text
//! initialize():
//!     → subscribe providers (isActive == true) + settings
//!     → clear cache (entries may be stale after a detach)
//!     → bulk list of active providers → cache
//!     → default mapping document (seeded with nulls on first load)
//!     → feed task (Added/Modified → upsert, Removed → evict)
//!
//! get_provider(id):
//!     → cache hit → redacted view
//!     → cache miss → point read → cache → redacted view
//! ```
//!
//! # Design Decisions
//! - The cache is a projection of the store; it is only authoritative for reads
//! - Feed events are applied in arrival order, last writer wins
//! - Explicit mutations upsert the cache at the call site as well; a feed event
//!   for an earlier write can land afterwards and briefly restore the older
//!   record until the event for the later write arrives
//! - Raw keys never leave the registry except through the credential manager

pub mod cache;
pub mod defaults;
pub(crate) mod feed;
pub mod provider_registry;
pub mod types;

pub use cache::ProviderCache;
pub use defaults::{DefaultMapping, DefaultResolutionIndex};
pub use provider_registry::ProviderRegistry;
pub use types::{
    parse_provider_type, parse_subtype, redact_secret, resolution_key, ApiKey, LlmSubtype,
    Provider, ProviderType, ProviderView, RegistryError, RegistryResult,
};
