//! adminop - resource cache and interaction controllers for an admin console
//!
//! Every list screen of the console follows one pattern: read a paginated,
//! sortable, searchable collection; mutate single entities; invalidate and
//! refetch; gate destructive actions behind a typed confirmation. This crate
//! implements that pattern once, parametrized by [`resource::ResourceDescriptor`]:
//!
//! - [`cache::RequestCache`]: key-addressed read cache with staleness and
//!   in-flight de-duplication
//! - [`query::ResourceQuery`]: builds cache keys from filter, page, size and
//!   sort, with debounced search
//! - [`mutation::ResourceMutation`]: create/update/delete with invalidation
//!   after server success
//! - [`confirm::ConfirmationGate`]: typed-confirmation state machine for
//!   destructive actions
//!
//! [`console::Console`] wires them to one backend and one cache.

pub mod cache;
pub mod client;
pub mod config;
pub mod confirm;
pub mod console;
pub mod error;
pub mod mutation;
pub mod query;
pub mod resource;
pub mod validation;

pub use console::Console;
pub use error::{Error, Result};
pub use resource::{ResourceDescriptor, ResourceKind};
