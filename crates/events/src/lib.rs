//! Filmgen in-process event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope, addressed to explicit
//!   recipients.
//! - [`event_types`]: the names of the events the workflow emits.

pub mod bus;
pub mod event_types;

pub use bus::{EventBus, PlatformEvent};
