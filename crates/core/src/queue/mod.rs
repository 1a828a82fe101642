//! Offline mutation queue and connectivity-aware sync engine.
//!
//! User actions taken while offline are recorded as [`QueuedMutation`]s in a
//! durable [`MutationStore`]. The [`SyncEngine`] drains the queue in a
//! single-flight pass whenever connectivity allows, dispatching each mutation
//! through a [`RemoteExecutor`] and reporting terminal outcomes to a
//! [`SyncNotifier`].

mod connectivity;
mod engine;
mod executor;
mod model;
mod notifier;
mod policy;
mod reconcile;
mod store;

pub use connectivity::*;
pub use engine::*;
pub use executor::*;
pub use model::*;
pub use notifier::*;
pub use policy::*;
pub use reconcile::*;
pub use store::*;
