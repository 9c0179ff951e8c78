//! Client-side data synchronization primitives for the gateway fleet console.
//!
//! Three independent building blocks that screens compose:
//!
//! ```text
//!  search box ──→ Debounced ──→ Poller::set_dependencies
//!                                    │
//!                              FetchState<T> ──seed──→ OptimisticEngine / OptimisticList
//!                                                           │
//!                                         mutate ──→ patch ──→ settle (replace | rollback)
//! ```
//!
//! - [`poller::Poller`]: stale-while-revalidate subscription over a fetch function
//! - [`debounce::Debouncer`]: trailing-edge coalescing with a stable handle
//! - [`optimistic::OptimisticEngine`]: optimistic mutations with rollback
//!
//! Nothing is shared between instances. Each owns its state and tears it
//! down on `dispose()` or drop.

pub mod config;
pub mod debounce;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod optimistic;
pub mod poller;

pub use debounce::{Debounced, Debouncer};
pub use error::{BoxError, SyncError};
pub use lifecycle::LivenessToken;
pub use optimistic::{
    Identified, MutationState, OptimisticEngine, OptimisticList, OptimisticState, Patch,
};
pub use poller::{DependencyKey, FetchState, FocusSignal, Poller, PollerBuilder};
