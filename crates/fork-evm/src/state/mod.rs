//! The state cache, the checkpoint discipline and the state managers.
//!
//! A session owns one [`StateManager`]. The manager variants differ only in their
//! [`Fallback`], selected at construction time:
//! - [`NormalStateManager`]: purely local.
//! - [`ForkStateManager`]: misses are fetched from an upstream at a pinned block and become
//!   part of the local trie.
//! - [`ProxyStateManager`]: misses are fetched from the upstream head, which is re-pinned on
//!   every [`lock`](StateManager::lock).
//!
//! [`DynStateManager`] erases the fallback so the mode can follow runtime configuration.

mod cache;
pub use cache::{Checkpoint, StateCache};

mod dump;
pub use dump::*;

mod fallback;
pub use fallback::*;

mod manager;
pub use manager::*;

mod traits;
pub use traits::*;

use alloy_provider::DynProvider;

use crate::fork::{ForkFallback, ProxyFallback};

/// A session without an upstream.
pub type NormalStateManager = StateManager<NoFallback>;

/// A session forking an upstream at a pinned block.
pub type ForkStateManager<P = DynProvider> = StateManager<ForkFallback<P>>;

/// A session following the head of an upstream.
pub type ProxyStateManager<P = DynProvider> = StateManager<ProxyFallback<P>>;

/// A session whose mode is chosen at runtime.
pub type DynStateManager = StateManager<DynFallback>;
