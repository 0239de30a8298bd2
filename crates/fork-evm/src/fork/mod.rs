//! The upstream fallback of forked and proxied sessions.

mod bridge;
pub use bridge::{BlockingBridge, OwnedRuntime};

mod fallback;
pub use fallback::{ForkFallback, ProxyFallback};

mod resolver;
pub use resolver::{BlockRef, ForkResolver};

use std::{sync::Arc, time::Duration};

use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use tracing::info;

use crate::{ForkError, ForkStateManager, ProxyStateManager, StateManager};

/// How a session relates to its upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForkMode {
    /// Pin the configured block for the whole session.
    #[default]
    Fork,
    /// Follow the upstream head, expecting a new block every `expected_block_time`.
    Proxy {
        /// How long a head observation stays valid.
        expected_block_time: Duration,
    },
}

/// Upstream configuration of a session.
#[derive(Debug, Clone)]
pub struct ForkConfig {
    /// The upstream JSON-RPC endpoint.
    pub url: String,
    /// The block to pin. Ignored in proxy mode.
    pub block: BlockRef,
    /// Fork or proxy.
    pub mode: ForkMode,
}

impl ForkConfig {
    /// Creates a fork configuration pinning `block` of `url`.
    pub fn new(url: impl Into<String>, block: BlockRef) -> Self {
        Self { url: url.into(), block, mode: ForkMode::Fork }
    }

    /// Connects an HTTP provider to the upstream.
    pub fn provider(&self) -> Result<DynProvider, ForkError> {
        let url = self.url.parse().map_err(|e| ForkError::InvalidUrl {
            url: self.url.clone(),
            message: format!("{e}"),
        })?;
        let provider = ProviderBuilder::new().disable_recommended_fillers().connect_http(url);
        Ok(DynProvider::new(provider))
    }
}

impl ForkStateManager {
    /// Starts a forked session, resolving the configured block against the upstream.
    pub async fn fork(config: &ForkConfig, bridge: BlockingBridge) -> Result<Self, ForkError> {
        let resolver = bridge.run(ForkResolver::connect(config.provider()?, config.block)).await?;
        info!(target: "fork", url = %config.url, block = resolver.block_number(), "Forking upstream");
        Ok(StateManager::with_fallback(ForkFallback::new(Arc::new(resolver), bridge)))
    }
}

impl<P: Provider> StateManager<ForkFallback<P>> {
    /// The block the session is pinned at.
    pub fn fork_block(&self) -> u64 {
        self.fallback().resolver().block_number()
    }
}

impl ProxyStateManager {
    /// Starts a proxied session at the current upstream head.
    pub async fn proxy(
        config: &ForkConfig,
        expected_block_time: Duration,
        bridge: BlockingBridge,
    ) -> Result<Self, ForkError> {
        let provider = config.provider()?;
        let upstream = provider.clone();
        let head =
            bridge.run(async move { ForkResolver::pinned(upstream, 0).head().await }).await?;
        info!(target: "fork", url = %config.url, head, "Proxying upstream");
        Ok(StateManager::with_fallback(ProxyFallback::new(provider, head, expected_block_time, bridge)))
    }
}
