use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{DynProvider, Provider};
use tracing::debug;

use super::{BlockingBridge, ForkResolver};
use crate::{
    state::{Fallback, RemoteAccount},
    StateError,
};

/// The fallback of a forked session: every miss is resolved at the pinned block.
pub struct ForkFallback<P = DynProvider> {
    resolver: Arc<ForkResolver<P>>,
    bridge: BlockingBridge,
}

impl<P> ForkFallback<P> {
    /// Creates a fallback over `resolver`.
    pub fn new(resolver: Arc<ForkResolver<P>>, bridge: BlockingBridge) -> Self {
        Self { resolver, bridge }
    }

    /// The shared resolver.
    pub fn resolver(&self) -> &Arc<ForkResolver<P>> {
        &self.resolver
    }

    /// The bridge used to await the upstream.
    pub fn bridge(&self) -> &BlockingBridge {
        &self.bridge
    }
}

impl<P> Clone for ForkFallback<P> {
    fn clone(&self) -> Self {
        Self { resolver: self.resolver.clone(), bridge: self.bridge.clone() }
    }
}

impl<P> fmt::Debug for ForkFallback<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkFallback").field("resolver", &self.resolver).finish_non_exhaustive()
    }
}

fn resolve_account<P: Provider>(
    resolver: &ForkResolver<P>,
    bridge: &BlockingBridge,
    address: Address,
) -> Result<Option<RemoteAccount>, StateError> {
    let account = bridge.block_on(resolver.fetch_account(address))?;
    Ok((!account.is_empty()).then_some(account))
}

impl<P: Provider> Fallback for ForkFallback<P> {
    fn account(&self, address: Address) -> Result<Option<RemoteAccount>, StateError> {
        resolve_account(&self.resolver, &self.bridge, address)
    }

    fn storage(&self, address: Address, slot: U256) -> Result<U256, StateError> {
        Ok(self.bridge.block_on(self.resolver.fetch_storage(address, slot))?)
    }

    fn code(&self, address: Address) -> Result<Bytes, StateError> {
        Ok(self.bridge.block_on(self.resolver.fetch_code(address))?)
    }
}

/// The fallback of a proxied session: misses are resolved at the upstream head, which is
/// re-pinned by [`lock`](Fallback::lock).
///
/// The resolver is an indirection cell: re-pinning swaps in a fresh resolver, which drops
/// every value cached for the previous head.
pub struct ProxyFallback<P = DynProvider> {
    provider: P,
    resolver: Arc<ForkResolver<P>>,
    bridge: BlockingBridge,
    expected_block_time: Duration,
    last_head_check: Option<Instant>,
    locked: bool,
}

impl<P: Provider + Clone> ProxyFallback<P> {
    /// Creates a proxy pinned at `head`.
    pub fn new(
        provider: P,
        head: u64,
        expected_block_time: Duration,
        bridge: BlockingBridge,
    ) -> Self {
        Self {
            resolver: Arc::new(ForkResolver::pinned(provider.clone(), head)),
            provider,
            bridge,
            expected_block_time,
            last_head_check: Some(Instant::now()),
            locked: false,
        }
    }

    /// The currently pinned head.
    pub fn block_number(&self) -> u64 {
        self.resolver.block_number()
    }

    /// The resolver of the currently pinned head.
    pub fn resolver(&self) -> &Arc<ForkResolver<P>> {
        &self.resolver
    }

    /// Returns `true` while a call holds the pinned head.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl<P: Clone> Clone for ProxyFallback<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            resolver: self.resolver.clone(),
            bridge: self.bridge.clone(),
            expected_block_time: self.expected_block_time,
            last_head_check: self.last_head_check,
            locked: self.locked,
        }
    }
}

impl<P> fmt::Debug for ProxyFallback<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFallback")
            .field("resolver", &self.resolver)
            .field("expected_block_time", &self.expected_block_time)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl<P: Provider + Clone> Fallback for ProxyFallback<P> {
    fn persists(&self) -> bool {
        false
    }

    /// Re-checks the head at most once per expected block time. When it moved, a fresh
    /// resolver replaces the old one, dropping every value cached for the previous head.
    fn lock(&mut self) -> Result<bool, StateError> {
        self.locked = true;
        if self.last_head_check.is_some_and(|at| at.elapsed() < self.expected_block_time) {
            return Ok(false);
        }
        let head = self.bridge.block_on(self.resolver.head())?;
        self.last_head_check = Some(Instant::now());
        if head == self.resolver.block_number() {
            return Ok(false);
        }
        debug!(target: "fork", from = self.resolver.block_number(), to = head, "Upstream head moved");
        self.resolver = Arc::new(ForkResolver::pinned(self.provider.clone(), head));
        Ok(true)
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn account(&self, address: Address) -> Result<Option<RemoteAccount>, StateError> {
        resolve_account(&self.resolver, &self.bridge, address)
    }

    fn storage(&self, address: Address, slot: U256) -> Result<U256, StateError> {
        Ok(self.bridge.block_on(self.resolver.fetch_storage(address, slot))?)
    }

    fn code(&self, address: Address) -> Result<Bytes, StateError> {
        Ok(self.bridge.block_on(self.resolver.fetch_code(address))?)
    }
}
