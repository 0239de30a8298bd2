use std::{
    collections::HashMap,
    fmt,
    future::IntoFuture,
    hash::Hash,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use alloy_eips::BlockId;
use alloy_primitives::{Address, Bytes, B256, U256, U64};
use alloy_provider::{DynProvider, Provider};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::{state::RemoteAccount, ForkError};

/// A reference to an upstream block, resolved to a number when a session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockRef {
    /// The upstream head at session start.
    #[default]
    Latest,
    /// A block number.
    Number(u64),
    /// A block hash.
    Hash(B256),
}

impl FromStr for BlockRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            _ if s.len() == 66 && s.starts_with("0x") => {
                s.parse().map(Self::Hash).map_err(|e| format!("invalid block hash {s}: {e}"))
            }
            _ => {
                let number = match s.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse(),
                };
                number.map(Self::Number).map_err(|e| format!("invalid block number {s}: {e}"))
            }
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Hash(hash) => write!(f, "{hash}"),
        }
    }
}

type Slot<T> = Arc<OnceCell<T>>;

/// Returns the cell of `key`, creating it if needed. The map lock is never held across an
/// await.
fn slot<K: Eq + Hash, T>(map: &Mutex<HashMap<K, Slot<T>>>, key: K) -> Slot<T> {
    map.lock().entry(key).or_default().clone()
}

#[derive(Debug, Deserialize)]
struct BlockNumberOnly {
    number: U64,
}

/// Resolves account, storage and code misses against an upstream JSON-RPC provider at a
/// pinned block.
///
/// Every value is fetched at most once per resolver: concurrent requests for the same key
/// wait on the same in-flight fetch, and later requests are served from memory. A failed
/// fetch is not cached.
pub struct ForkResolver<P = DynProvider> {
    provider: P,
    block_number: u64,
    accounts: Mutex<HashMap<Address, Slot<RemoteAccount>>>,
    storage: Mutex<HashMap<(Address, U256), Slot<U256>>>,
    code: Mutex<HashMap<Address, Slot<Bytes>>>,
    requests: AtomicU64,
}

impl<P> fmt::Debug for ForkResolver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkResolver")
            .field("block_number", &self.block_number)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

impl<P: Provider> ForkResolver<P> {
    /// Creates a resolver pinned at `block_number`.
    pub fn pinned(provider: P, block_number: u64) -> Self {
        Self {
            provider,
            block_number,
            accounts: Mutex::default(),
            storage: Mutex::default(),
            code: Mutex::default(),
            requests: AtomicU64::new(0),
        }
    }

    /// Resolves `block` against the upstream and creates a resolver pinned there.
    pub async fn connect(provider: P, block: BlockRef) -> Result<Self, ForkError> {
        let resolver = Self::pinned(provider, 0);
        let block_number = resolver.resolve(block).await?;
        debug!(target: "fork", %block, block_number, "Pinned fork block");
        Ok(Self { block_number, ..resolver })
    }

    /// The pinned block number.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// The upstream provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The number of upstream requests issued so far.
    pub fn upstream_requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn block_id(&self) -> BlockId {
        BlockId::number(self.block_number)
    }

    async fn request<T, E, F>(&self, method: &'static str, call: F) -> Result<T, ForkError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.requests.fetch_add(1, Ordering::Relaxed);
        trace!(target: "fork", method, block = self.block_number, "Upstream request");
        call.await.map_err(|err| ForkError::upstream(method, err))
    }

    /// Resolves a block reference to a block number.
    pub async fn resolve(&self, block: BlockRef) -> Result<u64, ForkError> {
        match block {
            BlockRef::Number(number) => Ok(number),
            BlockRef::Latest => {
                self.request("eth_blockNumber", self.provider.get_block_number()).await
            }
            BlockRef::Hash(hash) => {
                let block: Option<BlockNumberOnly> = self
                    .request(
                        "eth_getBlockByHash",
                        self.provider.raw_request("eth_getBlockByHash".into(), (hash, false)),
                    )
                    .await?;
                block
                    .map(|block| block.number.to::<u64>())
                    .ok_or_else(|| ForkError::BlockNotFound(hash.to_string()))
            }
        }
    }

    /// Returns the upstream head block number.
    pub async fn head(&self) -> Result<u64, ForkError> {
        self.resolve(BlockRef::Latest).await
    }

    /// Fetches nonce, balance and code of an account.
    pub async fn fetch_account(&self, address: Address) -> Result<RemoteAccount, ForkError> {
        let cell = slot(&self.accounts, address);
        cell.get_or_try_init(|| async {
            let block = self.block_id();
            let (balance, nonce, code) = tokio::try_join!(
                self.request("eth_getBalance", self.provider.get_balance(address).block_id(block)),
                self.request(
                    "eth_getTransactionCount",
                    self.provider.get_transaction_count(address).block_id(block),
                ),
                self.fetch_code(address),
            )?;
            Ok(RemoteAccount { nonce, balance, code })
        })
        .await
        .cloned()
    }

    /// Fetches the value of a storage slot.
    pub async fn fetch_storage(&self, address: Address, index: U256) -> Result<U256, ForkError> {
        let cell = slot(&self.storage, (address, index));
        cell.get_or_try_init(|| {
            self.request(
                "eth_getStorageAt",
                self.provider.get_storage_at(address, index).block_id(self.block_id()),
            )
        })
        .await
        .copied()
    }

    /// Fetches the code of an account.
    pub async fn fetch_code(&self, address: Address) -> Result<Bytes, ForkError> {
        let cell = slot(&self.code, address);
        cell.get_or_try_init(|| {
            self.request("eth_getCode", self.provider.get_code_at(address).block_id(self.block_id()))
        })
        .await
        .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_ref() {
        assert_eq!("latest".parse::<BlockRef>().unwrap(), BlockRef::Latest);
        assert_eq!("1234".parse::<BlockRef>().unwrap(), BlockRef::Number(1234));
        assert_eq!("0x10".parse::<BlockRef>().unwrap(), BlockRef::Number(16));
        assert_eq!(
            format!("0x{}", "ab".repeat(32)).parse::<BlockRef>().unwrap(),
            BlockRef::Hash(B256::repeat_byte(0xab))
        );
        assert!("pending".parse::<BlockRef>().is_err());
    }
}
