use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use parking_lot::Mutex;
use serde_json::{json, Value};
use wiremock::{matchers::method, Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::state::RemoteAccount;

/// The chain served by a [`MockUpstream`].
#[derive(Debug, Default)]
struct MockChain {
    head: u64,
    blocks: BTreeMap<B256, u64>,
    accounts: HashMap<Address, RemoteAccount>,
    storage: HashMap<(Address, U256), U256>,
    /// Every request received, as `(method, params)`.
    requests: Vec<(String, Value)>,
    failing: bool,
    delay: Duration,
}

impl MockChain {
    fn handle(&mut self, request: &Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        self.requests.push((method.clone(), params.clone()));

        if self.failing {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32000, "message": "upstream unavailable" },
            });
        }
        let address = || -> Address {
            params.get(0).and_then(|p| serde_json::from_value(p.clone()).ok()).unwrap_or_default()
        };
        let account = |address: Address| self.accounts.get(&address).cloned().unwrap_or_default();
        let result = match method.as_str() {
            "eth_blockNumber" => json!(U64::from(self.head)),
            "eth_chainId" => json!(U64::from(1)),
            "eth_getBalance" => json!(account(address()).balance),
            "eth_getTransactionCount" => json!(U64::from(account(address()).nonce)),
            "eth_getCode" => json!(account(address()).code),
            "eth_getStorageAt" => {
                let slot: U256 = params
                    .get(1)
                    .and_then(|p| serde_json::from_value(p.clone()).ok())
                    .unwrap_or_default();
                let value = self.storage.get(&(address(), slot)).copied().unwrap_or_default();
                json!(B256::from(value))
            }
            "eth_getBlockByHash" => {
                let hash: B256 = params
                    .get(0)
                    .and_then(|p| serde_json::from_value(p.clone()).ok())
                    .unwrap_or_default();
                match self.blocks.get(&hash) {
                    Some(number) => json!({ "hash": hash, "number": U64::from(*number) }),
                    None => Value::Null,
                }
            }
            _ => {
                return json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": format!("method {method} not found") },
                })
            }
        };
        json!({ "jsonrpc": "2.0", "id": id, "result": result })
    }
}

#[derive(Debug, Clone)]
struct Responder(Arc<Mutex<MockChain>>);

impl Respond for Responder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        let mut chain = self.0.lock();
        let response = match body {
            Value::Array(batch) => Value::Array(batch.iter().map(|r| chain.handle(r)).collect()),
            single => chain.handle(&single),
        };
        ResponseTemplate::new(200).set_body_json(response).set_delay(chain.delay)
    }
}

/// An HTTP JSON-RPC node serving a fixed chain, counting the requests it receives.
#[derive(Debug)]
pub struct MockUpstream {
    server: MockServer,
    chain: Arc<Mutex<MockChain>>,
}

impl MockUpstream {
    /// Starts a mock node whose head is block `head`.
    pub async fn start(head: u64) -> Self {
        let server = MockServer::start().await;
        let chain = Arc::new(Mutex::new(MockChain { head, ..Default::default() }));
        Mock::given(method("POST")).respond_with(Responder(chain.clone())).mount(&server).await;
        Self { server, chain }
    }

    /// The HTTP endpoint.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Moves the head.
    pub fn set_head(&self, head: u64) {
        self.chain.lock().head = head;
    }

    /// Registers a block hash.
    pub fn add_block(&self, hash: B256, number: u64) {
        self.chain.lock().blocks.insert(hash, number);
    }

    /// Sets an account.
    pub fn set_account(&self, address: Address, account: RemoteAccount) {
        self.chain.lock().accounts.insert(address, account);
    }

    /// Sets the balance of an account.
    pub fn set_balance(&self, address: Address, balance: U256) {
        self.chain.lock().accounts.entry(address).or_default().balance = balance;
    }

    /// Sets the code of an account.
    pub fn set_code(&self, address: Address, code: Bytes) {
        self.chain.lock().accounts.entry(address).or_default().code = code;
    }

    /// Sets a storage slot.
    pub fn set_storage(&self, address: Address, slot: U256, value: U256) {
        self.chain.lock().storage.insert((address, slot), value);
    }

    /// Makes every following request fail with a JSON-RPC error.
    pub fn set_failing(&self, failing: bool) {
        self.chain.lock().failing = failing;
    }

    /// Delays every following response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.chain.lock().delay = delay;
    }

    /// The number of requests received for `method`.
    pub fn requests(&self, method: &str) -> usize {
        self.chain.lock().requests.iter().filter(|(m, _)| m == method).count()
    }

    /// The params of every request received for `method`.
    pub fn params(&self, method: &str) -> Vec<Value> {
        self.chain
            .lock()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// The number of requests received.
    pub fn total_requests(&self) -> usize {
        self.chain.lock().requests.len()
    }
}
