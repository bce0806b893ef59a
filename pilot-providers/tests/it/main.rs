mod wrapping;

use async_trait::async_trait;
use ethers_core::types::{Address, H256};
use ethers_providers::{JsonRpcClient, JsonRpcError, MockError, MockProvider};
use pilot_core::{
    route::{Account, Connection, RolesVersion, Route, Waypoint},
    types::PrefixedAddress,
};
use pilot_providers::{Fork, ForkApi, ForkApiError, TransactionInfo};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Sandbox backend that hands out numbered forks all served by one [`TestRpc`].
#[derive(Debug, Default)]
pub struct MockForkApi {
    pub rpc: TestRpc,
    pub created: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub fetched: AtomicUsize,
}

impl MockForkApi {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForkApi for MockForkApi {
    type Rpc = TestRpc;

    async fn create_fork(&self, chain_id: u64, _block: Option<u64>) -> Result<Fork, ForkApiError> {
        tokio::task::yield_now().await;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Fork { id: format!("fork-{n}"), chain_id, block_number: Some(100) })
    }

    async fn delete_fork(&self, fork_id: &str) -> Result<(), ForkApiError> {
        self.deleted.lock().unwrap().push(fork_id.to_string());
        Ok(())
    }

    async fn transaction_info(
        &self,
        fork_id: &str,
        hash: H256,
    ) -> Result<TransactionInfo, ForkApiError> {
        tokio::task::yield_now().await;
        self.fetched.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionInfo {
            id: format!("{fork_id}-tx{}", hash.0[0]),
            hash,
            block_number: None,
            status: Some(true),
        })
    }

    fn rpc(&self, _fork: &Fork) -> Result<TestRpc, ForkApiError> {
        Ok(self.rpc.clone())
    }

    fn transaction_link(&self, fork_id: &str, transaction_id: &str) -> Option<String> {
        Some(format!("https://dashboard.test/{fork_id}/{transaction_id}"))
    }
}

/// A [`MockProvider`] that can also answer with JSON-RPC errors and, when slow, yields a few
/// times before answering so other futures can run while a request is in flight.
#[derive(Clone, Debug, Default)]
pub struct TestRpc {
    pub mock: MockProvider,
    yields: usize,
}

impl TestRpc {
    pub fn slow() -> Self {
        Self { mock: MockProvider::new(), yields: 5 }
    }

    pub fn push(&self, value: Value) -> Result<(), MockError> {
        self.mock.push::<Value, _>(value)
    }

    /// Queues an error response, in the same order as [`TestRpc::push`].
    pub fn push_error(&self, code: i64, message: &str, data: Option<Value>) {
        let error = json!({ "mockError": { "code": code, "message": message, "data": data } });
        self.push(error).unwrap();
    }

    pub fn assert_request<T: Serialize + Send + Sync>(
        &self,
        method: &str,
        params: T,
    ) -> Result<(), MockError> {
        self.mock.assert_request(method, params)
    }
}

#[async_trait]
impl JsonRpcClient for TestRpc {
    type Error = MockError;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }
        let value: Value = self.mock.request(method, params).await?;
        if let Some(error) = value.get("mockError") {
            return Err(MockError::JsonRpcError(JsonRpcError {
                code: error["code"].as_i64().unwrap_or_default(),
                message: error["message"].as_str().unwrap_or_default().to_string(),
                data: error.get("data").filter(|data| !data.is_null()).cloned(),
            }))
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// EOA 0xaa.. -> Roles v2 0xbb.. -> Safe 0xcc.. on mainnet
pub fn roles_route() -> Route {
    let initiator = PrefixedAddress::eoa(addr(0xaa));
    Route {
        id: "roles".into(),
        label: "roles".into(),
        initiator: Some(initiator),
        avatar: PrefixedAddress::new(1, addr(0xcc)).unwrap(),
        waypoints: Some(vec![
            Waypoint::start(Account::Eoa { address: addr(0xaa) }),
            Waypoint::new(
                Account::Roles {
                    chain: 1,
                    address: addr(0xbb),
                    version: RolesVersion::V2,
                    multisend: None,
                    multisend_call_only: None,
                },
                Connection::IsMember { from: initiator, roles: vec!["MANAGER".into()] },
            ),
            Waypoint::new(
                Account::Safe { chain: 1, address: addr(0xcc) },
                Connection::IsEnabled { from: PrefixedAddress::new(1, addr(0xbb)).unwrap() },
            ),
        ]),
        provider_type: None,
        last_used: None,
    }
}

/// EOA 0xaa.. owning Safe 0xee.. on Gnosis Chain
pub fn owner_route() -> Route {
    let initiator = PrefixedAddress::eoa(addr(0xaa));
    Route {
        id: "owner".into(),
        label: "owner".into(),
        initiator: Some(initiator),
        avatar: PrefixedAddress::new(100, addr(0xee)).unwrap(),
        waypoints: Some(vec![
            Waypoint::start(Account::Eoa { address: addr(0xaa) }),
            Waypoint::new(
                Account::Safe { chain: 100, address: addr(0xee) },
                Connection::Owns { from: initiator },
            ),
        ]),
        provider_type: None,
        last_used: None,
    }
}
