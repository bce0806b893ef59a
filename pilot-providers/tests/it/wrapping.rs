use crate::{addr, owner_route, roles_route};
use async_trait::async_trait;
use ethers_core::types::{TransactionRequest, H256, U256};
use ethers_providers::{JsonRpcClient, MockProvider};
use pilot_core::{route::Route, types::MetaTransaction, wrap};
use pilot_providers::{
    DirectExecution, DirectExecutionError, Submission, WrappingError, WrappingProvider,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct RecordingExecution {
    calls: Mutex<Vec<MetaTransaction>>,
}

#[async_trait]
impl DirectExecution for RecordingExecution {
    async fn send_transaction(
        &self,
        _route: &Route,
        call: &MetaTransaction,
    ) -> Result<H256, DirectExecutionError> {
        self.calls.lock().unwrap().push(call.clone());
        Ok(H256::repeat_byte(0x5a))
    }

    async fn estimate_gas(
        &self,
        _route: &Route,
        _call: &MetaTransaction,
    ) -> Result<U256, DirectExecutionError> {
        Ok(U256::from(21_000))
    }
}

fn avatar_tx() -> Value {
    json!({ "from": addr(0xcc), "to": addr(0xdd), "value": "0x0", "data": "0x" })
}

#[tokio::test]
async fn answers_with_the_avatar() {
    let upstream = MockProvider::new();
    let provider = WrappingProvider::new(upstream.clone(), roles_route());

    let accounts: Vec<ethers_core::types::Address> =
        provider.request("eth_requestAccounts", ()).await.unwrap();
    assert_eq!(accounts, vec![addr(0xcc)]);
    let accounts: Vec<ethers_core::types::Address> =
        provider.request("eth_accounts", ()).await.unwrap();
    assert_eq!(accounts, vec![addr(0xcc)]);
    assert!(upstream.assert_request("eth_accounts", ()).is_err());
}

#[tokio::test]
async fn rejects_typed_data_signatures() {
    let provider = WrappingProvider::new(MockProvider::new(), roles_route());
    let err = provider
        .request::<_, Value>("eth_signTypedData_v4", (addr(0xcc), "{}"))
        .await
        .unwrap_err();
    assert!(matches!(err, WrappingError::Unsupported(_)));
}

#[tokio::test]
async fn reads_as_the_avatar() {
    let upstream = MockProvider::new();
    let provider = WrappingProvider::new(upstream.clone(), roles_route());

    upstream.push(json!("0x")).unwrap();
    let _: Value = provider
        .request("eth_call", (json!({ "to": addr(0xdd), "data": "0x" }), "latest"))
        .await
        .unwrap();
    upstream
        .assert_request(
            "eth_call",
            (json!({ "to": addr(0xdd), "data": "0x", "from": addr(0xcc) }), "latest"),
        )
        .unwrap();
}

#[tokio::test]
async fn sends_through_the_module() {
    let upstream = MockProvider::new();
    let route = roles_route();
    let provider = WrappingProvider::new(upstream.clone(), route.clone());

    upstream.push(json!(H256::repeat_byte(1))).unwrap();
    let hash: H256 = provider.request("eth_sendTransaction", [avatar_tx()]).await.unwrap();
    assert_eq!(hash, H256::repeat_byte(1));

    let expected = wrap(&MetaTransaction::new(addr(0xdd)), &route, true).unwrap();
    assert_eq!(expected.from, addr(0xaa));
    assert_eq!(expected.to, addr(0xbb));
    let expected: TransactionRequest = expected.into();
    upstream.assert_request("eth_sendTransaction", [expected]).unwrap();
}

#[tokio::test]
async fn estimates_without_reverting() {
    let upstream = MockProvider::new();
    let route = roles_route();
    let provider = WrappingProvider::new(upstream.clone(), route.clone());

    upstream.push(json!("0x5208")).unwrap();
    let gas: U256 = provider.request("eth_estimateGas", [avatar_tx()]).await.unwrap();
    assert_eq!(gas, U256::from(21_000));

    let expected = wrap(&MetaTransaction::new(addr(0xdd)), &route, false).unwrap();
    let expected: TransactionRequest = expected.into();
    upstream.assert_request("eth_estimateGas", [expected]).unwrap();
}

#[tokio::test]
async fn owned_avatars_use_direct_execution() {
    let upstream = MockProvider::new();
    let direct = Arc::new(RecordingExecution::default());
    let provider =
        WrappingProvider::new(upstream.clone(), owner_route()).direct_execution(direct.clone());

    let tx = json!({ "to": addr(0xdd), "value": "0x10", "data": "0xabcd" });
    let hash: H256 = provider.request("eth_sendTransaction", [tx.clone()]).await.unwrap();
    let gas: U256 = provider.request("eth_estimateGas", [tx]).await.unwrap();

    assert_eq!(hash, H256::repeat_byte(0x5a));
    assert_eq!(gas, U256::from(21_000));
    assert_eq!(
        direct.calls.lock().unwrap().clone(),
        vec![MetaTransaction::new(addr(0xdd)).value(0x10u64).data(vec![0xab, 0xcd])]
    );
    assert!(upstream.assert_request("eth_sendTransaction", ()).is_err());
}

#[tokio::test]
async fn owned_avatars_need_direct_execution() {
    let provider = WrappingProvider::new(MockProvider::new(), owner_route());
    let err = provider.request::<_, H256>("eth_sendTransaction", [avatar_tx()]).await.unwrap_err();
    assert!(matches!(err, WrappingError::NoDirectExecution));
}

#[tokio::test]
async fn impersonation_sends_as_the_avatar() {
    let upstream = MockProvider::new();
    let provider =
        WrappingProvider::new(upstream.clone(), owner_route()).submission(Submission::Impersonate);

    upstream.push(json!(H256::repeat_byte(1))).unwrap();
    upstream.push(json!("0x5208")).unwrap();
    let tx = json!({ "from": addr(0xaa), "to": addr(0xdd), "data": "0xabcd" });
    let gas: U256 = provider.request("eth_estimateGas", [tx.clone()]).await.unwrap();
    let hash: H256 = provider.request("eth_sendTransaction", [tx]).await.unwrap();
    assert_eq!(gas, U256::from(21_000));
    assert_eq!(hash, H256::repeat_byte(1));

    let as_avatar = json!({ "from": addr(0xee), "to": addr(0xdd), "data": "0xabcd" });
    upstream.assert_request("eth_estimateGas", [as_avatar.clone()]).unwrap();
    upstream.assert_request("eth_sendTransaction", [as_avatar]).unwrap();

    let err = provider
        .request::<_, Value>("eth_signTypedData_v4", (addr(0xee), "{}"))
        .await
        .unwrap_err();
    assert!(matches!(err, WrappingError::Unsupported(_)));
}

#[tokio::test]
async fn passes_other_requests_through() {
    let upstream = MockProvider::new();
    let provider = WrappingProvider::new(upstream.clone(), roles_route());

    upstream.push(json!("0x2a")).unwrap();
    let nonce: U256 =
        provider.request("eth_getTransactionCount", (addr(0xaa), "latest")).await.unwrap();
    assert_eq!(nonce, U256::from(42));
    upstream.assert_request("eth_getTransactionCount", (addr(0xaa), "latest")).unwrap();
}
