use async_trait::async_trait;
use ethers_core::{
    abi::{encode, Token},
    types::{Address, H256},
    utils::id,
};
use ethers_providers::MockProvider;
use pilot::prelude::*;
use pilot::{
    providers::{Fork, ForkApiError, TransactionInfo},
    translations::bridge_aware::XDAI_BRIDGE,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn calldata(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    data
}

#[derive(Debug, Default)]
struct Sandbox {
    rpc: MockProvider,
    forks: AtomicUsize,
}

impl Sandbox {
    /// Queues `responses` to be answered in order.
    fn respond(&self, responses: &[Value]) {
        for response in responses.iter().rev() {
            self.rpc.push::<Value, _>(response.clone()).unwrap();
        }
    }

    /// Snapshot and hash for each of `count` sends, starting at checkpoint `first`.
    fn sends(first: u8, count: u8) -> Vec<Value> {
        (first..first + count)
            .flat_map(|n| [json!(format!("{n:#x}")), json!(H256::repeat_byte(n))])
            .collect()
    }
}

#[async_trait]
impl ForkApi for Sandbox {
    type Rpc = MockProvider;

    async fn create_fork(&self, chain_id: u64, _block: Option<u64>) -> Result<Fork, ForkApiError> {
        let n = self.forks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Fork { id: format!("fork-{n}"), chain_id, block_number: None })
    }

    async fn delete_fork(&self, _fork_id: &str) -> Result<(), ForkApiError> {
        Ok(())
    }

    async fn transaction_info(
        &self,
        fork_id: &str,
        hash: H256,
    ) -> Result<TransactionInfo, ForkApiError> {
        let id = format!("{fork_id}-{hash:?}");
        Ok(TransactionInfo { id, hash, block_number: None, status: None })
    }

    fn rpc(&self, _fork: &Fork) -> Result<MockProvider, ForkApiError> {
        Ok(self.rpc.clone())
    }
}

/// EOA 0xaa.. -> Roles v2 0xbb.. -> Safe 0xcc.. on mainnet
fn route() -> Route {
    let initiator = PrefixedAddress::eoa(addr(0xaa));
    Route {
        id: "mainnet".into(),
        label: "Mainnet Safe".into(),
        initiator: Some(initiator),
        avatar: PrefixedAddress::new(1, addr(0xcc)).unwrap(),
        waypoints: Some(vec![
            Waypoint::start(Account::Eoa { address: addr(0xaa) }),
            Waypoint::new(
                Account::Roles {
                    chain: 1,
                    address: addr(0xbb),
                    version: pilot::core::route::RolesVersion::V2,
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

fn session(sandbox: &Arc<Sandbox>) -> Session<MockProvider, Sandbox> {
    let options = ForkOptions { confirmations: 0 };
    Session::with_options(MockProvider::new(), sandbox.clone(), route(), options).unwrap()
}

#[tokio::test]
async fn auto_apply_appends_bridge_acknowledgement() {
    let sandbox = Arc::new(Sandbox::default());
    let session = session(&sandbox);
    let module = addr(0xb1);
    let translations =
        Translations::new(TranslationOptions { bridge_aware: Some(module), ..Default::default() });

    sandbox.respond(&Sandbox::sends(1, 2));
    let relay = MetaTransaction::new(XDAI_BRIDGE).data(calldata(
        "relayTokens(address,uint256)",
        &[Token::Address(addr(0xcc)), Token::Uint(100.into())],
    ));
    session.send(&relay).await.unwrap();

    assert!(pilot::auto_apply(&session, &translations).await.unwrap());
    let recorded = session.recorded();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].call, relay);
    assert_eq!(recorded[1].call.to, module);
    assert_eq!(recorded[1].checkpoint, "0x2");

    assert!(!pilot::auto_apply(&session, &translations).await.unwrap());
    assert_eq!(session.recorded().len(), 2);
}

#[tokio::test]
async fn translates_a_recorded_multicall() {
    let sandbox = Arc::new(Sandbox::default());
    let session = session(&sandbox);
    let translations = Translations::default();

    let inner = [vec![1u8, 2, 3, 4], vec![5u8, 6, 7, 8]];
    let multicall = MetaTransaction::new(addr(0xdd)).data(calldata(
        "multicall(bytes[])",
        &[Token::Array(inner.iter().cloned().map(Token::Bytes).collect())],
    ));

    let mut responses = Sandbox::sends(1, 1);
    responses.push(json!(true));
    responses.extend(Sandbox::sends(2, 2));
    sandbox.respond(&responses);

    session.send(&multicall).await.unwrap();
    let title = pilot::translate_call(&session, &translations, "0x1").await.unwrap();
    assert_eq!(title.as_deref(), Some("Unfold individual calls"));

    let calls: Vec<_> = session.recorded().into_iter().map(|recorded| recorded.call).collect();
    let expected = vec![multicall.clone().data(inner[0].clone()), multicall.data(inner[1].clone())];
    assert_eq!(calls, expected);

    assert!(matches!(
        pilot::translate_call(&session, &translations, "0x9").await,
        Err(SessionError::UnknownCheckpoint(_))
    ));
}
