use super::api::{Fork, ForkApi, ForkApiError, TransactionInfo};
use crate::{
    config::ForkOptions,
    events::{EventHub, ProviderEvent},
    params::Params,
};
use async_trait::async_trait;
use ethers_core::types::{TransactionRequest, H256, U64};
use ethers_providers::{JsonRpcClient, JsonRpcError, ProviderError, RpcError};
use futures_util::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;
use tokio::{sync::OnceCell, task::JoinHandle};
use tracing::{debug, info, trace, warn};

/// Error code the sandbox answers with when it sheds load.
pub const RATE_LIMITED_CODE: i64 = -32603;

/// Methods that never touch chain state and can be answered by the live chain while no fork
/// exists.
const READ_ONLY: &[&str] = &[
    "eth_call",
    "eth_estimateGas",
    "eth_feeHistory",
    "eth_gasPrice",
    "eth_getBalance",
    "eth_getBlockByHash",
    "eth_getBlockByNumber",
    "eth_getCode",
    "eth_getLogs",
    "eth_getStorageAt",
    "eth_getTransactionByHash",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "eth_maxPriorityFeePerGas",
    "net_version",
];

/// Methods that belong to the wallet rather than the chain.
const WALLET_ONLY: &[&str] = &[
    "eth_accounts",
    "eth_requestAccounts",
    "eth_sign",
    "eth_signTypedData_v4",
    "personal_sign",
    "wallet_addEthereumChain",
    "wallet_getPermissions",
    "wallet_requestPermissions",
    "wallet_switchEthereumChain",
];

#[derive(Debug, Error)]
pub enum ForkError {
    /// The sandbox answered with its internal error code, which it does when throttling.
    #[error("simulation backend unavailable (likely rate limited)")]
    RateLimited,

    #[error("no fork has been created")]
    NoFork,

    #[error("{0} called without params")]
    MissingParams(String),

    #[error("could not revert to checkpoint {0}")]
    RevertFailed(String),

    #[error(transparent)]
    Api(#[from] ForkApiError),

    /// Error from the live chain
    #[error("upstream: {0}")]
    Upstream(ProviderError),

    /// Any other error from the fork's JSON-RPC endpoint
    #[error("sandbox: {0}")]
    Sandbox(ProviderError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl ForkError {
    fn sandbox<E: RpcError + Into<ProviderError>>(err: E) -> Self {
        if err.as_error_response().map(|e| e.code) == Some(RATE_LIMITED_CODE) {
            warn!(target: "pilot::fork", %err, "sandbox rejected request");
            return ForkError::RateLimited
        }
        ForkError::Sandbox(err.into())
    }

    fn upstream<E: Into<ProviderError>>(err: E) -> Self {
        ForkError::Upstream(err.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ForkError::RateLimited)
    }
}

impl RpcError for ForkError {
    fn as_error_response(&self) -> Option<&JsonRpcError> {
        match self {
            ForkError::Upstream(err) | ForkError::Sandbox(err) => err.as_error_response(),
            _ => None,
        }
    }

    fn as_serde_error(&self) -> Option<&serde_json::Error> {
        match self {
            ForkError::Serde(err) => Some(err),
            ForkError::Upstream(err) | ForkError::Sandbox(err) => err.as_serde_error(),
            _ => None,
        }
    }
}

impl From<ForkError> for ProviderError {
    fn from(src: ForkError) -> Self {
        ProviderError::JsonRpcClientError(Box::new(src))
    }
}

struct ActiveFork<R> {
    fork: Fork,
    rpc: Arc<R>,
}

type InfoCell = Arc<OnceCell<TransactionInfo>>;

/// A [`JsonRpcClient`] that reads from the live chain until the first state changing request,
/// then lazily creates a fork through a [`ForkApi`] and sends everything there.
///
/// Every `eth_sendTransaction` is preceded by an `evm_snapshot`. The snapshot id is announced as
/// the call's checkpoint in a [`ProviderEvent::BeforeSend`] event and can later be passed to
/// [`ForkProvider::revert`] to undo that call and every call after it.
pub struct ForkProvider<C, A: ForkApi> {
    upstream: C,
    api: Arc<A>,
    chain_id: u64,
    options: ForkOptions,
    events: EventHub,
    /// Held across creation so concurrent requests wait for the same fork
    fork: tokio::sync::Mutex<Option<ActiveFork<A::Rpc>>>,
    block_number: Arc<Mutex<BlockNumber>>,
    transactions: Mutex<HashMap<H256, InfoCell>>,
    confirmations: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Debug, A: ForkApi> Debug for ForkProvider<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkProvider")
            .field("upstream", &self.upstream)
            .field("api", &self.api)
            .field("chain_id", &self.chain_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Cached block number of the fork. `epoch` moves on whenever the cache is invalidated, so a
/// background refresh started before that cannot write an outdated value.
#[derive(Debug, Default)]
struct BlockNumber {
    epoch: u64,
    value: Option<U64>,
}

impl BlockNumber {
    fn invalidate(&mut self) -> u64 {
        self.epoch += 1;
        self.value = None;
        self.epoch
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<C, A> ForkProvider<C, A>
where
    C: JsonRpcClient,
    A: ForkApi,
{
    pub fn new(upstream: C, api: Arc<A>, chain_id: u64) -> Self {
        Self {
            upstream,
            api,
            chain_id,
            options: ForkOptions::default(),
            events: EventHub::new(),
            fork: tokio::sync::Mutex::new(None),
            block_number: Arc::new(Mutex::new(BlockNumber::default())),
            transactions: Mutex::new(HashMap::new()),
            confirmations: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn options(mut self, options: ForkOptions) -> Self {
        self.options = options;
        self
    }

    /// Emits [`ProviderEvent::BeforeSend`] and [`ProviderEvent::Sent`] on `events`.
    #[must_use]
    pub fn events(mut self, events: EventHub) -> Self {
        self.events = events;
        self
    }

    pub fn event_hub(&self) -> &EventHub {
        &self.events
    }

    pub fn upstream(&self) -> &C {
        &self.upstream
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Id of the current fork, waiting for a creation in flight.
    pub async fn fork_id(&self) -> Option<String> {
        self.fork.lock().await.as_ref().map(|active| active.fork.id.clone())
    }

    async fn active(&self) -> Option<Arc<A::Rpc>> {
        self.fork.lock().await.as_ref().map(|active| active.rpc.clone())
    }

    async fn ensure_fork(&self) -> Result<Arc<A::Rpc>, ForkError> {
        let mut state = self.fork.lock().await;
        if let Some(active) = state.as_ref() {
            return Ok(active.rpc.clone())
        }

        debug!(target: "pilot::fork", chain_id = self.chain_id, "creating fork");
        let fork = self.api.create_fork(self.chain_id, None).await?;
        let rpc = Arc::new(self.api.rpc(&fork)?);
        info!(target: "pilot::fork", id = %fork.id, block = ?fork.block_number, "created fork");

        lock(&self.block_number).value = fork.block_number.map(U64::from);
        *state = Some(ActiveFork { fork, rpc: rpc.clone() });
        Ok(rpc)
    }

    /// Deletes the fork. Does nothing if there is none; a creation in flight is awaited first so
    /// its fork gets deleted too.
    pub async fn delete_fork(&self) -> Result<(), ForkError> {
        let mut state = self.fork.lock().await;
        let Some(active) = state.take() else { return Ok(()) };
        self.reset_caches();
        debug!(target: "pilot::fork", id = %active.fork.id, "deleting fork");
        self.api.delete_fork(&active.fork.id).await?;
        Ok(())
    }

    /// Replaces the fork with a fresh one at the chain tip, discarding all simulated state.
    pub async fn refork(&self) -> Result<String, ForkError> {
        self.delete_fork().await?;
        self.ensure_fork().await?;
        self.fork_id().await.ok_or(ForkError::NoFork)
    }

    /// Reverts the fork to `checkpoint`, the snapshot taken before a sent call.
    pub async fn revert(&self, checkpoint: &str) -> Result<(), ForkError> {
        let rpc = self.active().await.ok_or(ForkError::NoFork)?;
        let reverted: bool = rpc
            .request("evm_revert", [checkpoint])
            .await
            .map_err(ForkError::sandbox)?;
        lock(&self.block_number).invalidate();
        if !reverted {
            return Err(ForkError::RevertFailed(checkpoint.to_string()))
        }
        debug!(target: "pilot::fork", checkpoint, "reverted fork");
        Ok(())
    }

    /// Details the sandbox keeps about a transaction sent to the current fork. Fetched once per
    /// hash; concurrent callers share the same request.
    pub async fn transaction_info(&self, hash: H256) -> Result<TransactionInfo, ForkError> {
        let fork_id = self.fork_id().await.ok_or(ForkError::NoFork)?;
        let cell = lock(&self.transactions).entry(hash).or_default().clone();
        let info = cell
            .get_or_try_init(|| async {
                trace!(target: "pilot::fork", ?hash, "fetching transaction info");
                self.api.transaction_info(&fork_id, hash).await
            })
            .await?;
        Ok(info.clone())
    }

    /// Link for inspecting a transaction sent to the current fork.
    pub async fn transaction_link(&self, hash: H256) -> Result<Option<String>, ForkError> {
        let fork_id = self.fork_id().await.ok_or(ForkError::NoFork)?;
        let info = self.transaction_info(hash).await?;
        Ok(self.api.transaction_link(&fork_id, &info.id))
    }

    /// Waits for the blocks scheduled after sent transactions to be mined.
    pub async fn wait_for_confirmations(&self) {
        let pending = std::mem::take(&mut *lock(&self.confirmations));
        join_all(pending).await;
    }

    /// Background block advances still tracked.
    pub fn pending_confirmations(&self) -> usize {
        lock(&self.confirmations).len()
    }

    fn reset_caches(&self) {
        for handle in lock(&self.confirmations).drain(..) {
            handle.abort();
        }
        lock(&self.block_number).invalidate();
        lock(&self.transactions).clear();
    }

    async fn block_number(&self, params: Params) -> Result<Value, ForkError> {
        let (epoch, cached) = {
            let cache = lock(&self.block_number);
            (cache.epoch, cache.value)
        };
        if let Some(number) = cached {
            return Ok(serde_json::to_value(number)?)
        }
        match self.active().await {
            Some(rpc) => {
                let number: U64 = params
                    .forward(&*rpc, "eth_blockNumber")
                    .await
                    .map_err(ForkError::sandbox)?;
                let mut cache = lock(&self.block_number);
                if cache.epoch == epoch {
                    cache.value = Some(number);
                }
                Ok(serde_json::to_value(number)?)
            }
            None => {
                params.forward(&self.upstream, "eth_blockNumber").await.map_err(ForkError::upstream)
            }
        }
    }

    async fn send_transaction(&self, params: Params) -> Result<Value, ForkError> {
        let call: TransactionRequest = match params.first() {
            Some(call) => serde_json::from_value(call.clone())?,
            None => return Err(ForkError::MissingParams("eth_sendTransaction".into())),
        };
        let rpc = self.ensure_fork().await?;

        let checkpoint: String =
            Params::Zst.forward(&*rpc, "evm_snapshot").await.map_err(ForkError::sandbox)?;
        self.events.emit(&ProviderEvent::BeforeSend { checkpoint: checkpoint.clone(), call });

        let hash: H256 =
            params.forward(&*rpc, "eth_sendTransaction").await.map_err(ForkError::sandbox)?;
        debug!(target: "pilot::fork", %checkpoint, ?hash, "sent transaction to fork");
        self.events.emit(&ProviderEvent::Sent { checkpoint, hash });

        if let Err(err) = self.transaction_info(hash).await {
            warn!(target: "pilot::fork", ?hash, %err, "could not fetch transaction info");
        }
        let epoch = lock(&self.block_number).invalidate();
        self.advance_blocks(rpc, epoch);

        Ok(serde_json::to_value(hash)?)
    }

    /// Mines `confirmations` blocks in the background and refreshes the cached block number.
    fn advance_blocks(&self, rpc: Arc<A::Rpc>, epoch: u64) {
        let confirmations = self.options.confirmations;
        if confirmations == 0 {
            return
        }
        let block_number = self.block_number.clone();
        let handle = tokio::spawn(async move {
            let advanced: Result<Value, _> =
                rpc.request("evm_increaseBlocks", [U64::from(confirmations)]).await;
            if let Err(err) = advanced {
                warn!(target: "pilot::fork", %err, "could not advance fork blocks");
                return
            }
            match rpc.request::<_, U64>("eth_blockNumber", ()).await {
                Ok(number) => {
                    let mut cache = lock(&block_number);
                    if cache.epoch == epoch {
                        cache.value = Some(number);
                    }
                }
                Err(err) => warn!(target: "pilot::fork", %err, "could not refresh block number"),
            }
        });
        let mut pending = lock(&self.confirmations);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    async fn dispatch(&self, method: &str, params: Params) -> Result<Value, ForkError> {
        match method {
            "eth_chainId" => Ok(chain_id_value(self.chain_id)),
            "eth_blockNumber" => self.block_number(params).await,
            "eth_sendTransaction" => self.send_transaction(params).await,
            method if WALLET_ONLY.contains(&method) => {
                params.forward(&self.upstream, method).await.map_err(ForkError::upstream)
            }
            method if READ_ONLY.contains(&method) => match self.active().await {
                Some(rpc) => params.forward(&*rpc, method).await.map_err(ForkError::sandbox),
                None => params.forward(&self.upstream, method).await.map_err(ForkError::upstream),
            },
            method => {
                let rpc = self.ensure_fork().await?;
                params.forward(&*rpc, method).await.map_err(ForkError::sandbox)
            }
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<C, A> JsonRpcClient for ForkProvider<C, A>
where
    C: JsonRpcClient,
    A: ForkApi,
{
    type Error = ForkError;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        trace!(target: "pilot::fork", method, "request");
        let params = Params::new(params)?;
        let result = self.dispatch(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// `eth_chainId` answers with the configured id as a hex quantity.
pub(crate) fn chain_id_value(chain_id: u64) -> Value {
    json!(format!("{chain_id:#x}"))
}
