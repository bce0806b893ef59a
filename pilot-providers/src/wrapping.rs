use crate::params::Params;
use async_trait::async_trait;
use ethers_core::types::{Address, TransactionRequest, H256, U256};
use ethers_providers::{JsonRpcClient, JsonRpcError, ProviderError, RpcError};
use pilot_core::{
    route::Route,
    types::{CallError, MetaTransaction},
    wrap, WrapError,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;
use tracing::{debug, trace};

/// Boxed error returned by a [`DirectExecution`] implementation
pub type DirectExecutionError = Box<dyn std::error::Error + Send + Sync>;

/// Executes calls for routes where the initiator owns the avatar, e.g. by proposing a Safe
/// transaction. Provided by the embedding application.
#[async_trait]
pub trait DirectExecution: Debug + Send + Sync {
    async fn send_transaction(
        &self,
        route: &Route,
        call: &MetaTransaction,
    ) -> Result<H256, DirectExecutionError>;

    async fn estimate_gas(
        &self,
        route: &Route,
        call: &MetaTransaction,
    ) -> Result<U256, DirectExecutionError>;
}

#[derive(Debug, Error)]
pub enum WrappingError<E> {
    /// Contract accounts cannot produce typed data signatures
    #[error("{0} is not supported for avatars")]
    Unsupported(String),

    #[error("{0} called without a transaction")]
    MissingParams(String),

    #[error("route has no module and no direct execution is configured")]
    NoDirectExecution,

    #[error("direct execution failed: {0}")]
    DirectExecution(#[source] DirectExecutionError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Wrap(#[from] WrapError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// Error from the wrapped client
    #[error(transparent)]
    Inner(E),
}

impl<E: RpcError + 'static> RpcError for WrappingError<E> {
    fn as_error_response(&self) -> Option<&JsonRpcError> {
        match self {
            WrappingError::Inner(err) => err.as_error_response(),
            _ => None,
        }
    }

    fn as_serde_error(&self) -> Option<&serde_json::Error> {
        match self {
            WrappingError::Serde(err) => Some(err),
            WrappingError::Inner(err) => err.as_serde_error(),
            _ => None,
        }
    }
}

impl<E> From<WrappingError<E>> for ProviderError
where
    E: RpcError + 'static,
{
    fn from(src: WrappingError<E>) -> Self {
        ProviderError::JsonRpcClientError(Box::new(src))
    }
}

/// How transactions leave the wrapping stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Submission {
    /// Re-encoded for the route's module and sent from the initiator
    #[default]
    Wrap,
    /// Sent as the avatar itself. Only meaningful for backends that accept unsigned
    /// transactions from any account, such as a fork.
    Impersonate,
}

/// A [`JsonRpcClient`] that makes the caller believe it talks to the avatar directly.
///
/// Transactions are re-encoded for the route's authorization module and sent from the
/// initiator. Reads are made from the avatar's perspective.
#[derive(Debug)]
pub struct WrappingProvider<C> {
    inner: C,
    route: Route,
    direct: Option<Arc<dyn DirectExecution>>,
    submission: Submission,
}

impl<C> WrappingProvider<C> {
    pub fn new(inner: C, route: Route) -> Self {
        Self { inner, route, direct: None, submission: Submission::Wrap }
    }

    #[must_use]
    pub fn submission(mut self, submission: Submission) -> Self {
        self.submission = submission;
        self
    }

    /// Used for routes without a module.
    #[must_use]
    pub fn direct_execution(mut self, direct: Arc<dyn DirectExecution>) -> Self {
        self.direct = Some(direct);
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn avatar(&self) -> Address {
        self.route.avatar_address()
    }
}

impl<C: JsonRpcClient> WrappingProvider<C> {
    fn call_param(
        method: &str,
        params: &Params,
    ) -> Result<MetaTransaction, WrappingError<C::Error>> {
        let tx: TransactionRequest = match params.first() {
            Some(tx) => serde_json::from_value(tx.clone())?,
            None => return Err(WrappingError::MissingParams(method.to_string())),
        };
        Ok(MetaTransaction::try_from(&tx)?)
    }

    fn direct(&self) -> Result<&dyn DirectExecution, WrappingError<C::Error>> {
        self.direct.as_deref().ok_or(WrappingError::NoDirectExecution)
    }

    async fn estimate_gas(&self, mut params: Params) -> Result<Value, WrappingError<C::Error>> {
        if self.submission == Submission::Impersonate {
            return self.as_avatar("eth_estimateGas", params).await
        }
        let call = Self::call_param("eth_estimateGas", &params)?;
        match wrap(&call, &self.route, false) {
            Err(WrapError::NoModule) => {
                let gas = self
                    .direct()?
                    .estimate_gas(&self.route, &call)
                    .await
                    .map_err(WrappingError::DirectExecution)?;
                Ok(serde_json::to_value(gas)?)
            }
            Err(err) => Err(err.into()),
            Ok(wrapped) => {
                let wrapped: TransactionRequest = wrapped.into();
                if let Some(tx) = params.first_mut() {
                    *tx = serde_json::to_value(wrapped)?;
                }
                params.forward(&self.inner, "eth_estimateGas").await.map_err(WrappingError::Inner)
            }
        }
    }

    async fn send_transaction(&self, params: Params) -> Result<Value, WrappingError<C::Error>> {
        if self.submission == Submission::Impersonate {
            return self.as_avatar("eth_sendTransaction", params).await
        }
        let call = Self::call_param("eth_sendTransaction", &params)?;
        match wrap(&call, &self.route, true) {
            Err(WrapError::NoModule) => {
                debug!(target: "pilot::wrapping", to = ?call.to, "using direct execution");
                let hash = self
                    .direct()?
                    .send_transaction(&self.route, &call)
                    .await
                    .map_err(WrappingError::DirectExecution)?;
                Ok(serde_json::to_value(hash)?)
            }
            Err(err) => Err(err.into()),
            Ok(wrapped) => {
                debug!(
                    target: "pilot::wrapping",
                    module = ?wrapped.to,
                    to = ?call.to,
                    "sending wrapped transaction"
                );
                // sent as is, nonce and gas are left to the signer
                let tx: TransactionRequest = wrapped.into();
                self.inner.request("eth_sendTransaction", [tx]).await.map_err(WrappingError::Inner)
            }
        }
    }

    /// Forwards with `from` forced to the avatar.
    async fn as_avatar(
        &self,
        method: &str,
        mut params: Params,
    ) -> Result<Value, WrappingError<C::Error>> {
        let avatar = self.avatar();
        match params.first_mut() {
            Some(Value::Object(tx)) => {
                tx.insert("from".to_string(), json!(avatar));
            }
            _ => return Err(WrappingError::MissingParams(method.to_string())),
        }
        params.forward(&self.inner, method).await.map_err(WrappingError::Inner)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<C> JsonRpcClient for WrappingProvider<C>
where
    C: JsonRpcClient + 'static,
    C::Error: 'static,
{
    type Error = WrappingError<C::Error>;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        trace!(target: "pilot::wrapping", method, "request");
        let params = Params::new(params)?;
        let result = match method {
            "eth_requestAccounts" | "eth_accounts" => json!([self.avatar()]),
            "eth_signTypedData_v4" => return Err(WrappingError::Unsupported(method.to_string())),
            "eth_estimateGas" => self.estimate_gas(params).await?,
            "eth_sendTransaction" => self.send_transaction(params).await?,
            "eth_call" => self.as_avatar(method, params).await?,
            _ => params.forward(&self.inner, method).await.map_err(WrappingError::Inner)?,
        };
        Ok(serde_json::from_value(result)?)
    }
}
