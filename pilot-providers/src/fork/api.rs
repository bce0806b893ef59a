use crate::config::TenderlyConfig;
use async_trait::async_trait;
use ethers_core::types::H256;
use ethers_providers::{Http, JsonRpcClient};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{env::VarError, fmt::Debug};
use thiserror::Error;
use tracing::{error, trace};

/// A sandbox created from a chain's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fork {
    pub id: String,
    pub chain_id: u64,
    /// Block the fork was created at, if the backend reports it
    pub block_number: Option<u64>,
}

/// What the sandbox backend knows about a transaction sent to a fork.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// The backend's own id, used to inspect the simulation
    pub id: String,
    pub hash: H256,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub status: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ForkApiError {
    #[error("bad status code {status}: {body}")]
    BadStatusCode { status: u16, body: String },
    #[error("invalid access key")]
    InvalidAccessKey,
    #[error(transparent)]
    EnvVarNotFound(#[from] VarError),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// The out-of-band API of a simulation backend: creating, inspecting and deleting forks.
#[async_trait]
pub trait ForkApi: Debug + Send + Sync {
    /// JSON-RPC transport talking to a single fork
    type Rpc: JsonRpcClient + 'static;

    /// Creates a fork of `chain_id` at `block`, or at the chain tip.
    async fn create_fork(&self, chain_id: u64, block: Option<u64>) -> Result<Fork, ForkApiError>;

    async fn delete_fork(&self, fork_id: &str) -> Result<(), ForkApiError>;

    async fn transaction_info(
        &self,
        fork_id: &str,
        hash: H256,
    ) -> Result<TransactionInfo, ForkApiError>;

    /// Connects to the fork's JSON-RPC endpoint.
    fn rpc(&self, fork: &Fork) -> Result<Self::Rpc, ForkApiError>;

    /// Link for inspecting a simulated transaction in a browser.
    fn transaction_link(&self, _fork_id: &str, _transaction_id: &str) -> Option<String> {
        None
    }
}

#[derive(Serialize)]
struct CreateForkRequest {
    network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
}

#[derive(Deserialize)]
struct CreateForkResponse {
    simulation_fork: SimulationFork,
}

#[derive(Deserialize)]
struct SimulationFork {
    id: String,
    #[serde(default)]
    block_number: Option<u64>,
}

#[derive(Deserialize)]
struct TransactionResponse {
    fork_transaction: TransactionInfo,
}

/// [`ForkApi`] backed by Tenderly.
#[derive(Clone, Debug)]
pub struct Tenderly {
    client: Client,
    config: TenderlyConfig,
}

impl Tenderly {
    pub fn new(config: TenderlyConfig) -> Result<Self, ForkApiError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&config.access_key)
            .map_err(|_| ForkApiError::InvalidAccessKey)?;
        key.set_sensitive(true);
        headers.insert("X-Access-Key", key);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self { client, config })
    }

    /// Creates a client from the `TENDERLY_*` environment variables.
    pub fn new_from_env() -> Result<Self, ForkApiError> {
        Self::new(TenderlyConfig::from_env()?)
    }

    pub fn config(&self) -> &TenderlyConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.as_str().trim_end_matches('/'))
    }

    pub fn fork_rpc_url(&self, fork_id: &str) -> String {
        format!("{}/{fork_id}", self.config.rpc_url.as_str().trim_end_matches('/'))
    }

    async fn check<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ForkApiError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(target: "pilot::fork", %status, %body, "sandbox API request failed");
            return Err(ForkApiError::BadStatusCode { status: status.as_u16(), body })
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ForkApi for Tenderly {
    type Rpc = Http;

    async fn create_fork(&self, chain_id: u64, block: Option<u64>) -> Result<Fork, ForkApiError> {
        let url = self.api_url("fork");
        trace!(target: "pilot::fork", "POST {url}");
        let body = CreateForkRequest { network_id: chain_id.to_string(), block_number: block };
        let response = self.client.post(&url).json(&body).send().await?;
        let CreateForkResponse { simulation_fork } = self.check(response).await?;
        Ok(Fork { id: simulation_fork.id, chain_id, block_number: simulation_fork.block_number })
    }

    async fn delete_fork(&self, fork_id: &str) -> Result<(), ForkApiError> {
        let url = self.api_url(&format!("fork/{fork_id}"));
        trace!(target: "pilot::fork", "DELETE {url}");
        let response = self.client.delete(&url).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(())
        }
        let body = response.text().await?;
        Err(ForkApiError::BadStatusCode { status: status.as_u16(), body })
    }

    async fn transaction_info(
        &self,
        fork_id: &str,
        hash: H256,
    ) -> Result<TransactionInfo, ForkApiError> {
        let url = self.api_url(&format!("fork/{fork_id}/transaction/{hash:?}"));
        trace!(target: "pilot::fork", "GET {url}");
        let response = self.client.get(&url).send().await?;
        let TransactionResponse { fork_transaction } = self.check(response).await?;
        Ok(fork_transaction)
    }

    fn rpc(&self, fork: &Fork) -> Result<Http, ForkApiError> {
        Ok(Http::new(url::Url::parse(&self.fork_rpc_url(&fork.id))?))
    }

    fn transaction_link(&self, fork_id: &str, transaction_id: &str) -> Option<String> {
        let base = self.config.dashboard_url.as_str().trim_end_matches('/');
        Some(format!("{base}/fork/{fork_id}/simulation/{transaction_id}"))
    }
}
