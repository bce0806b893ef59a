use crate::fork::ForkApiError;
use url::Url;

/// Default REST endpoint for managing forks
pub const TENDERLY_API_URL: &str = "https://api.tenderly.co/api/v1/account/me/project/project";
/// Default base of the per-fork JSON-RPC endpoints
pub const TENDERLY_RPC_URL: &str = "https://rpc.tenderly.co/fork";
/// Default base for links to simulated transactions
pub const TENDERLY_DASHBOARD_URL: &str = "https://dashboard.tenderly.co/me/project";

/// Where and how to reach the Tenderly API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenderlyConfig {
    pub api_url: Url,
    pub rpc_url: Url,
    pub dashboard_url: Url,
    pub access_key: String,
}

impl TenderlyConfig {
    /// Creates a config for the public Tenderly endpoints.
    pub fn new(access_key: impl Into<String>) -> Result<Self, ForkApiError> {
        Ok(Self {
            api_url: Url::parse(TENDERLY_API_URL)?,
            rpc_url: Url::parse(TENDERLY_RPC_URL)?,
            dashboard_url: Url::parse(TENDERLY_DASHBOARD_URL)?,
            access_key: access_key.into(),
        })
    }

    /// Reads the config from the environment.
    ///
    /// `TENDERLY_ACCESS_KEY` is required. `TENDERLY_API_URL`, `TENDERLY_RPC_URL` and
    /// `TENDERLY_DASHBOARD_URL` override the public endpoints, which is how a proxy holding the
    /// key is put in front of the API.
    pub fn from_env() -> Result<Self, ForkApiError> {
        let mut config = Self::new(std::env::var("TENDERLY_ACCESS_KEY")?)?;
        if let Ok(url) = std::env::var("TENDERLY_API_URL") {
            config.api_url = Url::parse(&url)?;
        }
        if let Ok(url) = std::env::var("TENDERLY_RPC_URL") {
            config.rpc_url = Url::parse(&url)?;
        }
        if let Ok(url) = std::env::var("TENDERLY_DASHBOARD_URL") {
            config.dashboard_url = Url::parse(&url)?;
        }
        Ok(config)
    }
}

/// Behaviour of a [`ForkProvider`](crate::ForkProvider).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForkOptions {
    /// Blocks mined on the fork after every sent transaction, so callers waiting for
    /// confirmations make progress. `0` disables it.
    pub confirmations: u64,
}

impl Default for ForkOptions {
    fn default() -> Self {
        Self { confirmations: 2 }
    }
}
