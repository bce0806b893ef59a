use crate::{
    config::ForkOptions,
    events::{EventHub, ProviderEvent},
    fork::{ForkApi, ForkError, ForkProvider},
    wrapping::{DirectExecution, Submission, WrappingError, WrappingProvider},
};
use async_trait::async_trait;
use ethers_core::types::Address;
use ethers_providers::{JsonRpcClient, JsonRpcError, ProviderError, RpcError};
use pilot_core::route::Route;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("route avatar is not qualified with a chain")]
    ChainAgnosticRoute,
    #[error("simulating a route requires a fork api")]
    MissingForkApi,
}

#[derive(Debug, Error)]
pub enum PilotError<E> {
    #[error(transparent)]
    Wallet(E),
    #[error(transparent)]
    Wrapping(WrappingError<ForkError>),
}

impl<E> PilotError<E> {
    /// Whether the simulation backend refused the request because of load.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            PilotError::Wrapping(WrappingError::Inner(err)) => err.is_rate_limited(),
            _ => false,
        }
    }
}

impl<E: RpcError + 'static> RpcError for PilotError<E> {
    fn as_error_response(&self) -> Option<&JsonRpcError> {
        match self {
            PilotError::Wallet(err) => err.as_error_response(),
            PilotError::Wrapping(err) => err.as_error_response(),
        }
    }

    fn as_serde_error(&self) -> Option<&serde_json::Error> {
        match self {
            PilotError::Wallet(err) => err.as_serde_error(),
            PilotError::Wrapping(err) => err.as_serde_error(),
        }
    }
}

impl<E: RpcError + 'static> From<PilotError<E>> for ProviderError {
    fn from(src: PilotError<E>) -> Self {
        ProviderError::JsonRpcClientError(Box::new(src))
    }
}

/// The provider handed to the application, selected by what the active route needs.
///
/// Call sites match on the variant instead of probing which decorators are stacked.
#[derive(Debug)]
pub enum PilotProvider<C, A: ForkApi> {
    /// No route is active, requests go to the wallet untouched
    Wallet { upstream: C, events: EventHub },
    /// Calls are simulated on a fork as if sent by the avatar itself
    Forked(WrappingProvider<ForkProvider<C, A>>),
    /// Calls are wrapped for the route's module, then simulated on a fork
    Wrapped(WrappingProvider<ForkProvider<C, A>>),
}

impl<C, A> PilotProvider<C, A>
where
    C: JsonRpcClient + 'static,
    A: ForkApi + 'static,
{
    pub fn builder(upstream: C) -> PilotProviderBuilder<C, A> {
        PilotProviderBuilder {
            upstream,
            route: None,
            api: None,
            options: ForkOptions::default(),
            wrap: false,
            direct: None,
        }
    }

    pub fn events(&self) -> &EventHub {
        match self {
            PilotProvider::Wallet { events, .. } => events,
            PilotProvider::Forked(wrapping) | PilotProvider::Wrapped(wrapping) => {
                wrapping.inner().event_hub()
            }
        }
    }

    /// The avatar exposed to the caller, if a route is active.
    pub fn avatar(&self) -> Option<Address> {
        match self {
            PilotProvider::Wallet { .. } => None,
            PilotProvider::Forked(wrapping) | PilotProvider::Wrapped(wrapping) => {
                Some(wrapping.avatar())
            }
        }
    }

    pub fn fork(&self) -> Option<&ForkProvider<C, A>> {
        match self {
            PilotProvider::Wallet { .. } => None,
            PilotProvider::Forked(wrapping) | PilotProvider::Wrapped(wrapping) => {
                Some(wrapping.inner())
            }
        }
    }

    /// Re-emits an event received from the wallet. Account changes are reported as the avatar
    /// while a route is active.
    pub fn handle_upstream_event(&self, event: ProviderEvent) {
        let event = match (event, self.avatar()) {
            (ProviderEvent::AccountsChanged(_), Some(avatar)) => {
                ProviderEvent::AccountsChanged(vec![avatar])
            }
            (event, _) => event,
        };
        self.events().emit(&event);
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<C, A> JsonRpcClient for PilotProvider<C, A>
where
    C: JsonRpcClient + 'static,
    C::Error: 'static,
    A: ForkApi + 'static,
{
    type Error = PilotError<C::Error>;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        match self {
            PilotProvider::Wallet { upstream, .. } => {
                upstream.request(method, params).await.map_err(PilotError::Wallet)
            }
            PilotProvider::Forked(wrapping) | PilotProvider::Wrapped(wrapping) => {
                wrapping.request(method, params).await.map_err(PilotError::Wrapping)
            }
        }
    }
}

/// Assembles a [`PilotProvider`] for a route.
#[derive(Debug)]
#[must_use]
pub struct PilotProviderBuilder<C, A> {
    upstream: C,
    route: Option<Route>,
    api: Option<Arc<A>>,
    options: ForkOptions,
    wrap: bool,
    direct: Option<Arc<dyn DirectExecution>>,
}

impl<C, A> PilotProviderBuilder<C, A>
where
    C: JsonRpcClient + 'static,
    A: ForkApi + 'static,
{
    pub fn route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn fork_api(mut self, api: Arc<A>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn options(mut self, options: ForkOptions) -> Self {
        self.options = options;
        self
    }

    /// Send calls through the route's module instead of impersonating the avatar.
    pub fn wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn direct_execution(mut self, direct: Arc<dyn DirectExecution>) -> Self {
        self.direct = Some(direct);
        self
    }

    pub fn build(self) -> Result<PilotProvider<C, A>, BuildError> {
        let Some(route) = self.route else {
            return Ok(PilotProvider::Wallet { upstream: self.upstream, events: EventHub::new() })
        };
        let chain_id = route.chain_id().ok_or(BuildError::ChainAgnosticRoute)?;
        let api = self.api.ok_or(BuildError::MissingForkApi)?;
        let fork = ForkProvider::new(self.upstream, api, chain_id).options(self.options);

        if !self.wrap {
            let wrapping = WrappingProvider::new(fork, route).submission(Submission::Impersonate);
            return Ok(PilotProvider::Forked(wrapping))
        }
        let mut wrapping = WrappingProvider::new(fork, route);
        if let Some(direct) = self.direct {
            wrapping = wrapping.direct_execution(direct);
        }
        Ok(PilotProvider::Wrapped(wrapping))
    }
}
