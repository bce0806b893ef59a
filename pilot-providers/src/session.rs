//! The recording session for the active route.
//!
//! A [`Session`] owns the provider chain built for the selected route and keeps the list of
//! calls sent to the fork, each identified by the checkpoint taken right before it. Switching
//! the route discards the chain; anything still in flight on the old chain resolves to
//! [`SessionError::RouteChanged`].

use crate::{
    chain::{BuildError, PilotError, PilotProvider},
    config::ForkOptions,
    events::{EventKind, ProviderEvent, Subscription},
    fork::{ForkApi, ForkError, ForkProvider},
};
use ethers_core::types::{TransactionRequest, H256};
use ethers_providers::{JsonRpcClient, ProviderError};
use pilot_core::{
    route::Route,
    types::{MetaTransaction, Operation},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    /// The route was switched while the request was in flight
    #[error("the active route changed while the request was in flight")]
    RouteChanged,

    #[error("simulation backend unavailable (likely rate limited)")]
    RateLimited,

    #[error("unknown checkpoint {0}")]
    UnknownCheckpoint(String),

    #[error("the session has no fork")]
    NotForked,

    #[error("delegate calls cannot be replayed")]
    DelegateCall,

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fork(ForkError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl SessionError {
    fn provider<E>(err: PilotError<E>) -> Self
    where
        E: ethers_providers::RpcError + 'static,
    {
        if err.is_rate_limited() {
            return SessionError::RateLimited
        }
        SessionError::Provider(err.into())
    }
}

impl From<ForkError> for SessionError {
    fn from(err: ForkError) -> Self {
        if err.is_rate_limited() {
            return SessionError::RateLimited
        }
        SessionError::Fork(err)
    }
}

/// A call sent to the fork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    /// Snapshot taken before the call, reverting to it removes the call
    pub checkpoint: String,
    pub call: MetaTransaction,
    /// Set once the fork accepted the call
    pub hash: Option<H256>,
}

struct Active<C, A: ForkApi> {
    route: Route,
    provider: Arc<PilotProvider<C, A>>,
    _subscriptions: Vec<Subscription>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Records and simulates calls for one route at a time.
pub struct Session<C, A: ForkApi> {
    upstream: C,
    api: Arc<A>,
    options: ForkOptions,
    generation: Arc<AtomicU64>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    active: Mutex<Active<C, A>>,
}

impl<C: Debug, A: ForkApi> Debug for Session<C, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("upstream", &self.upstream)
            .field("generation", &self.generation)
            .field("recorded", &self.recorded)
            .finish_non_exhaustive()
    }
}

impl<C, A> Session<C, A>
where
    C: JsonRpcClient + Clone + 'static,
    C::Error: 'static,
    A: ForkApi + 'static,
{
    pub fn new(upstream: C, api: Arc<A>, route: Route) -> Result<Self, SessionError> {
        Self::with_options(upstream, api, route, ForkOptions::default())
    }

    pub fn with_options(
        upstream: C,
        api: Arc<A>,
        route: Route,
        options: ForkOptions,
    ) -> Result<Self, SessionError> {
        let generation = Arc::new(AtomicU64::new(0));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let active = Self::activate(&upstream, &api, options, route, 0, &generation, &recorded)?;
        Ok(Self { upstream, api, options, generation, recorded, active: Mutex::new(active) })
    }

    fn activate(
        upstream: &C,
        api: &Arc<A>,
        options: ForkOptions,
        route: Route,
        current: u64,
        generation: &Arc<AtomicU64>,
        recorded: &Arc<Mutex<Vec<Recorded>>>,
    ) -> Result<Active<C, A>, SessionError> {
        let provider = PilotProvider::builder(upstream.clone())
            .route(route.clone())
            .fork_api(api.clone())
            .options(options)
            .build()?;

        let events = provider.events();
        let (live, list) = (generation.clone(), recorded.clone());
        let before_send = events.subscribe(EventKind::BeforeSend, move |event| {
            let ProviderEvent::BeforeSend { checkpoint, call } = event else { return };
            if live.load(Ordering::SeqCst) != current {
                return
            }
            match MetaTransaction::try_from(call) {
                Ok(call) => lock(&list).push(Recorded {
                    checkpoint: checkpoint.clone(),
                    call,
                    hash: None,
                }),
                Err(err) => warn!(target: "pilot::session", %err, "not recording call"),
            }
        });
        let (live, list) = (generation.clone(), recorded.clone());
        let sent = events.subscribe(EventKind::Sent, move |event| {
            let ProviderEvent::Sent { checkpoint, hash } = event else { return };
            if live.load(Ordering::SeqCst) != current {
                return
            }
            if let Some(record) = lock(&list).iter_mut().find(|r| &r.checkpoint == checkpoint) {
                record.hash = Some(*hash);
            }
        });

        Ok(Active { route, provider: Arc::new(provider), _subscriptions: vec![before_send, sent] })
    }

    pub fn route(&self) -> Route {
        lock(&self.active).route.clone()
    }

    pub fn provider(&self) -> Arc<PilotProvider<C, A>> {
        lock(&self.active).provider.clone()
    }

    /// Calls recorded on the current fork, oldest first.
    pub fn recorded(&self) -> Vec<Recorded> {
        lock(&self.recorded).clone()
    }

    fn fork_of(provider: &PilotProvider<C, A>) -> Result<&ForkProvider<C, A>, SessionError> {
        provider.fork().ok_or(SessionError::NotForked)
    }

    fn check_generation(&self, generation: u64) -> Result<(), SessionError> {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(target: "pilot::session", generation, "discarding response from previous route");
            return Err(SessionError::RouteChanged)
        }
        Ok(())
    }

    /// Sends a request through the active provider chain.
    pub async fn request<T, R>(&self, method: &str, params: T) -> Result<R, SessionError>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        let provider = self.provider();
        let result = provider.request(method, params).await;
        self.check_generation(generation)?;
        result.map_err(SessionError::provider)
    }

    /// Removes the call recorded at `checkpoint` and every call after it by reverting the fork.
    pub async fn remove(&self, checkpoint: &str) -> Result<Vec<Recorded>, SessionError> {
        let generation = self.generation.load(Ordering::SeqCst);
        if !lock(&self.recorded).iter().any(|r| r.checkpoint == checkpoint) {
            return Err(SessionError::UnknownCheckpoint(checkpoint.to_string()))
        }
        let provider = self.provider();
        Self::fork_of(&provider)?.revert(checkpoint).await?;
        self.check_generation(generation)?;

        let mut recorded = lock(&self.recorded);
        let index = recorded
            .iter()
            .position(|r| r.checkpoint == checkpoint)
            .ok_or_else(|| SessionError::UnknownCheckpoint(checkpoint.to_string()))?;
        let removed = recorded.split_off(index);
        debug!(target: "pilot::session", checkpoint, removed = removed.len(), "reverted calls");
        Ok(removed)
    }

    /// Discards every recorded call by replacing the fork.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let provider = self.provider();
        Self::fork_of(&provider)?.refork().await?;
        self.check_generation(generation)?;
        lock(&self.recorded).clear();
        Ok(())
    }

    /// Replaces the recorded call at `checkpoint` with `calls`, then replays the calls that
    /// followed it.
    pub async fn apply_translation(
        &self,
        checkpoint: &str,
        calls: Vec<MetaTransaction>,
    ) -> Result<(), SessionError> {
        let removed = self.remove(checkpoint).await?;
        let later = removed.into_iter().skip(1).map(|r| r.call);
        for call in calls.into_iter().chain(later) {
            self.send(&call).await?;
        }
        Ok(())
    }

    /// Replaces the whole recording with `calls`.
    pub async fn replay(&self, calls: Vec<MetaTransaction>) -> Result<(), SessionError> {
        self.clear().await?;
        for call in &calls {
            self.send(call).await?;
        }
        Ok(())
    }

    /// Sends `call` to the fork as the avatar.
    pub async fn send(&self, call: &MetaTransaction) -> Result<H256, SessionError> {
        if call.operation == Operation::DelegateCall {
            return Err(SessionError::DelegateCall)
        }
        let tx = TransactionRequest::new()
            .from(self.route().avatar_address())
            .to(call.to)
            .value(call.value)
            .data(call.data.clone());
        self.request("eth_sendTransaction", [tx]).await
    }

    /// Makes `route` the active route. The old fork is deleted and the recording cleared.
    pub async fn switch_route(&self, route: Route) -> Result<(), SessionError> {
        let previous = {
            let mut active = lock(&self.active);
            let next = self.generation.load(Ordering::SeqCst) + 1;
            let replacement = Self::activate(
                &self.upstream,
                &self.api,
                self.options,
                route,
                next,
                &self.generation,
                &self.recorded,
            )?;
            self.generation.store(next, Ordering::SeqCst);
            lock(&self.recorded).clear();
            std::mem::replace(&mut *active, replacement)
        };
        debug!(target: "pilot::session", route = %lock(&self.active).route.id, "switched route");
        if let Some(fork) = previous.provider.fork() {
            fork.delete_fork().await?;
        }
        Ok(())
    }
}
