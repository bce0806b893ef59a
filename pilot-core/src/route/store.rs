use super::{LegacyConnection, Route};
use async_trait::async_trait;
use std::{
    convert::Infallible,
    fmt::Debug,
    sync::{Arc, Mutex},
};

/// Access to persisted routes. Implemented by the embedding application on top of whatever
/// durable key-value storage it has.
#[async_trait]
pub trait RouteStore: Debug + Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get_routes(&self) -> Result<Vec<Route>, Self::Error>;

    async fn set_routes(&self, routes: Vec<Route>) -> Result<(), Self::Error>;

    async fn get_selected_route_id(&self) -> Result<Option<String>, Self::Error>;

    async fn set_selected_route_id(&self, id: Option<String>) -> Result<(), Self::Error>;

    /// Records written by versions that predate routes.
    async fn get_legacy_connections(&self) -> Result<Vec<LegacyConnection>, Self::Error>;

    async fn get_selected_legacy_id(&self) -> Result<Option<String>, Self::Error>;
}

#[derive(Debug, Default)]
struct MemoryState {
    routes: Vec<Route>,
    selected: Option<String>,
    legacy: Vec<LegacyConnection>,
    selected_legacy: Option<String>,
}

/// A [`RouteStore`] that keeps everything in memory. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with legacy records, as an old installation would have them.
    pub fn with_legacy(legacy: Vec<LegacyConnection>, selected: Option<String>) -> Self {
        let store = Self::default();
        {
            let mut state = store.lock();
            state.legacy = legacy;
            state.selected_legacy = selected;
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // state is plain data, a poisoned lock still holds a consistent value
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    type Error = Infallible;

    async fn get_routes(&self) -> Result<Vec<Route>, Self::Error> {
        Ok(self.lock().routes.clone())
    }

    async fn set_routes(&self, routes: Vec<Route>) -> Result<(), Self::Error> {
        self.lock().routes = routes;
        Ok(())
    }

    async fn get_selected_route_id(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.lock().selected.clone())
    }

    async fn set_selected_route_id(&self, id: Option<String>) -> Result<(), Self::Error> {
        self.lock().selected = id;
        Ok(())
    }

    async fn get_legacy_connections(&self) -> Result<Vec<LegacyConnection>, Self::Error> {
        Ok(self.lock().legacy.clone())
    }

    async fn get_selected_legacy_id(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.lock().selected_legacy.clone())
    }
}
