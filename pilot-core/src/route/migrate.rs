use super::{from_legacy, RouteStore};
use tracing::{debug, warn};

/// Outcome of [`migrate_legacy`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Ids of legacy records converted during this run
    pub migrated: Vec<String>,
    /// Ids of legacy records that could not be converted (invalid avatar address)
    pub dropped: Vec<String>,
    /// Route selected as a result of the migration
    pub selected: Option<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.migrated.is_empty() && self.selected.is_none()
    }
}

/// Converts legacy connection records into routes.
///
/// Records whose id already exists as a route are skipped, so running this again after a
/// successful migration changes nothing. The legacy selection carries over only if no route is
/// selected yet.
pub async fn migrate_legacy<S: RouteStore>(store: &S) -> Result<MigrationReport, S::Error> {
    let mut report = MigrationReport::default();
    let legacy = store.get_legacy_connections().await?;
    if legacy.is_empty() {
        return Ok(report)
    }

    let mut routes = store.get_routes().await?;
    for connection in &legacy {
        if routes.iter().any(|route| route.id == connection.id) {
            continue
        }
        match from_legacy(connection) {
            Some(route) => {
                debug!(target: "pilot::migrate", id = %route.id, "migrated legacy connection");
                report.migrated.push(route.id.clone());
                routes.push(route);
            }
            None => {
                warn!(
                    target: "pilot::migrate",
                    id = %connection.id,
                    avatar = %connection.avatar_address,
                    "dropping legacy connection with invalid avatar"
                );
                report.dropped.push(connection.id.clone());
            }
        }
    }

    if !report.migrated.is_empty() {
        store.set_routes(routes.clone()).await?;
    }

    if store.get_selected_route_id().await?.is_none() {
        if let Some(id) = store.get_selected_legacy_id().await? {
            if routes.iter().any(|route| route.id == id) {
                store.set_selected_route_id(Some(id.clone())).await?;
                report.selected = Some(id);
            }
        }
    }

    Ok(report)
}
