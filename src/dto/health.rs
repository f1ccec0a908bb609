use serde::Serialize;
use utoipa::ToSchema;

/// Health report returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` while a storage backend is installed and answering, `degraded`
    /// otherwise.
    pub status: String,
    /// Outcome of the storage probe this report was built from.
    pub storage: StorageProbe,
    /// Running server version.
    pub version: &'static str,
}

/// Result of probing the room store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageProbe {
    /// Backend installed and reachable.
    Ready,
    /// Backend installed but the probe failed.
    Failing,
    /// No backend installed; room and vote operations are rejected.
    Missing,
}

impl HealthResponse {
    /// Assemble the report from the degraded flag and the probe outcome.
    pub fn new(degraded: bool, storage: StorageProbe) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            storage,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
