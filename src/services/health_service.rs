use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageProbe},
    state::SharedState,
};

/// Probe the room store and assemble the health report.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.room_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => StorageProbe::Ready,
            Err(err) => {
                warn!(error = %err, "room store failed the health probe");
                StorageProbe::Failing
            }
        },
        None => {
            warn!("no room store installed; reporting degraded");
            StorageProbe::Missing
        }
    };

    HealthResponse::new(state.is_degraded().await, storage)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::{RoomStore, memory::MemoryRoomStore},
        state::AppState,
    };

    #[tokio::test]
    async fn reports_ok_once_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());

        let report = health_status(&state).await;
        assert_eq!(report.status, "degraded");
        assert_eq!(report.storage, StorageProbe::Missing);

        let store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::new());
        state.set_room_store(store).await;

        let report = health_status(&state).await;
        assert_eq!(report.status, "ok");
        assert_eq!(report.storage, StorageProbe::Ready);
    }
}
