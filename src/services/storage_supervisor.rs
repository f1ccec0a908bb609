//! Keeps the room store connected for the lifetime of the process, flipping
//! the shared state in and out of degraded mode as the backend comes and
//! goes. Backoff and polling intervals come from [`SupervisorConfig`].

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    config::SupervisorConfig,
    dao::{room_store::RoomStore, storage::StorageError},
    state::SharedState,
};

/// Supervise the room store connection.
///
/// `connect` builds a fresh store and is retried with exponential backoff
/// until it succeeds. Once a store is installed the supervisor polls its
/// health; failed probes trigger a bounded number of in-place reconnects
/// before the connection is rebuilt from scratch. Rooms and votes keep
/// failing with the degraded error the whole time the backend is down.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let settings = state.config().supervisor().clone();

    loop {
        let store = bootstrap(&settings, &mut connect).await;
        state.set_room_store(store.clone()).await;
        info!("room store online; accepting room and vote traffic");

        monitor(&state, &settings, store).await;
        warn!("room store lost; rebuilding the connection");
    }
}

/// Retry `connect` until a store comes up.
async fn bootstrap<F, Fut>(settings: &SupervisorConfig, connect: &mut F) -> Arc<dyn RoomStore>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = settings.retry_initial_delay;
    loop {
        match connect().await {
            Ok(store) => return store,
            Err(err) => {
                warn!(error = %err, retry_in = ?delay, "room store connection failed");
                sleep(delay).await;
                delay = next_delay(delay, settings.retry_max_delay);
            }
        }
    }
}

/// Poll the installed store until its health cannot be restored.
async fn monitor(state: &SharedState, settings: &SupervisorConfig, store: Arc<dyn RoomStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("room store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
                sleep(settings.health_poll_interval).await;
            }
            Err(err) => {
                warn!(error = %err, "room store health probe failed");
                if restore(state, settings, store.as_ref()).await {
                    state.update_degraded(false).await;
                    sleep(settings.health_poll_interval).await;
                } else {
                    warn!(
                        budget = settings.max_reconnect_attempts,
                        "room store reconnect budget exhausted; staying degraded"
                    );
                    return;
                }
            }
        }
    }
}

/// Try the configured number of in-place reconnects, entering degraded mode
/// on the first failure.
async fn restore(
    state: &SharedState,
    settings: &SupervisorConfig,
    store: &dyn RoomStore,
) -> bool {
    let mut delay = settings.retry_initial_delay;
    for attempt in 0..settings.max_reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "room store reconnected");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "room store reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "room store reconnect failed");
                }
                sleep(delay).await;
                delay = next_delay(delay, settings.retry_max_delay);
            }
        }
    }
    false
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        config::AppConfig, dao::room_store::memory::MemoryRoomStore, state::AppState,
    };

    fn fast_settings() -> SupervisorConfig {
        SupervisorConfig {
            retry_initial_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            health_poll_interval: Duration::from_millis(5),
            max_reconnect_attempts: 2,
        }
    }

    #[tokio::test]
    async fn installs_the_store_after_a_failed_first_attempt() {
        let config = AppConfig::default().with_supervisor_settings(fast_settings());
        let state = AppState::new(config);
        assert!(state.is_degraded().await);

        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        tokio::spawn(run(state.clone(), move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(StorageError::unavailable(
                        "refused".into(),
                        std::io::Error::other("refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryRoomStore::new()) as Arc<dyn RoomStore>)
                }
            }
        }));

        for _ in 0..100 {
            if !state.is_degraded().await {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(!state.is_degraded().await, "store never came online");
        assert!(attempts.load(Ordering::SeqCst) >= 2);
    }
}
