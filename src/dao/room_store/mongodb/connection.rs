//! Client construction and the initial reachability probe for the room
//! database.

use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

const PING_ATTEMPTS: u32 = 10;
const PING_BACKOFF_START: Duration = Duration::from_millis(250);
const PING_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Build a client from the parsed options and wait until the deployment
/// answers a ping, so callers never receive a store whose first room read
/// would fail.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut backoff = PING_BACKOFF_START;
    let mut attempt = 1;
    loop {
        let err = match database.run_command(doc! {"ping": 1}).await {
            Ok(_) => {
                debug!(database = %config.database_name, attempt, "room database reachable");
                return Ok((client, database));
            }
            Err(err) => err,
        };

        if attempt >= PING_ATTEMPTS {
            return Err(MongoDaoError::InitialPing {
                attempts: attempt,
                source: err,
            });
        }
        warn!(
            database = %config.database_name,
            attempt,
            error = %err,
            "room database ping failed; backing off"
        );
        sleep(backoff).await;
        backoff = (backoff * 2).min(PING_BACKOFF_CAP);
        attempt += 1;
    }
}
