use anyhow::{Context, Result};
use redis::aio::{ConnectionManager, PubSub};
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared Redis connection manager guarded by a Tokio mutex.
///
/// The `ConnectionManager` reconnects transparently; the mutex only guards
/// the handle so it can be swapped without tearing down clones held by
/// background tasks.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool used for regular commands (GET/SET/DEL/PUBLISH).
pub struct RedisPool {
    client: Client,
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("failed to construct Redis client")?;
        let connection_manager = ConnectionManager::new(client.clone())
            .await
            .context("failed to initialize Redis connection manager")?;
        tracing::info!("redis connection manager ready");
        Ok(Self {
            client,
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }

    /// Open a dedicated pub/sub connection.
    ///
    /// SUBSCRIBE puts a Redis connection into a mode where regular commands
    /// are rejected, so subscribers must not share the command manager.
    pub async fn subscriber(&self) -> Result<PubSub> {
        self.client
            .get_async_pubsub()
            .await
            .context("failed to open Redis pub/sub connection")
    }
}

/// Open a standalone pub/sub connection from a URL.
///
/// Used by long-lived listener tasks that reconnect on broker errors.
pub async fn pubsub_connection(redis_url: &str) -> Result<PubSub> {
    let client = Client::open(redis_url).context("failed to construct Redis client")?;
    client
        .get_async_pubsub()
        .await
        .context("failed to open Redis pub/sub connection")
}
