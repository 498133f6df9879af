use super::DeadLetterError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A durable FIFO list of serialized records
///
/// Implementations delegate atomicity of each push/pop to the backing store.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Appends a record and refreshes the list's time-to-live
    async fn push(&self, record: String) -> Result<(), DeadLetterError>;

    /// Removes and returns the oldest record, or `None` when empty
    async fn pop(&self) -> Result<Option<String>, DeadLetterError>;

    /// Number of records currently stored
    async fn len(&self) -> Result<usize, DeadLetterError>;
}

/// Redis-backed list: `LPUSH` + `EXPIRE` to add, `RPOP` to take the oldest
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key: String,
    ttl: Duration,
}

impl RedisStore {
    /// Connects to Redis and verifies the server answers `PING`
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Connection URL (e.g. "redis://127.0.0.1:6379")
    /// * `key` - Name of the list holding the records
    /// * `ttl` - Expiry applied to the whole list on every push
    pub async fn connect(
        redis_url: &str,
        key: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, DeadLetterError> {
        let client = Client::open(redis_url)?;
        let mut conn = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            conn,
            key: key.into(),
            ttl,
        })
    }
}

#[async_trait]
impl DeadLetterStore for RedisStore {
    async fn push(&self, record: String) -> Result<(), DeadLetterError> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(&self.key)
            .arg(record)
            .ignore()
            .cmd("EXPIRE")
            .arg(&self.key)
            .arg(self.ttl.as_secs())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>, DeadLetterError> {
        let mut conn = self.conn.clone();
        let record: Option<String> = redis::cmd("RPOP")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(record)
    }

    async fn len(&self) -> Result<usize, DeadLetterError> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

/// In-process store with the same FIFO semantics and no expiry
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<VecDeque<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DeadLetterStore for MemoryStore {
    async fn push(&self, record: String) -> Result<(), DeadLetterError> {
        self.records().push_back(record);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>, DeadLetterError> {
        Ok(self.records().pop_front())
    }

    async fn len(&self) -> Result<usize, DeadLetterError> {
        Ok(self.records().len())
    }
}
