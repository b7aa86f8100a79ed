//! Store capability trait and its Redis-driver implementation.
//!
//! Everything the sweep needs from a key-value server is expressed as the
//! [`Store`] trait: type introspection, whole-value reads and bulk writes for
//! the five data types, TTL manipulation, delete, cross-database move, and a
//! cursor-based scan page. [`RedisStore`] implements it over a multiplexed
//! connection from the [`redis`] driver; tests implement it in memory.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::config::Endpoint;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// An error raised by a store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An error originating from the underlying Redis driver.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The initial connection did not complete within the configured timeout.
    #[error("connection to {0} timed out after {1:?}")]
    ConnectTimeout(String, Duration),

    /// A failure while handling a value of a known type, so the log line can
    /// carry the type tag alongside the key.
    #[error("type {key_type}: {source}")]
    ForType {
        key_type: String,
        #[source]
        source: Box<StoreError>,
    },

    /// Raised by test stores to simulate a per-key failure.
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Key types and TTL
// ---------------------------------------------------------------------------

/// The store-assigned type tag of a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyType {
    String,
    Hash,
    List,
    Set,
    ZSet,
    /// Any type outside the migratable set (streams, modules, a vanished key).
    Other(String),
}

impl KeyType {
    /// Map a `TYPE` reply to a tag.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "hash" => Self::Hash,
            "list" => Self::List,
            "set" => Self::Set,
            "zset" => Self::ZSet,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Hash => write!(f, "hash"),
            Self::List => write!(f, "list"),
            Self::Set => write!(f, "set"),
            Self::ZSet => write!(f, "zset"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// The expiration state of a key.
///
/// Wire sentinels from `TTL`: `-2` means the key does not exist, `-1` means
/// the key exists but carries no expiration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists and has no expiration set.
    Persistent,
    /// The key expires in this many seconds.
    Expires(u64),
}

impl Ttl {
    /// Decode the integer reply of a `TTL` command.
    pub fn from_seconds(reply: i64) -> Self {
        match reply {
            -2 => Self::Missing,
            i64::MIN..=-1 => Self::Persistent,
            secs => Self::Expires(secs as u64),
        }
    }
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// The store capabilities consumed by the sweep.
///
/// Methods mirror the primitives of a Redis-protocol server one-to-one, so
/// the production implementation is a thin shim over the driver and a test
/// implementation is a map in memory.
#[async_trait]
pub trait Store: Send {
    /// `TYPE key`
    async fn key_type(&mut self, key: &str) -> Result<KeyType, StoreError>;

    /// `GET key` — `None` when the key is absent.
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// `SET key value`
    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// `HGETALL key` — every field/value pair. Insertion order is not
    /// significant.
    async fn hash_entries(&mut self, key: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// `HSET key f1 v1 f2 v2 ...` — bulk field-set.
    async fn hash_set_all(
        &mut self,
        key: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), StoreError>;

    /// `LRANGE key 0 -1` — the full list in source order.
    async fn list_range(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    /// `LPUSH key i1 i2 ... in` — bulk prepend. The store prepends items
    /// left to right, so the pushed range lands in reverse order.
    async fn list_prepend(&mut self, key: &str, items: &[Vec<u8>]) -> Result<(), StoreError>;

    /// `SMEMBERS key`
    async fn set_members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    /// `SADD key m1 m2 ...` — bulk add.
    async fn set_add_all(&mut self, key: &str, members: &[Vec<u8>]) -> Result<(), StoreError>;

    /// `ZRANGE key 0 -1 WITHSCORES` — every member with its score.
    async fn sorted_set_entries(&mut self, key: &str) -> Result<Vec<(Vec<u8>, f64)>, StoreError>;

    /// `ZADD key score member` — single scored add.
    async fn sorted_set_add(
        &mut self,
        key: &str,
        member: &[u8],
        score: f64,
    ) -> Result<(), StoreError>;

    /// `TTL key`, decoded into [`Ttl`].
    async fn ttl(&mut self, key: &str) -> Result<Ttl, StoreError>;

    /// `EXPIRE key seconds` — `true` when a timeout was set.
    async fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    /// `PERSIST key` — `true` when a timeout was removed.
    async fn persist(&mut self, key: &str) -> Result<bool, StoreError>;

    /// `DEL key` — `true` when the key existed.
    async fn delete(&mut self, key: &str) -> Result<bool, StoreError>;

    /// `MOVE key db` — relocate a key to another logical database over this
    /// same connection. `false` when the store refuses: the key is absent
    /// here, or the target database already holds that name.
    async fn move_to_db(&mut self, key: &str, db: u32) -> Result<bool, StoreError>;

    /// One `SCAN cursor COUNT n` page: the next cursor and a batch of key
    /// names. A zero next-cursor ends the pass. Pages may be empty mid-pass,
    /// and a full pass visits each key at least once — there is no
    /// exactly-once or snapshot guarantee while the keyspace mutates.
    async fn scan_page(
        &mut self,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError>;
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

/// A [`Store`] over a multiplexed connection from the Redis driver.
///
/// The connection URL carries the logical database number, so the driver
/// issues the `SELECT` during the handshake.
pub struct RedisStore {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisStore {
    /// Connect to an endpoint, bounded by `timeout`.
    pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(endpoint.url())?;
        let connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StoreError::ConnectTimeout(endpoint.to_string(), timeout))??;
        Ok(Self { connection })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn key_type(&mut self, key: &str) -> Result<KeyType, StoreError> {
        let name: String = redis::cmd("TYPE")
            .arg(key)
            .query_async(&mut self.connection)
            .await?;
        Ok(KeyType::from_wire(&name))
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value: Option<Vec<u8>> = self.connection.get(key).await?;
        Ok(value)
    }

    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let _: () = self.connection.set(key, value).await?;
        Ok(())
    }

    async fn hash_entries(&mut self, key: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let entries: Vec<(String, Vec<u8>)> = self.connection.hgetall(key).await?;
        Ok(entries)
    }

    async fn hash_set_all(
        &mut self,
        key: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), StoreError> {
        let _: () = self.connection.hset_multiple(key, entries).await?;
        Ok(())
    }

    async fn list_range(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let items: Vec<Vec<u8>> = self.connection.lrange(key, 0, -1).await?;
        Ok(items)
    }

    async fn list_prepend(&mut self, key: &str, items: &[Vec<u8>]) -> Result<(), StoreError> {
        let _: () = self.connection.lpush(key, items).await?;
        Ok(())
    }

    async fn set_members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let members: Vec<Vec<u8>> = self.connection.smembers(key).await?;
        Ok(members)
    }

    async fn set_add_all(&mut self, key: &str, members: &[Vec<u8>]) -> Result<(), StoreError> {
        let _: () = self.connection.sadd(key, members).await?;
        Ok(())
    }

    async fn sorted_set_entries(&mut self, key: &str) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        let entries: Vec<(Vec<u8>, f64)> = self.connection.zrange_withscores(key, 0, -1).await?;
        Ok(entries)
    }

    async fn sorted_set_add(
        &mut self,
        key: &str,
        member: &[u8],
        score: f64,
    ) -> Result<(), StoreError> {
        let _: () = self.connection.zadd(key, member, score).await?;
        Ok(())
    }

    async fn ttl(&mut self, key: &str) -> Result<Ttl, StoreError> {
        let reply: i64 = self.connection.ttl(key).await?;
        Ok(Ttl::from_seconds(reply))
    }

    async fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let set: bool = self.connection.expire(key, seconds as i64).await?;
        Ok(set)
    }

    async fn persist(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed: bool = self.connection.persist(key).await?;
        Ok(removed)
    }

    async fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed: u64 = self.connection.del(key).await?;
        Ok(removed > 0)
    }

    async fn move_to_db(&mut self, key: &str, db: u32) -> Result<bool, StoreError> {
        let moved: bool = redis::cmd("MOVE")
            .arg(key)
            .arg(db)
            .query_async(&mut self.connection)
            .await?;
        Ok(moved)
    }

    async fn scan_page(
        &mut self,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let page: (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut self.connection)
            .await?;
        Ok(page)
    }
}
