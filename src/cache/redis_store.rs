//! Redis Store Module
//!
//! `RemoteStore` implementation backed by a pool of synchronous Redis
//! connections.
//!
//! Every call checks out its own connection, so a slow round-trip or a
//! reconnect only holds up the caller that hit it. Broken connections are
//! discarded by the pool and replaced in the background.

use std::time::Duration;

use r2d2::{CustomizeConnection, Pool, PooledConnection};
use redis::{Client, Commands, Connection, RedisError};

use crate::cache::distributed::RemoteStore;
use crate::error::BackendResult;

/// Bound on waiting for a pooled connection and on each command round-trip.
const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on open connections.
const POOL_SIZE: u32 = 16;

/// Keys requested per `SCAN` iteration.
const SCAN_BATCH: usize = 100;

/// Applies read and write timeouts to every connection the pool opens.
#[derive(Debug)]
struct IoTimeouts(Duration);

impl CustomizeConnection<Connection, RedisError> for IoTimeouts {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), RedisError> {
        conn.set_read_timeout(Some(self.0))?;
        conn.set_write_timeout(Some(self.0))
    }
}

// == Redis Store ==
pub struct RedisStore {
    pool: Pool<Client>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("state", &self.pool.state())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Opens a connection pool for `url` and waits for its first connection.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or no connection could be
    /// established within the I/O timeout.
    pub fn open(url: &str) -> BackendResult<Self> {
        let client = Client::open(url)?;
        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .min_idle(Some(1))
            .connection_timeout(IO_TIMEOUT)
            .connection_customizer(Box::new(IoTimeouts(IO_TIMEOUT)))
            .build(client)?;

        Ok(Self { pool })
    }

    fn connection(&self) -> BackendResult<PooledConnection<Client>> {
        Ok(self.pool.get()?)
    }
}

impl RemoteStore for RedisStore {
    fn ping(&self) -> BackendResult<()> {
        let mut conn = self.connection()?;
        redis::cmd("PING").query::<String>(&mut *conn)?;
        Ok(())
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.connection()?;
        Ok(conn.get(key)?)
    }

    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()> {
        let mut conn = self.connection()?;
        let _: () = conn.set_ex(key, value, ttl_secs.max(1))?;
        Ok(())
    }

    fn del(&self, keys: &[String]) -> BackendResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection()?;
        Ok(conn.del(keys)?)
    }

    fn scan_match(&self, pattern: &str) -> BackendResult<Vec<String>> {
        let mut conn = self.connection()?;
        let mut found = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(&mut *conn)?;
            found.extend(keys);

            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    #[test]
    fn test_open_rejects_invalid_url() {
        assert!(matches!(
            RedisStore::open("not a url"),
            Err(BackendError::Redis(_))
        ));
    }

    #[test]
    fn test_open_unreachable_server_fails() {
        let started = std::time::Instant::now();
        assert!(matches!(
            RedisStore::open("redis://127.0.0.1:1/"),
            Err(BackendError::Pool(_))
        ));
        assert!(started.elapsed() < IO_TIMEOUT * 3);
    }

    /// Requires a Redis instance at `redis://127.0.0.1/`.
    #[test]
    #[ignore]
    fn test_round_trip_against_local_redis() {
        let store = RedisStore::open("redis://127.0.0.1/").expect("local redis");
        store.ping().unwrap();

        store.set_ex("service_guard:test:k", "\"v\"", 30).unwrap();
        assert_eq!(
            store.get("service_guard:test:k").unwrap().as_deref(),
            Some("\"v\"")
        );

        let keys = store.scan_match("service_guard:test:*").unwrap();
        assert!(keys.contains(&"service_guard:test:k".to_string()));
        assert_eq!(store.del(&keys).unwrap(), keys.len());
    }

    /// Requires a Redis instance at `redis://127.0.0.1/`.
    #[test]
    #[ignore]
    fn test_concurrent_callers_use_separate_connections() {
        let store = std::sync::Arc::new(RedisStore::open("redis://127.0.0.1/").expect("local redis"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let key = format!("service_guard:test:c{}", i);
                    store.set_ex(&key, "1", 30).unwrap();
                    store.get(&key).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("1"));
        }
        assert!(store.pool.state().connections > 1);

        let keys = store.scan_match("service_guard:test:c*").unwrap();
        store.del(&keys).unwrap();
    }
}
