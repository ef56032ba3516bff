//! # Redis Backend
//!
//! [`KeyValueBackend`] over Redis using a multiplexed, auto-reconnecting
//! `ConnectionManager`.
//!
//! Guarded batches are executed as a single Lua script evaluation, which
//! Redis runs without interleaving other commands. The script receives each
//! command as `argc, name, args...` in `ARGV`, runs the guard, and returns
//! `0` without touching anything else if the guard's reply is nil or zero.
//!
//! # Examples
//!
//! ```ignore
//! use order_store::infrastructure::kv::RedisBackend;
//!
//! let backend = RedisBackend::connect("redis://127.0.0.1:6379").await?;
//! backend.ping().await?;
//! ```

use crate::infrastructure::kv::error::{BackendError, BackendResult};
use crate::infrastructure::kv::traits::{
    AtomicBatch, KeyValueBackend, ScanPage, SetCondition, WriteOutcome,
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::fmt;
use std::sync::Arc;

const GUARDED_BATCH_SCRIPT: &str = r"
local pos = 1
local function next_command()
  local argc = tonumber(ARGV[pos])
  local args = {}
  for i = 1, argc do
    args[i] = ARGV[pos + i]
  end
  pos = pos + argc + 1
  return args
end

local guard = redis.call(unpack(next_command()))
if not guard or guard == 0 then
  return 0
end
while pos <= #ARGV do
  redis.call(unpack(next_command()))
end
return 1
";

/// Redis implementation of [`KeyValueBackend`].
///
/// Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    guarded_batch: Arc<Script>,
}

impl RedisBackend {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            guarded_batch: Arc::new(Script::new(GUARDED_BATCH_SCRIPT)),
        }
    }

    /// Opens a connection manager for `url`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Connection` if the URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(url: &str) -> BackendResult<Self> {
        let client = Client::open(url)
            .map_err(|e| BackendError::connection(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client).await?;
        tracing::debug!("connected to redis");
        Ok(Self::new(conn))
    }

    /// Round-trips a `PING`.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the server does not answer `PONG`.
    pub async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(BackendError::response(format!("unexpected PING reply: {reply}")))
        }
    }
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        condition: SetCondition,
    ) -> BackendResult<WriteOutcome> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(flag) = condition.as_flag() {
            cmd.arg(flag);
        }
        // Nil reply means the NX/XX condition did not hold.
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(WriteOutcome::from_applied(reply.is_some()))
    }

    async fn mget(&self, keys: &[String]) -> BackendResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        if values.len() != keys.len() {
            return Err(BackendError::response(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn sscan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage> {
        let mut conn = self.conn.clone();
        let (cursor, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage { cursor, members })
    }

    async fn execute(&self, batch: AtomicBatch) -> BackendResult<WriteOutcome> {
        let mut invocation = self.guarded_batch.prepare_invoke();
        for command in std::iter::once(batch.guard()).chain(batch.dependents()) {
            let args = command.to_args();
            invocation.arg(args.len());
            for arg in args {
                invocation.arg(arg);
            }
        }

        let mut conn = self.conn.clone();
        let applied: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(WriteOutcome::from_applied(applied == 1))
    }
}
