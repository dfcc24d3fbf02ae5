//! Distributed lock (§4.8): a named mutex backed by Postgres advisory locks,
//! session-scoped, with shared/exclusive modes and a process-local gate that
//! avoids an unnecessary round trip when this process already holds (or is
//! waiting on) the same exclusive key.
//!
//! Grounded on `original_source/pt_repost/dlock/__init__.py`: the same
//! `pg_advisory_lock[_shared]` / `pg_try_advisory_lock[_shared]` /
//! `pg_advisory_unlock[_shared]` family, the same string-key hash-then-cast
//! scheme, and the same reader/writer asymmetry (shared acquisition skips the
//! process-local gate; exclusive acquisition takes it before the round trip
//! and releases it on every exit path by virtue of normal Rust scoping rather
//! than an explicit `finally`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{DataError, DataResult};

/// Acquisition mode for a [`Lock`] key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared (reader-style): blocked only by an exclusive holder.
    Shared,
    /// Exclusive (writer-style): blocked by any other holder.
    Exclusive,
}

impl LockMode {
    const fn acquire_fn(self) -> &'static str {
        match self {
            Self::Shared => "pg_advisory_lock_shared",
            Self::Exclusive => "pg_advisory_lock",
        }
    }

    const fn release_fn(self) -> &'static str {
        match self {
            Self::Shared => "pg_advisory_unlock_shared",
            Self::Exclusive => "pg_advisory_unlock",
        }
    }
}

/// Result of one [`Lock::acquire`] call.
#[derive(Debug)]
pub enum LockOutcome {
    /// The lock was acquired; hold the guard for as long as the critical
    /// section runs, then call [`LockGuard::release`].
    Acquired(LockGuard),
    /// The acquire timed out (a configured timeout elapsed); the caller
    /// should skip this tick and retry on the next one.
    TimedOut,
}

/// A named-mutex client backed by one connection pool. Cheap to clone; the
/// process-local gate registry is shared behind an `Arc`.
#[derive(Clone)]
pub struct Lock {
    pool: PgPool,
    gates: Arc<StdMutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl Lock {
    /// Build a lock client over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            gates: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Reduce `key` to the signed 64-bit integer Postgres advisory locks
    /// key on: an xxh3-64 hash of the UTF-8 bytes, reinterpreted as a
    /// two's-complement `i64` (matching the original's
    /// `xxhash.xxh3_64_intdigest(key) - 2**63`).
    #[must_use]
    pub fn key_for(key: &str) -> i64 {
        let digest = twox_hash::xxh3::hash64(key.as_bytes());
        digest.wrapping_sub(i64::MIN as u64) as i64
    }

    fn gate_for(&self, key: i64) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        gates.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Acquire `key` in `mode`, optionally bounded by `timeout`.
    ///
    /// Exclusive acquisition first takes a process-local gate for `key`
    /// (held inside the returned guard) so concurrent tasks in this process
    /// queue on the gate rather than each round-tripping to Postgres; shared
    /// acquisition skips the gate entirely. If the remote acquire fails or
    /// times out, the gate permit (if any) is dropped automatically by
    /// normal Rust scoping before this function returns.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Lock`] if the pool cannot hand out a connection
    /// or the advisory-lock call fails for a reason other than the
    /// configured timeout.
    pub async fn acquire(&self, key: &str, mode: LockMode, timeout: Option<Duration>) -> DataResult<LockOutcome> {
        let key = Self::key_for(key);
        let local_permit = match mode {
            LockMode::Exclusive => Some(self.gate_for(key).lock_owned().await),
            LockMode::Shared => None,
        };

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|source| DataError::Lock { operation: "acquire connection", source })?;

        if let Some(timeout) = timeout {
            let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
            sqlx::query("SET statement_timeout = $1")
                .bind(millis)
                .execute(&mut *conn)
                .await
                .map_err(|source| DataError::Lock { operation: "set statement_timeout", source })?;
        }

        let acquire_sql = format!("SELECT {}($1)", mode.acquire_fn());
        let acquired = sqlx::query(&acquire_sql).bind(key).execute(&mut *conn).await;

        match acquired {
            Ok(_) => {
                if timeout.is_some() {
                    sqlx::query("SET statement_timeout = 0")
                        .execute(&mut *conn)
                        .await
                        .map_err(|source| DataError::Lock { operation: "reset statement_timeout", source })?;
                }
                Ok(LockOutcome::Acquired(LockGuard {
                    conn: Some(conn),
                    key,
                    mode,
                    _local_permit: local_permit,
                }))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("57014") => {
                Ok(LockOutcome::TimedOut)
            }
            Err(source) => Err(DataError::Lock { operation: mode.acquire_fn(), source }),
        }
    }
}

/// Holds one acquired lock; release it explicitly with [`LockGuard::release`].
/// Dropping without releasing still frees the process-local gate (ordinary
/// scope exit) and the advisory lock itself is session-scoped, so it is also
/// freed once the underlying connection's backend session ends — but relying
/// on that instead of an explicit release leaves the lock held for as long as
/// the pool keeps the physical connection alive, so callers should always
/// call `release`.
pub struct LockGuard {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
    mode: LockMode,
    _local_permit: Option<OwnedMutexGuard<()>>,
}

impl LockGuard {
    /// Release the advisory lock on the connection that holds it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Lock`] if the unlock call fails.
    pub async fn release(mut self) -> DataResult<()> {
        if let Some(mut conn) = self.conn.take() {
            let release_sql = format!("SELECT {}($1)", self.mode.release_fn());
            sqlx::query(&release_sql)
                .bind(self.key)
                .execute(&mut *conn)
                .await
                .map_err(|source| DataError::Lock { operation: self.mode.release_fn(), source })?;
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.conn.is_some() {
            tracing::warn!(key = self.key, "lock guard dropped without an explicit release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_for_is_deterministic_and_fits_i64_range() {
        let a = Lock::key_for("schedule");
        let b = Lock::key_for("schedule");
        assert_eq!(a, b);
        let c = Lock::key_for("schedule-other");
        assert_ne!(a, c);
    }

    #[test]
    fn acquire_and_release_fn_names_match_mode() {
        assert_eq!(LockMode::Shared.acquire_fn(), "pg_advisory_lock_shared");
        assert_eq!(LockMode::Shared.release_fn(), "pg_advisory_unlock_shared");
        assert_eq!(LockMode::Exclusive.acquire_fn(), "pg_advisory_lock");
        assert_eq!(LockMode::Exclusive.release_fn(), "pg_advisory_unlock");
    }
}
