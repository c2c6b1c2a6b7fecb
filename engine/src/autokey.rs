//! Automatic primary-key generator (C8): finds an unused numeric value for
//! a fixed-width trailing key column by randomized probing with bounded
//! retry (§4.8).
//!
//! The source pools a cursor plus its PRNG per thread so a later call on
//! the same thread resumes near the last successful slot. A live cursor
//! can't outlive the transaction that opened it in this trait surface, so
//! here the pool keeps only the last tried candidate and the RNG state;
//! each attempt opens a fresh cursor against the current transaction.

use crate::error::{EngineError, Result};
use crate::store_trait::{Cursor, Index, LockOutcome, Txn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use relstore_codec::{lex, ColumnType, Direction, NullsOrder, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct KeyRange {
    pub min: i64,
    pub max: i64,
}

impl KeyRange {
    fn sample(&self, rng: &mut SmallRng) -> i64 {
        loop {
            let v = rng.gen_range(self.min..=self.max);
            if v != 0 {
                return v;
            }
        }
    }

    fn wrapping_next(&self, v: i64) -> i64 {
        let mut n = if v >= self.max { self.min } else { v + 1 };
        if n == 0 {
            n = if n >= self.max { self.min } else { n + 1 };
        }
        n
    }
}

struct PooledState {
    candidate: i64,
    rng: SmallRng,
}

/// Generates values for the trailing fixed-width column of `index`'s key,
/// with `prefix` holding the already-encoded leading key columns (empty
/// when the primary key is a single auto-generated column).
pub struct AutoKeyGenerator<I: Index> {
    index: Arc<I>,
    prefix: Vec<u8>,
    range: KeyRange,
    column_type: ColumnType,
    direction: Direction,
    nulls: NullsOrder,
    pooled: Mutex<Option<PooledState>>,
}

impl<I: Index> AutoKeyGenerator<I> {
    pub fn new(index: Arc<I>, prefix: Vec<u8>, range: KeyRange, column_type: ColumnType, direction: Direction, nulls: NullsOrder) -> Self {
        AutoKeyGenerator { index, prefix, range, column_type, direction, nulls, pooled: Mutex::new(None) }
    }

    fn encode_candidate(&self, candidate: i64) -> Result<Vec<u8>> {
        let value = match self.column_type {
            ColumnType::I32 => Value::I32(candidate as i32),
            ColumnType::I64 => Value::I64(candidate),
            ColumnType::U32 => Value::U32(candidate as u32),
            ColumnType::U64 => Value::U64(candidate as u64),
            other => {
                return Err(EngineError::UnsupportedConversion { from: "auto-key range".into(), to: format!("{other:?}") });
            }
        };
        let mut out = self.prefix.clone();
        lex::encode(&value, &self.column_type, self.direction, self.nulls, false, &mut out)?;
        Ok(out)
    }

    /// Steps 1-4 of §4.8: pick or resume a candidate, probe it under a
    /// zero-timeout upgradable lock, and on contention yield and retry with
    /// a fresh random candidate until the transaction's lock deadline
    /// expires.
    pub async fn generate(&self, txn: &dyn Txn, value: &[u8]) -> Result<Vec<u8>> {
        let pooled = self.pooled.lock().unwrap().take();
        let (mut candidate, mut rng) = match pooled {
            Some(state) => (state.candidate, state.rng),
            None => {
                let mut rng = SmallRng::from_entropy();
                let candidate = self.range.sample(&mut rng);
                (candidate, rng)
            }
        };

        let lock_timeout = txn.lock_timeout();
        let deadline = lock_timeout.map(|d| Instant::now() + d);

        loop {
            let key = self.encode_candidate(candidate)?;
            let outcome = self.index.lock_upgradable(txn, &key, Duration::from_secs(0)).await.map_err(EngineError::Store)?;

            if outcome == LockOutcome::Acquired {
                let mut cursor = self.index.new_cursor(txn).await.map_err(EngineError::Store)?;
                let found = cursor.find(&key).await.map_err(EngineError::Store)?;
                let occupied = found && cursor.key() == Some(key.as_slice());
                if !occupied {
                    self.index.store(txn, &key, Some(value)).await.map_err(EngineError::Store)?;
                    candidate = self.range.wrapping_next(candidate);
                    *self.pooled.lock().unwrap() = Some(PooledState { candidate, rng });
                    return Ok(key);
                }
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(EngineError::LockFailure {
                        duration: lock_timeout.unwrap_or_default(),
                        detail: "Unable to generate a unique identifier within the configured key range".into(),
                    });
                }
            }
            tokio::task::yield_now().await;
            candidate = self.range.sample(&mut rng);
        }
    }
}

impl<I: Index> Drop for AutoKeyGenerator<I> {
    fn drop(&mut self) {
        // No cursor is held across calls in this implementation, so there's
        // nothing to reset; the pooled candidate/RNG are simply discarded.
        *self.pooled.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_next_skips_zero_and_wraps() {
        let range = KeyRange { min: -2, max: 2 };
        assert_eq!(range.wrapping_next(-2), -1);
        assert_eq!(range.wrapping_next(-1), 1);
        assert_eq!(range.wrapping_next(1), 2);
        assert_eq!(range.wrapping_next(2), -2);
    }

    #[test]
    fn sample_never_returns_zero() {
        let range = KeyRange { min: -1, max: 1 };
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_ne!(range.sample(&mut rng), 0);
        }
    }
}
