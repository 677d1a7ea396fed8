//! Clock used to stamp chat messages on the server.
//!
//! Timestamps are Unix milliseconds (UTC). Usecases receive an `Arc<dyn Clock>`
//! so that tests can pin the value.

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Unix timestamp in milliseconds (UTC)
    fn now_millis(&self) -> i64;
}

/// 実時刻を返す Clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 常に同じ時刻を返す Clock（テスト用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(i64);

impl FixedClock {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}
