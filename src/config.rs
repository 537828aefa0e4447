//! Connection parameters for a link.
//!
//! The six standard tunables (t0-t3, k, w) are validated together at
//! construction and are immutable once a link is built.

use std::time::Duration;

use crate::error::{Result, Rtu104Error};

/// Default connect timeout t0 in seconds.
pub const DEFAULT_T0: u64 = 30;

/// Default outstanding-acknowledgment timeout t1 in seconds.
pub const DEFAULT_T1: u64 = 15;

/// Default local-acknowledgment-delay timeout t2 in seconds.
pub const DEFAULT_T2: u64 = 10;

/// Default idle/test-frame interval t3 in seconds.
pub const DEFAULT_T3: u64 = 20;

/// Default K parameter (max unacknowledged sent frames).
pub const DEFAULT_K: u16 = 12;

/// Default W parameter (received-unacknowledged threshold forcing an ack).
pub const DEFAULT_W: u16 = 8;

/// Validated, immutable link configuration.
///
/// Invariants enforced at construction:
/// - `t0` in `[1, 255]` seconds
/// - `t1` in `[1, 255]` seconds, strictly greater than `t2`
/// - `t2 >= 1` second
/// - `t3` in `[0, 10000]` seconds, `0` disables the keepalive
/// - `k` in `[w + 1, 1000]`
/// - `w` in `[1, 800]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    t0: u64,
    t1: u64,
    t2: u64,
    t3: u64,
    k: u16,
    w: u16,
}

impl ConnectionConfig {
    /// Create a configuration, validating all six parameters together.
    pub fn new(t0: u64, t1: u64, t2: u64, t3: u64, k: u16, w: u16) -> Result<Self> {
        if !(1..=255).contains(&t0) {
            return Err(Rtu104Error::config(format!("t0 must be in [1, 255]: {}", t0)));
        }
        if !(1..=255).contains(&t1) {
            return Err(Rtu104Error::config(format!("t1 must be in [1, 255]: {}", t1)));
        }
        if t2 < 1 || t2 >= t1 {
            return Err(Rtu104Error::config(format!(
                "t2 must be in [1, t1): t2={}, t1={}",
                t2, t1
            )));
        }
        if t3 > 10000 {
            return Err(Rtu104Error::config(format!("t3 must be in [0, 10000]: {}", t3)));
        }
        if !(1..=800).contains(&w) {
            return Err(Rtu104Error::config(format!("w must be in [1, 800]: {}", w)));
        }
        if k <= w || k > 1000 {
            return Err(Rtu104Error::config(format!(
                "k must be in [w + 1, 1000]: k={}, w={}",
                k, w
            )));
        }

        Ok(Self { t0, t1, t2, t3, k, w })
    }

    /// Connect timeout t0.
    pub fn t0(&self) -> Duration {
        Duration::from_secs(self.t0)
    }

    /// Outstanding-acknowledgment timeout t1 in milliseconds.
    pub fn t1_ms(&self) -> u64 {
        self.t1 * 1000
    }

    /// Local-acknowledgment-delay timeout t2 in milliseconds.
    pub fn t2_ms(&self) -> u64 {
        self.t2 * 1000
    }

    /// Idle/test-frame interval t3 in milliseconds; `0` disables it.
    pub fn t3_ms(&self) -> u64 {
        self.t3 * 1000
    }

    /// Maximum unacknowledged sent frames.
    pub fn k(&self) -> u16 {
        self.k
    }

    /// Received-unacknowledged threshold that forces an acknowledgment.
    pub fn w(&self) -> u16 {
        self.w
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        // The defaults satisfy every invariant
        Self {
            t0: DEFAULT_T0,
            t1: DEFAULT_T1,
            t2: DEFAULT_T2,
            t3: DEFAULT_T3,
            k: DEFAULT_K,
            w: DEFAULT_W,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConnectionConfig::default();
        let rebuilt = ConnectionConfig::new(
            DEFAULT_T0, DEFAULT_T1, DEFAULT_T2, DEFAULT_T3, DEFAULT_K, DEFAULT_W,
        )
        .unwrap();
        assert_eq!(config, rebuilt);
    }

    #[test]
    fn test_t2_must_be_below_t1() {
        assert!(ConnectionConfig::new(30, 15, 15, 20, 12, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 16, 20, 12, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 14, 20, 12, 8).is_ok());
    }

    #[test]
    fn test_w_must_be_below_k() {
        assert!(ConnectionConfig::new(30, 15, 10, 20, 8, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 10, 20, 8, 12).is_err());
        assert!(ConnectionConfig::new(30, 15, 10, 20, 9, 8).is_ok());
    }

    #[test]
    fn test_t3_zero_disables_keepalive() {
        let config = ConnectionConfig::new(30, 15, 10, 0, 12, 8).unwrap();
        assert_eq!(config.t3_ms(), 0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(ConnectionConfig::new(0, 15, 10, 20, 12, 8).is_err());
        assert!(ConnectionConfig::new(30, 0, 10, 20, 12, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 0, 20, 12, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 10, 10001, 12, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 10, 20, 1001, 8).is_err());
        assert!(ConnectionConfig::new(30, 15, 10, 20, 12, 0).is_err());
        assert!(ConnectionConfig::new(30, 255, 10, 20, 900, 800).is_ok());
    }

    #[test]
    fn test_millisecond_accessors() {
        let config = ConnectionConfig::new(30, 15, 10, 20, 12, 8).unwrap();
        assert_eq!(config.t1_ms(), 15_000);
        assert_eq!(config.t2_ms(), 10_000);
        assert_eq!(config.t3_ms(), 20_000);
        assert_eq!(config.t0(), Duration::from_secs(30));
        assert_eq!(config.k(), 12);
        assert_eq!(config.w(), 8);
    }
}
