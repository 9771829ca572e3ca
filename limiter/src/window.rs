//! Fixed-window arithmetic shared by every counter store.
//!
//! A counter resets entirely once the current time passes the window
//! boundary; it never decays continuously. Bursts straddling a
//! boundary can momentarily exceed the nominal rate, which is the
//! accepted tradeoff of the fixed-window strategy. The SQL
//! `rate_limit_hit` function mirrors this predicate exactly so both
//! stores reset at the same boundary given the same clock.

/// True once the window that ends at `reset_at_ms` has passed.
/// Strictly after: a hit landing exactly on the boundary still counts
/// against the old window.
pub fn window_expired(reset_at_ms: i64, now_ms: i64) -> bool {
    now_ms > reset_at_ms
}

/// Seconds a limited caller should wait, rounded up.
pub fn retry_after_secs(reset_at_ms: i64, now_ms: i64) -> i64 {
    ((reset_at_ms - now_ms).max(0) + 999) / 1000
}
