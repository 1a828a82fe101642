//! Scheduling constants and retry backoff policy.

/// Cadence of the periodic background pass in seconds.
pub const SYNC_PERIODIC_INTERVAL_SECS: u64 = 300;

/// Maximum jitter (seconds) added to periodic pass intervals.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 15;

/// Queued mutations older than this are purged and reported as expired.
pub const MUTATION_RETENTION_DAYS: i64 = 7;

/// Default retry budget for a queued mutation.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Base delay unit for the exponential retry backoff.
pub const BASE_BACKOFF_SECS: i64 = 5;

/// Exponential backoff in seconds with cap: 5s doubled per retry, exponent
/// capped at 8 (1280s ceiling).
pub fn backoff_seconds(retry_count: i32) -> i64 {
    backoff_with_base(BASE_BACKOFF_SECS, retry_count)
}

/// Backoff with an explicit base delay unit.
pub fn backoff_with_base(base_secs: i64, retry_count: i32) -> i64 {
    const MAX_EXPONENT: i32 = 8;

    let capped = retry_count.clamp(0, MAX_EXPONENT) as u32;
    base_secs.saturating_mul(2_i64.pow(capped))
}
