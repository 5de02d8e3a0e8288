//! Wall-clock helpers for wire timestamps
//!
//! The backend stamps everything in epoch milliseconds. Local TTLs (typing
//! indicators) use monotonic `tokio::time::Instant` instead and never touch
//! this module.

use time::OffsetDateTime;

/// Current wall-clock time in epoch milliseconds
pub fn now_unix_ms() -> i64 {
    let now = OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_unix_ms_is_current_era() {
        let now = now_unix_ms();
        // 2023-01-01 .. 2100-01-01, sanity only
        assert!(now > 1_672_531_200_000);
        assert!(now < 4_102_444_800_000);
    }

    #[test]
    fn test_now_unix_ms_is_monotonic_enough() {
        let a = now_unix_ms();
        let b = now_unix_ms();
        assert!(b >= a);
    }
}
