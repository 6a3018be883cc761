use std::time::Duration;

/// Smallest interval the poller will ever sleep between reads.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Calculates the delay before poll attempt `attempt` (1-based).
///
/// Formula: base * 2^(attempt-1), capped at max
///
/// # Examples
///
/// With base=1s, max=5s:
/// - Attempt 1: 1s
/// - Attempt 2: 2s
/// - Attempt 3: 4s
/// - Attempt 4+: 5s (capped)
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base = base.max(MIN_INTERVAL);
    let max = max.max(base);

    if attempt == 0 {
        return base;
    }

    let exponent = (attempt - 1).min(31);
    let multiplier = 2u32.saturating_pow(exponent);

    base.checked_mul(multiplier).unwrap_or(max).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(5);

        assert_eq!(calculate_backoff(1, base, max), Duration::from_secs(1));
        assert_eq!(calculate_backoff(2, base, max), Duration::from_secs(2));
        assert_eq!(calculate_backoff(3, base, max), Duration::from_secs(4));
        assert_eq!(calculate_backoff(4, base, max), Duration::from_secs(5)); // capped
        assert_eq!(calculate_backoff(50, base, max), Duration::from_secs(5)); // still capped
    }

    #[test]
    fn test_zero_attempt_uses_base() {
        assert_eq!(
            calculate_backoff(0, Duration::from_millis(200), Duration::from_secs(1)),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_never_busy_loops() {
        assert_eq!(
            calculate_backoff(1, Duration::ZERO, Duration::ZERO),
            MIN_INTERVAL
        );
    }

    #[test]
    fn test_max_below_base_is_raised() {
        let base = Duration::from_millis(500);
        assert_eq!(calculate_backoff(3, base, Duration::from_millis(100)), base);
    }
}
