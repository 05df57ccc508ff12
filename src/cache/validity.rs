use chrono::{DateTime, Duration, Utc};

use super::SnapshotMetadata;

/// TTL check: a snapshot is fresh while `now - cached_at < ttl`.
///
/// The comparison is strict — a snapshot exactly `ttl` old is already stale.
/// Clock skew that puts `cached_at` in the future counts as fresh; the age
/// is simply negative.
pub fn is_fresh(metadata: &SnapshotMetadata, ttl: Duration, now: DateTime<Utc>) -> bool {
    now - metadata.cached_at < ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(cached_at: DateTime<Utc>) -> SnapshotMetadata {
        SnapshotMetadata {
            cached_at,
            last_update_timestamp: cached_at,
            version: "1".to_string(),
        }
    }

    #[test]
    fn test_fresh_within_ttl() {
        let now = Utc::now();
        let meta = metadata(now - Duration::days(29));
        assert!(is_fresh(&meta, Duration::days(30), now));
    }

    #[test]
    fn test_stale_past_ttl() {
        let now = Utc::now();
        let meta = metadata(now - Duration::days(31));
        assert!(!is_fresh(&meta, Duration::days(30), now));
    }

    #[test]
    fn test_exactly_ttl_old_is_stale() {
        let now = Utc::now();
        let meta = metadata(now - Duration::days(30));
        assert!(!is_fresh(&meta, Duration::days(30), now));
    }

    #[test]
    fn test_future_cached_at_is_fresh() {
        let now = Utc::now();
        let meta = metadata(now + Duration::minutes(5));
        assert!(is_fresh(&meta, Duration::days(30), now));
    }

    #[test]
    fn test_age_ttl_relation_holds_across_values() {
        let now = Utc::now();
        for age_secs in [0i64, 1, 59, 3600, 86_400, 2_591_999, 2_592_000] {
            let ttl = Duration::seconds(2_592_000); // 30 days
            let meta = metadata(now - Duration::seconds(age_secs));
            assert_eq!(
                is_fresh(&meta, ttl, now),
                age_secs < 2_592_000,
                "age {} secs",
                age_secs
            );
        }
    }
}
