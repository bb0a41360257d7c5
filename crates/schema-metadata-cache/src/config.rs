use chrono::{DateTime, Utc};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the cache lifetime in milliseconds
pub const LIFETIME_ENV_VAR: &str = "METADATA_CACHE_LIFETIME_MS";

/// How long fetched data stays valid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheLifetime {
    /// Cached data never expires once populated
    #[default]
    Infinite,
    /// Cached data expires once it is this old
    Bounded(Duration),
}

impl CacheLifetime {
    /// A bounded lifetime of `ms` milliseconds
    pub fn from_millis(ms: u64) -> Self {
        Self::Bounded(Duration::from_millis(ms))
    }

    /// Whether data fetched at `fetched_at` is still valid at `now`.
    ///
    /// A negative age (clock stepped backwards) counts as fresh.
    pub fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Infinite => true,
            Self::Bounded(ttl) => match (now - fetched_at).to_std() {
                Ok(age) => age < *ttl,
                Err(_) => true,
            },
        }
    }
}

impl fmt::Display for CacheLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "infinite"),
            Self::Bounded(ttl) => write!(f, "{}ms", ttl.as_millis()),
        }
    }
}

impl FromStr for CacheLifetime {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inf" | "infinite" | "infinity" | "never" => Ok(Self::Infinite),
            other => other.parse::<u64>().map(Self::from_millis),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub lifetime: CacheLifetime,
}

impl CacheConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lifetime = lookup(LIFETIME_ENV_VAR)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self { lifetime }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.lifetime, CacheLifetime::Infinite);
    }

    #[test]
    fn test_from_lookup() {
        let config = CacheConfig::from_lookup(|key| {
            (key == LIFETIME_ENV_VAR).then(|| "30000".to_string())
        });
        assert_eq!(config.lifetime, CacheLifetime::from_millis(30_000));

        let config = CacheConfig::from_lookup(|_| Some("never".to_string()));
        assert_eq!(config.lifetime, CacheLifetime::Infinite);

        let config = CacheConfig::from_lookup(|_| Some("soon".to_string()));
        assert_eq!(config.lifetime, CacheLifetime::Infinite);

        let config = CacheConfig::from_lookup(|_| None);
        assert_eq!(config.lifetime, CacheLifetime::Infinite);
    }

    #[test]
    fn test_lifetime_parse_and_display() {
        assert_eq!(
            " Infinite ".parse::<CacheLifetime>().unwrap(),
            CacheLifetime::Infinite
        );
        assert_eq!(
            "100".parse::<CacheLifetime>().unwrap(),
            CacheLifetime::from_millis(100)
        );
        assert!("-5".parse::<CacheLifetime>().is_err());

        assert_eq!(CacheLifetime::Infinite.to_string(), "infinite");
        assert_eq!(CacheLifetime::from_millis(250).to_string(), "250ms");
    }

    #[test]
    fn test_bounded_freshness() {
        let lifetime = CacheLifetime::from_millis(100);
        let fetched_at = Utc::now();

        assert!(lifetime.is_fresh(fetched_at, fetched_at));
        assert!(lifetime.is_fresh(fetched_at, fetched_at + TimeDelta::milliseconds(99)));
        assert!(!lifetime.is_fresh(fetched_at, fetched_at + TimeDelta::milliseconds(100)));
        assert!(!lifetime.is_fresh(fetched_at, fetched_at + TimeDelta::days(365)));
    }

    #[test]
    fn test_clock_skew_counts_as_fresh() {
        let lifetime = CacheLifetime::from_millis(100);
        let fetched_at = Utc::now();
        assert!(lifetime.is_fresh(fetched_at, fetched_at - TimeDelta::seconds(5)));
    }

    #[test]
    fn test_extreme_lifetimes_do_not_overflow() {
        let fetched_at = DateTime::<Utc>::MIN_UTC;
        let now = DateTime::<Utc>::MAX_UTC;

        assert!(CacheLifetime::Infinite.is_fresh(fetched_at, now));
        assert!(CacheLifetime::Bounded(Duration::MAX).is_fresh(fetched_at, now));
        assert!(!CacheLifetime::Bounded(Duration::ZERO).is_fresh(fetched_at, now));
    }
}
