use std::cmp::max;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since UNIX_EPOCH.
pub fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Source of strictly increasing publish version markers.
///
/// Versions are wall-clock milliseconds, so a newer publish always resolves
/// as "latest". Two requests within the same millisecond, a clock that went
/// backwards, or a recorded version from the future all fall back to
/// `last + 1`.
#[derive(Debug)]
pub struct VersionClock {
    last: Mutex<Option<u64>>,
    now: fn() -> u64,
}

impl VersionClock {
    /// A clock that never goes below `floor + 1`.
    ///
    /// Pass the highest version already recorded so versions also keep
    /// increasing across runs.
    pub fn new(floor: Option<u64>) -> Self {
        Self::with_source(floor, now_millis)
    }

    pub(crate) fn with_source(floor: Option<u64>, now: fn() -> u64) -> Self {
        Self {
            last: Mutex::new(floor),
            now,
        }
    }

    /// The next version marker.
    pub fn next(&self) -> u64 {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = (self.now)();
        let version = match *last {
            Some(previous) => max(now, previous.saturating_add(1)),
            None => now,
        };
        *last = Some(version);
        version
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn frozen() -> u64 {
        1_000
    }

    #[test]
    fn test_versions_follow_wall_clock() {
        let before = now_millis();
        let version = VersionClock::new(None).next();
        assert!(version >= before);
        assert!(version <= now_millis());
    }

    #[test]
    fn test_same_millisecond_breaks_tie() {
        let clock = VersionClock::with_source(None, frozen);
        assert_eq!(clock.next(), 1_000);
        assert_eq!(clock.next(), 1_001);
        assert_eq!(clock.next(), 1_002);
    }

    #[test]
    fn test_recorded_future_version_is_respected() {
        let clock = VersionClock::with_source(Some(5_000), frozen);
        assert_eq!(clock.next(), 5_001);
    }

    #[test]
    fn test_older_recorded_version_uses_clock() {
        let clock = VersionClock::with_source(Some(10), frozen);
        assert_eq!(clock.next(), 1_000);
    }

    proptest! {
        #[test]
        fn versions_strictly_increase(floor in proptest::option::of(0u64..2_000), calls in 1usize..50) {
            let clock = VersionClock::with_source(floor, frozen);
            let mut previous = floor;
            for _ in 0..calls {
                let version = clock.next();
                if let Some(previous) = previous {
                    prop_assert!(version > previous);
                }
                previous = Some(version);
            }
        }
    }
}
