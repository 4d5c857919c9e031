use std::sync::{Arc, Mutex};

/// Source of wall-clock time, second resolution.
pub trait Clock: Send + Sync {
    fn unix_seconds(&self) -> i64;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Hands out job identifiers derived from ingestion time.
///
/// The first id in a second is the bare decimal timestamp (`"1700000000"`).
/// Later ids in the same second get a counter suffix (`"1700000000-1"`), so a
/// single process never issues the same id twice. If the clock steps back,
/// counting continues on the last second handed out.
pub struct JobIdGenerator {
    clock: Arc<dyn Clock>,
    // (last second issued, ids already issued in that second)
    last: Mutex<(i64, u32)>,
}

impl JobIdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new((i64::MIN, 0)),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn next_id(&self) -> String {
        let now = self.clock.unix_seconds();
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now > last.0 {
            *last = (now, 1);
            return now.to_string();
        }

        let (second, issued) = *last;
        *last = (second, issued + 1);
        format!("{second}-{issued}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn set(&self, secs: i64) {
            self.0.store(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn unix_seconds(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn generator_at(secs: i64) -> (Arc<ManualClock>, JobIdGenerator) {
        let clock = Arc::new(ManualClock(AtomicI64::new(secs)));
        let ids = JobIdGenerator::new(clock.clone());
        (clock, ids)
    }

    #[test]
    fn test_first_id_is_decimal_seconds() {
        let (_, ids) = generator_at(1_700_000_000);
        assert_eq!(ids.next_id(), "1700000000");
    }

    #[test]
    fn test_same_second_gets_suffix() {
        let (_, ids) = generator_at(1_700_000_000);
        assert_eq!(ids.next_id(), "1700000000");
        assert_eq!(ids.next_id(), "1700000000-1");
        assert_eq!(ids.next_id(), "1700000000-2");
    }

    #[test]
    fn test_new_second_resets_counter() {
        let (clock, ids) = generator_at(1_700_000_000);
        ids.next_id();
        ids.next_id();
        clock.set(1_700_000_001);
        assert_eq!(ids.next_id(), "1700000001");
    }

    #[test]
    fn test_clock_stepping_back_never_repeats() {
        let (clock, ids) = generator_at(1_700_000_005);
        assert_eq!(ids.next_id(), "1700000005");
        clock.set(1_700_000_002);
        assert_eq!(ids.next_id(), "1700000005-1");
    }

    #[test]
    fn test_system_clock_is_plausible() {
        // 2023-11-14, well before any build of this crate
        assert!(SystemClock.unix_seconds() > 1_700_000_000);
    }
}
