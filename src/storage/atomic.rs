use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

use likely_stable::LikelyResult;

use super::TimeStorage;

/// Atomic implementation of [`TimeStorage`]
pub struct AtomicStorage(AtomicI64);

impl TimeStorage for AtomicStorage {
    fn new(instant: i64) -> Self {
        Self(AtomicI64::new(instant))
    }

    fn load(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    fn compare_exchange_weak(&self, current: i64, new: i64) -> Result<(), i64> {
        self.0
            .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            .map_likely(|_| ())
    }
}

impl Debug for AtomicStorage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0.load(Ordering::Relaxed), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_exchange_reports_actual_value() {
        let storage = AtomicStorage::new(-10);
        assert_eq!(-10, storage.load());
        assert_eq!(Err(-10), storage.compare_exchange_weak(0, 5));
        // weak exchanges may fail spuriously
        while storage.compare_exchange_weak(-10, 5).is_err() {}
        assert_eq!(5, storage.load());
    }
}
