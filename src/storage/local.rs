use std::cell::Cell;

use super::TimeStorage;

/// Non atomic implementation of [`TimeStorage`]. This is intended for
/// single threaded scenarios and uses [`Cell`] internally.
#[derive(Debug)]
pub struct LocalStorage(Cell<i64>);

impl TimeStorage for LocalStorage {
    fn new(instant: i64) -> Self {
        Self(Cell::new(instant))
    }

    fn load(&self) -> i64 {
        self.0.get()
    }

    fn compare_exchange_weak(&self, current: i64, new: i64) -> Result<(), i64> {
        let actual = self.0.get();
        if actual != current {
            return Err(actual);
        }
        self.0.set(new);
        Ok(())
    }
}
