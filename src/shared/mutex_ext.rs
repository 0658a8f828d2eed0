//! Usage: Poison-tolerant locking for the small std mutexes in Tauri state (overlay, poller, hotkeys).

use std::sync::{Mutex, MutexGuard};

pub(crate) trait MutexExt<T> {
    /// Locks, clearing the poison flag if a previous holder panicked; the inner value is kept.
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;

    /// Runs `f` with the lock held.
    fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    mutex_type = std::any::type_name::<T>(),
                    file = loc.file(),
                    line = loc.line(),
                    "lock poisoned by a panicked holder; continuing with its last state"
                );
                // Logged once per poisoning, later lockers see a healthy mutex.
                self.clear_poison();
                poisoned.into_inner()
            }
        }
    }

    #[track_caller]
    fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        let mut guard = self.lock_or_recover();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn with_lock_returns_closure_value() {
        let m = Mutex::new(vec![1, 2]);
        let len = m.with_lock(|v| {
            v.push(3);
            v.len()
        });
        assert_eq!(len, 3);
    }

    #[test]
    fn poisoned_lock_keeps_value_and_is_healed() {
        let m = Arc::new(Mutex::new(String::from("before")));
        let m2 = Arc::clone(&m);
        let _ = std::thread::spawn(move || {
            let mut guard = m2.lock().expect("lock");
            guard.push_str("-panic");
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());

        assert_eq!(*m.lock_or_recover(), "before-panic");
        assert!(!m.is_poisoned());
    }
}
