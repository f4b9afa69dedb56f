use std::sync::{Mutex, MutexGuard};

/// Lock a component mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in the engine is a plain in-memory update, so the
/// data behind a poisoned lock is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
