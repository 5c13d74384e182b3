//! Single-value register shared between concurrent pipeline runs.

use std::sync::{Mutex, PoisonError};

/// Holds the most recent value together with the run sequence number that produced it.
///
/// Publishing is last-writer-wins among runs, but a value from an older run
/// than the one already stored is discarded, so a slow run can never roll the
/// state back.
#[derive(Debug)]
pub struct LatestSlot<T> {
    inner: Mutex<Option<(u64, T)>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestSlot<T> {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` produced by run `version`.
    ///
    /// Returns `false` when a newer run already published.
    pub fn publish(&self, version: u64, value: T) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some((stored, _)) if *stored > version => {
                log::debug!("Discarding result of run {version}, run {stored} already published");
                false
            }
            _ => {
                *guard = Some((version, value));
                true
            }
        }
    }

    /// Clone of the current value
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, value)| value.clone())
    }

    /// Run sequence number of the current value
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(version, _)| *version)
    }
}
