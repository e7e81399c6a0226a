//! Single-assignment values produced by one step and consumed by later ones

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stevedore_errors::ExecutionError;

/// Observable state of a deferred cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredState<T> {
    Pending,
    Resolved(T),
}

/// A write-once cell shared between a producing step and its consumers
///
/// Clones share the same cell. Reading while pending and writing twice are
/// both errors; neither blocks.
pub struct DeferredValue<T> {
    name: Arc<str>,
    cell: Arc<Mutex<DeferredState<T>>>,
}

impl<T> Clone for DeferredValue<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> DeferredValue<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            cell: Arc::new(Mutex::new(DeferredState::Pending)),
        }
    }

    /// Name of the producing step, used in error messages
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, DeferredState<T>> {
        // A poisoned cell still holds a consistent state; nothing is written
        // across a panic point.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the value
    ///
    /// # Errors
    ///
    /// Returns `DeferredAlreadyResolved` if a value was already stored.
    pub fn resolve(&self, value: T) -> Result<(), ExecutionError> {
        let mut state = self.lock();
        if matches!(*state, DeferredState::Resolved(_)) {
            return Err(ExecutionError::DeferredAlreadyResolved {
                name: self.name.to_string(),
            });
        }
        *state = DeferredState::Resolved(value);
        Ok(())
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(*self.lock(), DeferredState::Resolved(_))
    }

    /// Whether two handles point at the same cell
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone> DeferredValue<T> {
    /// Read the value
    ///
    /// # Errors
    ///
    /// Returns `DeferredNotResolved` while the producing step has not run.
    pub fn get(&self) -> Result<T, ExecutionError> {
        match &*self.lock() {
            DeferredState::Resolved(value) => Ok(value.clone()),
            DeferredState::Pending => Err(ExecutionError::DeferredNotResolved {
                name: self.name.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> DeferredState<T> {
        self.lock().clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValue")
            .field("name", &self.name)
            .field("state", &*self.lock())
            .finish()
    }
}

/// The deferred values the DSL hands out carry captured command output
pub type Deferred = DeferredValue<String>;
