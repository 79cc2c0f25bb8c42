//! [`Clock`] abstractions.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::{Date, DateTime};

/// Source of the current UTC time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current [`DateTime`].
    fn now(&self) -> DateTime;

    /// Returns the current UTC [`Date`].
    fn today(&self) -> Date {
        self.now().date()
    }
}

/// [`Clock`] reading the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct System;

impl Clock for System {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// [`Clock`] standing still until moved explicitly.
#[derive(Debug)]
pub struct Manual(Mutex<DateTime>);

impl Manual {
    /// Creates a new [`Manual`] clock showing the provided [`DateTime`].
    #[must_use]
    pub fn new(now: DateTime) -> Self {
        Self(Mutex::new(now))
    }

    /// Moves this [`Manual`] clock forward by the provided [`Duration`].
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }

    /// Sets this [`Manual`] clock to the provided [`DateTime`].
    pub fn set(&self, to: DateTime) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for Manual {
    fn default() -> Self {
        Self::new(DateTime::now())
    }
}

impl Clock for Manual {
    fn now(&self) -> DateTime {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
