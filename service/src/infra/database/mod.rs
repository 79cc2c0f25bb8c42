//! [`Database`]-related implementations.

#[cfg(any(test, feature = "memory"))]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

#[cfg(any(test, feature = "memory"))]
pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Memory`] error.
    #[cfg(any(test, feature = "memory"))]
    Memory(memory::Error),

    /// [`Postgres`] error.
    #[cfg(feature = "postgres")]
    Postgres(postgres::Error),
}

impl Error {
    /// Checks if this [`Error`] is a unique violation of the specified
    /// constraint (or of any constraint, if [`None`]).
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match *self {
            #[cfg(any(test, feature = "memory"))]
            Self::Memory(ref e) => e.is_unique_violation(constraint),
            #[cfg(feature = "postgres")]
            Self::Postgres(ref e) => e.is_unique_violation(constraint),
        }
    }
}
