//! In-memory [`Database`] implementation.
//!
//! A transaction holds the whole [`Store`] exclusively from its start until
//! it's committed or dropped, so transactions are fully serialized. Writes of
//! a transaction are staged on a copy of the [`Store`] and become visible only
//! on commit.

mod impls;
mod store;

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use derive_more::{Deref, Display, Error as StdError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use self::store::{Store, MEALS_SLOT_CONSTRAINT, USERS_CHAT_ID_CONSTRAINT};

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default, Deref)]
pub struct Memory<T = NonTx>(T);

/// Non-transactional in-memory [`Database`] client.
#[derive(Clone, Debug, Default)]
pub struct NonTx {
    /// Shared [`Store`].
    store: Arc<AsyncMutex<Store>>,
}

/// Transactional in-memory [`Database`] client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`Staged`] changes, until committed.
    staged: Arc<Mutex<Option<Staged>>>,
}

/// Changes of a [`Tx`] not yet published to the shared [`Store`].
#[derive(Debug)]
struct Staged {
    /// Exclusive access to the shared [`Store`].
    guard: OwnedMutexGuard<Store>,

    /// Copy of the shared [`Store`] the changes are applied to.
    store: Store,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new [`Tx`], waiting for the currently open one to finish.
    pub(crate) async fn begin(&self) -> Memory<Tx> {
        let guard = Arc::clone(&self.0.store).lock_owned().await;
        let store = (*guard).clone();
        Memory(Tx {
            staged: Arc::new(Mutex::new(Some(Staged { guard, store }))),
        })
    }
}

impl Tx {
    /// Publishes the staged changes of this [`Tx`].
    ///
    /// No-op if this [`Tx`] has been committed already.
    pub fn commit(&self) {
        let staged = self
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Staged { mut guard, store }) = staged {
            *guard = store;
        }
    }
}

/// Access to a [`Store`].
pub trait Connection {
    /// Reads the [`Store`] with the provided function.
    ///
    /// # Errors
    ///
    /// If the [`Store`] is not accessible anymore.
    fn read<R>(
        &self,
        f: impl FnOnce(&Store) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;

    /// Modifies the [`Store`] with the provided function.
    ///
    /// # Errors
    ///
    /// If the [`Store`] is not accessible anymore, or the provided function
    /// fails.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut Store) -> Result<R, Error>,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;
}

impl Connection for NonTx {
    async fn read<R>(
        &self,
        f: impl FnOnce(&Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(f(&*self.store.lock().await))
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&mut Store) -> Result<R, Error>,
    ) -> Result<R, Traced<database::Error>> {
        f(&mut *self.store.lock().await)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

impl Connection for Tx {
    async fn read<R>(
        &self,
        f: impl FnOnce(&Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        let staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        staged
            .as_ref()
            .map(|s| f(&s.store))
            .ok_or(Error::TxFinished)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&mut Store) -> Result<R, Error>,
    ) -> Result<R, Traced<database::Error>> {
        let mut staged =
            self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        staged
            .as_mut()
            .ok_or(Error::TxFinished)
            .and_then(|s| f(&mut s.store))
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }
}

/// In-memory database [`Error`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
pub enum Error {
    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),

    /// Foreign key constraint is violated.
    #[display("Foreign key constraint `{_0}` is violated")]
    ForeignKeyViolation(#[error(not(source))] &'static str),

    /// [`Tx`] is used after being committed.
    #[display("Transaction is already finished")]
    TxFinished,
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |n| n == *c),
            Self::ForeignKeyViolation(_) | Self::TxFinished => false,
        }
    }
}
