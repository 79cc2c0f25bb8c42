//! [`Tx`] client definitions.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

use super::NonTx;

/// Transactional Postgres database client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to retrieve the [`Connection`] from.
    pool: connection::Pool,

    /// Inner representation of this client.
    inner: Arc<Inner>,
}

/// Inner representation of the [`Tx`] client.
#[derive(Debug)]
struct Inner {
    /// [`NonTx`] client to initialize the [`connection::Tx`] from, if any.
    non_tx: RwLock<Option<NonTx>>,

    /// Lazily initialized [`connection::Tx`].
    tx: Arc<RwLock<Option<connection::Tx>>>,
}

impl Tx {
    /// Creates a new [`Tx`] client from the provided [`NonTx`] client.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            inner: Arc::new(Inner {
                non_tx: RwLock::new(Some(client)),
                tx: Arc::new(RwLock::new(None)),
            }),
        }
    }

    /// Returns underlying [`Connection`] of this [`Tx`] client.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        let connection = self.inner.tx.read().await;
        let guard = if connection.is_none() {
            drop(connection);

            let mut connection = self.inner.tx.write().await;
            if connection.is_none() {
                // Reuse the connection of the `NonTx` client, if acquired.
                let reused = match self.inner.non_tx.write().await.take() {
                    Some(client) => client.take_connection().await,
                    None => None,
                };
                let conn = match reused {
                    Some(conn) => conn,
                    None => self
                        .pool
                        .get()
                        .await
                        .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                        .map_err(tracerr::map_from)?,
                };

                *connection = Some(
                    connection::Tx::from_non_tx(conn)
                        .await
                        .map_err(tracerr::wrap!())?,
                );
            }

            connection.downgrade()
        } else {
            connection
        };

        Ok(RwLockReadGuard::map(guard, |conn| {
            conn.as_ref()
                .expect("connection cannot be dropped while guard is alive")
        }))
    }

    /// Takes the underlying [`Connection`] from this [`Tx`] client.
    ///
    /// Next time this [`Tx`] client is used, it will initialize a new
    /// [`Connection`].
    async fn take_connection(&self) -> Option<connection::Tx> {
        self.inner.tx.write().await.take()
    }

    /// Commits this [`Tx`] client.
    ///
    /// # Errors
    ///
    /// If failed to commit transaction of this [`Tx`] client.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        // Transaction is never started if nothing has been queried.
        match self.take_connection().await {
            Some(tx) => tx.commit().await.map_err(tracerr::wrap!()),
            None => Ok(()),
        }
    }
}

super::forward_connection!(Tx);
