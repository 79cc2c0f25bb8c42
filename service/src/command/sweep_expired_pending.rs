//! [`Command`] for releasing overdue pending purchases.

use common::operations::{By, Commit, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    read, Service,
};
#[cfg(doc)]
use crate::domain::{listing, Listing};

use super::{Classify, Command, ErrorKind};

/// [`Command`] for putting every [`listing::Status::AwaitingConfirmation`]
/// [`Listing`] whose pending deadline has passed back on sale.
///
/// Returns the released [`Listing`]s, so the affected parties may be notified.
/// Running it again right away releases nothing.
#[derive(Clone, Copy, Debug)]
pub struct SweepExpiredPending;

impl<Db> Command<SweepExpiredPending> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<By<Vec<read::listing::Released>, read::listing::Overdue>>,
            Ok = Vec<read::listing::Released>,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Vec<read::listing::Released>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        _: SweepExpiredPending,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let overdue = read::listing::Overdue(self.clock().now());
        let released = tx
            .execute(Update(By::new(overdue)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(released)
    }
}

/// Error of [`SweepExpiredPending`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
        }
    }
}
