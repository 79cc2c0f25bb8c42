//! [`Command`] for a seller turning down a pending buyer.

use common::operations::{
    By, Commit, Select, Transact, Transacted, UpdateIf,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, user, Listing},
    infra::{database, Database},
    Service,
};

use super::{transition, Classify, Command, ErrorKind, TransitionError};

/// [`Command`] for a seller turning down a pending buyer (e.g. because no
/// payment has arrived), putting the [`Listing`] back on sale.
#[derive(Clone, Copy, Debug)]
pub struct RejectPendingBySeller {
    /// ID of the [`Listing`] the purchase is pending for.
    pub listing_id: listing::Id,

    /// ID of the seller of the [`Listing`].
    pub seller_id: user::Id,
}

impl<Db> Command<RejectPendingBySeller> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            UpdateIf<Listing, listing::Expected>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RejectPendingBySeller,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectPendingBySeller {
            listing_id,
            seller_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let (listing, ()) = transition(&tx, listing_id, |l| {
            l.reject_pending(seller_id, now)
        })
        .await
        .map_err(tracerr::wrap!())?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(listing)
    }
}

/// Error of [`RejectPendingBySeller`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotFound(#[error(not(source))] listing::Id),

    /// Pending buyer cannot be rejected.
    #[display("Cannot reject pending buyer: {_0}")]
    Rejected(listing::Rejection),
}

impl TransitionError for ExecutionError {
    fn listing_not_found(id: listing::Id) -> Self {
        Self::ListingNotFound(id)
    }
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
            Self::ListingNotFound(_) => ErrorKind::NotFound,
            Self::Rejected(r) => r.kind(),
        }
    }
}
