//! [`Command`] for a seller confirming the payment of a pending purchase.

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

/// [`Command`] for a seller confirming the payment of a pending purchase,
/// selling the [`Listing`] to its pending buyer.
///
/// Returns the sold [`Listing`] along with its [`listing::Code`], which is
/// revealed to the buyer only now.
#[derive(Clone, Copy, Debug)]
pub struct FinalizeSale {
    /// ID of the [`Listing`] being sold.
    pub listing_id: listing::Id,

    /// ID of the seller of the [`Listing`].
    pub seller_id: user::Id,
}

impl<Db> Command<FinalizeSale> for Service<Db>
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
    type Ok = (Listing, listing::Code);
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: FinalizeSale) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let FinalizeSale {
            listing_id,
            seller_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let (listing, _) =
            transition(&tx, listing_id, |l| l.finalize(seller_id, now))
                .await
                .map_err(tracerr::wrap!())?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let code = listing.code.clone();
        Ok((listing, code))
    }
}

/// Error of [`FinalizeSale`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotFound(#[error(not(source))] listing::Id),

    /// [`Listing`] cannot be sold.
    #[display("Cannot finalize sale: {_0}")]
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
