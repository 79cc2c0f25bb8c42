//! [`Command`] for a pending buyer claiming to have paid for a [`Listing`].

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

/// [`Command`] for a pending buyer claiming to have paid for a [`Listing`].
///
/// Repeated claims are no-ops.
#[derive(Clone, Copy, Debug)]
pub struct ConfirmPaymentSent {
    /// ID of the [`Listing`] being paid for.
    pub listing_id: listing::Id,

    /// ID of the pending buyer of the [`Listing`].
    pub buyer_id: user::Id,
}

impl<Db> Command<ConfirmPaymentSent> for Service<Db>
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
        cmd: ConfirmPaymentSent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmPaymentSent {
            listing_id,
            buyer_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let (listing, _) = transition(&tx, listing_id, |l| {
            l.claim_payment(buyer_id, now)
        })
        .await
        .map_err(tracerr::wrap!())?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(listing)
    }
}

/// Error of [`ConfirmPaymentSent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotFound(#[error(not(source))] listing::Id),

    /// Payment cannot be claimed for the [`Listing`].
    #[display("Cannot claim payment: {_0}")]
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
