//! [`Command`] for a seller withdrawing a [`Listing`] from sale.

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

/// [`Command`] for a seller withdrawing a [`Listing`] from sale, which frees
/// its [`listing::Code`] for a new [`Listing`].
#[derive(Clone, Copy, Debug)]
pub struct CancelAvailableBySeller {
    /// ID of the [`Listing`] to withdraw.
    pub listing_id: listing::Id,

    /// ID of the seller of the [`Listing`].
    pub seller_id: user::Id,
}

impl<Db> Command<CancelAvailableBySeller> for Service<Db>
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
        cmd: CancelAvailableBySeller,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelAvailableBySeller {
            listing_id,
            seller_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let (listing, ()) =
            transition(&tx, listing_id, |l| l.withdraw(seller_id, now))
                .await
                .map_err(tracerr::wrap!())?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(listing)
    }
}

/// Error of [`CancelAvailableBySeller`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotFound(#[error(not(source))] listing::Id),

    /// [`Listing`] cannot be withdrawn.
    #[display("Cannot withdraw `Listing`: {_0}")]
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

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{
        command::{Classify as _, ErrorKind, InitiatePurchase},
        domain::listing,
        fixture::Env,
    };

    use super::CancelAvailableBySeller;

    #[tokio::test]
    async fn withdraws_available_listing() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let cancelled = env
            .service
            .execute(CancelAvailableBySeller {
                listing_id: listing.id,
                seller_id: seller.id,
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status, listing::Status::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(env.stored(listing.id).await, cancelled);
    }

    #[tokio::test]
    async fn cannot_withdraw_pending_listing() {
        let env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;
        _ = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: buyer.id,
            })
            .await
            .unwrap();

        let err = env
            .service
            .execute(CancelAvailableBySeller {
                listing_id: listing.id,
                seller_id: seller.id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = env
            .service
            .execute(CancelAvailableBySeller {
                listing_id: listing::Id::new(),
                seller_id: seller.id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
