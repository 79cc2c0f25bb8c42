//! [`Command`] for a pending buyer backing out of a purchase.

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

/// [`Command`] for a pending buyer backing out of a purchase, putting the
/// [`Listing`] back on sale.
#[derive(Clone, Copy, Debug)]
pub struct CancelPendingByBuyer {
    /// ID of the [`Listing`] the purchase is pending for.
    pub listing_id: listing::Id,

    /// ID of the pending buyer of the [`Listing`].
    pub buyer_id: user::Id,
}

impl<Db> Command<CancelPendingByBuyer> for Service<Db>
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
        cmd: CancelPendingByBuyer,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelPendingByBuyer {
            listing_id,
            buyer_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let (listing, ()) = transition(&tx, listing_id, |l| {
            l.cancel_pending(buyer_id, now)
        })
        .await
        .map_err(tracerr::wrap!())?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(listing)
    }
}

/// Error of [`CancelPendingByBuyer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotFound(#[error(not(source))] listing::Id),

    /// Pending purchase cannot be cancelled.
    #[display("Cannot cancel pending purchase: {_0}")]
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

    use super::CancelPendingByBuyer;

    #[tokio::test]
    async fn puts_listing_back_on_sale() {
        let env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let other = env.trader().await;
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

        let cancelled = env
            .service
            .execute(CancelPendingByBuyer {
                listing_id: listing.id,
                buyer_id: buyer.id,
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status, listing::Status::Available);
        assert_eq!(cancelled.pending_buyer_id, None);
        assert!(cancelled.cancelled_by_buyer_at.is_some());
        assert!(cancelled.is_consistent());

        let pending = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: other.id,
            })
            .await
            .unwrap();
        assert_eq!(pending.pending_buyer_id, Some(other.id));
    }

    #[tokio::test]
    async fn only_pending_buyer_may_cancel() {
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
            .execute(CancelPendingByBuyer {
                listing_id: listing.id,
                buyer_id: seller.id,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            env.stored(listing.id).await.pending_buyer_id,
            Some(buyer.id),
        );
    }
}
