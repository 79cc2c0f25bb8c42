//! [`Command`] for committing to buy a [`Listing`].

use common::operations::{
    By, Commit, Select, Transact, Transacted, UpdateIf,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, user, Listing, User},
    infra::{database, Database},
    Service,
};

use super::{transition, Classify, Command, ErrorKind, TransitionError};

/// [`Command`] for committing to buy a [`Listing`].
///
/// Puts the [`Listing`] on hold for the buyer until the configured pending
/// timeout elapses.
#[derive(Clone, Copy, Debug)]
pub struct InitiatePurchase {
    /// ID of the [`Listing`] to buy.
    pub listing_id: listing::Id,

    /// ID of the [`User`] buying the [`Listing`].
    pub buyer_id: user::Id,
}

impl<Db> Command<InitiatePurchase> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
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
        cmd: InitiatePurchase,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InitiatePurchase {
            listing_id,
            buyer_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let buyer = tx
            .execute(Select(By::<Option<User>, _>::new(buyer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BuyerNotExists(buyer_id))
            .map_err(tracerr::wrap!())?;
        if !buyer.can_buy() {
            return Err(tracerr::new!(E::BuyerNotEligible(buyer_id)));
        }

        let now = self.clock().now();
        let until = (now + self.config().pending_timeout).coerce();
        let (listing, ()) = transition(&tx, listing_id, |l| {
            l.reserve(buyer_id, until, now)
        })
        .await
        .map_err(tracerr::wrap!())?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(listing)
    }
}

/// Error of [`InitiatePurchase`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Buyer is not allowed to buy.
    #[display("`User(id: {_0})` is not eligible to buy")]
    #[from(ignore)]
    BuyerNotEligible(#[error(not(source))] user::Id),

    /// Buyer doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    BuyerNotExists(#[error(not(source))] user::Id),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotFound(#[error(not(source))] listing::Id),

    /// [`Listing`] cannot be bought.
    ///
    /// [`listing::Rejection::WrongStatus`] means the [`Listing`] is not
    /// available anymore.
    #[display("Cannot buy `Listing`: {_0}")]
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
            Self::Rejected(r) => r.kind(),
            Self::BuyerNotExists(_) | Self::ListingNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::BuyerNotEligible(_) => ErrorKind::Unauthorized,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::Handler as _;

    use crate::{
        command::{Classify as _, ErrorKind},
        domain::{listing, user},
        fixture::Env,
    };

    use super::{ExecutionError, InitiatePurchase};

    #[tokio::test]
    async fn puts_listing_on_hold_for_buyer() {
        let env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let pending = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: buyer.id,
            })
            .await
            .unwrap();

        assert_eq!(pending.status, listing::Status::AwaitingConfirmation);
        assert_eq!(pending.pending_buyer_id, Some(buyer.id));
        assert_eq!(pending.buyer_id, None);
        assert_eq!(
            pending.pending_until.map(|t| t.coerce()),
            Some(env.service.clock().now() + Duration::from_secs(5 * 60)),
        );
        assert!(pending.is_consistent());
        assert_eq!(env.stored(listing.id).await, pending);
    }

    #[tokio::test]
    async fn only_one_of_racing_buyers_wins() {
        let env = Env::new();
        let seller = env.trader().await;
        let first = env.trader().await;
        let second = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let (a, b) = tokio::join!(
            env.service.execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: first.id,
            }),
            env.service.execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: second.id,
            }),
        );

        let (winner, loser) = match (a, b) {
            (Ok(_), Err(e)) => (first.id, e),
            (Err(e), Ok(_)) => (second.id, e),
            (a, b) => panic!("exactly one must win: {a:?}, {b:?}"),
        };
        assert!(matches!(
            loser.as_ref(),
            ExecutionError::Rejected(listing::Rejection::WrongStatus(
                listing::Status::AwaitingConfirmation
            )),
        ));
        assert_eq!(loser.kind(), ErrorKind::InvalidState);
        let stored = env.stored(listing.id).await;
        assert_eq!(stored.pending_buyer_id, Some(winner));
    }

    #[tokio::test]
    async fn forbids_self_purchase() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let err = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: seller.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Rejected(listing::Rejection::SelfPurchase),
        ));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(
            env.stored(listing.id).await.status,
            listing::Status::Available,
        );
    }

    #[tokio::test]
    async fn requires_eligible_buyer() {
        let env = Env::new();
        let seller = env.trader().await;
        let unverified = env.user(|_| {}).await;
        let inactive = env
            .user(|u| {
                u.is_verified = true;
                u.is_active = false;
            })
            .await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        for buyer in [&unverified, &inactive] {
            let err = env
                .service
                .execute(InitiatePurchase {
                    listing_id: listing.id,
                    buyer_id: buyer.id,
                })
                .await
                .unwrap_err();

            assert!(matches!(
                err.as_ref(),
                ExecutionError::BuyerNotEligible(_),
            ));
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
    }

    #[tokio::test]
    async fn reports_missing_listing() {
        let env = Env::new();
        let buyer = env.trader().await;

        let err = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing::Id::new(),
                buyer_id: buyer.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::ListingNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing::Id::new(),
                buyer_id: user::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::BuyerNotExists(_)));
    }
}
