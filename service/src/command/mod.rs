//! [`Command`] definition.

pub mod cancel_available_by_seller;
pub mod cancel_pending_by_buyer;
pub mod confirm_payment_sent;
pub mod create_listing;
pub mod finalize_sale;
pub mod initiate_purchase;
pub mod purge_past_meals;
pub mod register_user;
pub mod reject_pending_by_seller;
pub mod set_user_active;
pub mod set_user_admin;
pub mod sweep_expired_pending;
pub mod update_payment_card;
pub mod upsert_meal;
pub mod verify_user;

use common::operations::{By, Select, UpdateIf};
use derive_more::Display;
use tracerr::Traced;

use crate::{
    domain::{listing, Listing},
    infra::{database, Database},
};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    cancel_available_by_seller::CancelAvailableBySeller,
    cancel_pending_by_buyer::CancelPendingByBuyer,
    confirm_payment_sent::ConfirmPaymentSent, create_listing::CreateListing,
    finalize_sale::FinalizeSale, initiate_purchase::InitiatePurchase,
    purge_past_meals::PurgePastMeals, register_user::RegisterUser,
    reject_pending_by_seller::RejectPendingBySeller,
    set_user_active::SetUserActive, set_user_admin::SetUserAdmin,
    sweep_expired_pending::SweepExpiredPending,
    update_payment_card::UpdatePaymentCard, upsert_meal::UpsertMeal,
    verify_user::VerifyUser,
};

/// Kind of a [`Command`] failure, telling the caller how to react.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Referred entity doesn't exist.
    #[display("not found")]
    NotFound,

    /// Operation is attempted from a wrong [`listing::Status`].
    #[display("invalid state")]
    InvalidState,

    /// Caller is not the party the operation requires.
    #[display("unauthorized")]
    Unauthorized,

    /// Operation would break a business constraint.
    #[display("constraint violation")]
    ConstraintViolation,

    /// Storage failed, so the operation may be retried.
    ///
    /// The operation must not be assumed as applied.
    #[display("storage failure")]
    StorageFailure,
}

/// [`ErrorKind`] classification of an error.
pub trait Classify {
    /// Returns the [`ErrorKind`] of this error.
    fn kind(&self) -> ErrorKind;
}

impl<E: Classify> Classify for Traced<E> {
    fn kind(&self) -> ErrorKind {
        self.as_ref().kind()
    }
}

impl Classify for database::Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::StorageFailure
    }
}

impl Classify for listing::Rejection {
    fn kind(&self) -> ErrorKind {
        use listing::Rejection as R;

        match self {
            R::WrongStatus(_) => ErrorKind::InvalidState,
            R::NotSeller | R::NotPendingBuyer => ErrorKind::Unauthorized,
            R::SelfPurchase | R::PendingBuyerMissing => {
                ErrorKind::ConstraintViolation
            }
        }
    }
}

/// Error of a [`Command`] transitioning an existing [`Listing`].
pub trait TransitionError:
    From<database::Error> + From<listing::Rejection>
{
    /// Creates a new error of the [`Listing`] with the provided ID being
    /// absent.
    fn listing_not_found(id: listing::Id) -> Self;
}

/// Applies the provided transition to the stored [`Listing`], writing it
/// only if the [`Listing`] is still in the state the transition started from.
///
/// If the [`Listing`] has been changed concurrently in the meantime, the
/// transition is re-checked against its current state, so the caller gets the
/// [`listing::Rejection`] describing the current state, falling back to
/// [`listing::Rejection::WrongStatus`].
async fn transition<Tx, E, R>(
    tx: &Tx,
    id: listing::Id,
    apply: impl Fn(&mut Listing) -> Result<R, listing::Rejection>,
) -> Result<(Listing, R), Traced<E>>
where
    Tx: Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            UpdateIf<Listing, listing::Expected>,
            Ok = bool,
            Err = Traced<database::Error>,
        >,
    E: TransitionError,
{
    let stored = tx
        .execute(Select(By::<Option<Listing>, _>::new(id)))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?
        .ok_or_else(|| E::listing_not_found(id))
        .map_err(tracerr::wrap!())?;

    let mut listing = stored.clone();
    let out = apply(&mut listing)
        .map_err(E::from)
        .map_err(tracerr::wrap!())?;
    if listing == stored {
        return Ok((listing, out));
    }

    let applied = tx
        .execute(UpdateIf(listing.clone(), stored.expected()))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?;
    if applied {
        return Ok((listing, out));
    }

    let mut current = tx
        .execute(Select(By::<Option<Listing>, _>::new(id)))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?
        .ok_or_else(|| E::listing_not_found(id))
        .map_err(tracerr::wrap!())?;
    let status = current.status;
    let rejection = apply(&mut current)
        .err()
        .unwrap_or(listing::Rejection::WrongStatus(status));
    Err(tracerr::new!(E::from(rejection)))
}

#[cfg(test)]
mod spec {
    use std::{
        sync::{Mutex, PoisonError},
        time::Duration,
    };

    use common::operations::{By, Select, UpdateIf};
    use tracerr::Traced;

    use crate::{
        domain::{listing, Listing},
        fixture::Env,
        infra::{database, Database, Memory},
    };

    use super::{
        initiate_purchase, transition, CancelPendingByBuyer, Classify as _,
        ErrorKind, FinalizeSale, InitiatePurchase,
    };

    /// [`Memory`] database letting a rival write land right before the next
    /// conditional update.
    #[derive(Debug)]
    struct Raced {
        /// Underlying [`Memory`] database.
        db: Memory,

        /// Rival write to be applied.
        rival: Mutex<Option<(Listing, listing::Expected)>>,
    }

    impl Database<Select<By<Option<Listing>, listing::Id>>> for Raced {
        type Ok = Option<Listing>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            op: Select<By<Option<Listing>, listing::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            self.db.execute(op).await
        }
    }

    impl Database<UpdateIf<Listing, listing::Expected>> for Raced {
        type Ok = bool;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            op: UpdateIf<Listing, listing::Expected>,
        ) -> Result<Self::Ok, Self::Err> {
            let rival = self
                .rival
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some((listing, expected)) = rival {
                assert!(self.db.execute(UpdateIf(listing, expected)).await?);
            }
            self.db.execute(op).await
        }
    }

    #[tokio::test]
    async fn loser_of_race_is_told_current_state() {
        let env = Env::new();
        let seller = env.trader().await;
        let winner = env.trader().await;
        let loser = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;
        let now = env.service.clock().now();
        let until = (now + Duration::from_secs(5 * 60)).coerce();

        let mut rival = listing.clone();
        rival.reserve(winner.id, until, now).unwrap();
        let raced = Raced {
            db: env.service.database().clone(),
            rival: Mutex::new(Some((rival, listing.expected()))),
        };

        let err: Traced<initiate_purchase::ExecutionError> =
            transition(&raced, listing.id, |l| l.reserve(loser.id, until, now))
                .await
                .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            initiate_purchase::ExecutionError::Rejected(
                listing::Rejection::WrongStatus(
                    listing::Status::AwaitingConfirmation,
                ),
            ),
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let stored = env.stored(listing.id).await;
        assert_eq!(stored.pending_buyer_id, Some(winner.id));
    }

    #[tokio::test]
    async fn stale_claim_is_refused_after_state_came_back() {
        let env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let stranger = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;
        let now = env.service.clock().now();
        let until = (now + Duration::from_secs(5 * 60)).coerce();

        let mut pending = listing.clone();
        pending.reserve(buyer.id, until, now).unwrap();
        assert!(env
            .service
            .database()
            .execute(UpdateIf(pending.clone(), listing.expected()))
            .await
            .unwrap());

        // Between reading and writing, the purchase is rejected and a
        // stranger takes the listing.
        let mut rival = pending.clone();
        rival.reject_pending(seller.id, now).unwrap();
        rival.reserve(stranger.id, until, now).unwrap();
        let raced = Raced {
            db: env.service.database().clone(),
            rival: Mutex::new(Some((rival, pending.expected()))),
        };

        let err: Traced<initiate_purchase::ExecutionError> =
            transition(&raced, listing.id, |l| l.claim_payment(buyer.id, now))
                .await
                .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            initiate_purchase::ExecutionError::Rejected(
                listing::Rejection::NotPendingBuyer,
            ),
        ));
        let stored = env.stored(listing.id).await;
        assert_eq!(stored.pending_buyer_id, Some(stranger.id));
        assert_eq!(stored.payment_claimed_at, None);
        assert!(stored.rejected_by_seller_at.is_some());
    }

    #[tokio::test]
    async fn listing_changes_hands_after_first_buyer_backs_out() {
        let env = Env::new();
        let seller = env.trader().await;
        let first = env.trader().await;
        let second = env.trader().await;
        let meal = env.meal(Some(25_000)).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;
        assert_eq!(listing.status, listing::Status::Available);

        let pending = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: first.id,
            })
            .await
            .unwrap();
        assert_eq!(pending.status, listing::Status::AwaitingConfirmation);
        assert_eq!(pending.pending_buyer_id, Some(first.id));
        assert_eq!(
            pending.pending_until.map(|t| t.coerce()),
            Some(env.service.clock().now() + Duration::from_secs(5 * 60)),
        );

        let err = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: second.id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let available = env
            .service
            .execute(CancelPendingByBuyer {
                listing_id: listing.id,
                buyer_id: first.id,
            })
            .await
            .unwrap();
        assert_eq!(available.status, listing::Status::Available);
        assert_eq!(available.pending_buyer_id, None);

        let pending = env
            .service
            .execute(InitiatePurchase {
                listing_id: listing.id,
                buyer_id: second.id,
            })
            .await
            .unwrap();
        assert_eq!(pending.pending_buyer_id, Some(second.id));

        let (sold, code) = env
            .service
            .execute(FinalizeSale {
                listing_id: listing.id,
                seller_id: seller.id,
            })
            .await
            .unwrap();
        assert_eq!(sold.status, listing::Status::Sold);
        assert_eq!(sold.buyer_id, Some(second.id));
        assert_eq!(code, listing::Code::new("ABC123").unwrap());
    }
}
