//! [`Command`] for putting a reservation [`listing::Code`] up for sale.

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, meal, user, Listing, Meal, User},
    infra::{database, Database},
    read, Service,
};

use super::{Classify, Command, ErrorKind};

/// [`Command`] for putting a reservation [`listing::Code`] up for sale.
#[derive(Clone, Debug)]
pub struct CreateListing {
    /// ID of the [`User`] selling the [`listing::Code`].
    pub seller_id: user::Id,

    /// Reservation [`listing::Code`] being sold.
    pub code: listing::Code,

    /// ID of the [`Meal`] the [`listing::Code`] is reserved for.
    pub meal_id: meal::Id,

    /// Asking price.
    pub price: Money,
}

impl<Db> Command<CreateListing> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::CodeHash>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Meal>, meal::Id>>,
            Ok = Option<Meal>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::listing::CodeIsActive, listing::Code>>,
            Ok = read::listing::CodeIsActive,
            Err = Traced<database::Error>,
        > + Database<Insert<Listing>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateListing) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateListing {
            seller_id,
            code,
            meal_id,
            price,
        } = cmd;

        if !price.is_positive() {
            return Err(tracerr::new!(E::InvalidPrice(price)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent listings of the same `listing::Code`.
        tx.execute(Lock(By::new(listing::CodeHash::new(&code))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let seller = tx
            .execute(Select(By::<Option<User>, _>::new(seller_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SellerNotExists(seller_id))
            .map_err(tracerr::wrap!())?;
        if !seller.can_sell() {
            return Err(tracerr::new!(E::SellerNotEligible(seller_id)));
        }

        let meal = tx
            .execute(Select(By::<Option<Meal>, _>::new(meal_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::MealNotFound(meal_id))
            .map_err(tracerr::wrap!())?;
        if let Some(ceiling) = meal.price_ceiling {
            if !meal.allows_price(price) {
                return Err(tracerr::new!(E::PriceExceedsLimit {
                    price,
                    ceiling
                }));
            }
        }

        let active = tx
            .execute(Select(By::<read::listing::CodeIsActive, _>::new(
                code.clone(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if *active {
            return Err(tracerr::new!(E::DuplicateCode(code)));
        }

        let listing = Listing::new(
            seller_id,
            code.clone(),
            meal_id,
            price,
            self.clock().now(),
        );
        // Concurrent listing of the same code may slip past the check above.
        let inserted = tx.execute(Insert(listing.clone())).await;
        if inserted.as_ref().is_err_and(|e| {
            e.as_ref()
                .is_unique_violation(Some(listing::ACTIVE_CODE_CONSTRAINT))
        }) {
            return Err(tracerr::new!(E::DuplicateCode(code)));
        }
        inserted.map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(listing)
    }
}

/// Error of [`CreateListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Reservation [`listing::Code`] is already occupied by an active
    /// [`Listing`].
    #[display("`{_0}` reservation code is already listed")]
    #[from(ignore)]
    DuplicateCode(#[error(not(source))] listing::Code),

    /// Asking price is not positive.
    #[display("`{_0}` is not a valid price")]
    #[from(ignore)]
    InvalidPrice(#[error(not(source))] Money),

    /// [`Meal`] doesn't exist.
    #[display("`Meal(id: {_0})` does not exist")]
    #[from(ignore)]
    MealNotFound(#[error(not(source))] meal::Id),

    /// Asking price is above the [`Meal`]'s price ceiling.
    #[display("`{price}` exceeds the price ceiling of `{ceiling}`")]
    #[from(ignore)]
    PriceExceedsLimit {
        /// Asking price.
        price: Money,

        /// Price ceiling of the [`Meal`].
        ceiling: Money,
    },

    /// Seller is not allowed to sell.
    #[display("`User(id: {_0})` is not eligible to sell")]
    #[from(ignore)]
    SellerNotEligible(#[error(not(source))] user::Id),

    /// Seller doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    SellerNotExists(#[error(not(source))] user::Id),
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
            Self::MealNotFound(_) | Self::SellerNotExists(_) => {
                ErrorKind::NotFound
            }
            Self::SellerNotEligible(_) => ErrorKind::Unauthorized,
            Self::DuplicateCode(_)
            | Self::InvalidPrice(_)
            | Self::PriceExceedsLimit { .. } => ErrorKind::ConstraintViolation,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{Handler as _, Money};

    use crate::{
        command::{Classify as _, ErrorKind},
        domain::{listing, meal},
        fixture::Env,
    };

    use super::{CreateListing, ExecutionError};

    fn cmd(
        seller: &crate::domain::User,
        code: &str,
        meal: meal::Id,
        price: u32,
    ) -> CreateListing {
        CreateListing {
            seller_id: seller.id,
            code: listing::Code::new(code).unwrap(),
            meal_id: meal,
            price: Money::from(price),
        }
    }

    #[tokio::test]
    async fn lists_code_as_available() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(Some(25_000)).await;

        let listing = env
            .service
            .execute(cmd(&seller, "ABC123", meal.id, 20_000))
            .await
            .unwrap();

        assert_eq!(listing.status, listing::Status::Available);
        assert_eq!(listing.seller_id, seller.id);
        assert!(listing.is_consistent());
        assert_eq!(env.stored(listing.id).await, listing);
    }

    #[tokio::test]
    async fn enforces_price_ceiling_inclusively() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(Some(25_000)).await;

        let err = env
            .service
            .execute(cmd(&seller, "ABC123", meal.id, 25_001))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PriceExceedsLimit { .. },
        ));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        _ = env
            .service
            .execute(cmd(&seller, "ABC123", meal.id, 25_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_active_duplicate_code() {
        let env = Env::new();
        let seller = env.trader().await;
        let other = env.trader().await;
        let meal = env.meal(None).await;
        _ = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let err = env
            .service
            .execute(cmd(&other, "ABC123", meal.id, 18_000))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::DuplicateCode(_)));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[tokio::test]
    async fn allows_relisting_cancelled_code() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;
        let first = env.listing(&seller, "ABC123", &meal, 20_000).await;
        _ = env
            .service
            .execute(crate::command::CancelAvailableBySeller {
                listing_id: first.id,
                seller_id: seller.id,
            })
            .await
            .unwrap();

        let second = env
            .service
            .execute(cmd(&seller, "ABC123", meal.id, 19_000))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn requires_eligible_seller() {
        let env = Env::new();
        let unverified = env.user(|_| {}).await;
        let without_card = env.user(|u| u.is_verified = true).await;
        let meal = env.meal(None).await;

        for seller in [&unverified, &without_card] {
            let err = env
                .service
                .execute(cmd(seller, "ABC123", meal.id, 20_000))
                .await
                .unwrap_err();

            assert!(matches!(
                err.as_ref(),
                ExecutionError::SellerNotEligible(_),
            ));
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
    }

    #[tokio::test]
    async fn rejects_non_positive_price() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;

        let err = env
            .service
            .execute(cmd(&seller, "ABC123", meal.id, 0))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidPrice(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_meal() {
        let env = Env::new();
        let seller = env.trader().await;

        let err = env
            .service
            .execute(cmd(&seller, "ABC123", meal::Id::new(), 20_000))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::MealNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
