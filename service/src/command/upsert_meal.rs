//! [`Command`] for adding a [`Meal`] to the catalog or refreshing it.

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted, Update},
    Date, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{meal, Meal},
    infra::{database, Database},
    Service,
};

use super::{Classify, Command, ErrorKind};

/// [`Command`] for adding a [`Meal`] to the catalog or refreshing it.
///
/// [`Meal`]s are identified by their [`meal::Slot`], so an existing [`Meal`]
/// with the same [`Date`] and [`meal::Description`] gets its
/// [`meal::Period`] and prices updated.
#[derive(Clone, Debug)]
pub struct UpsertMeal {
    /// [`Date`] the [`Meal`] is served on.
    pub date: Date,

    /// [`meal::Period`] of the day the [`Meal`] is served in.
    pub period: meal::Period,

    /// [`meal::Description`] of the [`Meal`].
    pub description: meal::Description,

    /// Canonical price of the [`Meal`].
    pub price: Money,

    /// Maximum resale price of the [`Meal`], if limited.
    pub price_ceiling: Option<Money>,
}

impl<Db> Command<UpsertMeal> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Meal, meal::Slot>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Meal>, meal::Slot>>,
            Ok = Option<Meal>,
            Err = Traced<database::Error>,
        > + Database<Insert<Meal>, Ok = (), Err = Traced<database::Error>>
        + Database<Update<Meal>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Meal;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UpsertMeal) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpsertMeal {
            date,
            period,
            description,
            price,
            price_ceiling,
        } = cmd;

        for p in Some(price).into_iter().chain(price_ceiling) {
            if !p.is_positive() {
                return Err(tracerr::new!(E::InvalidPrice(p)));
            }
        }

        let slot = meal::Slot::new(date, &description);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent upserts of the same `Meal`.
        tx.execute(Lock(By::<Meal, _>::new(slot)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let existing = tx
            .execute(Select(By::<Option<Meal>, _>::new(slot)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let meal = if let Some(mut meal) = existing {
            if meal.period == period
                && meal.price == price
                && meal.price_ceiling == price_ceiling
            {
                return Ok(meal);
            }
            meal.period = period;
            meal.price = price;
            meal.price_ceiling = price_ceiling;
            tx.execute(Update(meal.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            meal
        } else {
            let meal = Meal {
                id: meal::Id::new(),
                date,
                period,
                description,
                price,
                price_ceiling,
            };
            tx.execute(Insert(meal.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            meal
        };

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(meal)
    }
}

/// Error of [`UpsertMeal`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Price or price ceiling is not positive.
    #[display("`{_0}` is not a valid price")]
    #[from(ignore)]
    InvalidPrice(#[error(not(source))] Money),
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
            Self::InvalidPrice(_) => ErrorKind::ConstraintViolation,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{Handler as _, Money};

    use crate::{
        command::{Classify as _, ErrorKind},
        domain::meal,
        fixture::Env,
    };

    use super::{ExecutionError, UpsertMeal};

    fn cmd(env: &Env, description: &str, ceiling: Option<u32>) -> UpsertMeal {
        UpsertMeal {
            date: env.today(),
            period: meal::Period::Lunch,
            description: meal::Description::new(description).unwrap(),
            price: Money::from(15_000),
            price_ceiling: ceiling.map(Money::from),
        }
    }

    #[tokio::test]
    async fn updates_meal_in_same_slot() {
        let env = Env::new();
        let created = env
            .service
            .execute(cmd(&env, "Chelow kabab", None))
            .await
            .unwrap();

        let updated = env
            .service
            .execute(UpsertMeal {
                period: meal::Period::Dinner,
                ..cmd(&env, "Chelow kabab", Some(30_000))
            })
            .await
            .unwrap();
        let other = env
            .service
            .execute(cmd(&env, "Ghormeh sabzi", None))
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.period, meal::Period::Dinner);
        assert_eq!(updated.price_ceiling, Some(Money::from(30_000)));
        assert_ne!(other.id, created.id);
    }

    #[tokio::test]
    async fn rejects_non_positive_ceiling() {
        let env = Env::new();

        let err = env
            .service
            .execute(cmd(&env, "Chelow kabab", Some(0)))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidPrice(_)));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }
}
