//! [`Command`] for purging [`Meal`]s served in the past.

use common::{
    operations::{By, Commit, Delete, Transact, Transacted, Update},
    Date,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{Listing, Meal};
use crate::{
    infra::{database, Database},
    read, Service,
};

use super::{Classify, Command, ErrorKind};

/// [`Command`] for purging [`Meal`]s served before the provided [`Date`]
/// along with all their [`Listing`]s.
///
/// Non-terminal [`Listing`]s are expired first, so their parties may be
/// notified via the returned [`read::meal::PurgeReport`].
#[derive(Clone, Copy, Debug)]
pub struct PurgePastMeals {
    /// [`Date`] before which [`Meal`]s are purged.
    pub before: Date,
}

impl<Db> Command<PurgePastMeals> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<By<Vec<read::listing::Released>, read::listing::Outdated>>,
            Ok = Vec<read::listing::Released>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<read::meal::Purged, Date>>,
            Ok = read::meal::Purged,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = read::meal::PurgeReport;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: PurgePastMeals,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let PurgePastMeals { before } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let expired = tx
            .execute(Update(By::new(read::listing::Outdated {
                before,
                at: self.clock().now(),
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let purged = tx
            .execute(Delete(By::<read::meal::Purged, _>::new(before)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(read::meal::PurgeReport { expired, purged })
    }
}

/// Error of [`PurgePastMeals`] [`Command`] execution.
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

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::By, Handler as _};

    use crate::{
        command::{FinalizeSale, InitiatePurchase},
        domain::{meal, Meal},
        fixture::Env,
        query::DatabaseQuery,
        read,
    };

    use super::PurgePastMeals;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn purges_past_meals_with_their_listings() {
        let env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let past = env.meal(None).await;
        let tomorrow = env.today().next().unwrap();
        let upcoming = env.meal_on(tomorrow, "Ghormeh sabzi", None).await;
        let available = env.listing(&seller, "ABC123", &past, 20_000).await;
        let pending = env.listing(&seller, "DEF456", &past, 20_000).await;
        let sold = env.listing(&seller, "GHI789", &past, 20_000).await;
        let kept = env.listing(&seller, "JKL012", &upcoming, 20_000).await;
        for id in [pending.id, sold.id] {
            _ = env
                .service
                .execute(InitiatePurchase {
                    listing_id: id,
                    buyer_id: buyer.id,
                })
                .await
                .unwrap();
        }
        _ = env
            .service
            .execute(FinalizeSale {
                listing_id: sold.id,
                seller_id: seller.id,
            })
            .await
            .unwrap();
        env.advance(DAY);

        let report = env
            .service
            .execute(PurgePastMeals {
                before: env.today(),
            })
            .await
            .unwrap();

        let mut expired = report
            .expired
            .iter()
            .map(|r| (r.listing_id, r.pending_buyer.map(|b| b.id)))
            .collect::<Vec<_>>();
        expired.sort();
        let mut expected =
            vec![(available.id, None), (pending.id, Some(buyer.id))];
        expected.sort();
        assert_eq!(expired, expected);
        assert_eq!(
            report.purged,
            read::meal::Purged {
                listings: 3,
                meals: 1,
            },
        );

        assert_eq!(env.stored(kept.id).await, kept);
        let gone = env
            .service
            .execute(DatabaseQuery::<By<Option<Meal>, meal::Id>>::by(past.id))
            .await
            .unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn keeps_todays_meals() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let report = env
            .service
            .execute(PurgePastMeals {
                before: env.today(),
            })
            .await
            .unwrap();

        assert!(report.expired.is_empty());
        assert_eq!(report.purged, read::meal::Purged::default());
        assert_eq!(env.stored(listing.id).await, listing);
    }
}
