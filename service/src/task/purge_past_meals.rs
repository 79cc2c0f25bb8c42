//! [`PurgePastMeals`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start};
use smart_default::SmartDefault;
use tokio::time::{interval, timeout};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{Listing, Meal};
use crate::{
    command::{self, purge_past_meals::ExecutionError as CommandError},
    notify, read, Command, Service,
};

use super::Task;

/// Configuration for [`PurgePastMeals`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between purges.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,

    /// Maximum duration of a single purge.
    #[default(time::Duration::from_secs(60))]
    pub timeout: time::Duration,
}

/// [`Task`] for purging [`Meal`]s served before today along with their
/// [`Listing`]s.
///
/// Parties of the [`Listing`]s expired by the purge are notified.
#[derive(Clone, Copy, Debug)]
pub struct PurgePastMeals<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<PurgePastMeals<Self>, Config>>> for Service<Db>
where
    PurgePastMeals<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<PurgePastMeals<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = PurgePastMeals {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match timeout(task.config.timeout, task.execute(Perform(()))).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("`task::PurgePastMeals` failed: {e}");
                }
                Err(_) => {
                    log::error!(
                        "`task::PurgePastMeals` timed out after {:?}",
                        task.config.timeout,
                    );
                }
            }
        }
    }
}

impl<Db> Task<Perform<()>> for PurgePastMeals<Service<Db>>
where
    Service<Db>: Command<
        command::PurgePastMeals,
        Ok = read::meal::PurgeReport,
        Err = Traced<CommandError>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let before = self.service.clock().today();
        let read::meal::PurgeReport { expired, purged } = self
            .service
            .execute(command::PurgePastMeals { before })
            .await
            .map_err(tracerr::wrap!())?;

        if purged.meals > 0 {
            log::info!(
                "`task::PurgePastMeals` purged {} meal(s) served before \
                 {before} with {} listing(s), {} of them expired",
                purged.meals,
                purged.listings,
                expired.len(),
            );
        }
        for r in &expired {
            notify::listing_expired(self.service.notifier(), r);
        }
        Ok(())
    }
}

/// Error of [`PurgePastMeals`] execution.
pub type ExecutionError = Traced<CommandError>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::Perform, Handler as _};

    use crate::{command::InitiatePurchase, fixture::Env, notify::Event};

    use super::{Config, PurgePastMeals};

    #[tokio::test]
    async fn purges_yesterdays_meals_and_notifies() {
        let mut env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let meal = env.meal(None).await;
        let pending = env.listing(&seller, "ABC123", &meal, 20_000).await;
        _ = env
            .service
            .execute(InitiatePurchase {
                listing_id: pending.id,
                buyer_id: buyer.id,
            })
            .await
            .unwrap();
        let task = PurgePastMeals {
            config: Config::default(),
            service: env.service.clone(),
        };

        task.execute(Perform(())).await.unwrap();
        assert!(env.drain_events().is_empty());

        env.advance(Duration::from_secs(24 * 60 * 60));
        task.execute(Perform(())).await.unwrap();

        let events = env.drain_events();
        assert_eq!(
            events,
            [
                (
                    buyer.chat_id,
                    Event::ListingExpired {
                        listing_id: pending.id,
                        meal: Some(meal.description.clone()),
                    },
                ),
                (
                    seller.chat_id,
                    Event::ListingExpired {
                        listing_id: pending.id,
                        meal: Some(meal.description.clone()),
                    },
                ),
            ],
        );
    }
}
