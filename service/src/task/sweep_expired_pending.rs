//! [`SweepExpiredPending`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start};
use smart_default::SmartDefault;
use tokio::time::{interval, timeout};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Listing;
use crate::{
    command::{self, sweep_expired_pending::ExecutionError as CommandError},
    notify, read, Command, Service,
};

use super::Task;

/// Configuration for [`SweepExpiredPending`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between sweeps.
    #[default(time::Duration::from_secs(30))]
    pub interval: time::Duration,

    /// Maximum duration of a single sweep.
    #[default(time::Duration::from_secs(10))]
    pub timeout: time::Duration,
}

/// [`Task`] for releasing [`Listing`]s whose pending purchase is overdue, and
/// notifying their parties.
#[derive(Clone, Copy, Debug)]
pub struct SweepExpiredPending<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<SweepExpiredPending<Self>, Config>>> for Service<Db>
where
    SweepExpiredPending<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<SweepExpiredPending<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = SweepExpiredPending {
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
                    log::error!("`task::SweepExpiredPending` failed: {e}");
                }
                Err(_) => {
                    log::error!(
                        "`task::SweepExpiredPending` timed out after {:?}",
                        task.config.timeout,
                    );
                }
            }
        }
    }
}

impl<Db> Task<Perform<()>> for SweepExpiredPending<Service<Db>>
where
    Service<Db>: Command<
        command::SweepExpiredPending,
        Ok = Vec<read::listing::Released>,
        Err = Traced<CommandError>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let released = self
            .service
            .execute(command::SweepExpiredPending)
            .await
            .map_err(tracerr::wrap!())?;

        if !released.is_empty() {
            log::info!(
                "`task::SweepExpiredPending` released {} overdue pending \
                 purchase(s)",
                released.len(),
            );
        }
        for r in &released {
            notify::pending_released(self.service.notifier(), r);
        }
        Ok(())
    }
}

/// Error of [`SweepExpiredPending`] execution.
pub type ExecutionError = Traced<CommandError>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Perform, Start},
        Handler as _,
    };

    use crate::{
        command::InitiatePurchase, domain::listing, fixture::Env,
        notify::Event,
    };

    use super::{Config, SweepExpiredPending};

    #[tokio::test]
    async fn notifies_both_parties_of_released_purchase() {
        let mut env = Env::new();
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
        env.advance(Duration::from_secs(6 * 60));
        let task = SweepExpiredPending {
            config: Config::default(),
            service: env.service.clone(),
        };

        task.execute(Perform(())).await.unwrap();
        task.execute(Perform(())).await.unwrap();

        let events = env.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, seller.chat_id);
        assert!(matches!(events[0].1, Event::PendingPurchaseReleased { .. }));
        assert_eq!(events[1].0, buyer.chat_id);
        assert!(matches!(events[1].1, Event::PendingPurchaseExpired { .. }));
        assert_eq!(events[1].1.listing_id(), listing.id);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_periodically() {
        let mut env = Env::new();
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
        env.advance(Duration::from_secs(6 * 60));

        let config = Config::default();
        _ = tokio::time::timeout(
            config.interval + Duration::from_secs(1),
            env.service.execute(Start(
                By::<SweepExpiredPending<_>, _>::new(config),
            )),
        )
        .await
        .unwrap_err();

        assert_eq!(
            env.stored(listing.id).await.status,
            listing::Status::Available,
        );
        assert_eq!(env.drain_events().len(), 2);
    }
}
