//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
#[cfg(test)]
mod fixture;
pub mod infra;
pub mod notify;
pub mod query;
pub mod read;
pub mod task;

use std::{error::Error, sync::Arc, time};

use common::{
    operations::{By, Start},
    Clock,
};
use smart_default::SmartDefault;

use crate::domain::{listing, user};
#[cfg(doc)]
use crate::{domain::Listing, infra::Database};

pub use self::{
    command::Command, notify::Notifier, query::Query, task::Task,
};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Duration a pending buyer has to get confirmed by the seller before the
    /// [`Listing`] is released back on sale.
    #[default(listing::DEFAULT_PENDING_TIMEOUT)]
    pub pending_timeout: time::Duration,

    /// [`user::verification::Policy`] applied to verified users.
    pub verification: user::verification::Policy,

    /// [`task::SweepExpiredPending`] configuration.
    pub sweep_expired_pending: task::sweep_expired_pending::Config,

    /// [`task::PurgePastMeals`] configuration.
    pub purge_past_meals: task::purge_past_meals::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Clock`] telling the current time to this [`Service`].
    clock: Arc<dyn Clock>,

    /// [`Notifier`] background tasks of this [`Service`] report to.
    notifier: Arc<dyn Notifier>,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters, along with the
    /// [`task::Background`] running its periodic [`Task`]s.
    pub fn new(
        config: Config,
        database: Db,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::SweepExpiredPending<Self>,
                        task::sweep_expired_pending::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Task<
                Start<
                    By<
                        task::PurgePastMeals<Self>,
                        task::purge_past_meals::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Self::without_tasks(config, database, clock, notifier);

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("sweep_expired_pending", async move {
            svc.execute(Start(By::<task::SweepExpiredPending<_>, _>::new(
                svc.config().sweep_expired_pending,
            )))
            .await
        });
        let svc = this.clone();
        bg.spawn("purge_past_meals", async move {
            svc.execute(Start(By::<task::PurgePastMeals<_>, _>::new(
                svc.config().purge_past_meals,
            )))
            .await
        });

        (this, bg)
    }

    /// Creates a new [`Service`] with the provided parameters, without
    /// running any periodic [`Task`]s.
    #[must_use]
    pub fn without_tasks(
        config: Config,
        database: Db,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            database,
            clock,
            notifier,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Clock`] of this [`Service`].
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &dyn Notifier {
        &*self.notifier
    }
}
