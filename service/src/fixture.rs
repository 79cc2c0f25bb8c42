//! Environment for testing the [`Service`] against the [`Memory`] database.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use common::{clock, operations::By, Date, DateTime, Handler as _, Money};
use tokio::sync::mpsc;

use crate::{
    command,
    domain::{listing, meal, user, Listing, Meal, User},
    infra::Memory,
    notify,
    query::DatabaseQuery,
    Config, Service,
};

/// Moment the [`Env::clock`] starts at: 2024-03-10T12:00:00Z.
const START: i64 = 1_710_072_000;

/// [`Service`] along with the means of driving and observing it.
#[derive(Debug)]
pub(crate) struct Env {
    /// [`Service`] under test.
    pub(crate) service: Service<Memory>,

    /// [`clock::Manual`] of the [`Env::service`].
    pub(crate) clock: Arc<clock::Manual>,

    /// [`notify::Event`]s reported by the [`Env::service`].
    pub(crate) events: mpsc::UnboundedReceiver<(user::ChatId, notify::Event)>,

    /// Counter of chat IDs given to new [`User`]s.
    chats: AtomicI64,
}

impl Env {
    /// Creates a new [`Env`] with the default [`Config`].
    pub(crate) fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a new [`Env`] with the provided [`Config`].
    pub(crate) fn with_config(config: Config) -> Self {
        let clock = Arc::new(clock::Manual::new(
            DateTime::from_unix_timestamp(START).unwrap(),
        ));
        let (notifier, events) = notify::Channel::new();
        let service = Service::without_tasks(
            config,
            Memory::new(),
            clock.clone(),
            Arc::new(notifier),
        );
        Self {
            service,
            clock,
            events,
            chats: AtomicI64::new(100),
        }
    }

    /// Returns the current [`Date`] of the [`Env::clock`].
    pub(crate) fn today(&self) -> Date {
        self.service.clock().today()
    }

    /// Moves the [`Env::clock`] forward.
    pub(crate) fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Registers a new [`User`] eligible to both sell and buy.
    pub(crate) async fn trader(&self) -> User {
        self.user(|u| {
            u.is_verified = true;
            u.payment_card = Some(
                user::PaymentCard::new("6037 9911 2233 4455").unwrap(),
            );
        })
        .await
    }

    /// Registers a new unverified [`User`] adjusted by the provided function.
    pub(crate) async fn user(&self, adjust: impl FnOnce(&mut User)) -> User {
        let chat_id = self.chats.fetch_add(1, Ordering::Relaxed);
        let user = self
            .service
            .execute(command::RegisterUser {
                chat_id: user::ChatId::from(chat_id),
                username: None,
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();

        let mut adjusted = user.clone();
        adjust(&mut adjusted);
        self.service
            .database()
            .execute(common::operations::Update(adjusted.clone()))
            .await
            .unwrap();
        adjusted
    }

    /// Upserts a [`Meal`] served today with the provided price ceiling.
    pub(crate) async fn meal(&self, ceiling: Option<u32>) -> Meal {
        self.meal_on(self.today(), "Chelow kabab", ceiling).await
    }

    /// Upserts a [`Meal`] served on the provided [`Date`].
    pub(crate) async fn meal_on(
        &self,
        date: Date,
        description: &str,
        ceiling: Option<u32>,
    ) -> Meal {
        self.service
            .execute(command::UpsertMeal {
                date,
                period: meal::Period::Lunch,
                description: meal::Description::new(description).unwrap(),
                price: Money::from(15_000),
                price_ceiling: ceiling.map(Money::from),
            })
            .await
            .unwrap()
    }

    /// Lists the provided reservation code of the provided [`Meal`] on behalf
    /// of the provided seller.
    pub(crate) async fn listing(
        &self,
        seller: &User,
        code: &str,
        meal: &Meal,
        price: u32,
    ) -> Listing {
        self.service
            .execute(command::CreateListing {
                seller_id: seller.id,
                code: listing::Code::new(code).unwrap(),
                meal_id: meal.id,
                price: Money::from(price),
            })
            .await
            .unwrap()
    }

    /// Returns the stored state of the [`Listing`] with the provided ID.
    pub(crate) async fn stored(&self, id: listing::Id) -> Listing {
        self.service
            .execute(DatabaseQuery::<By<Option<Listing>, _>>::by(id))
            .await
            .unwrap()
            .unwrap()
    }

    /// Drains the reported [`notify::Event`]s.
    pub(crate) fn drain_events(&mut self) -> Vec<(user::ChatId, notify::Event)> {
        let mut events = vec![];
        while let Ok(ev) = self.events.try_recv() {
            events.push(ev);
        }
        events
    }
}
