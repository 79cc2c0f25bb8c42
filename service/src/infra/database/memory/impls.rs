//! [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{
        By, Commit, Delete, Insert, Lock, Select, Transact, Update, UpdateIf,
    },
    Date,
};
use tracerr::Traced;

use crate::{
    domain::{listing, meal, user, Listing, Meal, User},
    infra::{database, Database},
    read,
};

use super::{Connection, Memory, NonTx, Tx};

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.begin().await)
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.commit();
        Ok(())
    }
}

impl<C, IDs> Database<Select<By<HashMap<user::Id, User>, IDs>>> for Memory<C>
where
    C: Connection,
    IDs: AsRef<[user::Id]>,
{
    type Ok = HashMap<user::Id, User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<user::Id, User>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        self.read(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|id| s.user(*id).map(|u| (*id, u.clone())))
                .collect()
        })
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<Option<User>, user::Id>>> for Memory<C> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.user(id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<Option<User>, user::ChatId>>>
    for Memory<C>
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::ChatId>>,
    ) -> Result<Self::Ok, Self::Err> {
        let chat_id = by.into_inner();
        self.read(|s| s.user_by_chat(chat_id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Insert<User>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.upsert_user(user))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Update<User>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.upsert_user(user))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<Option<Meal>, meal::Id>>> for Memory<C> {
    type Ok = Option<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Meal>, meal::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.meal(id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<Option<Meal>, meal::Slot>>>
    for Memory<C>
{
    type Ok = Option<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Meal>, meal::Slot>>,
    ) -> Result<Self::Ok, Self::Err> {
        let slot = by.into_inner();
        self.read(|s| s.meal_by_slot(slot).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<Vec<Meal>, read::meal::ServedSince>>>
    for Memory<C>
{
    type Ok = Vec<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Meal>, read::meal::ServedSince>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::meal::ServedSince(date) = by.into_inner();
        self.read(|s| s.meals_served_since(date))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Insert<Meal>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(meal): Insert<Meal>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.upsert_meal(meal))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Update<Meal>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(meal): Update<Meal>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.upsert_meal(meal))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Delete<By<read::meal::Purged, Date>>>
    for Memory<C>
{
    type Ok = read::meal::Purged;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<read::meal::Purged, Date>>,
    ) -> Result<Self::Ok, Self::Err> {
        let before = by.into_inner();
        self.write(|s| Ok(s.purge_before(before)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<Option<Listing>, listing::Id>>>
    for Memory<C>
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.listing(id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Select<By<read::listing::CodeIsActive, listing::Code>>>
    for Memory<C>
{
    type Ok = read::listing::CodeIsActive;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::listing::CodeIsActive, listing::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        self.read(|s| read::listing::CodeIsActive(s.code_is_active(&code)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Insert<Listing>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.insert_listing(listing))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<UpdateIf<Listing, listing::Expected>>
    for Memory<C>
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        UpdateIf(listing, expected): UpdateIf<Listing, listing::Expected>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.update_listing_if(listing, expected))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection>
    Database<Update<By<Vec<read::listing::Released>, read::listing::Overdue>>>
    for Memory<C>
{
    type Ok = Vec<read::listing::Released>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<
            By<Vec<read::listing::Released>, read::listing::Overdue>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let overdue = by.into_inner();
        self.write(|s| Ok(s.release_overdue(overdue)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection>
    Database<Update<By<Vec<read::listing::Released>, read::listing::Outdated>>>
    for Memory<C>
{
    type Ok = Vec<read::listing::Released>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<
            By<Vec<read::listing::Released>, read::listing::Outdated>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let outdated = by.into_inner();
        self.write(|s| Ok(s.expire_outdated(outdated)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C, IDs>
    Database<Select<By<HashMap<listing::Id, read::listing::Details>, IDs>>>
    for Memory<C>
where
    C: Connection,
    IDs: AsRef<[listing::Id]>,
{
    type Ok = HashMap<listing::Id, read::listing::Details>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<HashMap<listing::Id, read::listing::Details>, IDs>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        self.read(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|id| s.details(*id).map(|d| (*id, d)))
                .collect()
        })
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<C: Connection>
    Database<Select<By<Option<read::listing::Details>, listing::Id>>>
    for Memory<C>
{
    type Ok = Option<read::listing::Details>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<read::listing::Details>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.details(id))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection>
    Database<
        Select<
            By<read::listing::list::Page, read::listing::list::Selector>,
        >,
    > for Memory<C>
{
    type Ok = read::listing::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::listing::list::Page, read::listing::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = by.into_inner();
        self.read(|s| s.listings_page(selector))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Locks are no-ops, since a [`Tx`] holds the whole [`Store`] exclusively.
///
/// [`Store`]: super::Store
macro_rules! impl_noop_lock {
    ($($entity:ty => $key:ty),* $(,)?) => {$(
        impl<C: Connection> Database<Lock<By<$entity, $key>>> for Memory<C> {
            type Ok = ();
            type Err = Traced<database::Error>;

            async fn execute(
                &self,
                _: Lock<By<$entity, $key>>,
            ) -> Result<Self::Ok, Self::Err> {
                Ok(())
            }
        }
    )*};
}

impl_noop_lock! {
    User => user::Id,
    User => user::ChatId,
    Meal => meal::Slot,
    Listing => listing::CodeHash,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::UpdateIf, Handler as _};

    use crate::{
        command::{InitiatePurchase, RejectPendingBySeller},
        domain::listing,
        fixture::Env,
    };

    #[tokio::test]
    async fn applies_update_against_current_state() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;

        let mut withdrawn = listing.clone();
        withdrawn
            .withdraw(seller.id, env.service.clock().now())
            .unwrap();
        let applied = env
            .service
            .database()
            .execute(UpdateIf(withdrawn, listing.expected()))
            .await
            .unwrap();

        assert!(applied);
        assert_eq!(
            env.stored(listing.id).await.status,
            listing::Status::Cancelled,
        );
    }

    #[tokio::test]
    async fn refuses_update_against_changed_status() {
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

        let mut withdrawn = listing.clone();
        withdrawn
            .withdraw(seller.id, env.service.clock().now())
            .unwrap();
        let applied = env
            .service
            .database()
            .execute(UpdateIf(withdrawn, listing.expected()))
            .await
            .unwrap();

        assert!(!applied);
        assert_eq!(
            env.stored(listing.id).await.status,
            listing::Status::AwaitingConfirmation,
        );
    }

    #[tokio::test]
    async fn refuses_update_read_before_state_came_back() {
        let env = Env::new();
        let seller = env.trader().await;
        let buyer = env.trader().await;
        let meal = env.meal(None).await;
        let listing = env.listing(&seller, "ABC123", &meal, 20_000).await;
        let purchase = InitiatePurchase {
            listing_id: listing.id,
            buyer_id: buyer.id,
        };
        let stale = env.service.execute(purchase).await.unwrap();

        _ = env
            .service
            .execute(RejectPendingBySeller {
                listing_id: listing.id,
                seller_id: seller.id,
            })
            .await
            .unwrap();
        env.advance(Duration::from_secs(60));
        let current = env.service.execute(purchase).await.unwrap();
        assert_eq!(current.status, stale.status);
        assert_eq!(current.pending_buyer_id, stale.pending_buyer_id);

        let mut claimed = stale.clone();
        assert_eq!(
            claimed.claim_payment(buyer.id, env.service.clock().now()),
            Ok(true),
        );
        let applied = env
            .service
            .database()
            .execute(UpdateIf(claimed, stale.expected()))
            .await
            .unwrap();

        assert!(!applied);
        let stored = env.stored(listing.id).await;
        assert_eq!(stored.pending_until, current.pending_until);
        assert!(stored.rejected_by_seller_at.is_some());
        assert_eq!(stored.payment_claimed_at, None);
    }
}
