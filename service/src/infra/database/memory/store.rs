//! In-memory [`Store`] of the marketplace state.

use std::{cmp::Reverse, collections::HashMap};

use common::{pagination, Date};

use crate::{
    domain::{listing, meal, user, Listing, Meal, User},
    read,
};

use super::Error;

/// Name of the constraint keeping [`user::ChatId`]s unique.
pub const USERS_CHAT_ID_CONSTRAINT: &str = "users_chat_id_key";

/// Name of the constraint keeping [`meal::Slot`]s unique.
pub const MEALS_SLOT_CONSTRAINT: &str = "meals_slot_key";

/// Snapshot of all the stored entities.
#[derive(Clone, Debug, Default)]
pub struct Store {
    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Stored [`Meal`]s.
    meals: HashMap<meal::Id, Meal>,

    /// Stored [`Listing`]s.
    listings: HashMap<listing::Id, Listing>,
}

impl Store {
    /// Returns the [`User`] with the provided ID.
    pub(super) fn user(&self, id: user::Id) -> Option<&User> {
        self.users.get(&id)
    }

    /// Returns the [`User`] with the provided [`user::ChatId`].
    pub(super) fn user_by_chat(&self, chat_id: user::ChatId) -> Option<&User> {
        self.users.values().find(|u| u.chat_id == chat_id)
    }

    /// Inserts or replaces the provided [`User`].
    pub(super) fn upsert_user(&mut self, user: User) -> Result<(), Error> {
        let taken = self
            .users
            .values()
            .any(|u| u.chat_id == user.chat_id && u.id != user.id);
        if taken {
            return Err(Error::UniqueViolation(USERS_CHAT_ID_CONSTRAINT));
        }

        _ = self.users.insert(user.id, user);
        Ok(())
    }

    /// Returns the [`Meal`] with the provided ID.
    pub(super) fn meal(&self, id: meal::Id) -> Option<&Meal> {
        self.meals.get(&id)
    }

    /// Returns the [`Meal`] occupying the provided [`meal::Slot`].
    pub(super) fn meal_by_slot(&self, slot: meal::Slot) -> Option<&Meal> {
        self.meals.values().find(|m| m.slot() == slot)
    }

    /// Inserts or replaces the provided [`Meal`].
    pub(super) fn upsert_meal(&mut self, meal: Meal) -> Result<(), Error> {
        let slot = meal.slot();
        let taken = self
            .meals
            .values()
            .any(|m| m.slot() == slot && m.id != meal.id);
        if taken {
            return Err(Error::UniqueViolation(MEALS_SLOT_CONSTRAINT));
        }

        _ = self.meals.insert(meal.id, meal);
        Ok(())
    }

    /// Returns [`Meal`]s served on the provided [`Date`] or later.
    pub(super) fn meals_served_since(&self, date: Date) -> Vec<Meal> {
        let mut meals = self
            .meals
            .values()
            .filter(|m| m.date >= date)
            .cloned()
            .collect::<Vec<_>>();
        meals.sort_by(|a, b| {
            (a.date, a.period.u8(), AsRef::<str>::as_ref(&a.description))
                .cmp(&(b.date, b.period.u8(), AsRef::<str>::as_ref(&b.description)))
        });
        meals
    }

    /// Returns the [`Listing`] with the provided ID.
    pub(super) fn listing(&self, id: listing::Id) -> Option<&Listing> {
        self.listings.get(&id)
    }

    /// Indicates whether the provided [`listing::Code`] is occupied by an
    /// active [`Listing`].
    pub(super) fn code_is_active(&self, code: &listing::Code) -> bool {
        self.listings
            .values()
            .any(|l| &l.code == code && l.status.is_active())
    }

    /// Inserts the provided new [`Listing`].
    pub(super) fn insert_listing(
        &mut self,
        listing: Listing,
    ) -> Result<(), Error> {
        if self.listings.contains_key(&listing.id) {
            return Err(Error::UniqueViolation("listings_pkey"));
        }
        self.check_listing(&listing)?;

        _ = self.listings.insert(listing.id, listing);
        Ok(())
    }

    /// Replaces the provided [`Listing`] if it's still stored in the
    /// [`listing::Expected`] state.
    pub(super) fn update_listing_if(
        &mut self,
        listing: Listing,
        expected: listing::Expected,
    ) -> Result<bool, Error> {
        let matches = self
            .listings
            .get(&listing.id)
            .is_some_and(|stored| expected.matches(stored));
        if !matches {
            return Ok(false);
        }
        self.check_listing(&listing)?;

        _ = self.listings.insert(listing.id, listing);
        Ok(true)
    }

    /// Puts back on sale every pending [`Listing`] overdue at the provided
    /// moment.
    pub(super) fn release_overdue(
        &mut self,
        read::listing::Overdue(at): read::listing::Overdue,
    ) -> Vec<read::listing::Released> {
        let mut released = self
            .listings
            .values_mut()
            .filter_map(|l| {
                let buyer_id = l.release_if_overdue(at)?;
                Some((l.id, l.seller_id, Some(buyer_id), l.meal_id))
            })
            .collect::<Vec<_>>();
        released.sort();

        released
            .into_iter()
            .filter_map(|(id, seller, buyer, meal)| {
                self.released(id, seller, buyer, meal)
            })
            .collect()
    }

    /// Expires every non-terminal [`Listing`] of [`Meal`]s served before the
    /// provided [`Date`].
    pub(super) fn expire_outdated(
        &mut self,
        read::listing::Outdated { before, at }: read::listing::Outdated,
    ) -> Vec<read::listing::Released> {
        let meals = &self.meals;
        let mut expired = self
            .listings
            .values_mut()
            .filter(|l| meals.get(&l.meal_id).is_some_and(|m| m.date < before))
            .filter_map(|l| {
                let buyer_id = l.pending_buyer_id;
                l.expire(at).then_some((l.id, l.seller_id, buyer_id, l.meal_id))
            })
            .collect::<Vec<_>>();
        expired.sort();

        expired
            .into_iter()
            .filter_map(|(id, seller, buyer, meal)| {
                self.released(id, seller, buyer, meal)
            })
            .collect()
    }

    /// Deletes [`Meal`]s served before the provided [`Date`] along with their
    /// [`Listing`]s.
    pub(super) fn purge_before(&mut self, before: Date) -> read::meal::Purged {
        let past = self
            .meals
            .values()
            .filter(|m| m.date < before)
            .map(|m| m.id)
            .collect::<Vec<_>>();

        let listings_before = self.listings.len();
        self.listings.retain(|_, l| !past.contains(&l.meal_id));
        for id in &past {
            _ = self.meals.remove(id);
        }

        read::meal::Purged {
            listings: (listings_before - self.listings.len()) as u64,
            meals: past.len() as u64,
        }
    }

    /// Returns [`read::listing::Details`] of the [`Listing`] with the
    /// provided ID.
    pub(super) fn details(
        &self,
        id: listing::Id,
    ) -> Option<read::listing::Details> {
        let listing = self.listings.get(&id)?;
        Some(read::listing::Details {
            listing: listing.clone(),
            seller: self.users.get(&listing.seller_id)?.clone(),
            meal: self.meals.get(&listing.meal_id)?.clone(),
        })
    }

    /// Returns a [`read::listing::list::Page`] of [`Listing`]s.
    pub(super) fn listings_page(
        &self,
        read::listing::list::Selector { arguments, filter }: read::listing::list::Selector,
    ) -> read::listing::list::Page {
        use read::listing::list::Filter as F;
        use listing::Status as S;

        let mut found = self
            .listings
            .values()
            .filter(|l| match filter {
                F::Available { served_since } => {
                    l.status == S::Available
                        && self
                            .meals
                            .get(&l.meal_id)
                            .is_some_and(|m| m.date >= served_since)
                }
                F::ActiveOf(seller) => {
                    l.seller_id == seller
                        && matches!(l.status, S::Available | S::AwaitingConfirmation)
                }
                F::PurchasedBy(buyer) => {
                    l.status == S::Sold && l.buyer_id == Some(buyer)
                }
                F::SoldBy(seller) => {
                    l.status == S::Sold && l.seller_id == seller
                }
            })
            .collect::<Vec<_>>();
        match filter {
            F::Available { .. } | F::ActiveOf(_) => {
                found.sort_by_key(|l| (Reverse(l.created_at), l.id));
            }
            F::PurchasedBy(_) | F::SoldBy(_) => {
                found.sort_by_key(|l| (Reverse(l.sold_at), l.id));
            }
        }

        let total = found.len() as u64;
        let items = found
            .into_iter()
            .skip(usize::try_from(arguments.offset()).unwrap_or(usize::MAX))
            .take(arguments.limit() as usize)
            .filter_map(|l| self.details(l.id))
            .collect::<Vec<_>>();

        pagination::Page::new(arguments, items, total)
    }

    /// Checks the references and the [`listing::ACTIVE_CODE_CONSTRAINT`] of
    /// the provided [`Listing`].
    fn check_listing(&self, listing: &Listing) -> Result<(), Error> {
        if !self.users.contains_key(&listing.seller_id) {
            return Err(Error::ForeignKeyViolation("listings_seller_id_fkey"));
        }
        if !self.meals.contains_key(&listing.meal_id) {
            return Err(Error::ForeignKeyViolation("listings_meal_id_fkey"));
        }

        let duplicate = listing.status.is_active()
            && self.listings.values().any(|l| {
                l.id != listing.id
                    && l.code == listing.code
                    && l.status.is_active()
            });
        if duplicate {
            return Err(Error::UniqueViolation(
                listing::ACTIVE_CODE_CONSTRAINT,
            ));
        }

        Ok(())
    }

    /// Assembles a [`read::listing::Released`] out of the stored entities.
    ///
    /// [`None`] is returned if the seller is not stored. A pending buyer who
    /// is not stored is omitted.
    fn released(
        &self,
        listing_id: listing::Id,
        seller_id: user::Id,
        pending_buyer_id: Option<user::Id>,
        meal_id: meal::Id,
    ) -> Option<read::listing::Released> {
        let contact =
            |id: user::Id| self.users.get(&id).map(read::user::Contact::from);

        Some(read::listing::Released {
            listing_id,
            seller: contact(seller_id)?,
            pending_buyer: pending_buyer_id.and_then(contact),
            meal: self.meals.get(&meal_id).map(|m| m.description.clone()),
        })
    }
}
