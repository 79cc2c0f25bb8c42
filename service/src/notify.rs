//! [`Notifier`] definitions.

use std::fmt;

use derive_more::Display;
use tokio::sync::mpsc;

use crate::{
    domain::{listing, meal, user},
    read,
};

/// Fire-and-forget sink of [`Event`]s addressed to users.
///
/// Only background tasks report to a [`Notifier`]: commands return their
/// outcome to the caller instead.
pub trait Notifier: fmt::Debug + Send + Sync {
    /// Delivers the provided [`Event`] to the provided recipient.
    ///
    /// Delivery failures are the [`Notifier`]'s own business.
    fn notify(&self, recipient: user::ChatId, event: Event);
}

/// Something users should be told about.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Event {
    /// Pending buyer of a seller's [`Listing`] didn't get confirmed in time,
    /// so the [`Listing`] is on sale again.
    ///
    /// [`Listing`]: crate::domain::Listing
    #[display("pending purchase of `Listing(id: {listing_id})` is released")]
    PendingPurchaseReleased {
        /// ID of the released [`Listing`].
        ///
        /// [`Listing`]: crate::domain::Listing
        listing_id: listing::Id,

        /// [`meal::Description`] of the [`Listing`]'s meal, if known.
        ///
        /// [`Listing`]: crate::domain::Listing
        meal: Option<meal::Description>,
    },

    /// Buyer's pending purchase timed out.
    #[display("pending purchase of `Listing(id: {listing_id})` has expired")]
    PendingPurchaseExpired {
        /// ID of the [`Listing`] the purchase was pending for.
        ///
        /// [`Listing`]: crate::domain::Listing
        listing_id: listing::Id,

        /// [`meal::Description`] of the [`Listing`]'s meal, if known.
        ///
        /// [`Listing`]: crate::domain::Listing
        meal: Option<meal::Description>,
    },

    /// [`Listing`] expired along with its meal.
    ///
    /// [`Listing`]: crate::domain::Listing
    #[display("`Listing(id: {listing_id})` has expired")]
    ListingExpired {
        /// ID of the expired [`Listing`].
        ///
        /// [`Listing`]: crate::domain::Listing
        listing_id: listing::Id,

        /// [`meal::Description`] of the [`Listing`]'s meal, if known.
        ///
        /// [`Listing`]: crate::domain::Listing
        meal: Option<meal::Description>,
    },
}

impl Event {
    /// Returns ID of the [`Listing`] this [`Event`] is about.
    ///
    /// [`Listing`]: crate::domain::Listing
    #[must_use]
    pub fn listing_id(&self) -> listing::Id {
        match self {
            Self::PendingPurchaseReleased { listing_id, .. }
            | Self::PendingPurchaseExpired { listing_id, .. }
            | Self::ListingExpired { listing_id, .. } => *listing_id,
        }
    }
}

/// Reports a [`read::listing::Released`] pending purchase to both its seller
/// and its former pending buyer.
pub(crate) fn pending_released(
    notifier: &dyn Notifier,
    released: &read::listing::Released,
) {
    let read::listing::Released {
        listing_id,
        seller,
        pending_buyer,
        meal,
    } = released;

    notifier.notify(
        seller.chat_id,
        Event::PendingPurchaseReleased {
            listing_id: *listing_id,
            meal: meal.clone(),
        },
    );
    if let Some(buyer) = pending_buyer {
        notifier.notify(
            buyer.chat_id,
            Event::PendingPurchaseExpired {
                listing_id: *listing_id,
                meal: meal.clone(),
            },
        );
    }
}

/// Reports an expired [`read::listing::Released`] listing to both its seller
/// and its former pending buyer, if any.
pub(crate) fn listing_expired(
    notifier: &dyn Notifier,
    released: &read::listing::Released,
) {
    let read::listing::Released {
        listing_id,
        seller,
        pending_buyer,
        meal,
    } = released;

    let event = Event::ListingExpired {
        listing_id: *listing_id,
        meal: meal.clone(),
    };
    if let Some(buyer) = pending_buyer {
        notifier.notify(buyer.chat_id, event.clone());
    }
    notifier.notify(seller.chat_id, event);
}

/// [`Notifier`] forwarding [`Event`]s into an [`mpsc`] channel.
///
/// [`Event`]s are dropped once the receiving half is gone.
#[derive(Clone, Debug)]
pub struct Channel(mpsc::UnboundedSender<(user::ChatId, Event)>);

impl Channel {
    /// Creates a new [`Channel`] along with its receiving half.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(user::ChatId, Event)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl Notifier for Channel {
    fn notify(&self, recipient: user::ChatId, event: Event) {
        _ = self.0.send((recipient, event));
    }
}

#[cfg(test)]
mod spec {
    use crate::{domain::user, read};

    use super::{listing_expired, pending_released, Channel, Event};

    fn released(with_buyer: bool) -> read::listing::Released {
        read::listing::Released {
            listing_id: crate::domain::listing::Id::new(),
            seller: read::user::Contact {
                id: user::Id::new(),
                chat_id: user::ChatId::from(1),
            },
            pending_buyer: with_buyer.then(|| read::user::Contact {
                id: user::Id::new(),
                chat_id: user::ChatId::from(2),
            }),
            meal: None,
        }
    }

    #[test]
    fn notifies_seller_and_former_buyer_of_release() {
        let (notifier, mut rx) = Channel::new();
        let r = released(true);

        pending_released(&notifier, &r);

        let (to, event) = rx.try_recv().unwrap();
        assert_eq!(to, user::ChatId::from(1));
        assert!(matches!(event, Event::PendingPurchaseReleased { .. }));
        let (to, event) = rx.try_recv().unwrap();
        assert_eq!(to, user::ChatId::from(2));
        assert!(matches!(event, Event::PendingPurchaseExpired { .. }));
        assert_eq!(event.listing_id(), r.listing_id);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn notifies_only_seller_of_expiry_without_buyer() {
        let (notifier, mut rx) = Channel::new();

        listing_expired(&notifier, &released(false));

        let (to, event) = rx.try_recv().unwrap();
        assert_eq!(to, user::ChatId::from(1));
        assert!(matches!(event, Event::ListingExpired { .. }));
        assert!(rx.try_recv().is_err());
    }
}
