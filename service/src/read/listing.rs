//! [`Listing`] read model definitions.

use common::{Date, DateTime};
use derive_more::Deref;

use crate::domain::{listing, meal, Listing, Meal, User};

use super::user::Contact;

/// [`Listing`] along with its seller and [`Meal`].
#[derive(Clone, Debug)]
pub struct Details {
    /// The [`Listing`] itself.
    pub listing: Listing,

    /// [`User`] selling the [`Listing`].
    pub seller: User,

    /// [`Meal`] the [`Listing`] is for.
    pub meal: Meal,
}

/// [`Listing`] taken off its pending buyer or off sale by the system.
///
/// Carries everything needed to notify the affected parties.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Released {
    /// ID of the [`Listing`].
    pub listing_id: listing::Id,

    /// Seller of the [`Listing`].
    pub seller: Contact,

    /// Former pending buyer of the [`Listing`], if there was one.
    pub pending_buyer: Option<Contact>,

    /// [`meal::Description`] of the [`Listing`]'s [`Meal`], if it's still
    /// known.
    pub meal: Option<meal::Description>,
}

/// Selector of [`listing::Status::AwaitingConfirmation`] [`Listing`]s whose
/// pending deadline has passed at the provided moment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Overdue(pub DateTime);

/// Selector of non-terminal [`Listing`]s of [`Meal`]s served before the
/// provided [`Date`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Outdated {
    /// [`Date`] before which [`Meal`]s are outdated.
    pub before: Date,

    /// Moment the [`Listing`]s expire at.
    pub at: DateTime,
}

/// Indicator whether a [`listing::Code`] is occupied by an active [`Listing`].
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct CodeIsActive(pub bool);

impl PartialEq<bool> for CodeIsActive {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}

pub mod list {
    //! [`Listing`] list definitions.
    //!
    //! [`Listing`]: crate::domain::Listing

    use common::{pagination, Date};

    use crate::domain::user;
    #[cfg(doc)]
    use crate::domain::{listing::Status, Listing, Meal};

    use super::Details;

    /// Page of [`Details`].
    pub type Page = pagination::Page<Details>;

    /// Arguments for selecting a [`Page`].
    pub type Arguments = pagination::Arguments;

    /// [`Page`] selector.
    pub type Selector = pagination::Selector<Filter>;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Filter {
        /// [`Status::Available`] [`Listing`]s of [`Meal`]s served on the
        /// provided [`Date`] or later, newest first.
        Available {
            /// Earliest [`Date`] of a [`Meal`] to be served.
            served_since: Date,
        },

        /// [`Status::Available`] and [`Status::AwaitingConfirmation`]
        /// [`Listing`]s of the provided seller, newest first.
        ActiveOf(user::Id),

        /// [`Status::Sold`] [`Listing`]s bought by the provided user, most
        /// recently sold first.
        PurchasedBy(user::Id),

        /// [`Status::Sold`] [`Listing`]s sold by the provided user, most
        /// recently sold first.
        SoldBy(user::Id),
    }
}
