//! [`Meal`] read model definitions.
//!
//! [`Meal`]: crate::domain::Meal

use common::Date;

use super::listing::Released;

/// Selector of [`Meal`]s served on the provided [`Date`] or later.
///
/// [`Meal`]: crate::domain::Meal
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ServedSince(pub Date);

/// Numbers of entities purged along with past [`Meal`]s.
///
/// [`Meal`]: crate::domain::Meal
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Purged {
    /// Number of deleted [`Listing`]s.
    ///
    /// [`Listing`]: crate::domain::Listing
    pub listings: u64,

    /// Number of deleted [`Meal`]s.
    ///
    /// [`Meal`]: crate::domain::Meal
    pub meals: u64,
}

/// Outcome of purging past [`Meal`]s.
///
/// [`Meal`]: crate::domain::Meal
#[derive(Clone, Debug, Default)]
pub struct PurgeReport {
    /// [`Listing`]s forced to expire before being purged.
    ///
    /// [`Listing`]: crate::domain::Listing
    pub expired: Vec<Released>,

    /// Numbers of purged entities.
    pub purged: Purged,
}
