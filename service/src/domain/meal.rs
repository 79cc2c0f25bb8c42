//! [`Meal`] definitions.

use common::{define_kind, Date, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3;

/// Catalog entry of one orderable food item on one [`Date`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Meal {
    /// ID of this [`Meal`].
    pub id: Id,

    /// [`Date`] this [`Meal`] is served on.
    pub date: Date,

    /// [`Period`] of the day this [`Meal`] is served in.
    pub period: Period,

    /// [`Description`] of this [`Meal`].
    pub description: Description,

    /// Canonical price of this [`Meal`].
    pub price: Money,

    /// Maximum resale price of this [`Meal`], if limited.
    pub price_ceiling: Option<Money>,
}

impl Meal {
    /// Indicates whether this [`Meal`] may be resold for the provided `price`.
    #[must_use]
    pub fn allows_price(&self, price: Money) -> bool {
        self.price_ceiling.map_or(true, |ceiling| price <= ceiling)
    }

    /// Returns the [`Slot`] occupied by this [`Meal`].
    #[must_use]
    pub fn slot(&self) -> Slot {
        Slot::new(self.date, &self.description)
    }
}

/// ID of a [`Meal`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Description (food name) of a [`Meal`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Description(String);

impl Description {
    /// Creates a new [`Description`] if the given `text` is valid.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        Self::check(&text).then_some(Self(text))
    }

    /// Checks whether the given `text` is a valid [`Description`].
    fn check(text: impl AsRef<str>) -> bool {
        let text = text.as_ref();
        text.trim() == text && !text.is_empty() && text.chars().count() <= 512
    }
}

impl FromStr for Description {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Description`")
    }
}

define_kind! {
    #[doc = "Period of a day a [`Meal`] is served in."]
    enum Period {
        #[doc = "Morning meal."]
        Breakfast = 1,

        #[doc = "Midday meal."]
        Lunch = 2,

        #[doc = "Evening meal."]
        Dinner = 3,
    }
}

/// Unique key of a [`Meal`] in the catalog: its [`Date`] and [`Description`].
///
/// Used to serialize concurrent upserts of the same [`Meal`].
#[derive(
    Clone, Copy, Debug, Display, Eq, From, Hash, Into, PartialEq,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Slot(Uuid);

impl Slot {
    /// Calculates the [`Slot`] of a [`Meal`].
    #[must_use]
    pub fn new(date: Date, description: &Description) -> Self {
        use std::hash::Hash as _;

        // WARNING: Changing the hashed fields or their order invalidates the
        //          locks held by running instances.
        let mut hasher = xxh3::Xxh3Builder::new().build();
        date.hash(&mut hasher);
        description.hash(&mut hasher);

        Self(Uuid::from_u128(hasher.digest128()))
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{Date, Money};

    use super::{Description, Id, Meal, Period, Slot};

    fn meal(ceiling: Option<u32>) -> Meal {
        Meal {
            id: Id::new(),
            date: Date::from_ymd(2024, 5, 1).unwrap(),
            period: Period::Lunch,
            description: Description::new("Kebab").unwrap(),
            price: Money::from(20_000),
            price_ceiling: ceiling.map(Money::from),
        }
    }

    #[test]
    fn price_ceiling_is_inclusive() {
        let limited = meal(Some(25_000));
        assert!(limited.allows_price(Money::from(25_000)));
        assert!(!limited.allows_price(Money::from(25_001)));

        assert!(meal(None).allows_price(Money::from(1_000_000)));
    }

    #[test]
    fn slot_depends_on_date_and_description() {
        let m = meal(None);
        let same = Meal {
            id: Id::new(),
            ..meal(Some(1))
        };
        assert_eq!(m.slot(), same.slot());

        let other_day = Slot::new(
            Date::from_ymd(2024, 5, 2).unwrap(),
            &m.description,
        );
        assert_ne!(m.slot(), other_day);
    }

    #[test]
    fn period_from_str() {
        assert_eq!(Period::from_str("LUNCH").unwrap(), Period::Lunch);
        assert_eq!(Period::Dinner.to_string(), "DINNER");
        assert_eq!(Period::from_u8(1), Some(Period::Breakfast));
        assert_eq!(Period::from_u8(4), None);
    }
}
