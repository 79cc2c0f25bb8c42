//! Calendar [`Date`] definitions.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::macros::format_description;

/// Calendar date without a time zone, formatted as `YYYY-MM-DD`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Date(time::Date);

impl Date {
    /// Creates a new [`Date`] out of the provided components.
    ///
    /// [`None`] is returned if the components don't form a valid date.
    #[must_use]
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        time::Date::from_calendar_date(year, month, day).ok().map(Self)
    }

    /// Returns the [`Date`] following this one.
    ///
    /// [`None`] is returned on the calendar overflow.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// Returns the [`Date`] preceding this one.
    ///
    /// [`None`] is returned on the calendar overflow.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.0.previous_day().map(Self)
    }
}

impl From<time::Date> for Date {
    fn from(date: time::Date) -> Self {
        Self(date)
    }
}

impl From<Date> for time::Date {
    fn from(date: Date) -> Self {
        date.0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(d) = self;
        write!(f, "{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
    }
}

impl FromStr for Date {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time::Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
            .map(Self)
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Date {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Date {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    use super::Date;

    impl Serialize for Date {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Date {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            let s = String::deserialize(d)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::Date;

    #[test]
    fn from_str() {
        assert_eq!(
            Date::from_str("2024-03-09").unwrap(),
            Date::from_ymd(2024, 3, 9).unwrap(),
        );
        assert_eq!(
            Date::from_str(" 2024-12-31 ").unwrap(),
            Date::from_ymd(2024, 12, 31).unwrap(),
        );

        assert!(Date::from_str("2024-02-30").is_err());
        assert!(Date::from_str("2024/03/09").is_err());
        assert!(Date::from_str("").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(Date::from_ymd(2024, 3, 9).unwrap().to_string(), "2024-03-09");
        assert_eq!(Date::from_ymd(987, 1, 1).unwrap().to_string(), "0987-01-01");
    }

    #[test]
    fn orders_chronologically() {
        let day = Date::from_ymd(2024, 2, 28).unwrap();

        assert!(day < day.next().unwrap());
        assert!(day > day.previous().unwrap());
        assert_eq!(day.next().unwrap(), Date::from_ymd(2024, 2, 29).unwrap());
    }
}
