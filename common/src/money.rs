//! [`Money`]-related definitions.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{
    fmt::{self, Write as _},
    str::FromStr,
};

#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use rust_decimal::Decimal;

/// Amount of money in the marketplace currency.
///
/// Formatted with thousands separators and without trailing fractional zeros,
/// e.g. `20,000` or `1,250.5`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Money(Decimal);

impl Money {
    /// Zero [`Money`].
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates new [`Money`] of the provided amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Returns the amount of this [`Money`].
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Indicates whether this [`Money`] is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl From<u32> for Money {
    fn from(amount: u32) -> Self {
        Self(amount.into())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = self.0.normalize();
        let digits = amount.abs().to_string();
        let (int, frac) = digits
            .split_once('.')
            .map_or((digits.as_str(), None), |(i, f)| (i, Some(f)));

        if amount.is_sign_negative() && !amount.is_zero() {
            f.write_char('-')?;
        }
        for (n, c) in int.chars().enumerate() {
            if n > 0 && (int.len() - n) % 3 == 0 {
                f.write_char(',')?;
            }
            f.write_char(c)?;
        }
        if let Some(frac) = frac {
            write!(f, ".{frac}")?;
        }
        Ok(())
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .chars()
            .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
            .collect::<String>();
        if amount.is_empty() {
            return Err("empty amount");
        }

        Decimal::from_str(&amount)
            .map(Self)
            .map_err(|_| "invalid amount")
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Money {
    accepts!(NUMERIC);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Decimal::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Money {
    accepts!(NUMERIC);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}
