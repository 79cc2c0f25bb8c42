//! [`User`] definitions.

pub mod verification;

use std::sync::LazyLock;

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::verification::Policy as VerificationPolicy;

/// Marketplace participant identified by a chat platform account.
#[derive(Clone, Debug)]
pub struct User {
    /// ID of this [`User`].
    pub id: Id,

    /// [`ChatId`] of this [`User`] on the chat platform.
    pub chat_id: ChatId,

    /// [`Username`] of this [`User`] on the chat platform, if any.
    pub username: Option<Username>,

    /// First [`Name`] of this [`User`], if any.
    pub first_name: Option<Name>,

    /// Last [`Name`] of this [`User`], if any.
    pub last_name: Option<Name>,

    /// [`EducationNumber`] of this [`User`], if provided.
    pub education_number: Option<EducationNumber>,

    /// [`NationalId`] of this [`User`], if provided.
    pub national_id: Option<NationalId>,

    /// [`Phone`] of this [`User`], if provided.
    pub phone: Option<Phone>,

    /// [`PaymentCard`] sale proceeds of this [`User`] are transferred to.
    pub payment_card: Option<PaymentCard>,

    /// Indicator whether this [`User`] has passed the verification.
    pub is_verified: bool,

    /// Indicator whether this [`User`] is an administrator.
    pub is_admin: bool,

    /// Indicator whether this [`User`] is allowed to trade.
    pub is_active: bool,

    /// [`DateTime`] when this [`User`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`User`] was modified last time.
    pub updated_at: ModificationDateTime,
}

impl User {
    /// Indicates whether this [`User`] may put listings up for sale.
    #[must_use]
    pub fn can_sell(&self) -> bool {
        self.is_active && self.is_verified && self.payment_card.is_some()
    }

    /// Indicates whether this [`User`] may buy listings.
    #[must_use]
    pub fn can_buy(&self) -> bool {
        self.is_active && self.is_verified
    }

    /// Returns a human-readable name of this [`User`].
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name, &self.username) {
            (Some(first), Some(last), _) => format!("{first} {last}"),
            (Some(name), None, _) | (None, Some(name), _) => name.to_string(),
            (None, None, Some(username)) => format!("@{username}"),
            (None, None, None) => format!("#{}", self.chat_id),
        }
    }
}

/// ID of a [`User`].
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

/// ID of a chat a [`User`] is reachable in.
#[derive(
    Clone,
    Copy,
    Debug,
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
pub struct ChatId(i64);

/// Username of a [`User`] on the chat platform, without the leading `@`.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Username(String);

impl Username {
    /// Creates a new [`Username`] if the given `username` is valid.
    ///
    /// A leading `@` is stripped.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let username = username.strip_prefix('@').unwrap_or(&username);
        Self::check(username).then(|| Self(username.to_owned()))
    }

    /// Checks whether the given `username` is a valid [`Username`].
    fn check(username: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Username`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9_]{1,32}$").expect("valid regex")
        });

        REGEX.is_match(username.as_ref())
    }
}

impl FromStr for Username {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Username`")
    }
}

/// First or last name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name
            && !name.is_empty()
            && name.chars().count() <= 256
            && !name.chars().any(char::is_control)
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// University education (student) number of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct EducationNumber(String);

impl EducationNumber {
    /// Creates a new [`EducationNumber`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given `number` is a valid [`EducationNumber`].
    fn check(number: impl AsRef<str>) -> bool {
        /// Regular expression checking [`EducationNumber`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9]{4,32}$").expect("valid regex")
        });

        REGEX.is_match(number.as_ref())
    }
}

impl FromStr for EducationNumber {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim()).ok_or("invalid `EducationNumber`")
    }
}

/// 10-digit national identification code of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct NationalId(String);

impl NationalId {
    /// Creates a new [`NationalId`] if the given `code` is valid.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`NationalId`].
    ///
    /// The last digit is a checksum of the first nine ones, and codes made of
    /// a single repeated digit are rejected.
    fn check(code: impl AsRef<str>) -> bool {
        let code = code.as_ref();
        let Some(digits) = code
            .chars()
            .map(|c| c.to_digit(10))
            .collect::<Option<Vec<_>>>()
        else {
            return false;
        };
        if digits.len() != 10 || digits.iter().all(|d| *d == digits[0]) {
            return false;
        }

        let sum = digits[..9]
            .iter()
            .zip((2..=10).rev())
            .map(|(d, weight)| d * weight)
            .sum::<u32>();
        let remainder = sum % 11;
        let expected = if remainder < 2 {
            remainder
        } else {
            11 - remainder
        };

        digits[9] == expected
    }
}

impl FromStr for NationalId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim()).ok_or("invalid `NationalId`")
    }
}

/// Phone number of a [`User`] in international format, digits only.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Phone(String);

impl Phone {
    /// Creates a new [`Phone`] if the given `number` is valid.
    ///
    /// A leading `+` and separating spaces or dashes are stripped.
    #[must_use]
    pub fn new(number: impl AsRef<str>) -> Option<Self> {
        let number = number.as_ref().trim();
        let number = number
            .strip_prefix('+')
            .unwrap_or(number)
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect::<String>();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given normalized `number` is a valid [`Phone`].
    fn check(number: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Phone`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[1-9][0-9]{9,14}$").expect("valid regex")
        });

        REGEX.is_match(number.as_ref())
    }

    /// Indicates whether this [`Phone`] is registered under the provided
    /// country calling code.
    #[must_use]
    pub fn has_country_code(&self, code: u16) -> bool {
        self.0.starts_with(&code.to_string())
    }
}

impl FromStr for Phone {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Phone`")
    }
}

/// 16-digit bank card number a [`User`] receives payments to.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PaymentCard(String);

impl PaymentCard {
    /// Creates a new [`PaymentCard`] if the given `number` is valid.
    ///
    /// Separating spaces or dashes are stripped.
    #[must_use]
    pub fn new(number: impl AsRef<str>) -> Option<Self> {
        let number = number
            .as_ref()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect::<String>();
        (number.len() == 16 && number.bytes().all(|b| b.is_ascii_digit()))
            .then_some(Self(number))
    }

    /// Returns this [`PaymentCard`] number with all but the last 4 digits
    /// hidden.
    #[must_use]
    pub fn masked(&self) -> String {
        format!("**** **** **** {}", &self.0[12..])
    }

    /// Returns this [`PaymentCard`] number split into groups of 4 digits.
    #[must_use]
    pub fn grouped(&self) -> String {
        let n = &self.0;
        format!("{} {} {} {}", &n[..4], &n[4..8], &n[8..12], &n[12..])
    }
}

impl FromStr for PaymentCard {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `PaymentCard`")
    }
}

/// [`DateTime`] when a [`User`] was created.
pub type CreationDateTime = DateTimeOf<(User, unit::Creation)>;

/// [`DateTime`] when a [`User`] was modified.
pub type ModificationDateTime = DateTimeOf<(User, unit::Modification)>;

#[cfg(test)]
mod spec {
    use super::{EducationNumber, NationalId, PaymentCard, Phone, Username};

    #[test]
    fn national_id_checksum() {
        for valid in [
            "0013542419",
            "0499370899",
            "0790419904",
            "2000000010",
            "1000000011",
        ] {
            assert!(NationalId::new(valid).is_some(), "{valid}");
        }

        for invalid in [
            "0013542418",
            "1111111111",
            "0000000000",
            "001354241",
            "00135424190",
            "00135a2419",
            "",
        ] {
            assert!(NationalId::new(invalid).is_none(), "{invalid}");
        }
    }

    #[test]
    fn phone_normalization() {
        let phone = Phone::new("+98 912-345 6789").unwrap();
        assert_eq!(AsRef::<str>::as_ref(&phone), "989123456789");
        assert!(phone.has_country_code(98));
        assert!(!phone.has_country_code(7));

        assert!(Phone::new("09123456789").is_none());
        assert!(Phone::new("+98 912").is_none());
        assert!(Phone::new("phone").is_none());
    }

    #[test]
    fn payment_card_masking() {
        let card = PaymentCard::new("6037-9911 2345 6789").unwrap();
        assert_eq!(card.masked(), "**** **** **** 6789");
        assert_eq!(card.grouped(), "6037 9911 2345 6789");

        assert!(PaymentCard::new("6037 9911 2345 678").is_none());
        assert!(PaymentCard::new("6037 9911 2345 67890").is_none());
        assert!(PaymentCard::new("6037 9911 2345 678x").is_none());
    }

    #[test]
    fn username_strips_at_sign() {
        assert_eq!(AsRef::<str>::as_ref(&Username::new("@meal_bot").unwrap()), "meal_bot");
        assert!(Username::new("with space").is_none());
        assert!(Username::new("@").is_none());
    }

    #[test]
    fn education_number_format() {
        assert!(EducationNumber::new("400123456").is_some());
        assert!(EducationNumber::new("40-0123").is_none());
        assert!(EducationNumber::new("123").is_none());
    }
}
