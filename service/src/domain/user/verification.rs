//! [`User`] verification [`Policy`].

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

#[cfg(doc)]
use super::User;
use super::{NationalId, Phone};

/// Rules a [`User`] must satisfy to become verified.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct Policy {
    /// [`Method`] of verification.
    pub method: Method,

    /// Country calling code every verified [`Phone`] must carry.
    #[default(98)]
    pub country_code: u16,
}

impl Policy {
    /// Checks the provided credentials against this [`Policy`].
    ///
    /// # Errors
    ///
    /// With a [`Violation`] of this [`Policy`], if any.
    pub fn check(
        &self,
        phone: &Phone,
        national_id: Option<&NationalId>,
    ) -> Result<(), Violation> {
        if !phone.has_country_code(self.country_code) {
            return Err(Violation::ForeignPhone(self.country_code));
        }
        match self.method {
            Method::PhoneOnly => Ok(()),
            Method::PhoneAndNationalId => national_id
                .map(drop)
                .ok_or(Violation::NationalIdRequired),
        }
    }
}

/// Method of [`User`] verification.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    /// Only a domestic [`Phone`] is required.
    #[default]
    #[display("phone only")]
    PhoneOnly,

    /// Both a domestic [`Phone`] and a valid [`NationalId`] are required.
    #[display("phone and national ID")]
    PhoneAndNationalId,
}

/// Violation of a verification [`Policy`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum Violation {
    /// [`Phone`] doesn't belong to the required country.
    #[display("phone number must start with the `+{_0}` country code")]
    ForeignPhone(#[error(not(source))] u16),

    /// [`NationalId`] hasn't been provided.
    #[display("national ID is required")]
    NationalIdRequired,
}
