//! [`Error`]-related definitions.

use std::fmt;

use derive_more::Error as StdError;
use itertools::Itertools as _;
use service::{
    command::{self, Classify as _, ErrorKind},
    domain::listing,
    infra::database,
};
use tracerr::{Trace, Traced};

/// Defines a new error type.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            message: $message.to_owned(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

/// Message shown to users when a failure is not theirs to fix.
pub const RETRY_MESSAGE: &str = "Something went wrong, please try again later.";

/// User-facing [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Creates a new [`Error`] representing an internal failure.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            code: "INTERNAL_ERROR",
            message: RETRY_MESSAGE.to_owned(),
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] of the provided [`ErrorKind`] with the
    /// provided message.
    ///
    /// [`None`] is returned for [`ErrorKind`]s which are not user-facing.
    #[must_use]
    pub fn of_kind(kind: ErrorKind, message: &impl ToString) -> Option<Self> {
        let code = match kind {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorKind::StorageFailure => return None,
        };
        Some(Self {
            code,
            message: message.to_string(),
            backtrace: None,
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]: {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error {
        self.try_as_error().unwrap_or_else(Error::internal)
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

define_error! {
    enum ListingError {
        #[code = "LISTING_NOT_AVAILABLE"]
        #[message = "This listing is not on sale."]
        NotAvailable,

        #[code = "LISTING_ON_HOLD"]
        #[message = "Somebody is already buying this listing."]
        OnHold,

        #[code = "LISTING_SOLD"]
        #[message = "This listing has already been sold."]
        Sold,

        #[code = "LISTING_CANCELLED"]
        #[message = "This listing has been cancelled by its seller."]
        Cancelled,

        #[code = "LISTING_EXPIRED"]
        #[message = "This listing has expired."]
        Expired,

        #[code = "NOT_SELLER"]
        #[message = "Only the seller can do this."]
        NotSeller,

        #[code = "NOT_PENDING_BUYER"]
        #[message = "Only the buyer holding this listing can do this."]
        NotPendingBuyer,

        #[code = "SELF_PURCHASE"]
        #[message = "You cannot buy your own listing."]
        SelfPurchase,

        #[code = "LISTING_NOT_FOUND"]
        #[message = "This listing does not exist."]
        NotFound,
    }
}

define_error! {
    enum CreateListingError {
        #[code = "DUPLICATE_CODE"]
        #[message = "This reservation code is already on sale."]
        DuplicateCode,

        #[code = "SELLER_NOT_ELIGIBLE"]
        #[message = "Verify your account and set a payment card to sell."]
        SellerNotEligible,

        #[code = "PRICE_EXCEEDS_LIMIT"]
        #[message = "The price is above the ceiling allowed for this meal."]
        PriceExceedsLimit,

        #[code = "INVALID_PRICE"]
        #[message = "The price must be greater than zero."]
        InvalidPrice,

        #[code = "MEAL_NOT_FOUND"]
        #[message = "This meal is not on the menu."]
        MealNotFound,
    }
}

define_error! {
    enum UserError {
        #[code = "USER_NOT_FOUND"]
        #[message = "Register first to use the marketplace."]
        NotRegistered,

        #[code = "BUYER_NOT_ELIGIBLE"]
        #[message = "Verify your account to buy."]
        BuyerNotEligible,
    }
}

impl AsError for listing::Rejection {
    fn try_as_error(&self) -> Option<Error> {
        use listing::{Rejection as R, Status as S};

        let e = match self {
            R::WrongStatus(S::Available) => ListingError::NotAvailable,
            R::WrongStatus(S::AwaitingConfirmation) => ListingError::OnHold,
            R::WrongStatus(S::Sold) => ListingError::Sold,
            R::WrongStatus(S::Cancelled) => ListingError::Cancelled,
            R::WrongStatus(S::Expired) => ListingError::Expired,
            R::NotSeller => ListingError::NotSeller,
            R::NotPendingBuyer => ListingError::NotPendingBuyer,
            R::SelfPurchase => ListingError::SelfPurchase,
            R::PendingBuyerMissing => return None,
        };
        Some(e.into())
    }
}

/// Implements [`AsError`] for [`Command`] errors transitioning a [`Listing`].
///
/// [`Command`]: service::Command
/// [`Listing`]: service::domain::Listing
macro_rules! impl_as_error_for_transition {
    ($($cmd:ident),* $(,)?) => {$(
        impl AsError for command::$cmd::ExecutionError {
            fn try_as_error(&self) -> Option<Error> {
                match self {
                    Self::Db(e) => e.try_as_error(),
                    Self::Rejected(r) => r.try_as_error(),
                    Self::ListingNotFound(_) => {
                        Some(ListingError::NotFound.into())
                    }
                }
            }
        }
    )*};
}

impl_as_error_for_transition!(
    cancel_available_by_seller,
    cancel_pending_by_buyer,
    confirm_payment_sent,
    finalize_sale,
    reject_pending_by_seller,
);

impl AsError for command::initiate_purchase::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Rejected(r) => r.try_as_error(),
            Self::BuyerNotEligible(_) => {
                Some(UserError::BuyerNotEligible.into())
            }
            Self::BuyerNotExists(_) => Some(UserError::NotRegistered.into()),
            Self::ListingNotFound(_) => Some(ListingError::NotFound.into()),
        }
    }
}

impl AsError for command::create_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        let e = match self {
            Self::Db(e) => return e.try_as_error(),
            Self::DuplicateCode(_) => CreateListingError::DuplicateCode,
            Self::InvalidPrice(_) => CreateListingError::InvalidPrice,
            Self::MealNotFound(_) => CreateListingError::MealNotFound,
            Self::PriceExceedsLimit { .. } => {
                CreateListingError::PriceExceedsLimit
            }
            Self::SellerNotEligible(_) => CreateListingError::SellerNotEligible,
            Self::SellerNotExists(_) => {
                return Some(UserError::NotRegistered.into());
            }
        };
        Some(e.into())
    }
}

/// Implements [`AsError`] for [`Command`] errors by their [`ErrorKind`].
///
/// [`Command`]: service::Command
macro_rules! impl_as_error_by_kind {
    ($($cmd:ident),* $(,)?) => {$(
        impl AsError for command::$cmd::ExecutionError {
            fn try_as_error(&self) -> Option<Error> {
                Error::of_kind(self.kind(), &self)
            }
        }
    )*};
}

impl_as_error_by_kind!(
    purge_past_meals,
    register_user,
    set_user_active,
    set_user_admin,
    sweep_expired_pending,
    update_payment_card,
    upsert_meal,
    verify_user,
);
