//! [`Listing`] definitions and its lifecycle state machine.
//!
//! ```text
//!            reserve                     finalize
//! AVAILABLE ─────────► AWAITING_CONFIRMATION ─────────► SOLD
//!   │   ▲                    │
//!   │   └────────────────────┘ cancel_pending / reject_pending / release
//!   │
//!   ├── withdraw ──► CANCELLED
//!   └── expire ────► EXPIRED   (also from AWAITING_CONFIRMATION)
//! ```

use std::{sync::LazyLock, time::Duration};

use common::{define_kind, unit as common_unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3;

#[cfg(doc)]
use crate::domain::Meal;
use crate::domain::{meal, user};

/// Default duration of a pending purchase before it's released back on sale.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Name of the storage constraint allowing a single active [`Listing`] per
/// [`Code`].
pub const ACTIVE_CODE_CONSTRAINT: &str = "listings_active_reservation_code";

/// One seller's offer of one reservation [`Code`] for a [`Meal`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the [`User`] selling this [`Listing`].
    ///
    /// [`User`]: user::User
    pub seller_id: user::Id,

    /// ID of the [`User`] who bought this [`Listing`], once [`Status::Sold`].
    ///
    /// [`User`]: user::User
    pub buyer_id: Option<user::Id>,

    /// ID of the [`User`] committed to buy this [`Listing`], while
    /// [`Status::AwaitingConfirmation`].
    ///
    /// [`User`]: user::User
    pub pending_buyer_id: Option<user::Id>,

    /// Reservation [`Code`] being sold.
    pub code: Code,

    /// ID of the [`Meal`] the [`Code`] is reserved for.
    pub meal_id: meal::Id,

    /// Asking price of this [`Listing`].
    pub price: Money,

    /// Current [`Status`] of this [`Listing`].
    pub status: Status,

    /// [`DateTime`] when this [`Listing`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Listing`] changed last time.
    pub updated_at: ModificationDateTime,

    /// [`Revision`] of this [`Listing`], advanced by each of its changes.
    pub revision: Revision,

    /// [`DateTime`] when this [`Listing`] was sold.
    pub sold_at: Option<SaleDateTime>,

    /// [`DateTime`] until which the pending buyer must be confirmed.
    pub pending_until: Option<PendingDeadline>,

    /// [`DateTime`] when the pending buyer claimed to have paid.
    pub payment_claimed_at: Option<PaymentClaimDateTime>,

    /// [`DateTime`] when a pending buyer cancelled the purchase last time.
    pub cancelled_by_buyer_at: Option<BuyerCancellationDateTime>,

    /// [`DateTime`] when the seller rejected a pending buyer last time.
    pub rejected_by_seller_at: Option<SellerRejectionDateTime>,

    /// [`DateTime`] when the seller withdrew this [`Listing`].
    pub cancelled_at: Option<CancellationDateTime>,
}

impl Listing {
    /// Creates a new [`Status::Available`] [`Listing`].
    #[must_use]
    pub fn new(
        seller_id: user::Id,
        code: Code,
        meal_id: meal::Id,
        price: Money,
        now: DateTime,
    ) -> Self {
        Self {
            id: Id::new(),
            seller_id,
            buyer_id: None,
            pending_buyer_id: None,
            code,
            meal_id,
            price,
            status: Status::Available,
            created_at: now.coerce(),
            updated_at: now.coerce(),
            revision: Revision::default(),
            sold_at: None,
            pending_until: None,
            payment_claimed_at: None,
            cancelled_by_buyer_at: None,
            rejected_by_seller_at: None,
            cancelled_at: None,
        }
    }

    /// Returns the [`Expected`] state this [`Listing`] must still be stored
    /// in for a transition from its current state to be applied.
    #[must_use]
    pub fn expected(&self) -> Expected {
        Expected {
            status: self.status,
            pending_buyer_id: self.pending_buyer_id,
            revision: self.revision,
        }
    }

    /// Commits the provided buyer to purchase this [`Listing`] until the
    /// provided deadline.
    ///
    /// # Errors
    ///
    /// - [`Rejection::WrongStatus`] unless [`Status::Available`];
    /// - [`Rejection::SelfPurchase`] if the buyer is the seller.
    pub fn reserve(
        &mut self,
        buyer_id: user::Id,
        until: PendingDeadline,
        now: DateTime,
    ) -> Result<(), Rejection> {
        self.ensure_status(Status::Available)?;
        if buyer_id == self.seller_id {
            return Err(Rejection::SelfPurchase);
        }

        self.status = Status::AwaitingConfirmation;
        self.pending_buyer_id = Some(buyer_id);
        self.pending_until = Some(until);
        self.payment_claimed_at = None;
        self.touch(now);
        Ok(())
    }

    /// Records the pending buyer's claim of having paid.
    ///
    /// Returns `false` if the claim has been recorded already.
    ///
    /// # Errors
    ///
    /// - [`Rejection::WrongStatus`] unless [`Status::AwaitingConfirmation`];
    /// - [`Rejection::NotPendingBuyer`] if the caller is not the pending
    ///   buyer.
    pub fn claim_payment(
        &mut self,
        buyer_id: user::Id,
        now: DateTime,
    ) -> Result<bool, Rejection> {
        self.ensure_status(Status::AwaitingConfirmation)?;
        self.ensure_pending_buyer(buyer_id)?;
        if self.payment_claimed_at.is_some() {
            return Ok(false);
        }

        self.payment_claimed_at = Some(now.coerce());
        self.touch(now);
        Ok(true)
    }

    /// Sells this [`Listing`] to its pending buyer, returning the buyer's ID.
    ///
    /// # Errors
    ///
    /// - [`Rejection::WrongStatus`] unless [`Status::AwaitingConfirmation`];
    /// - [`Rejection::NotSeller`] if the caller is not the seller;
    /// - [`Rejection::PendingBuyerMissing`] if there is no pending buyer.
    pub fn finalize(
        &mut self,
        seller_id: user::Id,
        now: DateTime,
    ) -> Result<user::Id, Rejection> {
        self.ensure_status(Status::AwaitingConfirmation)?;
        self.ensure_seller(seller_id)?;
        let buyer_id =
            self.pending_buyer_id.ok_or(Rejection::PendingBuyerMissing)?;

        self.status = Status::Sold;
        self.buyer_id = Some(buyer_id);
        self.pending_buyer_id = None;
        self.pending_until = None;
        self.sold_at = Some(now.coerce());
        self.touch(now);
        Ok(buyer_id)
    }

    /// Cancels the pending purchase on behalf of the pending buyer.
    ///
    /// # Errors
    ///
    /// - [`Rejection::WrongStatus`] unless [`Status::AwaitingConfirmation`];
    /// - [`Rejection::NotPendingBuyer`] if the caller is not the pending
    ///   buyer.
    pub fn cancel_pending(
        &mut self,
        buyer_id: user::Id,
        now: DateTime,
    ) -> Result<(), Rejection> {
        self.ensure_status(Status::AwaitingConfirmation)?;
        self.ensure_pending_buyer(buyer_id)?;

        self.put_back_on_sale(now);
        self.cancelled_by_buyer_at = Some(now.coerce());
        Ok(())
    }

    /// Rejects the pending buyer on behalf of the seller.
    ///
    /// # Errors
    ///
    /// - [`Rejection::WrongStatus`] unless [`Status::AwaitingConfirmation`];
    /// - [`Rejection::NotSeller`] if the caller is not the seller.
    pub fn reject_pending(
        &mut self,
        seller_id: user::Id,
        now: DateTime,
    ) -> Result<(), Rejection> {
        self.ensure_status(Status::AwaitingConfirmation)?;
        self.ensure_seller(seller_id)?;

        self.put_back_on_sale(now);
        self.rejected_by_seller_at = Some(now.coerce());
        Ok(())
    }

    /// Withdraws this [`Listing`] from sale on behalf of the seller.
    ///
    /// # Errors
    ///
    /// - [`Rejection::WrongStatus`] unless [`Status::Available`];
    /// - [`Rejection::NotSeller`] if the caller is not the seller.
    pub fn withdraw(
        &mut self,
        seller_id: user::Id,
        now: DateTime,
    ) -> Result<(), Rejection> {
        self.ensure_status(Status::Available)?;
        self.ensure_seller(seller_id)?;

        self.status = Status::Cancelled;
        self.cancelled_at = Some(now.coerce());
        self.touch(now);
        Ok(())
    }

    /// Puts this [`Listing`] back on sale if its pending purchase is overdue
    /// at the provided moment.
    ///
    /// Returns the ID of the released pending buyer, if released.
    pub fn release_if_overdue(&mut self, now: DateTime) -> Option<user::Id> {
        let overdue = self.status == Status::AwaitingConfirmation
            && self.pending_until.is_some_and(|until| until < now.coerce());
        if !overdue {
            return None;
        }

        let buyer_id = self.pending_buyer_id;
        self.put_back_on_sale(now);
        buyer_id
    }

    /// Expires this [`Listing`] if it hasn't reached a terminal [`Status`]
    /// yet, dropping its pending buyer, if any.
    ///
    /// Returns `false` if nothing has changed.
    pub fn expire(&mut self, now: DateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = Status::Expired;
        self.pending_buyer_id = None;
        self.pending_until = None;
        self.payment_claimed_at = None;
        self.touch(now);
        true
    }

    /// Indicates whether the buyer references of this [`Listing`] agree with
    /// its [`Status`].
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let pending = self.status == Status::AwaitingConfirmation;
        let sold = self.status == Status::Sold;

        pending == self.pending_buyer_id.is_some()
            && pending == self.pending_until.is_some()
            && sold == self.buyer_id.is_some()
            && self.pending_buyer_id != Some(self.seller_id)
            && self.buyer_id != Some(self.seller_id)
    }

    /// Marks this [`Listing`] as changed at the provided moment.
    fn touch(&mut self, now: DateTime) {
        self.updated_at = now.coerce();
        self.revision = self.revision.next();
    }

    /// Clears the pending purchase, making this [`Listing`] available again.
    fn put_back_on_sale(&mut self, now: DateTime) {
        self.status = Status::Available;
        self.pending_buyer_id = None;
        self.pending_until = None;
        self.payment_claimed_at = None;
        self.touch(now);
    }

    /// Ensures this [`Listing`] is in the provided [`Status`].
    fn ensure_status(&self, status: Status) -> Result<(), Rejection> {
        if self.status == status {
            Ok(())
        } else {
            Err(Rejection::WrongStatus(self.status))
        }
    }

    /// Ensures the provided [`User`] is the seller of this [`Listing`].
    ///
    /// [`User`]: user::User
    fn ensure_seller(&self, user_id: user::Id) -> Result<(), Rejection> {
        if self.seller_id == user_id {
            Ok(())
        } else {
            Err(Rejection::NotSeller)
        }
    }

    /// Ensures the provided [`User`] is the pending buyer of this
    /// [`Listing`].
    ///
    /// [`User`]: user::User
    fn ensure_pending_buyer(&self, user_id: user::Id) -> Result<(), Rejection> {
        if self.pending_buyer_id == Some(user_id) {
            Ok(())
        } else {
            Err(Rejection::NotPendingBuyer)
        }
    }
}

/// Stored state of a [`Listing`] a conditional update is applied against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Expected {
    /// Expected [`Status`].
    pub status: Status,

    /// Expected pending buyer.
    pub pending_buyer_id: Option<user::Id>,

    /// Expected [`Revision`].
    ///
    /// Distinguishes a [`Listing`] which left the [`Status`] and came back
    /// into it since being read.
    pub revision: Revision,
}

impl Expected {
    /// Indicates whether the provided [`Listing`] is still in this
    /// [`Expected`] state.
    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        *self == listing.expected()
    }
}

/// Revision of a stored [`Listing`].
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Revision(i64);

impl Revision {
    /// Returns the [`Revision`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Reason of a [`Listing`] transition being refused.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum Rejection {
    /// [`Listing`] is not in the [`Status`] required by the transition.
    #[display("`Listing` is `{_0}`")]
    WrongStatus(#[error(not(source))] Status),

    /// Caller is not the seller of the [`Listing`].
    #[display("caller is not the seller")]
    NotSeller,

    /// Caller is not the pending buyer of the [`Listing`].
    #[display("caller is not the pending buyer")]
    NotPendingBuyer,

    /// Seller tries to buy their own [`Listing`].
    #[display("seller cannot buy their own `Listing`")]
    SelfPurchase,

    /// [`Listing`] awaits confirmation without a pending buyer.
    #[display("`Listing` has no pending buyer")]
    PendingBuyerMissing,
}

/// ID of a [`Listing`].
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

/// University meal reservation code sold by a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Code(String);

impl Code {
    /// Creates a new [`Code`] if the given `code` is valid.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Code`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9-]{3,64}$").expect("valid regex")
        });

        REGEX.is_match(code.as_ref())
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim()).ok_or("invalid `Code`")
    }
}

/// Hash of a [`Code`] used to serialize concurrent listings of it.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, Hash, Into, PartialEq,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct CodeHash(Uuid);

impl CodeHash {
    /// Calculates a new [`CodeHash`] of the provided [`Code`].
    #[must_use]
    pub fn new(code: &Code) -> Self {
        Self(Uuid::from_u128(xxh3::xxh3_128(code.0.as_bytes())))
    }
}

define_kind! {
    #[doc = "Status of a [`Listing`]."]
    enum Status {
        #[doc = "On sale."]
        Available = 1,

        #[doc = "Committed to by a buyer, awaiting the seller's confirmation \
                 of payment."]
        AwaitingConfirmation = 2,

        #[doc = "Sold to a buyer."]
        Sold = 3,

        #[doc = "Withdrawn by the seller."]
        Cancelled = 4,

        #[doc = "Outdated with its meal."]
        Expired = 5,
    }
}

impl Status {
    /// Indicates whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sold | Self::Cancelled | Self::Expired)
    }

    /// Indicates whether a [`Listing`] in this [`Status`] occupies its
    /// [`Code`].
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Expired)
    }
}

pub mod unit {
    //! Marker types of [`Listing`] events.
    //!
    //! [`Listing`]: super::Listing

    /// Marker type describing a sale.
    #[derive(Clone, Copy, Debug)]
    pub struct Sale;

    /// Marker type describing a buyer's claim of payment.
    #[derive(Clone, Copy, Debug)]
    pub struct PaymentClaim;

    /// Marker type describing a cancellation by a pending buyer.
    #[derive(Clone, Copy, Debug)]
    pub struct BuyerCancellation;

    /// Marker type describing a rejection by a seller.
    #[derive(Clone, Copy, Debug)]
    pub struct SellerRejection;

    /// Marker type describing a withdrawal by a seller.
    #[derive(Clone, Copy, Debug)]
    pub struct Cancellation;
}

/// Untyped [`DateTime`] transitions are performed at.
type DateTime = common::DateTime;

/// [`DateTime`] when a [`Listing`] was created.
pub type CreationDateTime = DateTimeOf<(Listing, common_unit::Creation)>;

/// [`DateTime`] when a [`Listing`] was modified.
pub type ModificationDateTime =
    DateTimeOf<(Listing, common_unit::Modification)>;

/// [`DateTime`] when a [`Listing`] was sold.
pub type SaleDateTime = DateTimeOf<(Listing, unit::Sale)>;

/// [`DateTime`] until which a [`Listing`] awaits confirmation.
pub type PendingDeadline = DateTimeOf<(Listing, common_unit::Deadline)>;

/// [`DateTime`] when a pending buyer claimed to have paid.
pub type PaymentClaimDateTime = DateTimeOf<(Listing, unit::PaymentClaim)>;

/// [`DateTime`] when a pending buyer cancelled a purchase.
pub type BuyerCancellationDateTime =
    DateTimeOf<(Listing, unit::BuyerCancellation)>;

/// [`DateTime`] when a seller rejected a pending buyer.
pub type SellerRejectionDateTime = DateTimeOf<(Listing, unit::SellerRejection)>;

/// [`DateTime`] when a seller withdrew a [`Listing`].
pub type CancellationDateTime = DateTimeOf<(Listing, unit::Cancellation)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{DateTime, Money};

    use crate::domain::{meal, user};

    use super::{Code, Listing, Rejection, Status};

    fn now() -> DateTime {
        DateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn listing(seller_id: user::Id) -> Listing {
        Listing::new(
            seller_id,
            Code::new("ABC123").unwrap(),
            meal::Id::new(),
            Money::from(20_000),
            now(),
        )
    }

    #[test]
    fn full_sale() {
        let (seller, buyer) = (user::Id::new(), user::Id::new());
        let mut l = listing(seller);
        assert_eq!(l.status, Status::Available);
        assert!(l.is_consistent());

        l.reserve(buyer, (now() + Duration::from_secs(300)).coerce(), now())
            .unwrap();
        assert_eq!(l.status, Status::AwaitingConfirmation);
        assert_eq!(l.pending_buyer_id, Some(buyer));
        assert!(l.is_consistent());

        assert_eq!(l.claim_payment(buyer, now()), Ok(true));
        assert_eq!(l.claim_payment(buyer, now()), Ok(false));
        assert_eq!(l.status, Status::AwaitingConfirmation);

        assert_eq!(l.finalize(seller, now()), Ok(buyer));
        assert_eq!(l.status, Status::Sold);
        assert_eq!(l.buyer_id, Some(buyer));
        assert_eq!(l.pending_buyer_id, None);
        assert_eq!(l.pending_until, None);
        assert!(l.sold_at.is_some());
        assert!(l.is_consistent());

        assert_eq!(
            l.finalize(seller, now()),
            Err(Rejection::WrongStatus(Status::Sold)),
        );
    }

    #[test]
    fn refuses_self_purchase() {
        let seller = user::Id::new();
        let mut l = listing(seller);

        assert_eq!(
            l.reserve(seller, now().coerce(), now()),
            Err(Rejection::SelfPurchase),
        );
        assert_eq!(l.status, Status::Available);
    }

    #[test]
    fn checks_parties() {
        let (seller, buyer, stranger) =
            (user::Id::new(), user::Id::new(), user::Id::new());
        let mut l = listing(seller);
        l.reserve(buyer, now().coerce(), now()).unwrap();

        assert_eq!(l.finalize(stranger, now()), Err(Rejection::NotSeller));
        assert_eq!(l.finalize(buyer, now()), Err(Rejection::NotSeller));
        assert_eq!(
            l.cancel_pending(stranger, now()),
            Err(Rejection::NotPendingBuyer),
        );
        assert_eq!(
            l.claim_payment(seller, now()),
            Err(Rejection::NotPendingBuyer),
        );
        assert_eq!(
            l.reject_pending(buyer, now()),
            Err(Rejection::NotSeller),
        );
        assert_eq!(l.status, Status::AwaitingConfirmation);
    }

    #[test]
    fn pending_purchase_goes_back_on_sale() {
        let (seller, buyer) = (user::Id::new(), user::Id::new());

        let mut l = listing(seller);
        l.reserve(buyer, now().coerce(), now()).unwrap();
        _ = l.claim_payment(buyer, now()).unwrap();
        l.cancel_pending(buyer, now()).unwrap();
        assert_eq!(l.status, Status::Available);
        assert_eq!(l.pending_buyer_id, None);
        assert_eq!(l.payment_claimed_at, None);
        assert!(l.cancelled_by_buyer_at.is_some());
        assert!(l.is_consistent());

        l.reserve(buyer, now().coerce(), now()).unwrap();
        l.reject_pending(seller, now()).unwrap();
        assert_eq!(l.status, Status::Available);
        assert!(l.rejected_by_seller_at.is_some());
        assert!(l.is_consistent());
    }

    #[test]
    fn finalizing_requires_pending_buyer() {
        let seller = user::Id::new();
        let mut l = listing(seller);
        l.status = Status::AwaitingConfirmation;
        l.pending_until = Some(now().coerce());

        assert_eq!(
            l.finalize(seller, now()),
            Err(Rejection::PendingBuyerMissing),
        );
    }

    #[test]
    fn releases_only_overdue() {
        let (seller, buyer) = (user::Id::new(), user::Id::new());
        let mut l = listing(seller);
        l.reserve(buyer, now().coerce(), now() - Duration::from_secs(300))
            .unwrap();

        assert_eq!(l.release_if_overdue(now()), None);
        assert_eq!(l.status, Status::AwaitingConfirmation);

        assert_eq!(
            l.release_if_overdue(now() + Duration::from_secs(1)),
            Some(buyer),
        );
        assert_eq!(l.status, Status::Available);
        assert!(l.is_consistent());

        assert_eq!(l.release_if_overdue(now() + Duration::from_secs(2)), None);
    }

    #[test]
    fn withdraws_and_expires() {
        let (seller, buyer) = (user::Id::new(), user::Id::new());

        let mut l = listing(seller);
        assert_eq!(l.withdraw(buyer, now()), Err(Rejection::NotSeller));
        l.withdraw(seller, now()).unwrap();
        assert_eq!(l.status, Status::Cancelled);
        assert!(!l.status.is_active());
        assert!(!l.expire(now()));
        assert_eq!(l.status, Status::Cancelled);

        let mut l = listing(seller);
        l.reserve(buyer, now().coerce(), now()).unwrap();
        assert_eq!(
            l.withdraw(seller, now()),
            Err(Rejection::WrongStatus(Status::AwaitingConfirmation)),
        );
        assert!(l.expire(now()));
        assert_eq!(l.status, Status::Expired);
        assert_eq!(l.pending_buyer_id, None);
        assert!(l.is_consistent());
    }

    #[test]
    fn returning_to_same_state_is_a_new_revision() {
        let (seller, buyer) = (user::Id::new(), user::Id::new());
        let mut l = listing(seller);
        l.reserve(buyer, now().coerce(), now()).unwrap();
        let first = l.expected();

        l.reject_pending(seller, now()).unwrap();
        l.reserve(buyer, now().coerce(), now()).unwrap();

        assert_eq!(l.status, first.status);
        assert_eq!(l.pending_buyer_id, first.pending_buyer_id);
        assert!(!first.matches(&l));
        assert!(l.expected().matches(&l));
    }

    #[test]
    fn status_classification() {
        assert!(Status::Sold.is_active());
        assert!(Status::Sold.is_terminal());
        assert!(Status::AwaitingConfirmation.is_active());
        assert!(!Status::AwaitingConfirmation.is_terminal());
        assert!(!Status::Expired.is_active());
    }
}
