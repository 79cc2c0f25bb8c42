//! Domain definitions.

pub mod listing;
pub mod meal;
pub mod user;

pub use self::{listing::Listing, meal::Meal, user::User};
