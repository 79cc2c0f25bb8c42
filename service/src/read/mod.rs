//! Read entities definitions.

pub mod listing;
pub mod meal;
pub mod user;
