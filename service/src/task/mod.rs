//! Background [`Task`]s definitions.

mod background;
pub mod purge_past_meals;
pub mod sweep_expired_pending;

pub use common::Handler as Task;

pub use self::{
    background::{Background, Stopped},
    purge_past_meals::PurgePastMeals,
    sweep_expired_pending::SweepExpiredPending,
};
