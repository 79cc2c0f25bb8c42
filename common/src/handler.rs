//! [`Handler`] abstractions.
//!
//! Commands, queries, background tasks and database operations are all
//! [`Handler`]s distinguished only by their argument type.

use std::future::Future;

/// Asynchronous handler of `Args`.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Handles the provided `args`.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
