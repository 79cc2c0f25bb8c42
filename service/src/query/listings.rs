//! [`Query`] collection related to multiple [`Listing`]s.

use common::operations::{By, Select};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{listing::Status, Listing, Meal};
use crate::{
    infra::{database, Database},
    read::listing::list,
    Service,
};

use super::{DatabaseQuery, Query};

/// Queries a [`list::Page`] of [`Listing`]s matching a [`list::Filter`].
pub type List = DatabaseQuery<By<list::Page, list::Selector>>;

/// Queries a [`list::Page`] of [`Status::Available`] [`Listing`]s of
/// [`Meal`]s served today or later, newest first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Available(pub list::Arguments);

impl<Db> Query<Available> for Service<Db>
where
    Db: Database<
        Select<By<list::Page, list::Selector>>,
        Ok = list::Page,
        Err = Traced<database::Error>,
    >,
{
    type Ok = list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Available(arguments): Available,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = list::Selector {
            arguments,
            filter: list::Filter::Available {
                served_since: self.clock().today(),
            },
        };
        self.database()
            .execute(Select(By::new(selector)))
            .await
            .map_err(tracerr::wrap!())
    }
}
