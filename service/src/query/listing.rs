//! [`Query`] collection related to a single [`Listing`].

use common::operations::By;

use crate::{domain::listing, read};
#[cfg(doc)]
use crate::{domain::Listing, Query};

use super::DatabaseQuery;

/// Queries [`read::listing::Details`] of a [`Listing`] by its
/// [`listing::Id`].
pub type ById = DatabaseQuery<By<Option<read::listing::Details>, listing::Id>>;

/// Queries whether a [`listing::Code`] is occupied by an active [`Listing`].
pub type CodeIsActive =
    DatabaseQuery<By<read::listing::CodeIsActive, listing::Code>>;
