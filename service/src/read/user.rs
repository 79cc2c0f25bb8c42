//! [`User`] read model definitions.

use crate::domain::{user, User};

/// Means of reaching a [`User`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Contact {
    /// ID of the [`User`].
    pub id: user::Id,

    /// [`user::ChatId`] the [`User`] is reachable in.
    pub chat_id: user::ChatId,
}

impl From<&User> for Contact {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            chat_id: user.chat_id,
        }
    }
}
