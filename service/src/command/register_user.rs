//! [`Command`] for registering a [`User`] upon its first contact.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::{Classify, Command, ErrorKind};

/// [`Command`] for registering a [`User`] by its [`user::ChatId`].
///
/// Registering an already known [`user::ChatId`] refreshes the chat profile
/// of the existing [`User`] instead.
#[derive(Clone, Debug)]
pub struct RegisterUser {
    /// [`user::ChatId`] the [`User`] contacted from.
    pub chat_id: user::ChatId,

    /// [`user::Username`] on the chat platform, if any.
    pub username: Option<user::Username>,

    /// First [`user::Name`] on the chat platform, if any.
    pub first_name: Option<user::Name>,

    /// Last [`user::Name`] on the chat platform, if any.
    pub last_name: Option<user::Name>,
}

impl<Db> Command<RegisterUser> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<User, user::ChatId>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::ChatId>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Insert<User>, Ok = (), Err = Traced<database::Error>>
        + Database<Update<User>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RegisterUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RegisterUser {
            chat_id,
            username,
            first_name,
            last_name,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent registrations from the same chat.
        tx.execute(Lock(By::<User, _>::new(chat_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let existing = tx
            .execute(Select(By::<Option<User>, _>::new(chat_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let user = if let Some(mut user) = existing {
            if user.username == username
                && user.first_name == first_name
                && user.last_name == last_name
            {
                return Ok(user);
            }
            user.username = username;
            user.first_name = first_name;
            user.last_name = last_name;
            user.updated_at = now.coerce();
            tx.execute(Update(user.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            user
        } else {
            let user = User {
                id: user::Id::new(),
                chat_id,
                username,
                first_name,
                last_name,
                education_number: None,
                national_id: None,
                phone: None,
                payment_card: None,
                is_verified: false,
                is_admin: false,
                is_active: true,
                created_at: now.coerce(),
                updated_at: now.coerce(),
            };
            tx.execute(Insert(user.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            user
        };

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(user)
    }
}

/// Error of [`RegisterUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
        }
    }
}
