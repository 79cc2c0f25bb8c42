//! [`Command`] for granting or revoking administrator rights of a [`User`].

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::{Classify, Command, ErrorKind};

/// [`Command`] for granting or revoking administrator rights of a [`User`].
#[derive(Clone, Copy, Debug)]
pub struct SetUserAdmin {
    /// ID of the [`User`] to switch.
    pub user_id: user::Id,

    /// Indicator whether the [`User`] is an administrator.
    pub admin: bool,
}

impl<Db> Command<SetUserAdmin> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<User, user::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SetUserAdmin) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetUserAdmin { user_id, admin } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `User`.
        tx.execute(Lock(By::<User, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut user = tx
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;
        if user.is_admin == admin {
            return Ok(user);
        }

        user.is_admin = admin;
        user.updated_at = self.clock().now().coerce();
        tx.execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(user)
    }
}

/// Error of [`SetUserAdmin`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
            Self::UserNotExists(_) => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::fixture::Env;

    use super::SetUserAdmin;

    #[tokio::test]
    async fn grants_and_revokes() {
        let env = Env::new();
        let user = env.user(|_| {}).await;

        let admin = env
            .service
            .execute(SetUserAdmin {
                user_id: user.id,
                admin: true,
            })
            .await
            .unwrap();
        assert!(admin.is_admin);

        let revoked = env
            .service
            .execute(SetUserAdmin {
                user_id: user.id,
                admin: false,
            })
            .await
            .unwrap();
        assert!(!revoked.is_admin);
        assert!(revoked.updated_at >= admin.updated_at);
    }
}
