//! [`Command`] for allowing or forbidding a [`User`] to trade.

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

/// [`Command`] for allowing or forbidding a [`User`] to trade.
///
/// Inactive [`User`]s can neither sell nor buy, while their existing
/// listings stay intact.
#[derive(Clone, Copy, Debug)]
pub struct SetUserActive {
    /// ID of the [`User`] to switch.
    pub user_id: user::Id,

    /// Indicator whether the [`User`] is allowed to trade.
    pub active: bool,
}

impl<Db> Command<SetUserActive> for Service<Db>
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

    async fn execute(&self, cmd: SetUserActive) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetUserActive { user_id, active } = cmd;

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
        if user.is_active == active {
            return Ok(user);
        }

        user.is_active = active;
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

/// Error of [`SetUserActive`] [`Command`] execution.
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
    use common::{Handler as _, Money};

    use crate::{
        command::{Classify as _, CreateListing, ErrorKind},
        domain::{listing, user},
        fixture::Env,
    };

    use super::SetUserActive;

    #[tokio::test]
    async fn deactivated_user_cannot_sell() {
        let env = Env::new();
        let seller = env.trader().await;
        let meal = env.meal(None).await;

        let deactivated = env
            .service
            .execute(SetUserActive {
                user_id: seller.id,
                active: false,
            })
            .await
            .unwrap();
        assert!(!deactivated.is_active);
        assert!(!deactivated.can_sell());

        let err = env
            .service
            .execute(CreateListing {
                seller_id: seller.id,
                code: listing::Code::new("ABC123").unwrap(),
                meal_id: meal.id,
                price: Money::from(20_000),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let reactivated = env
            .service
            .execute(SetUserActive {
                user_id: seller.id,
                active: true,
            })
            .await
            .unwrap();
        assert!(reactivated.can_sell());
    }

    #[tokio::test]
    async fn reports_missing_user() {
        let env = Env::new();

        let err = env
            .service
            .execute(SetUserActive {
                user_id: user::Id::new(),
                active: true,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
