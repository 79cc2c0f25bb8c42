//! [`Command`] for updating a [`user::PaymentCard`].

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

/// [`Command`] for updating a [`user::PaymentCard`] sale proceeds of a
/// [`User`] are transferred to.
#[derive(Clone, Debug)]
pub struct UpdatePaymentCard {
    /// ID of the [`User`] which [`user::PaymentCard`] should be updated.
    pub user_id: user::Id,

    /// New [`user::PaymentCard`] of the [`User`].
    pub card: user::PaymentCard,
}

impl<Db> Command<UpdatePaymentCard> for Service<Db>
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

    async fn execute(
        &self,
        cmd: UpdatePaymentCard,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdatePaymentCard { user_id, card } = cmd;

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
        if user.payment_card.as_ref() == Some(&card) {
            return Ok(user);
        }

        user.payment_card = Some(card);
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

/// Error of [`UpdatePaymentCard`] [`Command`] execution.
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
    use common::{operations::By, Handler as _};

    use crate::{
        domain::{user, User},
        fixture::Env,
        query::DatabaseQuery,
    };

    use super::UpdatePaymentCard;

    #[tokio::test]
    async fn makes_verified_user_eligible_to_sell() {
        let env = Env::new();
        let user = env.user(|u| u.is_verified = true).await;
        assert!(!user.can_sell());

        let updated = env
            .service
            .execute(UpdatePaymentCard {
                user_id: user.id,
                card: user::PaymentCard::new("6037-9911-2233-4455").unwrap(),
            })
            .await
            .unwrap();

        assert!(updated.can_sell());
        let stored = env
            .service
            .execute(DatabaseQuery::<By<Option<User>, user::Id>>::by(user.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.payment_card.map(|c| c.masked()),
            Some("**** **** **** 4455".to_owned()),
        );
    }
}
