//! [`Command`] for verifying a [`User`].

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

/// [`Command`] for verifying a [`User`] with the provided credentials.
///
/// Credentials are checked against the configured [`user::verification::Policy`]
/// and stored along with the verification.
#[derive(Clone, Debug)]
pub struct VerifyUser {
    /// ID of the [`User`] to verify.
    pub user_id: user::Id,

    /// [`user::Phone`] of the [`User`].
    pub phone: user::Phone,

    /// [`user::EducationNumber`] of the [`User`].
    pub education_number: user::EducationNumber,

    /// [`user::NationalId`] of the [`User`], if provided.
    pub national_id: Option<user::NationalId>,
}

impl<Db> Command<VerifyUser> for Service<Db>
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

    async fn execute(&self, cmd: VerifyUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let VerifyUser {
            user_id,
            phone,
            education_number,
            national_id,
        } = cmd;

        self.config()
            .verification
            .check(&phone, national_id.as_ref())
            .map_err(E::PolicyViolated)
            .map_err(tracerr::wrap!())?;

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

        user.phone = Some(phone);
        user.education_number = Some(education_number);
        if national_id.is_some() {
            user.national_id = national_id;
        }
        user.is_verified = true;
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

/// Error of [`VerifyUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Credentials don't satisfy the [`user::verification::Policy`].
    #[display("Verification failed: {_0}")]
    #[from(ignore)]
    PolicyViolated(user::verification::Violation),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
            Self::PolicyViolated(_) => ErrorKind::ConstraintViolation,
            Self::UserNotExists(_) => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{
        command::{Classify as _, ErrorKind},
        domain::user::{self, verification},
        fixture::Env,
        Config,
    };

    use super::{ExecutionError, VerifyUser};

    fn cmd(
        user_id: user::Id,
        phone: &str,
        national_id: Option<&str>,
    ) -> VerifyUser {
        VerifyUser {
            user_id,
            phone: user::Phone::new(phone).unwrap(),
            education_number: user::EducationNumber::new("9912345").unwrap(),
            national_id: national_id.map(|id| user::NationalId::new(id).unwrap()),
        }
    }

    #[tokio::test]
    async fn verifies_domestic_phone() {
        let env = Env::new();
        let user = env.user(|_| {}).await;

        let verified = env
            .service
            .execute(cmd(user.id, "+98 912 345 6789", None))
            .await
            .unwrap();

        assert!(verified.is_verified);
        assert!(verified.can_buy());
        assert!(!verified.can_sell());
        assert_eq!(verified.phone, user::Phone::new("989123456789"));
    }

    #[tokio::test]
    async fn rejects_foreign_phone() {
        let env = Env::new();
        let user = env.user(|_| {}).await;

        let err = env
            .service
            .execute(cmd(user.id, "+7 912 345 6789", None))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::PolicyViolated(
                verification::Violation::ForeignPhone(98)
            ),
        ));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[tokio::test]
    async fn requires_national_id_when_configured() {
        let env = Env::with_config(Config {
            verification: verification::Policy {
                method: verification::Method::PhoneAndNationalId,
                ..verification::Policy::default()
            },
            ..Config::default()
        });
        let user = env.user(|_| {}).await;

        let err = env
            .service
            .execute(cmd(user.id, "+989123456789", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PolicyViolated(
                verification::Violation::NationalIdRequired
            ),
        ));

        let verified = env
            .service
            .execute(cmd(user.id, "+989123456789", Some("0013542419")))
            .await
            .unwrap();
        assert!(verified.is_verified);
        assert!(verified.national_id.is_some());
    }

    #[tokio::test]
    async fn reports_missing_user() {
        let env = Env::new();

        let err = env
            .service
            .execute(cmd(user::Id::new(), "+989123456789", None))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
