//! [`User`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Lock, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C, IDs> Database<Select<By<HashMap<user::Id, User>, IDs>>> for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[user::Id]>,
{
    type Ok = HashMap<user::Id, User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<user::Id, User>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[user::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        const SQL: &str = "\
            SELECT id, chat_id, \
                   username, first_name, last_name, \
                   education_number, national_id, \
                   phone, payment_card, \
                   is_verified, is_admin, is_active, \
                   created_at, updated_at \
            FROM users \
            WHERE id = ANY($1::UUID[])";
        Ok(self
            .query(SQL, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                (
                    id,
                    User {
                        id,
                        chat_id: row.get("chat_id"),
                        username: row.get("username"),
                        first_name: row.get("first_name"),
                        last_name: row.get("last_name"),
                        education_number: row.get("education_number"),
                        national_id: row.get("national_id"),
                        phone: row.get("phone"),
                        payment_card: row.get("payment_card"),
                        is_verified: row.get("is_verified"),
                        is_admin: row.get("is_admin"),
                        is_active: row.get("is_active"),
                        created_at: row.get("created_at"),
                        updated_at: row.get("updated_at"),
                    },
                )
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<User>, user::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<user::Id, User>, [user::Id; 1]>>,
        Ok = HashMap<user::Id, User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<User>, user::ChatId>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::ChatId>>,
    ) -> Result<Self::Ok, Self::Err> {
        let chat_id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM users \
            WHERE chat_id = $1::INT8";
        let Some(row) = self
            .query_opt(SQL, &[&chat_id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let user_id: user::Id = row.get("id");
        self.execute(Select(By::new(user_id)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<User>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(user)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            chat_id,
            username,
            first_name,
            last_name,
            education_number,
            national_id,
            phone,
            payment_card,
            is_verified,
            is_admin,
            is_active,
            created_at,
            updated_at,
        } = user;

        const SQL: &str = "\
            INSERT INTO users (\
                id, chat_id, \
                username, first_name, last_name, \
                education_number, national_id, \
                phone, payment_card, \
                is_verified, is_admin, is_active, \
                created_at, updated_at\
            ) \
            VALUES (\
                $1::UUID, $2::INT8, \
                $3::VARCHAR, $4::VARCHAR, $5::VARCHAR, \
                $6::VARCHAR, $7::VARCHAR, \
                $8::VARCHAR, $9::VARCHAR, \
                $10::BOOLEAN, $11::BOOLEAN, $12::BOOLEAN, \
                $13::TIMESTAMPTZ, $14::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET chat_id = EXCLUDED.chat_id, \
                username = EXCLUDED.username, \
                first_name = EXCLUDED.first_name, \
                last_name = EXCLUDED.last_name, \
                education_number = EXCLUDED.education_number, \
                national_id = EXCLUDED.national_id, \
                phone = EXCLUDED.phone, \
                payment_card = EXCLUDED.payment_card, \
                is_verified = EXCLUDED.is_verified, \
                is_admin = EXCLUDED.is_admin, \
                is_active = EXCLUDED.is_active, \
                updated_at = EXCLUDED.updated_at";
        self.exec(
            SQL,
            &[
                &id,
                &chat_id,
                &username,
                &first_name,
                &last_name,
                &education_number,
                &national_id,
                &phone,
                &payment_card,
                &is_verified,
                &is_admin,
                &is_active,
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<User, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<User, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO users_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO NOTHING";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<User, user::ChatId>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<User, user::ChatId>>,
    ) -> Result<Self::Ok, Self::Err> {
        let chat_id: user::ChatId = by.into_inner();

        const SQL: &str = "\
            INSERT INTO users_chat_lock \
            VALUES ($1::INT8) \
            ON CONFLICT (chat_id) DO NOTHING";
        self.exec(SQL, &[&chat_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
