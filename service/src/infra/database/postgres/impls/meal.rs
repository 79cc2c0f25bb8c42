//! [`Meal`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Delete, Insert, Lock, Select, Update},
    Date,
};
use tracerr::Traced;

use crate::{
    domain::{meal, Meal},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns selected to build a [`Meal`].
const COLUMNS: &str = "id, date, period, description, price, price_ceiling";

/// Builds a [`Meal`] out of the provided [`COLUMNS`] row.
fn meal_from(row: &tokio_postgres::Row) -> Meal {
    Meal {
        id: row.get("id"),
        date: row.get("date"),
        period: row.get("period"),
        description: row.get("description"),
        price: row.get("price"),
        price_ceiling: row.get("price_ceiling"),
    }
}

impl<C, IDs> Database<Select<By<HashMap<meal::Id, Meal>, IDs>>> for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[meal::Id]>,
{
    type Ok = HashMap<meal::Id, Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<meal::Id, Meal>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        let ids: &[meal::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM meals \
             WHERE id = ANY($1::UUID[])",
        );
        Ok(self
            .query(sql.as_str(), &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(meal_from)
            .map(|m| (m.id, m))
            .collect())
    }
}

impl<C> Database<Select<By<Option<Meal>, meal::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<meal::Id, Meal>, [meal::Id; 1]>>,
        Ok = HashMap<meal::Id, Meal>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Meal>, meal::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<Meal>, meal::Slot>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Meal>, meal::Slot>>,
    ) -> Result<Self::Ok, Self::Err> {
        let slot = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM meals \
             WHERE slot = $1::UUID",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&slot])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(meal_from))
    }
}

impl<C> Database<Select<By<Vec<Meal>, read::meal::ServedSince>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Meal>, read::meal::ServedSince>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::meal::ServedSince(date) = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM meals \
             WHERE date >= $1::DATE \
             ORDER BY date ASC, period ASC, description ASC",
        );
        Ok(self
            .query(sql.as_str(), &[&date])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(meal_from)
            .collect())
    }
}

impl<C> Database<Insert<Meal>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Meal>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(meal): Insert<Meal>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(meal)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Meal>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(meal): Update<Meal>,
    ) -> Result<Self::Ok, Self::Err> {
        let slot = meal.slot();
        let Meal {
            id,
            date,
            period,
            description,
            price,
            price_ceiling,
        } = meal;

        const SQL: &str = "\
            INSERT INTO meals (\
                id, slot, date, period, description, price, price_ceiling\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::DATE, $4::INT2, $5::VARCHAR, \
                $6::NUMERIC, $7::NUMERIC\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET slot = EXCLUDED.slot, \
                date = EXCLUDED.date, \
                period = EXCLUDED.period, \
                description = EXCLUDED.description, \
                price = EXCLUDED.price, \
                price_ceiling = EXCLUDED.price_ceiling";
        self.exec(
            SQL,
            &[
                &id,
                &slot,
                &date,
                &period,
                &description,
                &price,
                &price_ceiling,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<read::meal::Purged, Date>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::meal::Purged;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<read::meal::Purged, Date>>,
    ) -> Result<Self::Ok, Self::Err> {
        let before: Date = by.into_inner();

        const SQL: &str = "\
            WITH past AS (\
                SELECT id \
                FROM meals \
                WHERE date < $1::DATE \
                FOR UPDATE\
            ), \
            deleted_listings AS (\
                DELETE FROM listings \
                WHERE meal_id IN (SELECT id FROM past) \
                RETURNING id\
            ), \
            deleted_meals AS (\
                DELETE FROM meals \
                WHERE id IN (SELECT id FROM past) \
                RETURNING id\
            ) \
            SELECT (SELECT COUNT(*) FROM deleted_listings) AS listings, \
                   (SELECT COUNT(*) FROM deleted_meals) AS meals";
        let row = self
            .query_opt(SQL, &[&before])
            .await
            .map_err(tracerr::wrap!())?;

        let count = |column: &str| {
            let n = row.as_ref().map_or(0, |r| r.get::<_, i64>(column));
            u64::try_from(n).unwrap_or_default()
        };
        Ok(read::meal::Purged {
            listings: count("listings"),
            meals: count("meals"),
        })
    }
}

impl<C> Database<Lock<By<Meal, meal::Slot>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Meal, meal::Slot>>,
    ) -> Result<Self::Ok, Self::Err> {
        let slot: meal::Slot = by.into_inner();

        const SQL: &str = "\
            INSERT INTO meals_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (slot) DO NOTHING";
        self.exec(SQL, &[&slot])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
