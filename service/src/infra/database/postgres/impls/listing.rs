//! [`Listing`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Lock, Select, Update, UpdateIf};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{listing, meal, user, Listing, Meal, User},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns selected to build a [`Listing`].
const COLUMNS: &str = "\
    id, seller_id, buyer_id, pending_buyer_id, reservation_code, meal_id, \
    price, status, created_at, updated_at, sold_at, pending_until, \
    payment_claimed_at, cancelled_by_buyer_at, rejected_by_seller_at, \
    cancelled_at, revision";

/// Builds a [`Listing`] out of the provided [`COLUMNS`] row.
fn listing_from(row: &Row) -> Listing {
    Listing {
        id: row.get("id"),
        seller_id: row.get("seller_id"),
        buyer_id: row.get("buyer_id"),
        pending_buyer_id: row.get("pending_buyer_id"),
        code: row.get("reservation_code"),
        meal_id: row.get("meal_id"),
        price: row.get("price"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        revision: row.get("revision"),
        sold_at: row.get("sold_at"),
        pending_until: row.get("pending_until"),
        payment_claimed_at: row.get("payment_claimed_at"),
        cancelled_by_buyer_at: row.get("cancelled_by_buyer_at"),
        rejected_by_seller_at: row.get("rejected_by_seller_at"),
        cancelled_at: row.get("cancelled_at"),
    }
}

/// Selects [`read::listing::Released`] out of a `released` relation having
/// `id`, `seller_id`, `pending_buyer_id` and `meal_id` columns.
const RELEASED: &str = "\
    SELECT r.id, \
           r.seller_id, s.chat_id AS seller_chat_id, \
           r.pending_buyer_id, b.chat_id AS pending_buyer_chat_id, \
           m.description \
    FROM released AS r \
    INNER JOIN users AS s ON s.id = r.seller_id \
    LEFT JOIN users AS b ON b.id = r.pending_buyer_id \
    LEFT JOIN meals AS m ON m.id = r.meal_id \
    ORDER BY r.id ASC";

/// Builds a [`read::listing::Released`] out of the provided [`RELEASED`] row.
fn released_from(row: &Row) -> read::listing::Released {
    let pending_buyer_id: Option<user::Id> = row.get("pending_buyer_id");
    let pending_buyer_chat_id: Option<user::ChatId> =
        row.get("pending_buyer_chat_id");
    read::listing::Released {
        listing_id: row.get("id"),
        seller: read::user::Contact {
            id: row.get("seller_id"),
            chat_id: row.get("seller_chat_id"),
        },
        pending_buyer: pending_buyer_id.zip(pending_buyer_chat_id).map(
            |(id, chat_id)| read::user::Contact { id, chat_id },
        ),
        meal: row.get("description"),
    }
}

impl<C, IDs> Database<Select<By<HashMap<listing::Id, Listing>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[listing::Id]>,
{
    type Ok = HashMap<listing::Id, Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<listing::Id, Listing>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        let ids: &[listing::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM listings \
             WHERE id = ANY($1::UUID[])",
        );
        Ok(self
            .query(sql.as_str(), &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(listing_from)
            .map(|l| (l.id, l))
            .collect())
    }
}

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<listing::Id, Listing>, [listing::Id; 1]>>,
        Ok = HashMap<listing::Id, Listing>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<read::listing::CodeIsActive, listing::Code>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::listing::CodeIsActive;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::listing::CodeIsActive, listing::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();

        const SQL: &str = "\
            SELECT EXISTS (\
                SELECT 1 \
                FROM listings \
                WHERE reservation_code = $1::VARCHAR \
                  AND status = ANY($2::INT2[])\
            ) AS active";
        let active = [
            listing::Status::Available,
            listing::Status::AwaitingConfirmation,
            listing::Status::Sold,
        ];
        let row = self
            .query_opt(SQL, &[&code, &active.as_slice()])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(read::listing::CodeIsActive(
            row.is_some_and(|r| r.get("active")),
        ))
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            seller_id,
            buyer_id,
            pending_buyer_id,
            code,
            meal_id,
            price,
            status,
            created_at,
            updated_at,
            revision,
            sold_at,
            pending_until,
            payment_claimed_at,
            cancelled_by_buyer_at,
            rejected_by_seller_at,
            cancelled_at,
        } = listing;

        let sql = format!(
            "INSERT INTO listings ({COLUMNS}) \
             VALUES (\
                 $1::UUID, $2::UUID, $3::UUID, $4::UUID, $5::VARCHAR, \
                 $6::UUID, $7::NUMERIC, $8::INT2, \
                 $9::TIMESTAMPTZ, $10::TIMESTAMPTZ, $11::TIMESTAMPTZ, \
                 $12::TIMESTAMPTZ, $13::TIMESTAMPTZ, $14::TIMESTAMPTZ, \
                 $15::TIMESTAMPTZ, $16::TIMESTAMPTZ, $17::INT8\
             )",
        );
        self.exec(
            sql.as_str(),
            &[
                &id,
                &seller_id,
                &buyer_id,
                &pending_buyer_id,
                &code,
                &meal_id,
                &price,
                &status,
                &created_at,
                &updated_at,
                &sold_at,
                &pending_until,
                &payment_claimed_at,
                &cancelled_by_buyer_at,
                &rejected_by_seller_at,
                &cancelled_at,
                &revision,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<UpdateIf<Listing, listing::Expected>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        UpdateIf(listing, expected): UpdateIf<Listing, listing::Expected>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            seller_id: _,
            buyer_id,
            pending_buyer_id,
            code: _,
            meal_id: _,
            price,
            status,
            created_at: _,
            updated_at,
            revision,
            sold_at,
            pending_until,
            payment_claimed_at,
            cancelled_by_buyer_at,
            rejected_by_seller_at,
            cancelled_at,
        } = listing;
        let listing::Expected {
            status: expected_status,
            pending_buyer_id: expected_pending_buyer_id,
            revision: expected_revision,
        } = expected;

        const SQL: &str = "\
            UPDATE listings \
            SET buyer_id = $2::UUID, \
                pending_buyer_id = $3::UUID, \
                price = $4::NUMERIC, \
                status = $5::INT2, \
                updated_at = $6::TIMESTAMPTZ, \
                sold_at = $7::TIMESTAMPTZ, \
                pending_until = $8::TIMESTAMPTZ, \
                payment_claimed_at = $9::TIMESTAMPTZ, \
                cancelled_by_buyer_at = $10::TIMESTAMPTZ, \
                rejected_by_seller_at = $11::TIMESTAMPTZ, \
                cancelled_at = $12::TIMESTAMPTZ, \
                revision = $15::INT8 \
            WHERE id = $1::UUID \
              AND status = $13::INT2 \
              AND pending_buyer_id IS NOT DISTINCT FROM $14::UUID \
              AND revision = $16::INT8";
        let updated = self
            .exec(
                SQL,
                &[
                    &id,
                    &buyer_id,
                    &pending_buyer_id,
                    &price,
                    &status,
                    &updated_at,
                    &sold_at,
                    &pending_until,
                    &payment_claimed_at,
                    &cancelled_by_buyer_at,
                    &rejected_by_seller_at,
                    &cancelled_at,
                    &expected_status,
                    &expected_pending_buyer_id,
                    &revision,
                    &expected_revision,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        Ok(updated == 1)
    }
}

impl<C>
    Database<Update<By<Vec<read::listing::Released>, read::listing::Overdue>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<read::listing::Released>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<
            By<Vec<read::listing::Released>, read::listing::Overdue>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::listing::Overdue(now): read::listing::Overdue =
            by.into_inner();

        // Rows being transitioned concurrently are left for the next sweep.
        let sql = format!(
            "WITH overdue AS (\
                 SELECT id, pending_buyer_id \
                 FROM listings \
                 WHERE status = $2::INT2 \
                   AND pending_until < $1::TIMESTAMPTZ \
                 FOR UPDATE SKIP LOCKED\
             ), \
             released AS (\
                 UPDATE listings AS l \
                 SET status = $3::INT2, \
                     pending_buyer_id = NULL, \
                     pending_until = NULL, \
                     payment_claimed_at = NULL, \
                     updated_at = $1::TIMESTAMPTZ, \
                     revision = l.revision + 1 \
                 FROM overdue AS o \
                 WHERE l.id = o.id \
                 RETURNING l.id, l.seller_id, o.pending_buyer_id, l.meal_id\
             ) \
             {RELEASED}",
        );
        Ok(self
            .query(
                sql.as_str(),
                &[
                    &now,
                    &listing::Status::AwaitingConfirmation,
                    &listing::Status::Available,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(released_from)
            .collect())
    }
}

impl<C>
    Database<Update<By<Vec<read::listing::Released>, read::listing::Outdated>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<read::listing::Released>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<
            By<Vec<read::listing::Released>, read::listing::Outdated>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::listing::Outdated { before, at } = by.into_inner();

        let sql = format!(
            "WITH outdated AS (\
                 SELECT l.id, l.pending_buyer_id \
                 FROM listings AS l \
                 INNER JOIN meals AS m ON m.id = l.meal_id \
                 WHERE m.date < $1::DATE \
                   AND l.status = ANY($3::INT2[]) \
                 FOR UPDATE OF l\
             ), \
             released AS (\
                 UPDATE listings AS l \
                 SET status = $4::INT2, \
                     pending_buyer_id = NULL, \
                     pending_until = NULL, \
                     payment_claimed_at = NULL, \
                     updated_at = $2::TIMESTAMPTZ, \
                     revision = l.revision + 1 \
                 FROM outdated AS o \
                 WHERE l.id = o.id \
                 RETURNING l.id, l.seller_id, o.pending_buyer_id, l.meal_id\
             ) \
             {RELEASED}",
        );
        let expirable = [
            listing::Status::Available,
            listing::Status::AwaitingConfirmation,
        ];
        Ok(self
            .query(
                sql.as_str(),
                &[
                    &before,
                    &at,
                    &expirable.as_slice(),
                    &listing::Status::Expired,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(released_from)
            .collect())
    }
}

impl<C, IDs>
    Database<Select<By<HashMap<listing::Id, read::listing::Details>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[listing::Id]>,
    Self: Database<
            Select<By<HashMap<listing::Id, Listing>, IDs>>,
            Ok = HashMap<listing::Id, Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<user::Id, User>, Vec<user::Id>>>,
            Ok = HashMap<user::Id, User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<meal::Id, Meal>, Vec<meal::Id>>>,
            Ok = HashMap<meal::Id, Meal>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = HashMap<listing::Id, read::listing::Details>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<HashMap<listing::Id, read::listing::Details>, IDs>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let listings: HashMap<listing::Id, Listing> = self
            .execute(Select(By::new(by.into_inner())))
            .await
            .map_err(tracerr::wrap!())?;
        if listings.is_empty() {
            return Ok(HashMap::new());
        }

        let seller_ids =
            listings.values().map(|l| l.seller_id).unique().collect_vec();
        let meal_ids =
            listings.values().map(|l| l.meal_id).unique().collect_vec();
        let sellers: HashMap<user::Id, User> = self
            .execute(Select(By::new(seller_ids)))
            .await
            .map_err(tracerr::wrap!())?;
        let meals: HashMap<meal::Id, Meal> = self
            .execute(Select(By::new(meal_ids)))
            .await
            .map_err(tracerr::wrap!())?;

        // Several listings may share a seller or a meal.
        let mut details = HashMap::with_capacity(listings.len());
        for (id, listing) in listings {
            let (Some(seller), Some(meal)) = (
                sellers.get(&listing.seller_id).cloned(),
                meals.get(&listing.meal_id).cloned(),
            ) else {
                continue;
            };
            _ = details.insert(
                id,
                read::listing::Details {
                    listing,
                    seller,
                    meal,
                },
            );
        }
        Ok(details)
    }
}

impl<C> Database<Select<By<Option<read::listing::Details>, listing::Id>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<listing::Id, read::listing::Details>, [listing::Id; 1]>>,
        Ok = HashMap<listing::Id, read::listing::Details>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<read::listing::Details>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<read::listing::Details>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C>
    Database<
        Select<By<read::listing::list::Page, read::listing::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<listing::Id, read::listing::Details>, Vec<listing::Id>>>,
        Ok = HashMap<listing::Id, read::listing::Details>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::listing::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::listing::list::Page, read::listing::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        use listing::Status as S;
        use read::listing::list::Filter as F;

        let read::listing::list::Selector { arguments, filter } =
            by.into_inner();

        let (available, pending, sold) = (
            S::Available.u8(),
            S::AwaitingConfirmation.u8(),
            S::Sold.u8(),
        );
        let (condition, order, param): (String, &str, &(dyn ToSql + Sync)) =
            match &filter {
                F::Available { served_since } => (
                    format!(
                        "l.status = {available} AND l.meal_id IN (\
                             SELECT id FROM meals WHERE date >= $1::DATE\
                         )",
                    ),
                    "l.created_at DESC, l.id ASC",
                    served_since,
                ),
                F::ActiveOf(seller_id) => (
                    format!(
                        "l.seller_id = $1::UUID \
                         AND l.status IN ({available}, {pending})",
                    ),
                    "l.created_at DESC, l.id ASC",
                    seller_id,
                ),
                F::PurchasedBy(buyer_id) => (
                    format!("l.buyer_id = $1::UUID AND l.status = {sold}"),
                    "l.sold_at DESC, l.id ASC",
                    buyer_id,
                ),
                F::SoldBy(seller_id) => (
                    format!("l.seller_id = $1::UUID AND l.status = {sold}"),
                    "l.sold_at DESC, l.id ASC",
                    seller_id,
                ),
            };

        let count_sql = format!(
            "SELECT COUNT(*) AS total \
             FROM listings AS l \
             WHERE {condition}",
        );
        let total = self
            .query_opt(count_sql.as_str(), &[param])
            .await
            .map_err(tracerr::wrap!())?
            .map_or(0, |r| r.get::<_, i64>("total"));
        let total = u64::try_from(total).unwrap_or_default();

        let limit = i64::from(arguments.limit());
        let offset = i64::try_from(arguments.offset()).unwrap_or(i64::MAX);
        let ids_sql = format!(
            "SELECT l.id \
             FROM listings AS l \
             WHERE {condition} \
             ORDER BY {order} \
             LIMIT $2::INT8 OFFSET $3::INT8",
        );
        let ids = self
            .query(ids_sql.as_str(), &[param, &limit, &offset])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|r| r.get::<_, listing::Id>("id"))
            .collect_vec();

        let mut details: HashMap<listing::Id, read::listing::Details> = self
            .execute(Select(By::new(ids.clone())))
            .await
            .map_err(tracerr::wrap!())?;
        let items = ids
            .into_iter()
            .filter_map(|id| details.remove(&id))
            .collect_vec();

        Ok(read::listing::list::Page::new(arguments, items, total))
    }
}

impl<C> Database<Lock<By<Listing, listing::CodeHash>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::CodeHash>>,
    ) -> Result<Self::Ok, Self::Err> {
        let hash: listing::CodeHash = by.into_inner();

        const SQL: &str = "\
            INSERT INTO listings_code_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (hash) DO NOTHING";
        self.exec(SQL, &[&hash])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
