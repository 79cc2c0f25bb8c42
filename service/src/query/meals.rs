//! [`Query`] collection related to multiple [`Meal`]s.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::Meal,
    infra::{database, Database},
    read, Service,
};

use super::Query;

/// Queries [`Meal`]s a reservation may still be sold for: the ones served
/// today or later, in serving order.
#[derive(Clone, Copy, Debug)]
pub struct ForSelling;

impl<Db> Query<ForSelling> for Service<Db>
where
    Db: Database<
        Select<By<Vec<Meal>, read::meal::ServedSince>>,
        Ok = Vec<Meal>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Vec<Meal>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: ForSelling) -> Result<Self::Ok, Self::Err> {
        let since = read::meal::ServedSince(self.clock().today());
        self.database()
            .execute(Select(By::new(since)))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::fixture::Env;

    use super::ForSelling;

    #[tokio::test]
    async fn lists_todays_and_upcoming_meals() {
        let env = Env::new();
        let yesterday = env.today().previous().unwrap();
        let tomorrow = env.today().next().unwrap();
        _ = env.meal_on(yesterday, "Ash reshteh", None).await;
        let upcoming = env.meal_on(tomorrow, "Ghormeh sabzi", None).await;
        let today = env.meal(None).await;

        let meals = env.service.execute(ForSelling).await.unwrap();

        let ids = meals.iter().map(|m| m.id).collect::<Vec<_>>();
        assert_eq!(ids, [today.id, upcoming.id]);
    }
}
