use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, Statement};

use crate::{Currency, Money, ResultEngine};

use super::Engine;

impl Engine {
    /// Category sums over `[start, end]` (calendar days, inclusive), converted
    /// to the display currency selected at call time.
    ///
    /// Served through the report cache; no matching spends is an empty map.
    pub async fn stats_by(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultEngine<(BTreeMap<String, Money>, Currency)> {
        let sums = self
            .reports
            .get_or_compute(start, end, || {
                self.category_sums(start.date_naive(), end.date_naive())
            })
            .await?;

        let state = self.budget_state().await?;
        let rate = self.rate(state.display_currency).await?;
        let converted = sums
            .into_iter()
            .map(|(name, amount)| Ok((name, amount.from_canonical(rate)?)))
            .collect::<ResultEngine<BTreeMap<_, _>>>()?;
        Ok((converted, state.display_currency))
    }

    /// Canonical sums per category name, straight from the spend log.
    pub async fn category_sums(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<BTreeMap<String, Money>> {
        let rows = self
            .database
            .query_all(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "SELECT c.name AS name, SUM(s.amount) AS total \
                 FROM spendings s \
                 JOIN categories c ON c.id = s.category_id \
                 WHERE s.date BETWEEN ? AND ? \
                 GROUP BY c.name",
                vec![start.into(), end.into()],
            ))
            .await?;

        let mut sums = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("", "name")?;
            let total: i64 = row.try_get("", "total")?;
            sums.insert(name, Money::new(total));
        }
        Ok(sums)
    }
}
