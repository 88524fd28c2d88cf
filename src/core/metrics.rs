use crate::core::database::Database;
use crate::domain::model::{round_currency, RevenueReport, RevenueRow, Sundae, SundaeWithMetrics};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};

fn format_timestamp(seconds: Option<f64>) -> Option<String> {
    let millis = (seconds? * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

impl Database {
    pub async fn list_sundaes(&self) -> Result<Vec<Sundae>> {
        let sundaes = sqlx::query_as::<_, Sundae>(
            "SELECT id, name, description FROM sundaes ORDER BY rowid",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(sundaes)
    }

    /// Volume is the number of sales rows, revenue the sum of their prices.
    pub async fn sundae_with_metrics(&self, id: &str) -> Result<Option<SundaeWithMetrics>> {
        let Some(sundae) = sqlx::query_as::<_, Sundae>(
            "SELECT id, name, description FROM sundaes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        else {
            return Ok(None);
        };

        let (volume, revenue): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), CAST(COALESCE(SUM(price), 0) AS REAL) FROM sales WHERE sundae_id = ?1",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        Ok(Some(SundaeWithMetrics {
            id: sundae.id,
            name: sundae.name,
            description: sundae.description,
            volume,
            revenue: round_currency(revenue),
        }))
    }

    /// Sale times that are not numeric (text stored in the REAL column) are
    /// left out of `first_sale` / `last_sale` but still count towards volume.
    pub async fn revenue_report(&self) -> Result<RevenueReport> {
        let rows: Vec<(String, String, i64, f64, Option<f64>, Option<f64>)> = sqlx::query_as(
            "SELECT
                s.id,
                s.name,
                COUNT(sa.id) AS volume,
                CAST(COALESCE(SUM(sa.price), 0) AS REAL) AS revenue,
                CAST(MIN(CASE WHEN typeof(sa.timestamp) IN ('integer', 'real') THEN sa.timestamp END) AS REAL),
                CAST(MAX(CASE WHEN typeof(sa.timestamp) IN ('integer', 'real') THEN sa.timestamp END) AS REAL)
            FROM sundaes s
            LEFT JOIN sales sa ON sa.sundae_id = s.id
            GROUP BY s.id, s.name
            ORDER BY revenue DESC, s.id",
        )
        .fetch_all(self.pool())
        .await?;

        let total_volume = rows.iter().map(|r| r.2).sum();
        let total_revenue = round_currency(rows.iter().map(|r| r.3).sum());
        let top_sundae = rows
            .first()
            .filter(|r| r.2 > 0)
            .map(|r| r.1.clone());

        let rows = rows
            .into_iter()
            .map(
                |(sundae_id, sundae_name, volume, revenue, first, last)| RevenueRow {
                    sundae_id,
                    sundae_name,
                    volume,
                    revenue: round_currency(revenue),
                    first_sale: format_timestamp(first),
                    last_sale: format_timestamp(last),
                },
            )
            .collect();

        tracing::debug!("Revenue report: total {:.2} over {} sales", total_revenue, total_volume);
        Ok(RevenueReport {
            rows,
            total_volume,
            total_revenue,
            top_sundae,
        })
    }
}
