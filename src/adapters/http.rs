use crate::domain::model::{RevenueReport, Sundae, SundaeWithMetrics};
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const CHART_WIDTH: usize = 40;

/// Talks to a running sundae API, the way the revenue dashboard does.
pub struct SundaeApiClient {
    client: Client,
    base_url: Url,
}

impl SundaeApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| EtlError::InvalidConfigValueError {
            field: "client.api_base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(EtlError::InvalidConfigValueError {
                field: "client.api_base_url".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, resource: &str) -> Result<T> {
        tracing::debug!("Making API request to: {}", url);
        let response = self.client.get(url.clone()).send().await?;
        tracing::debug!("API response status: {}", response.status());

        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(EtlError::not_found(resource)),
            status => Err(EtlError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    pub async fn fetch_sundae(&self, id: &str) -> Result<SundaeWithMetrics> {
        let url = self.endpoint(&["sundaes", id]);
        self.get_json(url, "Sundae").await
    }

    pub async fn fetch_sundaes(&self) -> Result<Vec<Sundae>> {
        let url = self.endpoint(&["sundaes"]);
        self.get_json(url, "Sundae list").await
    }

    pub async fn fetch_revenue_report(&self) -> Result<RevenueReport> {
        let url = self.endpoint(&["reports", "revenue"]);
        self.get_json(url, "Revenue report").await
    }

    /// Chart for one sundae, or the revenue of every sundae when no id is given.
    /// An unknown id is reported together with the ids the server does know.
    pub async fn analyze(&self, id: Option<&str>) -> Result<String> {
        let Some(id) = id else {
            let report = self.fetch_revenue_report().await?;
            return Ok(render_revenue_chart(&report));
        };

        match self.fetch_sundae(id).await {
            Ok(sundae) => Ok(render_chart(&sundae)),
            Err(EtlError::NotFound { .. }) => {
                let known: Vec<String> = self
                    .fetch_sundaes()
                    .await?
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
                tracing::debug!("Known sundaes: {:?}", known);
                Err(EtlError::not_found(format!(
                    "Sundae '{}' (available: {})",
                    id,
                    if known.is_empty() { "none".to_string() } else { known.join(", ") }
                )))
            }
            Err(e) => Err(e),
        }
    }
}

fn bar(value: f64, max: f64) -> String {
    let len = if max > 0.0 {
        ((value / max) * CHART_WIDTH as f64).round() as usize
    } else {
        0
    };
    "█".repeat(len.min(CHART_WIDTH))
}

/// Text rendering of the volume/revenue bar chart.
pub fn render_chart(sundae: &SundaeWithMetrics) -> String {
    let volume = sundae.volume as f64;
    let max = volume.max(sundae.revenue);

    let mut out = String::new();
    out.push_str(&format!("Revenue and Volume for Sundae: {}\n", sundae.id));
    out.push_str(&format!("{} ({})\n", sundae.name, sundae.description.as_deref().unwrap_or("-")));
    out.push_str(&format!("Volume  | {} {}\n", bar(volume, max), sundae.volume));
    out.push_str(&format!("Revenue | {} {:.2}\n", bar(sundae.revenue, max), sundae.revenue));
    out
}

/// One revenue bar per sundae, scaled to the best seller.
pub fn render_revenue_chart(report: &RevenueReport) -> String {
    let max = report.rows.iter().map(|r| r.revenue).fold(0.0, f64::max);
    let width = report
        .rows
        .iter()
        .map(|r| r.sundae_name.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::from("Revenue by Sundae\n");
    for row in &report.rows {
        out.push_str(&format!(
            "{:<width$} | {} {:.2} ({} sold)\n",
            row.sundae_name,
            bar(row.revenue, max),
            row.revenue,
            row.volume,
            width = width
        ));
    }
    out.push_str(&format!("Total Revenue: {:.2}\n", report.total_revenue));
    out
}
