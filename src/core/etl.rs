use crate::core::Pipeline;
use crate::domain::model::LoadOutcome;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<LoadOutcome> {
        let started = Instant::now();
        tracing::info!("🚀 Starting ETL process...");

        // Extract
        tracing::info!("Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", raw_data.len());

        // Transform
        tracing::info!("Planning schema changes...");
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "{} new column(s) for '{}'{}",
            transformed.plan.columns().len(),
            transformed.table,
            if transformed.plan.creates_table() {
                " (new table)"
            } else {
                ""
            }
        );

        // Load
        tracing::info!("Loading data...");
        let outcome = self.pipeline.load(transformed).await?;
        tracing::info!(
            "✅ ETL finished for '{}' in {:?} ({} records, applied: {})",
            outcome.table,
            started.elapsed(),
            outcome.records,
            outcome.applied
        );

        Ok(outcome)
    }
}
