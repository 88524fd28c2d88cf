use crate::config::app_config::SeedConfig;
use crate::core::database::Database;
use crate::core::etl::EtlEngine;
use crate::core::pipeline::JsonLoadPipeline;
use crate::core::Storage;
use crate::domain::model::LoadOutcome;
use crate::utils::error::Result;

/// Initial setup: optionally reset, then load sundaes before sales so the
/// foreign keys resolve.
pub async fn seed_database<S: Storage + Clone>(
    db: &Database,
    storage: &S,
    seed: &SeedConfig,
    reset: bool,
) -> Result<Vec<LoadOutcome>> {
    if reset {
        db.reset().await?;
    } else {
        db.ensure_base_schema().await?;
    }

    let mut outcomes = Vec::with_capacity(2);
    for (file, table) in [(&seed.sundaes_file, "sundaes"), (&seed.sales_file, "sales")] {
        tracing::info!("🔹 Loading {} into '{}'", file, table);
        let pipeline = JsonLoadPipeline::new(
            storage.clone(),
            db.clone(),
            file.as_str(),
            Some(table.to_string()),
        )?;
        outcomes.push(EtlEngine::new(pipeline).run().await?);
    }

    tracing::info!("✅ Database setup complete");
    Ok(outcomes)
}
