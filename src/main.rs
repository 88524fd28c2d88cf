use clap::Parser;
use std::time::Duration;
use sundae_etl::core::setup::seed_database;
use sundae_etl::utils::error::ErrorSeverity;
use sundae_etl::utils::validation::{validate_file_extensions, Validate};
use sundae_etl::utils::logger;
use sundae_etl::{
    api, AppConfig, AppState, CliConfig, Command, Database, EtlEngine, EtlError, JsonLoadPipeline,
    LocalStorage, ReportWriter, SundaeApiClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 載入配置
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(mut config) => {
            cli.apply_to(&mut config);
            config
        }
        Err(e) => {
            logger::init_cli_logger(cli.verbose, "info");
            exit_with(e);
        }
    };

    // 初始化日誌
    if config.logging.json {
        logger::init_json_logger(cli.verbose, &config.logging.level);
    } else {
        logger::init_cli_logger(cli.verbose, &config.logging.level);
    }

    tracing::info!("Starting sundae-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(e);
    }

    if let Err(e) = run(cli.command, config).await {
        exit_with(e);
    }

    Ok(())
}

async fn run(command: Command, config: AppConfig) -> sundae_etl::Result<()> {
    match command {
        Command::Serve { .. } => {
            let db = Database::connect(&config.database).await?;
            let state = AppState::new(db, LocalStorage::new(config.server.upload_dir.clone()));
            api::serve(&config.server, state).await?;
        }
        Command::Init { reset, .. } => {
            let db = Database::connect(&config.database).await?;
            let outcomes = seed_database(&db, &LocalStorage::new("."), &config.seed, reset).await?;
            for outcome in outcomes {
                println!("✅ {} records loaded into '{}'", outcome.records, outcome.table);
            }
        }
        Command::Load {
            file,
            table,
            dry_run,
        } => {
            validate_file_extensions("file", std::slice::from_ref(&file), &["json"])?;
            let db = Database::connect(&config.database).await?;
            let pipeline =
                JsonLoadPipeline::new(LocalStorage::new("."), db, file, table)?.dry_run(dry_run);
            let outcome = EtlEngine::new(pipeline).run().await?;

            if outcome.statements.is_empty() {
                println!("Schema of '{}' already matches the input", outcome.table);
            }
            for statement in &outcome.statements {
                println!("{}", statement);
            }
            if outcome.applied {
                println!("✅ {} records loaded into '{}'", outcome.records, outcome.table);
            } else {
                println!("🔍 Dry run: {} records would be loaded into '{}'", outcome.records, outcome.table);
            }
        }
        Command::Tables => {
            let db = Database::connect(&config.database).await?;
            for table in db.list_tables().await? {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.sql_type))
                    .collect();
                println!("{}: {}", table.name, columns.join(", "));
            }
        }
        Command::Show { table, limit } => {
            let db = Database::connect(&config.database).await?;
            let rows = db.fetch_rows(&table, limit).await?;
            if rows.is_empty() {
                println!("⚠ Table '{}' is empty", table);
            }
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Command::Report { .. } => {
            let db = Database::connect(&config.database).await?;
            let report = db.revenue_report().await?;
            if report.rows.is_empty() {
                println!("⚠ No revenue data available");
            }

            let storage = LocalStorage::new(config.report.output_path.clone());
            let written = ReportWriter::new(storage, config.report.clone())
                .write(&report)
                .await?;
            for name in written {
                println!("📁 {}/{}", config.report.output_path, name);
            }

            if let Some(top) = &report.top_sundae {
                let revenue = report.rows.first().map(|r| r.revenue).unwrap_or_default();
                println!("Top Revenue Sundae: {} with ${:.2}", top, revenue);
            }
            println!("Total Revenue: ${:.2}", report.total_revenue);
        }
        Command::Analyze { id, .. } => {
            let client = SundaeApiClient::new(
                &config.client.api_base_url,
                Duration::from_secs(config.client.timeout_seconds),
            )?;
            print!("{}", client.analyze(id.as_deref()).await?);
        }
        Command::Check => {
            let db = Database::connect(&config.database).await?;
            db.ping().await?;
            println!("Database connection successful!");
        }
    }
    Ok(())
}

fn exit_with(e: EtlError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
