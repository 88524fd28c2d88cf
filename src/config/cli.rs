use crate::config::app_config::{AppConfig, CompressionConfig};
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "sundae-etl")]
#[command(about = "Load sundae sales data, serve it over HTTP and report on revenue")]
pub struct CliConfig {
    /// Path to a TOML configuration file (defaults to ./sundae.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the base tables and load the seed files
    Init {
        /// Drop the sundaes and sales tables first
        #[arg(long)]
        reset: bool,
        #[arg(long)]
        sundaes: Option<String>,
        #[arg(long)]
        sales: Option<String>,
    },
    /// Load a JSON array into a table, adding columns as needed
    Load {
        file: String,
        /// Target table (defaults to the file name without extension)
        #[arg(long)]
        table: Option<String>,
        /// Show the schema changes without touching the database
        #[arg(long)]
        dry_run: bool,
    },
    /// List tables and their columns
    Tables,
    /// Print rows of a table as JSON lines
    Show {
        table: String,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Write the revenue report
    Report {
        #[arg(long)]
        output: Option<String>,
        #[arg(long, value_delimiter = ',')]
        formats: Vec<String>,
        /// Bundle all formats into one ZIP archive
        #[arg(long)]
        archive: bool,
    },
    /// Chart volume and revenue from a running API (one sundae, or all of them)
    Analyze {
        id: Option<String>,
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Test the database connection
    Check,
}

impl CliConfig {
    /// Command-line flags override the file and environment.
    pub fn apply_to(&self, config: &mut AppConfig) {
        match &self.command {
            Command::Serve { host, port } => {
                if let Some(host) = host {
                    config.server.host = host.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
            }
            Command::Init { sundaes, sales, .. } => {
                if let Some(path) = sundaes {
                    config.seed.sundaes_file = path.clone();
                }
                if let Some(path) = sales {
                    config.seed.sales_file = path.clone();
                }
            }
            Command::Report {
                output,
                formats,
                archive,
            } => {
                if let Some(output) = output {
                    config.report.output_path = output.clone();
                }
                if !formats.is_empty() {
                    config.report.output_formats = formats.clone();
                }
                if *archive {
                    let compression = config.report.compression.get_or_insert_with(CompressionConfig::default);
                    compression.enabled = true;
                }
            }
            Command::Analyze { api_url, .. } => {
                if let Some(url) = api_url {
                    config.client.api_base_url = url.clone();
                }
            }
            Command::Load { .. } | Command::Tables | Command::Show { .. } | Command::Check => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_command() {
        let cli = CliConfig::try_parse_from([
            "sundae-etl",
            "load",
            "data/employees.json",
            "--dry-run",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Load {
                file,
                table,
                dry_run,
            } => {
                assert_eq!(file, "data/employees.json");
                assert_eq!(table, None);
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_report_flags_override_config() {
        let cli = CliConfig::try_parse_from([
            "sundae-etl",
            "report",
            "--output",
            "/tmp/reports",
            "--formats",
            "csv,tsv",
            "--archive",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.report.output_path, "/tmp/reports");
        assert_eq!(config.report.output_formats, vec!["csv", "tsv"]);
        assert!(config.compression_enabled());
    }

    #[test]
    fn test_analyze_id_is_optional() {
        let cli = CliConfig::try_parse_from(["sundae-etl", "analyze", "--api-url", "http://api:9000"])
            .unwrap();
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert!(matches!(cli.command, Command::Analyze { id: None, .. }));
        assert_eq!(config.client.api_base_url, "http://api:9000");
    }

    #[test]
    fn test_serve_flags_override_config() {
        let cli =
            CliConfig::try_parse_from(["sundae-etl", "--config", "x.toml", "serve", "--port", "9000"])
                .unwrap();
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
