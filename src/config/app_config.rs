use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "sundae.toml";

pub const REPORT_FORMATS: [&str; 3] = ["csv", "tsv", "json"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub seed: SeedConfig,
    pub report: ReportConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sundaes.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Uploaded JSON payloads are kept here before they are loaded.
    pub upload_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            upload_dir: "./uploads".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub sundaes_file: String,
    pub sales_file: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            sundaes_file: "data/sundaes.json".to_string(),
            sales_file: "data/sales.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: "./output".to_string(),
            output_formats: vec!["csv".to_string(), "json".to_string()],
            compression: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filename: "revenue_report.zip".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// 依序：指定檔案 → 預設檔案 → 內建預設值，最後套用環境變數
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DB_PATH})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// `DATABASE_URL`, `HOST` and `PORT` win over the file.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            tracing::debug!("DATABASE_URL overrides database.url");
            self.database.url = url;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|e| EtlError::InvalidConfigValueError {
                field: "PORT".to_string(),
                value: port.clone(),
                reason: format!("{}", e),
            })?;
        }
        Ok(())
    }

    pub fn compression_enabled(&self) -> bool {
        self.report
            .compression
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(false)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_database_url("database.url", &self.database.url)?;
        validation::validate_positive_number(
            "database.max_connections",
            self.database.max_connections as usize,
            1,
        )?;

        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validation::validate_path("server.upload_dir", &self.server.upload_dir)?;

        validation::validate_path("seed.sundaes_file", &self.seed.sundaes_file)?;
        validation::validate_path("seed.sales_file", &self.seed.sales_file)?;

        validation::validate_path("report.output_path", &self.report.output_path)?;
        if self.report.output_formats.is_empty() {
            return Err(EtlError::InvalidConfigValueError {
                field: "report.output_formats".to_string(),
                value: String::new(),
                reason: "At least one output format is required".to_string(),
            });
        }
        for format in &self.report.output_formats {
            if !REPORT_FORMATS.contains(&format.as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "report.output_formats".to_string(),
                    value: format.clone(),
                    reason: format!(
                        "Unsupported format. Valid formats: {}",
                        REPORT_FORMATS.join(", ")
                    ),
                });
            }
        }
        if let Some(compression) = &self.report.compression {
            validation::validate_file_extensions(
                "report.compression.filename",
                std::slice::from_ref(&compression.filename),
                &["zip"],
            )?;
        }

        validation::validate_url("client.api_base_url", &self.client.api_base_url)?;
        validation::validate_positive_number(
            "client.timeout_seconds",
            self.client.timeout_seconds as usize,
            1,
        )?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(EtlError::InvalidConfigValueError {
                field: "logging.level".to_string(),
                value: other.to_string(),
                reason: "Expected one of trace, debug, info, warn, error".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8000);
        assert!(!config.compression_enabled());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
[database]
url = "sqlite://parlor.db"

[report]
output_formats = ["csv", "tsv"]

[report.compression]
enabled = true
filename = "bundle.zip"
"#,
        )
        .unwrap();

        assert_eq!(config.database.url, "sqlite://parlor.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.report.output_formats, vec!["csv", "tsv"]);
        assert!(config.compression_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_env_var_is_left_in_place() {
        let config = AppConfig::from_toml_str(
            r#"
[server]
upload_dir = "${SUNDAE_ETL_TEST_SURELY_UNSET}/uploads"
"#,
        )
        .unwrap();
        assert_eq!(
            config.server.upload_dir,
            "${SUNDAE_ETL_TEST_SURELY_UNSET}/uploads"
        );
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = AppConfig::from_toml_str("[database\nurl = 1").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("DATABASE_URL", "sqlite::memory:"), ("PORT", "9090")]
            .into_iter()
            .collect();
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_bad_port_override_fails() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| (key == "PORT").then(|| "eighty".to_string()));
        assert!(matches!(
            result,
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.report.output_formats = vec!["xlsx".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/sundaes".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.report.compression = Some(CompressionConfig {
            enabled: true,
            filename: "bundle.tar".to_string(),
        });
        assert!(config.validate().is_err());
    }
}
