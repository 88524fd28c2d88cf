use crate::utils::error::{EtlError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Longest identifier accepted for tables and columns.
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_database_url(field_name: &str, url_str: &str) -> Result<()> {
    let invalid = |reason: String| EtlError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: url_str.to_string(),
        reason,
    };

    if url_str.trim().is_empty() {
        return Err(invalid("Database URL cannot be empty".to_string()));
    }

    let url = Url::parse(url_str).map_err(|e| invalid(format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "sqlite" => Ok(()),
        scheme => Err(invalid(format!(
            "Unsupported database scheme: {} (only sqlite is supported)",
            scheme
        ))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extensions(
    field_name: &str,
    files: &[String],
    allowed_extensions: &[&str],
) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    for file in files {
        if let Some(extension) = std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            if !allowed_set.contains(extension.to_ascii_lowercase().as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.clone(),
                    reason: format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        extension,
                        allowed_extensions.join(", ")
                    ),
                });
            }
        } else {
            return Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: file.clone(),
                reason: "File has no extension or invalid filename".to_string(),
            });
        }
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Table and column names end up inside DDL, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(EtlError::InvalidIdentifier {
            name: name.to_string(),
            reason: format!("longer than {} characters", MAX_IDENTIFIER_LEN),
        });
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(EtlError::InvalidIdentifier {
            name: name.to_string(),
            reason: "must start with a letter or underscore and contain only letters, digits and underscores"
                .to_string(),
        });
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(EtlError::InvalidIdentifier {
            name: name.to_string(),
            reason: "the sqlite_ prefix is reserved".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("client.api_base_url", "https://example.com").is_ok());
        assert!(validate_url("client.api_base_url", "http://127.0.0.1:8000").is_ok());
        assert!(validate_url("client.api_base_url", "").is_err());
        assert!(validate_url("client.api_base_url", "invalid-url").is_err());
        assert!(validate_url("client.api_base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_database_url() {
        assert!(validate_database_url("database.url", "sqlite://sundaes.db").is_ok());
        assert!(validate_database_url("database.url", "sqlite::memory:").is_ok());
        assert!(validate_database_url("database.url", "postgres://localhost/db").is_err());
        assert!(validate_database_url("database.url", "  ").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("database.max_connections", 5, 1).is_ok());
        assert!(validate_positive_number("database.max_connections", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extensions() {
        let files = vec!["sundaes.json".to_string(), "SALES.JSON".to_string()];
        assert!(validate_file_extensions("file", &files, &["json"]).is_ok());

        let invalid_files = vec!["sales.csv".to_string()];
        assert!(validate_file_extensions("file", &invalid_files, &["json"]).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("sundaes").is_ok());
        assert!(validate_identifier("_private_col2").is_ok());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("name; DROP TABLE sales").is_err());
        assert!(validate_identifier("with-dash").is_err());
        assert!(validate_identifier("sqlite_master").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }
}
