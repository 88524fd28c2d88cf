use crate::config::ReportConfig;
use crate::core::Storage;
use crate::domain::model::RevenueReport;
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub struct ReportWriter<S: Storage> {
    storage: S,
    config: ReportConfig,
}

impl<S: Storage> ReportWriter<S> {
    pub fn new(storage: S, config: ReportConfig) -> Self {
        Self { storage, config }
    }

    fn render(&self, report: &RevenueReport, format: &str) -> Result<Vec<u8>> {
        match format {
            "csv" => render_delimited(report, b','),
            "tsv" => render_delimited(report, b'\t'),
            "json" => Ok(serde_json::to_vec_pretty(report)?),
            other => Err(EtlError::InvalidConfigValueError {
                field: "report.output_formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format".to_string(),
            }),
        }
    }

    /// Writes every configured format, returns the file names written.
    pub async fn write(&self, report: &RevenueReport) -> Result<Vec<String>> {
        let mut rendered = Vec::with_capacity(self.config.output_formats.len());
        for format in &self.config.output_formats {
            let name = format!("revenue_report.{}", format);
            rendered.push((name, self.render(report, format)?));
        }

        match self.config.compression.as_ref().filter(|c| c.enabled) {
            Some(compression) => {
                tracing::debug!("Creating ZIP file with {} files", rendered.len());
                let zip_data = {
                    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                    for (name, data) in &rendered {
                        zip.start_file(name.as_str(), SimpleFileOptions::default())?;
                        zip.write_all(data)?;
                    }
                    zip.finish()?.into_inner()
                };

                tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
                self.storage
                    .write_file(&compression.filename, &zip_data)
                    .await?;
                Ok(vec![compression.filename.clone()])
            }
            None => {
                let mut written = Vec::with_capacity(rendered.len());
                for (name, data) in rendered {
                    self.storage.write_file(&name, &data).await?;
                    written.push(name);
                }
                Ok(written)
            }
        }
    }
}

fn render_delimited(report: &RevenueReport, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in &report.rows {
        writer.serialize(row)?;
    }
    if report.rows.is_empty() {
        writer.write_record([
            "sundae_id",
            "sundae_name",
            "volume",
            "revenue",
            "first_sale",
            "last_sale",
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}
