pub mod adapters;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{http::SundaeApiClient, storage::LocalStorage};
pub use api::AppState;
pub use config::AppConfig;
#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use core::{database::Database, etl::EtlEngine, pipeline::JsonLoadPipeline, report::ReportWriter};
pub use utils::error::{EtlError, Result};
