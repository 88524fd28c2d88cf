pub mod database;
pub mod etl;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod setup;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
