use crate::adapters::storage::LocalStorage;
use crate::core::database::Database;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub uploads: LocalStorage,
}

impl AppState {
    pub fn new(db: Database, uploads: LocalStorage) -> Self {
        Self { db, uploads }
    }
}
