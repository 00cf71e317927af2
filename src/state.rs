use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::services::admission::AdmissionService;
use crate::services::conflict::ConflictRules;

pub struct AppState {
    pub store: SqliteStore,
    pub admission: AdmissionService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let store = SqliteStore::new(Arc::new(Mutex::new(conn)));
        let rules = ConflictRules {
            weekly_meets_monthly: config.strict_cross_cycle,
        };
        let admission = AdmissionService::with_rules(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            rules,
        );
        Self {
            store,
            admission,
            config,
        }
    }
}
