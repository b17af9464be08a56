//! In-memory stand-ins for unconfigured pools outside production.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::database::MemoryDatabase;
use crate::schema::SchemaCatalog;

/// Response header marking data served from the mock store.
pub const DATA_SOURCE_HEADER: &str = "x-portal-data-source";

/// One `MemoryDatabase` per pool name. Every table a descriptor on that pool
/// declares is seeded from its `mockRows` on first use.
#[derive(Default)]
pub struct MockStore {
    databases: Mutex<HashMap<String, Arc<MemoryDatabase>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_for(&self, pool: &str, catalog: &SchemaCatalog) -> Arc<MemoryDatabase> {
        let database = match self.databases.lock() {
            Ok(mut databases) => databases.entry(pool.to_string()).or_default().clone(),
            Err(poisoned) => poisoned.into_inner().entry(pool.to_string()).or_default().clone(),
        };
        for descriptor in catalog.iter().filter(|d| d.db_pool == pool) {
            database.seed_once(&descriptor.table_name, descriptor.mock_rows.iter().cloned());
        }
        database
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCatalog;

    #[test]
    fn seeds_once_and_shares_per_pool() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let store = MockStore::new();
        let a = store.database_for("GTP_PROXY", &catalog);
        a.insert_row("gtp_imsi_ranges", Default::default());
        let b = store.database_for("GTP_PROXY", &catalog);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.rows("gtp_imsi_ranges").len(), 3);
        assert_eq!(b.rows("gtp_mccmnc_mappings").len(), 2);
        assert!(b.rows("audit_logs").is_empty());
    }
}
