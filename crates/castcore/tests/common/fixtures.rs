//! Throwaway SQLite ledgers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use castcore::storage::broadcasts::{create_broadcast, get_broadcast, Broadcast, NewBroadcast};
use castcore::storage::recipients::{create_recipient, get_recipient, set_active, NewRecipient, Recipient};
use castcore::storage::{create_pool, DbConnection, DbPool};
use tempfile::TempDir;

/// A migrated ledger in a temp directory, removed on drop.
pub struct TestLedger {
    pub pool: Arc<DbPool>,
    _dir: TempDir,
}

impl TestLedger {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("ledger.sqlite");
        let pool = create_pool(path.to_str().expect("utf-8 path")).expect("create pool");
        Self {
            pool: Arc::new(pool),
            _dir: dir,
        }
    }

    pub fn conn(&self) -> DbConnection {
        self.pool.get().expect("pooled connection")
    }

    /// Registers an active recipient with the given handle.
    pub fn recipient(&self, handle: &str) -> Recipient {
        create_recipient(
            &self.conn(),
            &NewRecipient {
                telegram_id: handle.to_string(),
                first_name: Some(format!("User {}", handle)),
                ..Default::default()
            },
        )
        .expect("create recipient")
    }

    /// Registers a recipient and deactivates it.
    pub fn inactive_recipient(&self, handle: &str) -> Recipient {
        let r = self.recipient(handle);
        set_active(&self.conn(), r.id, false).expect("deactivate");
        get_recipient(&self.conn(), r.id).expect("load").expect("exists")
    }

    pub fn draft(&self, title: &str, message: &str) -> Broadcast {
        create_broadcast(&self.conn(), &NewBroadcast::new(title, message)).expect("create broadcast")
    }

    pub fn broadcast(&self, id: i64) -> Broadcast {
        get_broadcast(&self.conn(), id).expect("load broadcast").expect("broadcast exists")
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}
