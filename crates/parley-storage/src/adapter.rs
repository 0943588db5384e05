// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::types::{QueuedMessage, StoredMessage, StoredRecord};
use parley_core::{AdapterType, HealthStatus, ParleyError, PluginAdapter, StorageAdapter, TagQuery};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened on [`StorageAdapter::initialize`]; every other
/// operation fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(db: &Database) -> Result<(), ParleyError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        Self::checkpoint(self.db()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Exchange records ---

    async fn save_record(&self, record: &StoredRecord) -> Result<(), ParleyError> {
        queries::records::insert_record(self.db()?, record).await
    }

    async fn update_record(&self, record: &StoredRecord) -> Result<(), ParleyError> {
        queries::records::update_record(self.db()?, record).await
    }

    async fn get_record(
        &self,
        record_type: &str,
        id: &str,
    ) -> Result<Option<StoredRecord>, ParleyError> {
        queries::records::get_record(self.db()?, record_type, id).await
    }

    async fn find_records(
        &self,
        record_type: &str,
        query: &TagQuery,
    ) -> Result<Vec<StoredRecord>, ParleyError> {
        queries::records::find_records(self.db()?, record_type, query).await
    }

    async fn delete_record(&self, record_type: &str, id: &str) -> Result<(), ParleyError> {
        queries::records::delete_record(self.db()?, record_type, id).await
    }

    // --- Protocol messages ---

    async fn save_protocol_message(&self, message: &StoredMessage) -> Result<(), ParleyError> {
        queries::messages::upsert_message(self.db()?, message).await
    }

    async fn find_protocol_message(
        &self,
        associated_record_id: &str,
        message_class: &str,
    ) -> Result<Option<StoredMessage>, ParleyError> {
        queries::messages::find_message(self.db()?, associated_record_id, message_class).await
    }

    async fn find_protocol_messages(
        &self,
        associated_record_id: &str,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        queries::messages::find_messages_for_record(self.db()?, associated_record_id).await
    }

    // --- Outbound queue ---

    async fn enqueue_message(
        &self,
        connection_id: &str,
        payload: &[u8],
    ) -> Result<i64, ParleyError> {
        queries::queue::enqueue(self.db()?, connection_id, payload).await
    }

    async fn take_queued_messages(
        &self,
        connection_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueuedMessage>, ParleyError> {
        queries::queue::take(self.db()?, connection_id, limit).await
    }

    async fn queued_message_count(&self, connection_id: &str) -> Result<usize, ParleyError> {
        queries::queue::count(self.db()?, connection_id).await
    }
}
