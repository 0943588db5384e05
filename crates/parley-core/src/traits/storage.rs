// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{QueuedMessage, StoredMessage, StoredRecord, TagQuery};

/// Adapter for the agent's durable state: exchange records, the protocol
/// messages exchanged for them, and the store-and-forward queue.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ParleyError>;

    // --- Exchange records ---

    /// Inserts a new record. Fails with `RecordDuplicate` if the id exists.
    async fn save_record(&self, record: &StoredRecord) -> Result<(), ParleyError>;

    /// Replaces an existing record. Fails with `RecordNotFound` if absent.
    async fn update_record(&self, record: &StoredRecord) -> Result<(), ParleyError>;

    async fn get_record(
        &self,
        record_type: &str,
        id: &str,
    ) -> Result<Option<StoredRecord>, ParleyError>;

    async fn find_records(
        &self,
        record_type: &str,
        query: &TagQuery,
    ) -> Result<Vec<StoredRecord>, ParleyError>;

    async fn delete_record(&self, record_type: &str, id: &str) -> Result<(), ParleyError>;

    // --- Protocol messages ---

    /// Upserts on `(associated_record_id, message_class)`.
    async fn save_protocol_message(&self, message: &StoredMessage) -> Result<(), ParleyError>;

    async fn find_protocol_message(
        &self,
        associated_record_id: &str,
        message_class: &str,
    ) -> Result<Option<StoredMessage>, ParleyError>;

    async fn find_protocol_messages(
        &self,
        associated_record_id: &str,
    ) -> Result<Vec<StoredMessage>, ParleyError>;

    // --- Outbound queue ---

    /// Appends a packed message for a connection. Returns the entry id.
    async fn enqueue_message(&self, connection_id: &str, payload: &[u8])
    -> Result<i64, ParleyError>;

    /// Removes and returns up to `limit` queued messages in FIFO order.
    async fn take_queued_messages(
        &self,
        connection_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueuedMessage>, ParleyError>;

    async fn queued_message_count(&self, connection_id: &str) -> Result<usize, ParleyError>;
}
