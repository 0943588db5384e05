// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed exchange-record repository over the storage adapter.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use parley_bus::{EventBus, EventKind, StateChanged};
use parley_core::types::StoredRecord;
use parley_core::{ParleyError, StorageAdapter, TagQuery};
use tracing::debug;

use crate::record::{ExchangeRecord, timestamp};

/// Persists records of one family and publishes their state transitions.
pub struct Repository<R: ExchangeRecord> {
    storage: Arc<dyn StorageAdapter>,
    bus: EventBus,
    _record: PhantomData<fn() -> R>,
}

impl<R: ExchangeRecord> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            bus: self.bus.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: ExchangeRecord> Repository<R> {
    pub fn new(storage: Arc<dyn StorageAdapter>, bus: EventBus) -> Self {
        Self {
            storage,
            bus,
            _record: PhantomData,
        }
    }

    /// Inserts a new record and publishes its creation (no previous state).
    pub async fn save(&self, record: &R) -> Result<(), ParleyError> {
        self.storage.save_record(&to_stored(record)?).await?;
        debug!(
            record_type = R::RECORD_TYPE,
            record_id = record.id(),
            state = %record.state(),
            "record created"
        );
        self.publish(record, None);
        Ok(())
    }

    /// Writes the record without publishing an event.
    pub async fn update(&self, record: &R) -> Result<(), ParleyError> {
        self.storage.update_record(&to_stored(record)?).await
    }

    /// The only sanctioned way to change a record's state: mutate, persist, publish.
    pub async fn update_state(&self, record: &mut R, state: R::State) -> Result<(), ParleyError> {
        let previous = record.state();
        record.set_state(state);
        record.touch(Utc::now());
        if let Err(e) = self.update(record).await {
            record.set_state(previous);
            return Err(e);
        }
        debug!(
            record_type = R::RECORD_TYPE,
            record_id = record.id(),
            previous_state = %previous,
            state = %state,
            "record state changed"
        );
        self.publish(record, Some(previous.to_string()));
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<R, ParleyError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ParleyError::RecordNotFound {
                record_type: R::RECORD_TYPE.to_string(),
                query: format!("id={id}"),
            })
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<R>, ParleyError> {
        self.storage
            .get_record(R::RECORD_TYPE, id)
            .await?
            .map(|stored| from_stored(&stored))
            .transpose()
    }

    pub async fn find_by_query(&self, query: &TagQuery) -> Result<Vec<R>, ParleyError> {
        self.storage
            .find_records(R::RECORD_TYPE, query)
            .await?
            .iter()
            .map(from_stored)
            .collect()
    }

    /// Exactly one match, else `RecordNotFound` or `RecordDuplicate`.
    pub async fn get_single_by_query(&self, query: &TagQuery) -> Result<R, ParleyError> {
        self.find_single_by_query(query)
            .await?
            .ok_or_else(|| ParleyError::RecordNotFound {
                record_type: R::RECORD_TYPE.to_string(),
                query: query.to_string(),
            })
    }

    /// At most one match, else `RecordDuplicate`.
    pub async fn find_single_by_query(&self, query: &TagQuery) -> Result<Option<R>, ParleyError> {
        let mut records = self.find_by_query(query).await?;
        if records.len() > 1 {
            return Err(ParleyError::RecordDuplicate {
                record_type: R::RECORD_TYPE.to_string(),
                query: query.to_string(),
            });
        }
        Ok(records.pop())
    }

    pub async fn get_all(&self) -> Result<Vec<R>, ParleyError> {
        self.find_by_query(&TagQuery::new()).await
    }

    pub async fn delete(&self, record: &R) -> Result<(), ParleyError> {
        self.storage.delete_record(R::RECORD_TYPE, record.id()).await
    }

    fn publish(&self, record: &R, previous_state: Option<String>) {
        self.bus.publish(EventKind::StateChanged(StateChanged {
            record_type: R::RECORD_TYPE.to_string(),
            record_id: record.id().to_string(),
            previous_state,
            state: record.state().to_string(),
            thread_id: record.thread_id().map(str::to_string),
            connection_id: record.connection_id().map(str::to_string),
            record: serde_json::to_value(record).unwrap_or_default(),
        }));
    }
}

fn to_stored<R: ExchangeRecord>(record: &R) -> Result<StoredRecord, ParleyError> {
    let value = serde_json::to_string(record).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    Ok(StoredRecord {
        id: record.id().to_string(),
        record_type: R::RECORD_TYPE.to_string(),
        tags: record.tags(),
        value,
        created_at: timestamp(record.created_at()),
        updated_at: timestamp(record.updated_at()),
    })
}

fn from_stored<R: ExchangeRecord>(stored: &StoredRecord) -> Result<R, ParleyError> {
    serde_json::from_str(&stored.value).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use parley_bus::BusEvent;
    use parley_config::model::StorageConfig;
    use parley_storage::SqliteStorage;
    use serde::{Deserialize, Serialize};
    use strum::Display;
    use tempfile::TempDir;

    use crate::record::ProtocolState;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
    #[strum(serialize_all = "kebab-case")]
    #[serde(rename_all = "kebab-case")]
    enum PingState {
        Sent,
        Done,
    }

    impl ProtocolState for PingState {
        fn is_terminal(&self) -> bool {
            matches!(self, PingState::Done)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PingRecord {
        id: String,
        thread_id: String,
        connection_id: String,
        state: PingState,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl ExchangeRecord for PingRecord {
        const RECORD_TYPE: &'static str = "PingRecord";
        type State = PingState;

        fn id(&self) -> &str {
            &self.id
        }
        fn state(&self) -> PingState {
            self.state
        }
        fn set_state(&mut self, state: PingState) {
            self.state = state;
        }
        fn thread_id(&self) -> Option<&str> {
            Some(&self.thread_id)
        }
        fn connection_id(&self) -> Option<&str> {
            Some(&self.connection_id)
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
        fn updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }
        fn touch(&mut self, at: DateTime<Utc>) {
            self.updated_at = at;
        }
    }

    fn ping(id: &str, thread: &str) -> PingRecord {
        let now = Utc::now();
        PingRecord {
            id: id.into(),
            thread_id: thread.into(),
            connection_id: "conn-1".into(),
            state: PingState::Sent,
            created_at: now,
            updated_at: now,
        }
    }

    async fn repository() -> (Repository<PingRecord>, EventBus, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("repo.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let bus = EventBus::default();
        (Repository::new(Arc::new(storage), bus.clone()), bus, dir)
    }

    fn state_change(event: &BusEvent) -> (Option<String>, String) {
        let changed = event.as_state_changed().unwrap();
        (changed.previous_state.clone(), changed.state.clone())
    }

    #[tokio::test]
    async fn save_and_update_state_publish_transitions() {
        let (repo, bus, _dir) = repository().await;
        let mut rx = bus.subscribe();

        let mut record = ping("p1", "t1");
        repo.save(&record).await.unwrap();
        repo.update_state(&mut record, PingState::Done).await.unwrap();

        assert_eq!(state_change(&rx.recv().await.unwrap()), (None, "sent".into()));
        assert_eq!(
            state_change(&rx.recv().await.unwrap()),
            (Some("sent".into()), "done".into())
        );
        assert_eq!(repo.get_by_id("p1").await.unwrap().state, PingState::Done);
    }

    #[tokio::test]
    async fn single_query_reports_missing_and_duplicates() {
        let (repo, _bus, _dir) = repository().await;
        repo.save(&ping("p1", "t1")).await.unwrap();
        repo.save(&ping("p2", "t1")).await.unwrap();
        repo.save(&ping("p3", "t2")).await.unwrap();

        let t2 = TagQuery::new().with("threadId", "t2");
        assert_eq!(repo.get_single_by_query(&t2).await.unwrap().id, "p3");

        let t1 = TagQuery::new().with("threadId", "t1");
        assert!(matches!(
            repo.get_single_by_query(&t1).await.unwrap_err(),
            ParleyError::RecordDuplicate { .. }
        ));

        let none = TagQuery::new().with("threadId", "t9");
        assert!(repo.get_single_by_query(&none).await.unwrap_err().is_not_found());
        assert!(repo.find_single_by_query(&none).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_update_leaves_state_untouched() {
        let (repo, _bus, _dir) = repository().await;
        let mut record = ping("never-saved", "t1");
        let err = repo.update_state(&mut record, PingState::Done).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(record.state, PingState::Sent);
    }

    #[tokio::test]
    async fn tags_follow_state() {
        let (repo, _bus, _dir) = repository().await;
        let mut record = ping("p1", "t1");
        repo.save(&record).await.unwrap();
        repo.update_state(&mut record, PingState::Done).await.unwrap();

        let sent = TagQuery::new().with("state", "sent");
        assert!(repo.find_by_query(&sent).await.unwrap().is_empty());
        let done = TagQuery::new().with("state", "done").with("connectionId", "conn-1");
        assert_eq!(repo.find_by_query(&done).await.unwrap().len(), 1);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);

        repo.delete(&record).await.unwrap();
        assert!(repo.find_by_id("p1").await.unwrap().is_none());
    }
}
