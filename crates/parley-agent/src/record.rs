// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exchange record abstractions shared by every protocol family.
//!
//! A record's `state` is only ever changed through
//! [`Repository::update_state`](crate::repository::Repository::update_state),
//! which persists the record and publishes the transition. Tags are derived
//! from the record's own fields on every save.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::{ParleyError, Tags};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A per-family state enum.
pub trait ProtocolState:
    Copy + Eq + fmt::Display + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Terminal states accept no further transitions.
    fn is_terminal(&self) -> bool;
}

/// A persisted state-machine instance for one protocol run.
pub trait ExchangeRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Storage discriminator, e.g. `CredentialRecord`.
    const RECORD_TYPE: &'static str;

    type State: ProtocolState;

    fn id(&self) -> &str;

    fn state(&self) -> Self::State;

    /// Raw state setter. Callers outside the repository must go through
    /// `Repository::update_state`.
    fn set_state(&mut self, state: Self::State);

    fn thread_id(&self) -> Option<&str>;

    fn connection_id(&self) -> Option<&str>;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    fn touch(&mut self, at: DateTime<Utc>);

    /// Family-specific lookup tags (role, keys, ...).
    fn custom_tags(&self) -> Tags {
        Tags::new()
    }

    /// Full tag set: `threadId`, `connectionId` and `state` plus the custom tags.
    fn tags(&self) -> Tags {
        let mut tags = self.custom_tags();
        if let Some(thread_id) = self.thread_id() {
            tags.insert("threadId".into(), thread_id.to_string());
        }
        if let Some(connection_id) = self.connection_id() {
            tags.insert("connectionId".into(), connection_id.to_string());
        }
        tags.insert("state".into(), self.state().to_string());
        tags
    }
}

/// Fails with `InvalidState` unless the record is in one of `expected`.
pub fn assert_state<R: ExchangeRecord>(record: &R, expected: &[R::State]) -> Result<(), ParleyError> {
    let actual = record.state();
    if expected.contains(&actual) {
        Ok(())
    } else {
        Err(ParleyError::invalid_state(R::RECORD_TYPE, actual, expected))
    }
}

/// Fails with `InvalidState` when the record has reached a terminal state.
pub fn assert_not_terminal<R: ExchangeRecord>(
    record: &R,
    all_states: &[R::State],
) -> Result<(), ParleyError> {
    let actual = record.state();
    if actual.is_terminal() {
        let open: Vec<R::State> = all_states.iter().copied().filter(|s| !s.is_terminal()).collect();
        return Err(ParleyError::invalid_state(R::RECORD_TYPE, actual, &open));
    }
    Ok(())
}

/// Fails with `InvalidState` when the record belongs to the other side of the exchange.
pub fn assert_role<R, Role>(record: &R, actual: Role, expected: Role) -> Result<(), ParleyError>
where
    R: ExchangeRecord,
    Role: PartialEq + fmt::Display,
{
    if actual == expected {
        return Ok(());
    }
    Err(ParleyError::InvalidState {
        record_type: R::RECORD_TYPE.to_string(),
        actual: format!("{} ({actual})", record.state()),
        expected: vec![format!("any {expected} state")],
    })
}

/// RFC 3339 timestamp with millisecond precision, as stored.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A metadata value whose variant doubles as its key.
pub trait MetadataEntry: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync {
    type Key: Copy + Eq + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// Typed sidecar of transient protocol data, at most one entry per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent, bound = "E: MetadataEntry")]
pub struct Metadata<E: MetadataEntry> {
    entries: Vec<E>,
}

impl<E: MetadataEntry> Default for Metadata<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: MetadataEntry> Metadata<E> {
    pub fn get(&self, key: E::Key) -> Option<&E> {
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Inserts the entry, replacing any entry with the same key.
    pub fn set(&mut self, entry: E) {
        let key = entry.key();
        self.entries.retain(|e| e.key() != key);
        self.entries.push(entry);
    }

    pub fn remove(&mut self, key: E::Key) -> Option<E> {
        let index = self.entries.iter().position(|e| e.key() == key)?;
        Some(self.entries.remove(index))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::EnumDiscriminants;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
    #[strum_discriminants(name(TestKey))]
    #[serde(tag = "key", content = "value")]
    enum TestEntry {
        Nonce(String),
        Count(u32),
    }

    impl MetadataEntry for TestEntry {
        type Key = TestKey;

        fn key(&self) -> TestKey {
            self.into()
        }
    }

    #[test]
    fn metadata_replaces_entries_by_key() {
        let mut metadata = Metadata::<TestEntry>::default();
        metadata.set(TestEntry::Nonce("a".into()));
        metadata.set(TestEntry::Count(1));
        metadata.set(TestEntry::Nonce("b".into()));

        assert_eq!(metadata.get(TestKey::Nonce), Some(&TestEntry::Nonce("b".into())));
        assert_eq!(metadata.remove(TestKey::Count), Some(TestEntry::Count(1)));
        assert!(metadata.get(TestKey::Count).is_none());
    }

    #[test]
    fn metadata_serializes_as_tagged_list() {
        let mut metadata = Metadata::<TestEntry>::default();
        metadata.set(TestEntry::Count(3));
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json, serde_json::json!([{"key": "Count", "value": 3}]));
        let back: Metadata<TestEntry> = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn timestamp_uses_millisecond_precision() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2026-03-01T10:00:00.123Z");
    }
}
