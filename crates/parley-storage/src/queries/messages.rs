// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol message persistence.
//!
//! One row per `(associated_record_id, message_class)`: saving a message of a
//! class that already exists for the record replaces it in place.

use parley_core::types::{MessageRole, StoredMessage};
use parley_core::ParleyError;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<StoredMessage, rusqlite::Error> {
    let role: String = row.get(3)?;
    let role = role
        .parse::<MessageRole>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(StoredMessage {
        id: row.get(0)?,
        associated_record_id: row.get(1)?,
        message_class: row.get(2)?,
        role,
        message: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Insert a message, or replace the existing one of the same class for the record.
///
/// On replace the original row id and `created_at` are kept.
pub async fn upsert_message(db: &Database, message: &StoredMessage) -> Result<(), ParleyError> {
    let msg = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO didcomm_messages
                    (id, associated_record_id, message_class, role, message, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (associated_record_id, message_class) DO UPDATE SET
                    role = excluded.role,
                    message = excluded.message,
                    updated_at = excluded.updated_at",
                params![
                    msg.id,
                    msg.associated_record_id,
                    msg.message_class,
                    msg.role.to_string(),
                    msg.message,
                    msg.created_at,
                    msg.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the message of one class stored for a record.
pub async fn find_message(
    db: &Database,
    associated_record_id: &str,
    message_class: &str,
) -> Result<Option<StoredMessage>, ParleyError> {
    let record_id = associated_record_id.to_string();
    let class = message_class.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, associated_record_id, message_class, role, message, created_at, updated_at
                 FROM didcomm_messages
                 WHERE associated_record_id = ?1 AND message_class = ?2",
                params![record_id, class],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All messages stored for a record, oldest first.
pub async fn find_messages_for_record(
    db: &Database,
    associated_record_id: &str,
) -> Result<Vec<StoredMessage>, ParleyError> {
    let record_id = associated_record_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, associated_record_id, message_class, role, message, created_at, updated_at
                 FROM didcomm_messages
                 WHERE associated_record_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![record_id], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn message(id: &str, class: &str, body: &str, at: &str) -> StoredMessage {
        StoredMessage {
            id: id.into(),
            associated_record_id: "cred-1".into(),
            message_class: class.into(),
            role: MessageRole::Sender,
            message: body.into(),
            created_at: at.into(),
            updated_at: at.into(),
        }
    }

    const OFFER: &str = "https://didcomm.org/issue-credential/1.0/offer-credential";
    const REQUEST: &str = "https://didcomm.org/issue-credential/1.0/request-credential";

    #[tokio::test]
    async fn second_save_of_same_class_replaces_first() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &message("m1", OFFER, r#"{"n":1}"#, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let mut second = message("m2", OFFER, r#"{"n":2}"#, "2026-01-02T00:00:00.000Z");
        second.role = MessageRole::Receiver;
        upsert_message(&db, &second).await.unwrap();

        let all = find_messages_for_record(&db, "cred-1").await.unwrap();
        assert_eq!(all.len(), 1);
        let stored = &all[0];
        assert_eq!(stored.id, "m1");
        assert_eq!(stored.message, r#"{"n":2}"#);
        assert_eq!(stored.role, MessageRole::Receiver);
        assert_eq!(stored.created_at, "2026-01-01T00:00:00.000Z");
        assert_eq!(stored.updated_at, "2026-01-02T00:00:00.000Z");
    }

    #[tokio::test]
    async fn classes_are_stored_separately() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &message("m1", OFFER, "{}", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        upsert_message(&db, &message("m2", REQUEST, "{}", "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();

        assert_eq!(find_messages_for_record(&db, "cred-1").await.unwrap().len(), 2);
        let offer = find_message(&db, "cred-1", OFFER).await.unwrap().unwrap();
        assert_eq!(offer.id, "m1");
        assert!(find_message(&db, "cred-2", OFFER).await.unwrap().is_none());
    }
}
