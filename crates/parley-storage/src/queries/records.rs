// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exchange record CRUD and tag queries.
//!
//! Tags are stored as a JSON object and matched with `json_extract`, so the
//! tag set of a record type can grow without schema changes.

use parley_core::types::{StoredRecord, TagQuery, Tags};
use parley_core::ParleyError;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::database::Database;

const COLUMNS: &str = "id, record_type, tags, value, created_at, updated_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<(StoredRecord, String), rusqlite::Error> {
    Ok((
        StoredRecord {
            id: row.get(0)?,
            record_type: row.get(1)?,
            tags: Tags::new(),
            value: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        },
        row.get(2)?,
    ))
}

fn decode_tags((mut record, tags): (StoredRecord, String)) -> Result<StoredRecord, ParleyError> {
    record.tags = serde_json::from_str(&tags).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    Ok(record)
}

fn encode_tags(tags: &Tags) -> Result<String, ParleyError> {
    serde_json::to_string(tags).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })
}

/// Insert a new record. A record with the same type and id is a duplicate.
pub async fn insert_record(db: &Database, record: &StoredRecord) -> Result<(), ParleyError> {
    let record = record.clone();
    let tags = encode_tags(&record.tags)?;
    let record_type = record.record_type.clone();
    let id = record.id.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO records (id, record_type, tags, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.record_type,
                    tags,
                    record.value,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if inserted == 0 {
        return Err(ParleyError::RecordDuplicate {
            record_type,
            query: format!("id={id}"),
        });
    }
    Ok(())
}

/// Replace the tags, value and `updated_at` of an existing record.
pub async fn update_record(db: &Database, record: &StoredRecord) -> Result<(), ParleyError> {
    let record = record.clone();
    let tags = encode_tags(&record.tags)?;
    let record_type = record.record_type.clone();
    let id = record.id.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE records SET tags = ?1, value = ?2, updated_at = ?3
                 WHERE record_type = ?4 AND id = ?5",
                params![
                    tags,
                    record.value,
                    record.updated_at,
                    record.record_type,
                    record.id,
                ],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(ParleyError::RecordNotFound {
            record_type,
            query: format!("id={id}"),
        });
    }
    Ok(())
}

/// Get a record by type and id.
pub async fn get_record(
    db: &Database,
    record_type: &str,
    id: &str,
) -> Result<Option<StoredRecord>, ParleyError> {
    let record_type = record_type.to_string();
    let id = id.to_string();
    let row = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM records WHERE record_type = ?1 AND id = ?2"),
                params![record_type, id],
                row_to_record,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    row.map(decode_tags).transpose()
}

/// Find all records of a type whose tags match every condition, oldest first.
pub async fn find_records(
    db: &Database,
    record_type: &str,
    query: &TagQuery,
) -> Result<Vec<StoredRecord>, ParleyError> {
    let mut sql = format!("SELECT {COLUMNS} FROM records WHERE record_type = ?1");
    let mut values = vec![record_type.to_string()];
    for (tag, value) in query.conditions() {
        let path_param = values.len() + 1;
        let value_param = values.len() + 2;
        sql.push_str(&format!(
            " AND json_extract(tags, ?{path_param}) = ?{value_param}"
        ));
        values.push(format!("$.\"{}\"", tag.replace('"', "")));
        values.push(value.clone());
    }
    sql.push_str(" ORDER BY created_at ASC, rowid ASC");

    let rows = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    rows.into_iter().map(decode_tags).collect()
}

/// Delete a record. Deleting a missing record is not an error.
pub async fn delete_record(db: &Database, record_type: &str, id: &str) -> Result<(), ParleyError> {
    let record_type = record_type.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM records WHERE record_type = ?1 AND id = ?2",
                params![record_type, id],
            )?;
            Ok(())
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

    fn record(id: &str, thread: &str, connection: &str, state: &str) -> StoredRecord {
        let mut tags = Tags::new();
        tags.insert("threadId".into(), thread.into());
        tags.insert("connectionId".into(), connection.into());
        tags.insert("state".into(), state.into());
        StoredRecord {
            id: id.into(),
            record_type: "CredentialRecord".into(),
            tags,
            value: format!(r#"{{"id":"{id}"}}"#),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_tags() {
        let (db, _dir) = setup_db().await;
        let r = record("r1", "t1", "c1", "offer-sent");
        insert_record(&db, &r).await.unwrap();

        let loaded = get_record(&db, "CredentialRecord", "r1").await.unwrap().unwrap();
        assert_eq!(loaded, r);
        assert!(get_record(&db, "ProofRecord", "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let (db, _dir) = setup_db().await;
        let r = record("r1", "t1", "c1", "offer-sent");
        insert_record(&db, &r).await.unwrap();
        let err = insert_record(&db, &r).await.unwrap_err();
        assert!(matches!(err, ParleyError::RecordDuplicate { .. }));
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = update_record(&db, &record("nope", "t", "c", "s")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn find_by_tags_isolates_threads_on_same_connection() {
        let (db, _dir) = setup_db().await;
        insert_record(&db, &record("r1", "t1", "c1", "offer-sent")).await.unwrap();
        insert_record(&db, &record("r2", "t2", "c1", "offer-sent")).await.unwrap();

        let query = TagQuery::new().with("threadId", "t2").with("connectionId", "c1");
        let found = find_records(&db, "CredentialRecord", &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "r2");

        let all = find_records(&db, "CredentialRecord", &TagQuery::new()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_changes_tag_lookup() {
        let (db, _dir) = setup_db().await;
        let mut r = record("r1", "t1", "c1", "offer-sent");
        insert_record(&db, &r).await.unwrap();
        r.tags.insert("state".into(), "done".into());
        r.updated_at = "2026-01-02T00:00:00.000Z".into();
        update_record(&db, &r).await.unwrap();

        let by_old = TagQuery::new().with("state", "offer-sent");
        assert!(find_records(&db, "CredentialRecord", &by_old).await.unwrap().is_empty());
        let by_new = TagQuery::new().with("state", "done");
        assert_eq!(find_records(&db, "CredentialRecord", &by_new).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let (db, _dir) = setup_db().await;
        insert_record(&db, &record("r1", "t1", "c1", "s")).await.unwrap();
        delete_record(&db, "CredentialRecord", "r1").await.unwrap();
        assert!(get_record(&db, "CredentialRecord", "r1").await.unwrap().is_none());
    }
}
