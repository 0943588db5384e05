// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-and-forward queue for peers that expose no reachable endpoint.

use parley_core::types::QueuedMessage;
use parley_core::ParleyError;
use rusqlite::params;

use crate::database::Database;

/// Append a packed message for a connection. Returns the entry id.
pub async fn enqueue(db: &Database, connection_id: &str, payload: &[u8]) -> Result<i64, ParleyError> {
    let connection_id = connection_id.to_string();
    let payload = payload.to_vec();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO outbound_queue (connection_id, payload) VALUES (?1, ?2)",
                params![connection_id, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove and return the oldest queued messages for a connection.
///
/// Selection and deletion run in one transaction, so a message is handed out
/// at most once.
pub async fn take(
    db: &Database,
    connection_id: &str,
    limit: Option<usize>,
) -> Result<Vec<QueuedMessage>, ParleyError> {
    let connection_id = connection_id.to_string();
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let taken = {
                let mut stmt = tx.prepare(
                    "SELECT id, connection_id, payload, created_at
                     FROM outbound_queue
                     WHERE connection_id = ?1
                     ORDER BY id ASC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![connection_id, limit], |row| {
                    Ok(QueuedMessage {
                        id: row.get(0)?,
                        connection_id: row.get(1)?,
                        payload: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            {
                let mut delete = tx.prepare("DELETE FROM outbound_queue WHERE id = ?1")?;
                for entry in &taken {
                    delete.execute(params![entry.id])?;
                }
            }
            tx.commit()?;
            Ok(taken)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of messages waiting for a connection.
pub async fn count(db: &Database, connection_id: &str) -> Result<usize, ParleyError> {
    let connection_id = connection_id.to_string();
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM outbound_queue WHERE connection_id = ?1",
                params![connection_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(usize::try_from(count).unwrap_or_default())
}
