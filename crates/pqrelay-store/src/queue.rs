//! Durable offline queue (I5). Delivery is at-least-once on the durable
//! side and at-most-once in practice: the gateway deletes a row only after
//! its bytes have been handed to the socket, one row at a time, so a crash
//! between send and delete is the only way to observe a duplicate.

use crate::StoreError;
use sqlx::SqlitePool;

/// One row pending delivery to `for_id`.
pub struct QueuedEnvelope {
    pub row_id: i64,
    pub msg: Vec<u8>,
}

/// Appends an envelope for later delivery to `for_id`.
pub async fn enqueue(pool: &SqlitePool, for_id: i64, msg: &[u8]) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO queue (\"for\", msg) VALUES (?, ?)")
        .bind(for_id)
        .bind(msg)
        .execute(pool)
        .await?;
    Ok(())
}

/// Lists everything queued for `for_id` in delivery order
/// (`created_at ASC`, ties broken by `id ASC`). Does not delete anything;
/// the caller deletes each row individually once its send succeeds.
pub async fn list_for(pool: &SqlitePool, for_id: i64) -> Result<Vec<QueuedEnvelope>, StoreError> {
    let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
        "SELECT id, msg FROM queue WHERE \"for\" = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(for_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(row_id, msg)| QueuedEnvelope { row_id, msg }).collect())
}

/// Removes one delivered row. Failure here is logged by the caller and
/// otherwise ignored — a future drain will simply redeliver the envelope.
pub async fn delete(pool: &SqlitePool, row_id: i64) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM queue WHERE id = ?")
        .bind(row_id)
        .execute(pool)
        .await?;
    Ok(())
}
