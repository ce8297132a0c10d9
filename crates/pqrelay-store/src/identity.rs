//! Registration, authenticated rotation, deletion, and directory lookup
//! for identities (C5). Every multi-statement mutation runs inside one
//! transaction so a failure partway through leaves no partial row behind.

use crate::model::{AuthIdentity, IdentityPatch, NewIdentity, NewPrekey, NewSignedPrekey, PublicIdentity};
use crate::StoreError;
use sqlx::SqlitePool;

/// Inserts a new identity and its prekey pools. Returns the new row id.
///
/// A handle collision is reported as [`StoreError::Conflict`] rather than
/// the raw unique-constraint violation, so callers don't have to sniff
/// SQLite error codes to tell a 409 from a 500.
pub async fn register(pool: &SqlitePool, new: NewIdentity) -> Result<i64, StoreError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT OR IGNORE INTO identities \
         (handle, ik, spk, spk_id, spk_sig, pqspk, pqspk_id, pqspk_sig) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.handle)
    .bind(&new.ik)
    .bind(&new.spk.key)
    .bind(new.spk.id)
    .bind(&new.spk.sig)
    .bind(&new.pqspk.key)
    .bind(new.pqspk.id)
    .bind(&new.pqspk.sig)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict);
    }

    let id = result.last_insert_rowid();

    insert_prekeys(&mut tx, id, &new.one_time_prekeys).await?;
    insert_pqkem_prekeys(&mut tx, id, &new.one_time_pqkem_prekeys).await?;

    tx.commit().await?;
    Ok(id)
}

/// Applies a rotation/top-up. Only the fields present in `patch` are
/// touched; the three spk/pqspk update shapes exist so an absent field
/// never overwrites an existing row with NULL.
pub async fn patch(pool: &SqlitePool, id: i64, patch: IdentityPatch) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    match (&patch.spk, &patch.pqspk) {
        (Some(spk), Some(pqspk)) => {
            sqlx::query(
                "UPDATE identities SET spk = ?, spk_id = ?, spk_sig = ?, \
                 pqspk = ?, pqspk_id = ?, pqspk_sig = ? WHERE id = ?",
            )
            .bind(&spk.key)
            .bind(spk.id)
            .bind(&spk.sig)
            .bind(&pqspk.key)
            .bind(pqspk.id)
            .bind(&pqspk.sig)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        (Some(spk), None) => {
            sqlx::query("UPDATE identities SET spk = ?, spk_id = ?, spk_sig = ? WHERE id = ?")
                .bind(&spk.key)
                .bind(spk.id)
                .bind(&spk.sig)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        (None, Some(pqspk)) => {
            sqlx::query("UPDATE identities SET pqspk = ?, pqspk_id = ?, pqspk_sig = ? WHERE id = ?")
                .bind(&pqspk.key)
                .bind(pqspk.id)
                .bind(&pqspk.sig)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        (None, None) => {}
    }

    insert_prekeys(&mut tx, id, &patch.one_time_prekeys).await?;
    insert_pqkem_prekeys(&mut tx, id, &patch.one_time_pqkem_prekeys).await?;

    if !patch.one_time_prekeys.is_empty() || !patch.one_time_pqkem_prekeys.is_empty() {
        if let Err(err) = sqlx::query("UPDATE identities SET notified_low_prekeys = 0 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(id, %err, "failed to clear notified_low_prekeys flag");
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Deletes the identity row. `ON DELETE CASCADE` purges its prekeys and
/// queued envelopes. Returns the number of rows removed (0 or 1), so the
/// caller can tell an unknown id apart from a store failure.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM identities WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Resolves `(id, ik)` by handle, for the request authenticator (C4) and
/// the WebSocket handshake (C7).
pub async fn resolve_for_auth(pool: &SqlitePool, handle: &str) -> Result<Option<AuthIdentity>, StoreError> {
    let row: Option<(i64, Vec<u8>)> = sqlx::query_as("SELECT id, ik FROM identities WHERE handle = ?")
        .bind(handle)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(id, ik)| AuthIdentity { id, ik }))
}

/// Public directory lookup: `(handle, id_key)`.
pub async fn get_public(pool: &SqlitePool, handle: &str) -> Result<Option<PublicIdentity>, StoreError> {
    let row: Option<(String, Vec<u8>)> = sqlx::query_as("SELECT handle, ik FROM identities WHERE handle = ?")
        .bind(handle)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(handle, id_key)| PublicIdentity { handle, id_key }))
}

async fn insert_prekeys(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    for_id: i64,
    prekeys: &[NewPrekey],
) -> Result<(), StoreError> {
    for prekey in prekeys {
        sqlx::query("INSERT INTO opks (id, \"for\", key) VALUES (?, ?, ?)")
            .bind(prekey.id)
            .bind(for_id)
            .bind(&prekey.key)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_pqkem_prekeys(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    for_id: i64,
    prekeys: &[NewSignedPrekey],
) -> Result<(), StoreError> {
    for prekey in prekeys {
        sqlx::query("INSERT INTO pqopks (id, \"for\", key, sig) VALUES (?, ?, ?, ?)")
            .bind(prekey.id)
            .bind(for_id)
            .bind(&prekey.key)
            .bind(&prekey.sig)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
