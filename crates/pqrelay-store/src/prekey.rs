//! PQXDH bundle assembly and one-time-prekey consumption (C6, invariant I4).
//! The select-then-delete of a one-time prekey runs inside one transaction;
//! combined with the store's single-connection pool, two concurrent fetches
//! can never observe, let alone hand out, the same row.

use crate::model::{Bundle, BundlePrekey, BundleSignedPrekey};
use crate::StoreError;
use sqlx::SqlitePool;

struct IdentityRow {
    ik: Vec<u8>,
    spk: Vec<u8>,
    spk_id: i64,
    spk_sig: Vec<u8>,
    pqspk: Vec<u8>,
    pqspk_id: i64,
    pqspk_sig: Vec<u8>,
}

/// Assembles a bundle for `handle`. `dry_run` skips prekey selection and
/// consumption entirely, returning only `id_key` — used by clients to
/// probe existence without spending a one-time prekey.
pub async fn fetch_bundle(pool: &SqlitePool, handle: &str, dry_run: bool) -> Result<Option<Bundle>, StoreError> {
    let mut tx = pool.begin().await?;

    let identity: Option<(i64, Vec<u8>, Vec<u8>, i64, Vec<u8>, Vec<u8>, i64, Vec<u8>)> = sqlx::query_as(
        "SELECT id, ik, spk, spk_id, spk_sig, pqspk, pqspk_id, pqspk_sig FROM identities WHERE handle = ?",
    )
    .bind(handle)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((id, ik, spk, spk_id, spk_sig, pqspk, pqspk_id, pqspk_sig)) = identity else {
        return Ok(None);
    };
    let row = IdentityRow { ik, spk, spk_id, spk_sig, pqspk, pqspk_id, pqspk_sig };

    if dry_run {
        tx.commit().await?;
        return Ok(Some(Bundle {
            id_key: row.ik,
            prekey: None,
            pqkem_prekey: None,
            one_time_prekey: None,
        }));
    }

    let pqkem_prekey = match take_oldest_pqopk(&mut tx, id).await? {
        Some(slot) => Some(slot),
        None => Some(BundleSignedPrekey {
            id: row.pqspk_id,
            key: row.pqspk,
            sig: row.pqspk_sig,
        }),
    };

    let one_time_prekey = take_oldest_opk(&mut tx, id).await?;

    tx.commit().await?;

    Ok(Some(Bundle {
        id_key: row.ik,
        prekey: Some(BundleSignedPrekey { id: row.spk_id, key: row.spk, sig: row.spk_sig }),
        pqkem_prekey,
        one_time_prekey,
    }))
}

async fn take_oldest_pqopk(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    for_id: i64,
) -> Result<Option<BundleSignedPrekey>, StoreError> {
    let row: Option<(i64, i64, Vec<u8>, Vec<u8>)> = sqlx::query_as(
        "SELECT uid, id, key, sig FROM pqopks WHERE \"for\" = ? ORDER BY uid ASC LIMIT 1",
    )
    .bind(for_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some((uid, id, key, sig)) = row else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM pqopks WHERE uid = ?")
        .bind(uid)
        .execute(&mut **tx)
        .await?;

    Ok(Some(BundleSignedPrekey { id, key, sig }))
}

async fn take_oldest_opk(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    for_id: i64,
) -> Result<Option<BundlePrekey>, StoreError> {
    let row: Option<(i64, i64, Vec<u8>)> = sqlx::query_as(
        "SELECT uid, id, key FROM opks WHERE \"for\" = ? ORDER BY uid ASC LIMIT 1",
    )
    .bind(for_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some((uid, id, key)) = row else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM opks WHERE uid = ?")
        .bind(uid)
        .execute(&mut **tx)
        .await?;

    Ok(Some(BundlePrekey { id, key }))
}
