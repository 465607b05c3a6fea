//! Payload hydration.
//!
//! Matching document keys are split into fixed-size batches. Each batch is
//! fetched with one `HMGET` on its own task and its own connection; the
//! payloads are then reassembled in batch order so the result keeps the
//! order of the keys.

use std::sync::Arc;

use log::debug;
use tokio::task::JoinHandle;

use crate::error::{AutocompleteError, Result};
use crate::storage::StorePool;

/// Fetch the payloads of `keys` from the document hash `hash`.
///
/// Fails on the first batch that fails, aborting the batches still in
/// flight. A key without a payload is a [`AutocompleteError::Decode`] error.
pub async fn hydrate(
    pool: Arc<dyn StorePool>,
    hash: &str,
    keys: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<u8>>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let total = keys.len();

    let handles: Vec<JoinHandle<Result<Vec<Vec<u8>>>>> = keys
        .chunks(batch_size)
        .map(|batch| {
            let pool = Arc::clone(&pool);
            let hash = hash.to_string();
            let batch = batch.to_vec();
            tokio::spawn(async move { fetch_batch(pool, hash, batch).await })
        })
        .collect();

    debug!("hydrating {total} documents from {hash} in {} batches", handles.len());

    let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
    let batches = futures::future::try_join_all(handles.into_iter().map(join_batch))
        .await
        .inspect_err(|_| aborts.iter().for_each(|handle| handle.abort()))?;

    let mut payloads = Vec::with_capacity(total);
    for batch in batches {
        payloads.extend(batch);
    }
    Ok(payloads)
}

async fn join_batch(handle: JoinHandle<Result<Vec<Vec<u8>>>>) -> Result<Vec<Vec<u8>>> {
    handle.await?
}

async fn fetch_batch(pool: Arc<dyn StorePool>, hash: String, keys: Vec<String>) -> Result<Vec<Vec<u8>>> {
    let mut conn = pool.get().await?;
    let values = conn.hmget(&hash, &keys).await?;

    values
        .into_iter()
        .zip(&keys)
        .map(|(value, key)| {
            value.ok_or_else(|| AutocompleteError::decode(format!("{hash} has no payload for {key}")))
        })
        .collect()
}
