//! Writes against an index: add, remove, update payload, update score.

use log::{debug, trace, warn};

use crate::analysis::prefixes;
use crate::config::IndexType;
use crate::document::{Document, encode_payload};
use crate::engine::Autocomplete;
use crate::error::{AutocompleteError, Result};
use crate::keys::{CompositeMember, document_key};
use crate::scripts;
use crate::storage::{StoreConnection, Transaction};

impl Autocomplete {
    /// Index a document under `index` at the given rank.
    ///
    /// Indexing the same document again overwrites its payload and score.
    pub async fn index<D: Document + ?Sized>(&self, index: &str, document: &D, score: u64) -> Result<()> {
        let key = document_key(document);
        let payload = encode_payload(document)?;
        let hash = self.keys().document_hash(index);

        match self.index_type() {
            IndexType::Prefixes => {
                let word_prefixes = prefixes(document.term());
                let mut tx = Transaction::new();
                for word_prefix in &word_prefixes {
                    tx.zadd(self.keys().prefix_set(index, word_prefix), score as f64, key.as_str());
                }
                tx.hset(hash, key.as_str(), payload);

                let mut conn = self.connection().await?;
                commit(conn.as_mut(), tx).await?;
                debug!("indexed {key} under {} prefixes of {index}", word_prefixes.len());
            }
            IndexType::Terms => {
                let set = self.keys().term_set(index);
                let member = CompositeMember::new(document, score).to_string();

                let mut conn = self.connection().await?;
                scripts::index_term(
                    self.scripts(),
                    conn.as_mut(),
                    &set,
                    &hash,
                    &key,
                    &member,
                    payload,
                    self.config().max_transaction_retries,
                )
                .await?;
                debug!("indexed {key} as {member} in {set}");
            }
        }

        Ok(())
    }

    /// Remove a document from `index`.
    ///
    /// Under prefix indexing, removing a document that was never indexed is a
    /// no-op. Under term indexing it fails with
    /// [`AutocompleteError::MemberNotFound`].
    pub async fn remove_document<D: Document + ?Sized>(&self, index: &str, document: &D) -> Result<()> {
        let key = document_key(document);
        let hash = self.keys().document_hash(index);

        match self.index_type() {
            IndexType::Prefixes => {
                let mut tx = Transaction::new();
                for word_prefix in prefixes(document.term()) {
                    tx.zrem(self.keys().prefix_set(index, &word_prefix), key.as_str());
                }
                tx.hdel(hash, key.as_str());

                let mut conn = self.connection().await?;
                commit(conn.as_mut(), tx).await?;
            }
            IndexType::Terms => {
                let set = self.keys().term_set(index);
                let mut conn = self.connection().await?;
                self.remove_member(conn.as_mut(), &set, &hash, &key).await?;
            }
        }

        debug!("removed {key} from {index}");
        Ok(())
    }

    /// Replace the payload of an indexed document, leaving its rank and
    /// prefixes untouched.
    ///
    /// Fails with [`AutocompleteError::DocumentNotFound`] when the document
    /// hash has no entry for the document.
    pub async fn update_document<D: Document + ?Sized>(&self, index: &str, document: &D) -> Result<()> {
        let key = document_key(document);
        let payload = encode_payload(document)?;
        let hash = self.keys().document_hash(index);
        let retries = self.config().max_transaction_retries;

        let mut conn = self.connection().await?;
        let watched = [hash.clone()];
        for attempt in 0..=retries {
            conn.watch(&watched).await?;
            if !conn.hexists(&hash, &key).await? {
                conn.unwatch().await?;
                return Err(AutocompleteError::document_not_found(hash, key));
            }

            let mut tx = Transaction::new();
            tx.hset(hash.as_str(), key.as_str(), payload.clone());
            if conn.exec(tx).await?.is_some() {
                debug!("updated payload of {key} in {hash}");
                return Ok(());
            }
            warn!("{hash} changed while updating {key}, retrying (attempt {attempt})");
        }

        Err(AutocompleteError::conflict(format!(
            "updating {key} in {hash} failed after {retries} retries"
        )))
    }

    /// Change the rank of an indexed document.
    ///
    /// Under prefix indexing the document's prefix sets are rescored while
    /// the document hash is watched, failing with
    /// [`AutocompleteError::DocumentNotFound`] when the document has no
    /// payload. Under term indexing the document's member is replaced,
    /// failing with [`AutocompleteError::MemberNotFound`] when it has none.
    pub async fn update_score<D: Document + ?Sized>(&self, index: &str, document: &D, score: u64) -> Result<()> {
        let key = document_key(document);

        match self.index_type() {
            IndexType::Prefixes => {
                let mut conn = self.connection().await?;
                self.rescore_prefixes(conn.as_mut(), index, document, &key, score)
                    .await?;
            }
            IndexType::Terms => {
                let set = self.keys().term_set(index);
                let member = CompositeMember::new(document, score).to_string();

                let mut conn = self.connection().await?;
                scripts::replace_member(
                    self.scripts(),
                    conn.as_mut(),
                    &set,
                    &key,
                    &member,
                    self.config().max_transaction_retries,
                )
                .await?;
            }
        }

        debug!("rescored {key} in {index} to {score}");
        Ok(())
    }

    /// Whether a document is indexed under `index`.
    ///
    /// Prefix indexing checks the document hash; term indexing checks the
    /// term set.
    pub async fn contains<D: Document + ?Sized>(&self, index: &str, document: &D) -> Result<bool> {
        let key = document_key(document);
        let mut conn = self.connection().await?;

        let found = match self.index_type() {
            IndexType::Prefixes => {
                let hash = self.keys().document_hash(index);
                conn.hexists(&hash, &key).await?
            }
            IndexType::Terms => {
                let set = self.keys().term_set(index);
                scripts::member_exists(self.scripts(), conn.as_mut(), &set, &key).await?
            }
        };
        Ok(found)
    }

    async fn rescore_prefixes<D: Document + ?Sized>(
        &self,
        conn: &mut dyn StoreConnection,
        index: &str,
        document: &D,
        key: &str,
        score: u64,
    ) -> Result<()> {
        let hash = self.keys().document_hash(index);
        let retries = self.config().max_transaction_retries;
        let word_prefixes = prefixes(document.term());
        let watched = [hash.clone()];

        for attempt in 0..=retries {
            conn.watch(&watched).await?;
            if !conn.hexists(&hash, key).await? {
                conn.unwatch().await?;
                return Err(AutocompleteError::document_not_found(hash, key));
            }

            let mut tx = Transaction::new();
            for word_prefix in &word_prefixes {
                tx.zadd(self.keys().prefix_set(index, word_prefix), score as f64, key);
            }
            if conn.exec(tx).await?.is_some() {
                return Ok(());
            }
            warn!("{hash} changed while rescoring {key}, retrying (attempt {attempt})");
        }

        Err(AutocompleteError::conflict(format!(
            "rescoring {key} in {index} failed after {retries} retries"
        )))
    }

    async fn remove_member(
        &self,
        conn: &mut dyn StoreConnection,
        set: &str,
        hash: &str,
        key: &str,
    ) -> Result<()> {
        let retries = self.config().max_transaction_retries;
        let watched = [set.to_string()];

        for attempt in 0..=retries {
            conn.watch(&watched).await?;
            let Some(member) = scripts::locate_member(self.scripts(), conn, set, key).await? else {
                conn.unwatch().await?;
                return Err(AutocompleteError::member_not_found(set, key));
            };

            let mut tx = Transaction::new();
            tx.zrem(set, member.as_str()).hdel(hash, key);
            if conn.exec(tx).await?.is_some() {
                trace!("removed {member} from {set}");
                return Ok(());
            }
            warn!("{set} changed while removing {key}, retrying (attempt {attempt})");
        }

        Err(AutocompleteError::conflict(format!(
            "removing {key} from {set} failed after {retries} retries"
        )))
    }
}

/// Execute an unconditional transaction.
async fn commit(conn: &mut dyn StoreConnection, tx: Transaction) -> Result<()> {
    let commands = tx.len();
    match conn.exec(tx).await? {
        Some(_) => {
            trace!("committed {commands} commands");
            Ok(())
        }
        None => Err(AutocompleteError::conflict(
            "transaction aborted without watched keys",
        )),
    }
}
