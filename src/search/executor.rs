//! Query execution.

use std::sync::Arc;

use log::{debug, trace};
use serde::de::DeserializeOwned;

use crate::engine::Autocomplete;
use crate::error::{AutocompleteError, Result};
use crate::keys::{member_document_key, member_score_token};
use crate::search::hydrator::hydrate;
use crate::search::planner::{QueryPlan, SortOrder};
use crate::storage::{Aggregate, LexBound, ScoreBound, StoreConnection, Transaction};

impl Autocomplete {
    /// Search `index` for documents matching `query`, returning their raw
    /// JSON payloads in the requested order.
    ///
    /// A query without terms matches nothing.
    pub async fn search(&self, index: &str, query: &str, order: SortOrder) -> Result<Vec<Vec<u8>>> {
        let plan = QueryPlan::new(self.keys(), self.index_type(), index, query);
        trace!("search {index:?} for {query:?} ({order}): {plan:?}");

        let document_keys = match plan {
            QueryPlan::Empty => return Ok(Vec::new()),
            QueryPlan::PrefixSet { key } => {
                let mut conn = self.connection().await?;
                read_prefix_set(conn.as_mut(), &key, order).await?
            }
            QueryPlan::Intersection {
                destination,
                sources,
            } => {
                let mut conn = self.connection().await?;
                self.intersect(conn.as_mut(), &destination, sources).await?;
                read_prefix_set(conn.as_mut(), &destination, order).await?
            }
            QueryPlan::TermRange { set, phrase } => {
                let mut conn = self.connection().await?;
                read_term_range(conn.as_mut(), &set, &phrase, order).await?
            }
        };

        debug!("{} matches for {query:?} in {index}", document_keys.len());

        let hash = self.keys().document_hash(index);
        hydrate(Arc::clone(self.pool()), &hash, document_keys, self.config().batch_size).await
    }

    /// Search and decode every payload as `T`.
    ///
    /// A payload that does not decode fails the whole search with
    /// [`AutocompleteError::Decode`].
    pub async fn search_as<T: DeserializeOwned>(&self, index: &str, query: &str, order: SortOrder) -> Result<Vec<T>> {
        self.search(index, query, order)
            .await?
            .iter()
            .map(|payload| {
                serde_json::from_slice(payload)
                    .map_err(|e| AutocompleteError::decode(format!("invalid document payload: {e}")))
            })
            .collect()
    }

    /// Store the MAX-aggregated intersection of `sources` in `destination`
    /// with the configured lifetime.
    async fn intersect(&self, conn: &mut dyn StoreConnection, destination: &str, sources: Vec<String>) -> Result<()> {
        let ttl = self.config().intersection_ttl.as_secs();

        let mut tx = Transaction::new();
        tx.zinterstore(destination, sources, Aggregate::Max)
            .expire(destination, ttl);

        match conn.exec(tx).await? {
            Some(_) => Ok(()),
            None => Err(AutocompleteError::conflict(format!(
                "intersection into {destination} was aborted"
            ))),
        }
    }
}

/// Document keys of a prefix or intersection set.
///
/// Lexicographic orders sort the keys themselves; score orders use the set
/// ranking, ties broken by key.
async fn read_prefix_set(conn: &mut dyn StoreConnection, key: &str, order: SortOrder) -> Result<Vec<String>> {
    let keys = match order {
        SortOrder::Lexicographical => {
            let mut keys = conn.zrange(key, 0, -1).await?;
            keys.sort();
            keys
        }
        SortOrder::ReverseLexicographical => {
            let mut keys = conn.zrevrange(key, 0, -1).await?;
            keys.sort_by(|a, b| b.cmp(a));
            keys
        }
        SortOrder::Score => {
            conn.zrangebyscore(key, ScoreBound::NegInf, ScoreBound::PosInf)
                .await?
        }
        SortOrder::ReverseScore => {
            conn.zrevrangebyscore(key, ScoreBound::PosInf, ScoreBound::NegInf)
                .await?
        }
    };
    Ok(keys)
}

/// Document keys of the term-set members starting with `phrase`.
///
/// Members sort by term first, so lexicographic orders come straight from
/// the range. Score orders re-sort stably on the embedded score token.
async fn read_term_range(
    conn: &mut dyn StoreConnection,
    set: &str,
    phrase: &str,
    order: SortOrder,
) -> Result<Vec<String>> {
    let lower = phrase.as_bytes().to_vec();
    let mut upper = lower.clone();
    upper.push(0xff);

    let mut members = match order {
        SortOrder::ReverseLexicographical => {
            conn.zrevrangebylex(set, LexBound::Inclusive(upper), LexBound::Inclusive(lower))
                .await?
        }
        _ => {
            conn.zrangebylex(set, LexBound::Inclusive(lower), LexBound::Inclusive(upper))
                .await?
        }
    };

    match order {
        SortOrder::Score => members.sort_by(|a, b| member_score_token(a).cmp(member_score_token(b))),
        SortOrder::ReverseScore => members.sort_by(|a, b| member_score_token(b).cmp(member_score_token(a))),
        SortOrder::Lexicographical | SortOrder::ReverseLexicographical => {}
    }

    Ok(members
        .iter()
        .map(|member| member_document_key(member).to_string())
        .collect())
}
