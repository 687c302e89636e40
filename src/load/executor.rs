//! Query executors: one per entity kind.
//!
//! Each executor takes the unresolved ids of its kind, groups them by
//! identical option shape and issues one store query per shape (split into
//! chunks of at most `max_batch_size` ids). Ids the store does not return are
//! completed as tombstones so the driver never retries them.

use crate::entity::{Mastery, Page, User};
use crate::error::StorageError;
use crate::options::{LoadOptionSet, MasteryOptions, PageOptions, UserOptions};
use crate::store::{EntityStore, MasteryBatch, PageBatch, UserBatch};
use crate::types::{MasteryId, PageId, UserId};
use crate::viewer::VisibilityScope;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

/// Query result for one staged id
#[derive(Debug, Clone)]
pub(crate) struct Completion<K, O, V> {
    pub id: K,
    /// Options the query was made with
    pub options: O,
    /// `None` for absent or invisible entities
    pub value: Option<V>,
}

#[derive(Debug)]
pub(crate) struct KindOutcome<K, O, V> {
    pub completions: Vec<Completion<K, O, V>>,
    pub queries: usize,
}

impl<K, O, V> KindOutcome<K, O, V> {
    fn empty() -> Self {
        Self {
            completions: Vec::new(),
            queries: 0,
        }
    }
}

/// Group ids by identical options, preserving first-seen order of shapes.
pub(crate) fn group_by_shape<K, O: LoadOptionSet>(pending: Vec<(K, O)>) -> Vec<(O, Vec<K>)> {
    let mut groups: Vec<(O, Vec<K>)> = Vec::new();
    for (id, options) in pending {
        match groups.iter_mut().find(|(shape, _)| *shape == options) {
            Some((_, ids)) => ids.push(id),
            None => groups.push((options, vec![id])),
        }
    }
    groups
}

async fn execute_kind<K, O, V, Q, Fut>(
    pending: Vec<(K, O)>,
    max_batch_size: usize,
    query: Q,
    id_of: fn(&V) -> &K,
) -> Result<KindOutcome<K, O, V>, StorageError>
where
    K: Clone + Eq + Hash,
    O: LoadOptionSet,
    Q: Fn(Vec<K>, O) -> Fut,
    Fut: Future<Output = Result<Vec<V>, StorageError>>,
{
    if pending.is_empty() {
        return Ok(KindOutcome::empty());
    }

    let chunk_size = max_batch_size.max(1);
    let mut batches: Vec<(O, Vec<K>)> = Vec::new();
    for (options, ids) in group_by_shape(pending) {
        for chunk in ids.chunks(chunk_size) {
            batches.push((options, chunk.to_vec()));
        }
    }

    let queries = batches.len();
    let results = try_join_all(batches.into_iter().map(|(options, ids)| {
        let rows = query(ids.clone(), options);
        async move { rows.await.map(|rows| (options, ids, rows)) }
    }))
    .await?;

    let mut completions = Vec::new();
    for (options, ids, rows) in results {
        let mut by_id: HashMap<K, V> = rows
            .into_iter()
            .map(|row| (id_of(&row).clone(), row))
            .collect();
        for id in ids {
            let value = by_id.remove(&id);
            completions.push(Completion { id, options, value });
        }
    }

    Ok(KindOutcome {
        completions,
        queries,
    })
}

fn page_key(page: &Page) -> &PageId {
    &page.page_id
}

fn user_key(user: &User) -> &UserId {
    &user.user_id
}

fn mastery_key(mastery: &Mastery) -> &MasteryId {
    &mastery.mastery_id
}

pub(crate) async fn execute_pages(
    store: &dyn EntityStore,
    pending: Vec<(PageId, PageOptions)>,
    scope: &VisibilityScope,
    max_batch_size: usize,
) -> Result<KindOutcome<PageId, PageOptions, Page>, StorageError> {
    execute_kind(
        pending,
        max_batch_size,
        |ids, options| {
            let batch = PageBatch {
                ids,
                options,
                scope: scope.clone(),
            };
            async move { store.query_pages(&batch).await }
        },
        page_key,
    )
    .await
}

pub(crate) async fn execute_users(
    store: &dyn EntityStore,
    pending: Vec<(UserId, UserOptions)>,
    scope: &VisibilityScope,
    max_batch_size: usize,
) -> Result<KindOutcome<UserId, UserOptions, User>, StorageError> {
    execute_kind(
        pending,
        max_batch_size,
        |ids, options| {
            let batch = UserBatch {
                ids,
                options,
                scope: scope.clone(),
            };
            async move { store.query_users(&batch).await }
        },
        user_key,
    )
    .await
}

pub(crate) async fn execute_masteries(
    store: &dyn EntityStore,
    pending: Vec<(MasteryId, MasteryOptions)>,
    scope: &VisibilityScope,
    max_batch_size: usize,
) -> Result<KindOutcome<MasteryId, MasteryOptions, Mastery>, StorageError> {
    execute_kind(
        pending,
        max_batch_size,
        |ids, options| {
            let batch = MasteryBatch {
                ids,
                options,
                user_id: scope.user_id.clone(),
            };
            async move { store.query_masteries(&batch).await }
        },
        mastery_key,
    )
    .await
}
