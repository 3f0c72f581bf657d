//! Grouping of model queries into inference batches.
//!
//! Queries are grouped by query type, then by item. Each item keeps its url
//! and its queries in insertion order, so the per-type projections below are
//! index-aligned: entry `i` of `urls`, `item_indices`, `label_lists` and
//! `label_ids` all describe the same item.

use indexmap::IndexMap;

use labelbot_common::{LabelExport, ModelQuery, QueryType};

/// Queries for a single item.
#[derive(Debug, Clone)]
struct ItemQueries {
    url: String,
    queries: Vec<ModelQuery>,
}

type QueriesByItem = IndexMap<usize, ItemQueries>;

/// Batch of queries for one inference round.
#[derive(Debug, Clone, Default)]
pub struct QueryBatch {
    by_type: IndexMap<QueryType, QueriesByItem>,
}

impl QueryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query to the batch. `None` is ignored.
    pub fn add(&mut self, query: Option<ModelQuery>) {
        let Some(query) = query else {
            return;
        };
        self.by_type
            .entry(query.query_type)
            .or_default()
            .entry(query.item_index)
            .or_insert_with(|| ItemQueries {
                url: query.url.clone(),
                queries: Vec::new(),
            })
            .queries
            .push(query);
    }

    /// Query types present in the batch, in order of first insertion.
    pub fn query_types(&self) -> Vec<QueryType> {
        self.by_type.keys().copied().collect()
    }

    /// Image urls for a query type, one per item.
    pub fn urls(&self, query_type: QueryType) -> Vec<String> {
        self.items(query_type).map(|(_, q)| q.url.clone()).collect()
    }

    /// Item index of each url for a query type.
    pub fn item_indices(&self, query_type: QueryType) -> Vec<usize> {
        self.items(query_type).map(|(index, _)| *index).collect()
    }

    /// Labels to send for each url of a query type.
    pub fn label_lists(&self, query_type: QueryType) -> Vec<Vec<LabelExport>> {
        self.items(query_type)
            .map(|(_, q)| q.queries.iter().map(|query| query.label.clone()).collect())
            .collect()
    }

    /// Ids of the queried labels, grouped like `label_lists`.
    pub fn label_ids(&self, query_type: QueryType) -> Vec<Vec<String>> {
        self.items(query_type)
            .map(|(_, q)| q.queries.iter().map(|query| query.label.id.clone()).collect())
            .collect()
    }

    /// Total number of queries in the batch.
    pub fn len(&self) -> usize {
        self.by_type
            .values()
            .flat_map(|items| items.values())
            .map(|q| q.queries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    fn items(&self, query_type: QueryType) -> impl Iterator<Item = (&usize, &ItemQueries)> {
        self.by_type
            .get(&query_type)
            .into_iter()
            .flat_map(|items| items.iter())
    }
}
