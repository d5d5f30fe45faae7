use std::collections::{HashMap, HashSet};

use common::{DocumentGapCount, ReferencedFile, SearchesPerUser, TopQueryGroup, TopQueryItem};
use model::entities::{document_gap, top_query};
use sea_orm::sea_query::Expr;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect};
use tracing::{debug, instrument};

use crate::error::Result;

/// Grouping key of referenced files; `rank_sources` applies the same rule.
const NORMALIZED_SOURCE: &str = "lower(trim(source))";

/// Groups queries by topic, keeping topics in order of first appearance and
/// queries in input order.
pub fn group_by_topic(items: Vec<TopQueryItem>) -> Vec<TopQueryGroup> {
    let mut groups: Vec<TopQueryGroup> = Vec::new();
    let mut index: HashMap<Option<String>, usize> = HashMap::new();

    for item in items {
        match index.get(&item.topic) {
            Some(&i) => groups[i].queries.push(item),
            None => {
                index.insert(item.topic.clone(), groups.len());
                groups.push(TopQueryGroup {
                    topic: item.topic.clone(),
                    queries: vec![item],
                });
            }
        }
    }
    groups
}

/// Sums `(key, count)` pairs per key, largest total first, ties by key.
fn sum_desc<K: Ord + std::hash::Hash + Clone>(rows: impl IntoIterator<Item = (K, i64)>) -> Vec<(K, i64)> {
    let mut totals: HashMap<K, i64> = HashMap::new();
    for (key, count) in rows {
        *totals.entry(key).or_default() += count;
    }
    let mut ranked: Vec<_> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Reference counts per source document, with names compared trimmed and
/// lowercased.
pub fn rank_sources(rows: impl IntoIterator<Item = (String, i64)>) -> Vec<ReferencedFile> {
    sum_desc(
        rows.into_iter()
            .map(|(source, count)| (source.trim().to_lowercase(), count)),
    )
    .into_iter()
    .map(|(source, count)| ReferencedFile { source, count })
    .collect()
}

pub fn rank_gaps(rows: impl IntoIterator<Item = (Option<String>, i64)>) -> Vec<DocumentGapCount> {
    sum_desc(rows)
        .into_iter()
        .map(|(main_topic, count)| DocumentGapCount { main_topic, count })
        .collect()
}

/// Total searches divided by the number of distinct searching users.
/// Rows without a user add to the total but not to the user count.
pub fn searches_per_user_of(rows: impl IntoIterator<Item = (Option<i32>, i64)>) -> SearchesPerUser {
    let mut total = 0;
    let mut users = HashSet::new();
    for (user_id, count) in rows {
        total += count;
        if let Some(id) = user_id {
            users.insert(id);
        }
    }
    let unique_users = users.len() as i64;

    SearchesPerUser {
        total_searches: total,
        unique_users,
        average: total as f64 / unique_users.max(1) as f64,
    }
}

#[instrument(skip(db))]
pub async fn top_queries(db: &DatabaseConnection) -> Result<Vec<TopQueryGroup>> {
    let rows = top_query::Entity::find()
        .order_by_desc(top_query::Column::Count)
        .order_by_asc(top_query::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} top query rows", rows.len());

    let items = rows
        .into_iter()
        .map(|row| TopQueryItem {
            source: row.source,
            topic: row.topic,
            count: row.count,
            query: row.query,
            llm_response: row.llm_response,
        })
        .collect();
    Ok(group_by_topic(items))
}

#[instrument(skip(db))]
pub async fn gap_in_queries(db: &DatabaseConnection) -> Result<Vec<DocumentGapCount>> {
    let rows: Vec<(Option<String>, i64)> = document_gap::Entity::find()
        .select_only()
        .column(document_gap::Column::MainTopic)
        .column_as(Expr::col(document_gap::Column::Count).sum(), "total")
        .group_by(document_gap::Column::MainTopic)
        .into_tuple()
        .all(db)
        .await?;
    debug!("Retrieved {} gap-in-document topics", rows.len());

    Ok(rank_gaps(rows))
}

#[instrument(skip(db))]
pub async fn most_referenced_files(db: &DatabaseConnection) -> Result<Vec<ReferencedFile>> {
    let rows: Vec<(String, i64)> = top_query::Entity::find()
        .select_only()
        .column_as(Expr::cust(NORMALIZED_SOURCE), "normalized_source")
        .column_as(Expr::col(top_query::Column::Count).sum(), "total")
        .group_by(Expr::cust(NORMALIZED_SOURCE))
        .into_tuple()
        .all(db)
        .await?;
    debug!("Retrieved {} referenced sources", rows.len());

    Ok(rank_sources(rows))
}

#[instrument(skip(db))]
pub async fn searches_per_user(db: &DatabaseConnection) -> Result<SearchesPerUser> {
    let rows: Vec<(Option<i32>, i64)> = top_query::Entity::find()
        .select_only()
        .column(top_query::Column::UserId)
        .column_as(Expr::col(top_query::Column::Count).sum(), "total")
        .group_by(top_query::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    debug!("Retrieved search totals for {} user groups", rows.len());

    Ok(searches_per_user_of(rows))
}
