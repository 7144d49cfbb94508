//! Topic Registry: known topic set, exclude/search visibility and tree navigation.
//! Every operation is a pure function over explicit inputs.

pub mod filters;
pub mod matcher;
pub mod tree;

pub use filters::*;
pub use matcher::match_filter;
pub use tree::*;

/// Adds `topic` if absent, keeping the set sorted.
pub fn ingest(mut topics: Vec<String>, topic: &str) -> Vec<String> {
    if let Err(pos) = topics.binary_search_by(|known| known.as_str().cmp(topic)) {
        topics.insert(pos, topic.to_string());
    }
    topics
}

/// Drops topics hidden by an active exclude filter, then keeps only those
/// containing `search_query` as typed (case-insensitive) when it is non-blank.
pub fn filtered_topics(topics: &[String], filters: &[ExcludeFilter], search_query: &str) -> Vec<String> {
    let active: Vec<&ExcludeFilter> = filters.iter().filter(|f| f.is_active()).collect();
    let searching = !search_query.trim().is_empty();
    let query = search_query.to_lowercase();

    topics
        .iter()
        .filter(|topic| !searching || topic.to_lowercase().contains(&query))
        .filter(|topic| !active.iter().any(|filter| filter.excludes(topic)))
        .cloned()
        .collect()
}
