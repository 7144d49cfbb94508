//! Wildcard filter matching: "+" matches exactly one level, a trailing "#"
//! matches the rest of the topic (zero or more levels).

pub const WILDCARD_SINGLE: &str = "+";
pub const WILDCARD_MULTI: &str = "#";

pub fn match_filter(topic: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern == WILDCARD_MULTI {
        return true;
    }

    let filter_levels: Vec<&str> = pattern.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();

    for (i, part) in filter_levels.iter().enumerate() {
        if *part == WILDCARD_MULTI {
            return true;
        }
        let Some(level) = topic_levels.get(i) else {
            return false;
        };
        if *part == WILDCARD_SINGLE {
            continue;
        }
        if part != level {
            return false;
        }
    }

    filter_levels.len() == topic_levels.len()
}

/// True when the string carries a wildcard level and can only be used as a filter.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|level| level == WILDCARD_SINGLE || level == WILDCARD_MULTI)
}
