use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^.\[\]]+)|\[(\d+)\]").expect("path token pattern is valid"));
static AROUND_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\.\s*").expect("dot pattern is valid"));
static AROUND_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[\s*").expect("open bracket pattern is valid"));
static AROUND_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\]\s*").expect("close bracket pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

impl PathToken {
    pub fn is_index(&self) -> bool {
        matches!(self, PathToken::Index(_))
    }
}

fn normalize_path(path: &str) -> String {
    let path = AROUND_DOT.replace_all(path.trim(), ".");
    let path = AROUND_OPEN.replace_all(&path, "[");
    AROUND_CLOSE.replace_all(&path, "]").into_owned()
}

/// `a.b[2].c` -> `Key(a), Key(b), Index(2), Key(c)`.
pub fn parse_path(path: &str) -> Vec<PathToken> {
    let normalized = normalize_path(path);
    TOKEN
        .captures_iter(&normalized)
        .filter_map(|caps| {
            if let Some(key) = caps.get(1) {
                return Some(PathToken::Key(key.as_str().to_string()));
            }
            // indices too large for usize are dropped like any other unparseable token
            caps.get(2)
                .and_then(|index| index.as_str().parse().ok())
                .map(PathToken::Index)
        })
        .collect()
}
