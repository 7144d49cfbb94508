//! Topic tree: a trie over "/"-separated levels, rebuilt from the filtered
//! topic set on every query and never mutated afterwards.

use std::collections::BTreeMap;

use serde::Serialize;

/// Node path -> expanded flag. Missing entries mean "expanded" for depth 0
/// and "collapsed" for everything deeper.
pub type ExpansionMap = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicNode {
    pub name: String,
    pub path: String,
    // BTreeMap keeps children in lexicographic order for every traversal
    pub children: BTreeMap<String, TopicNode>,
}

impl TopicNode {
    fn new(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            children: BTreeMap::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Follows `path` level by level from this node. An empty path is the node itself.
    pub fn find(&self, path: &str) -> Option<&TopicNode> {
        let mut current = self;
        for part in path.split('/').filter(|part| !part.is_empty()) {
            current = current.children.get(part)?;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicEntry {
    pub path: String,
    pub label: String,
    pub depth: usize,
    pub has_children: bool,
}

pub fn build_tree<S: AsRef<str>>(topics: &[S]) -> TopicNode {
    let mut root = TopicNode::default();
    for topic in topics {
        let mut node = &mut root;
        let mut current_path = String::new();
        for part in topic.as_ref().split('/').filter(|part| !part.is_empty()) {
            if !current_path.is_empty() {
                current_path.push('/');
            }
            current_path.push_str(part);
            node = node
                .children
                .entry(part.to_string())
                .or_insert_with(|| TopicNode::new(part, current_path.clone()));
        }
    }
    root
}

pub fn is_expanded(expansion: &ExpansionMap, path: &str, depth: usize) -> bool {
    expansion.get(path).copied().unwrap_or(depth == 0)
}

/// Depth of a node path: the number of levels minus one.
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|part| !part.is_empty()).count().saturating_sub(1)
}

/// Flips the expansion of `path` relative to its effective state.
pub fn toggle_expansion(expansion: &ExpansionMap, path: &str) -> ExpansionMap {
    let mut next = expansion.clone();
    let current = is_expanded(expansion, path, path_depth(path));
    next.insert(path.to_string(), !current);
    next
}

/// Pre-order walk emitting children of expanded nodes only.
pub fn visible_entries(tree: &TopicNode, expansion: &ExpansionMap) -> Vec<TopicEntry> {
    let mut entries = Vec::new();
    walk(tree, 0, expansion, &mut entries);
    entries
}

fn walk(node: &TopicNode, depth: usize, expansion: &ExpansionMap, entries: &mut Vec<TopicEntry>) {
    for child in node.children.values() {
        let has_children = child.has_children();
        let expanded = is_expanded(expansion, &child.path, depth);
        let marker = match (has_children, expanded) {
            (true, true) => "- ",
            (true, false) => "+ ",
            (false, _) => "  ",
        };
        entries.push(TopicEntry {
            path: child.path.clone(),
            label: format!("{}{}{}", "  ".repeat(depth), marker, child.name),
            depth,
            has_children,
        });
        if has_children && expanded {
            walk(child, depth + 1, expansion, entries);
        }
    }
}

/// Descends through the lexicographically-first child until a leaf is reached.
/// `None` when `from_path` is absent or has no children.
pub fn first_leaf_path(tree: &TopicNode, from_path: &str) -> Option<String> {
    let mut current = tree.find(from_path)?;
    if !current.has_children() {
        return None;
    }
    while let Some(first) = current.children.values().next() {
        current = first;
    }
    Some(current.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(entries: &[TopicEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn build_groups_levels_and_records_paths() {
        let tree = build_tree(&["a/b", "a/c", "d"]);
        let a = tree.find("a").expect("a exists");
        assert_eq!(a.path, "a");
        assert_eq!(a.children.keys().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(tree.find("a/c").map(|n| n.path.as_str()), Some("a/c"));
        assert!(tree.find("a/z").is_none());
    }

    #[test]
    fn empty_levels_are_skipped() {
        let tree = build_tree(&["/a//b/"]);
        assert_eq!(tree.find("a/b").map(|n| n.path.as_str()), Some("a/b"));
    }

    #[test]
    fn depth_zero_expanded_by_default() {
        let tree = build_tree(&["a/b/c", "z"]);
        let entries = visible_entries(&tree, &ExpansionMap::new());
        assert_eq!(labels(&entries), vec!["- a", "  + b", "  z"]);
        assert_eq!(entries[1].depth, 1);
        assert!(entries[1].has_children);
    }

    #[test]
    fn expansion_map_overrides_defaults() {
        let tree = build_tree(&["a/b/c"]);
        let mut expansion = ExpansionMap::new();
        expansion.insert("a".into(), false);
        assert_eq!(labels(&visible_entries(&tree, &expansion)), vec!["+ a"]);

        expansion.insert("a".into(), true);
        expansion.insert("a/b".into(), true);
        assert_eq!(
            labels(&visible_entries(&tree, &expansion)),
            vec!["- a", "  - b", "      c"]
        );
    }

    #[test]
    fn toggle_uses_effective_default() {
        let toggled = toggle_expansion(&ExpansionMap::new(), "a");
        assert_eq!(toggled.get("a"), Some(&false));
        let toggled = toggle_expansion(&ExpansionMap::new(), "a/b");
        assert_eq!(toggled.get("a/b"), Some(&true));
    }

    #[test]
    fn first_leaf_descends_lexicographically() {
        let tree = build_tree(&["b/c", "a/c", "a/b/d"]);
        assert_eq!(first_leaf_path(&tree, "a").as_deref(), Some("a/b/d"));
        assert_eq!(first_leaf_path(&tree, "").as_deref(), Some("a/b/d"));
        assert_eq!(first_leaf_path(&tree, "b").as_deref(), Some("b/c"));
    }

    #[test]
    fn first_leaf_none_for_missing_or_leaf() {
        let tree = build_tree(&["a/b"]);
        assert_eq!(first_leaf_path(&tree, "x"), None);
        assert_eq!(first_leaf_path(&tree, "a/b"), None);
    }
}
