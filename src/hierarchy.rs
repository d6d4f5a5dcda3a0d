//! Resolves the account hierarchy implied by dot-delimited codes.
//!
//! Source rows carry no parent pointers; the tree is recovered purely from
//! string prefixes. `"5.1"` is the parent of `"5.1.1"` but not of `"5.10"`,
//! because the prefix must be followed by a literal dot.

use crate::schema::AccountRecord;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaNode {
    pub code: String,
    pub name: String,
    /// Count of dot separators in the code.
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub is_leaf: bool,
}

/// Arena of resolved accounts. Parent/child relations are plain indices
/// into `nodes`, computed once per resolution pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountArena {
    nodes: Vec<ArenaNode>,
    index: BTreeMap<String, usize>,
    roots: Vec<usize>,
}

impl AccountArena {
    /// Builds the arena from the full set of uploaded records. Duplicate
    /// codes keep the first occurrence. Codes arrive pre-validated by
    /// ingestion, but empty ones are skipped here too.
    pub fn resolve(records: &[AccountRecord]) -> Self {
        let mut nodes: Vec<ArenaNode> = Vec::with_capacity(records.len());
        let mut index: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            let code = record.code.trim();
            if code.is_empty() {
                continue;
            }
            if index.contains_key(code) {
                warn!("Duplicate account code {}, keeping first occurrence", code);
                continue;
            }
            let idx = nodes.len();
            nodes.push(ArenaNode {
                code: code.to_string(),
                name: record.name.clone(),
                depth: code.matches('.').count(),
                parent: None,
                children: Vec::new(),
                is_leaf: true,
            });
            index.insert(code.to_string(), idx);
        }

        // Leaf detection: in lexicographic order a parent's first descendant
        // is its immediate successor ('.' sorts before any digit), so one
        // adjacent scan replaces the pairwise prefix check.
        let mut sorted: Vec<usize> = index.values().copied().collect();
        sorted.sort_by(|a, b| nodes[*a].code.cmp(&nodes[*b].code));
        for pair in sorted.windows(2) {
            let prefix = format!("{}.", nodes[pair[0]].code);
            if nodes[pair[1]].code.starts_with(&prefix) {
                nodes[pair[0]].is_leaf = false;
            }
        }

        // Parent linking: longest existing proper prefix at a dot boundary.
        let mut roots = Vec::new();
        for idx in 0..nodes.len() {
            let code = nodes[idx].code.clone();
            let mut parent = None;
            let mut prefix = code.as_str();
            while let Some(cut) = prefix.rfind('.') {
                prefix = &prefix[..cut];
                if let Some(&p) = index.get(prefix) {
                    parent = Some(p);
                    break;
                }
            }
            match parent {
                Some(p) => {
                    nodes[idx].parent = Some(p);
                    nodes[p].children.push(idx);
                }
                None => roots.push(idx),
            }
        }

        Self {
            nodes,
            index,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&ArenaNode> {
        self.index.get(code).map(|&i| &self.nodes[i])
    }

    pub fn node(&self, idx: usize) -> &ArenaNode {
        &self.nodes[idx]
    }

    /// True iff no other code in the set extends this one past a dot.
    /// Unknown codes are reported as leaves; they have no descendants.
    pub fn is_leaf(&self, code: &str) -> bool {
        self.get(code).map(|n| n.is_leaf).unwrap_or(true)
    }

    pub fn roots(&self) -> impl Iterator<Item = &ArenaNode> {
        self.roots.iter().map(move |&i| &self.nodes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArenaNode> {
        self.nodes.iter()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &ArenaNode> {
        self.nodes.iter().filter(|n| n.is_leaf)
    }

    /// Leaf descendants of a node, the node itself when it is a leaf.
    pub fn leaf_descendants(&self, code: &str) -> Vec<&ArenaNode> {
        let mut out = Vec::new();
        if let Some(&start) = self.index.get(code) {
            let mut stack = vec![start];
            while let Some(idx) = stack.pop() {
                let node = &self.nodes[idx];
                if node.is_leaf {
                    out.push(node);
                } else {
                    stack.extend(node.children.iter().copied());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(code: &str) -> AccountRecord {
        AccountRecord {
            code: code.to_string(),
            name: format!("Cuenta {}", code),
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn test_leaf_detection() {
        let records = vec![
            record("4"),
            record("5"),
            record("5.1"),
            record("5.1.1"),
            record("5.1.2"),
            record("5.10"),
        ];
        let arena = AccountArena::resolve(&records);

        assert!(arena.is_leaf("4"));
        assert!(!arena.is_leaf("5"));
        assert!(!arena.is_leaf("5.1"));
        assert!(arena.is_leaf("5.1.1"));
        assert!(arena.is_leaf("5.1.2"));
        // "5.1" is a string prefix of "5.10" but not a dot-prefix
        assert!(arena.is_leaf("5.10"));
    }

    #[test]
    fn test_parent_links_skip_missing_levels() {
        // "5.1" is absent: "5.1.1" must attach to "5" directly.
        let records = vec![record("5"), record("5.1.1"), record("5.2")];
        let arena = AccountArena::resolve(&records);

        let child = arena.get("5.1.1").unwrap();
        let parent = child.parent.map(|i| arena.node(i).code.clone());
        assert_eq!(parent.as_deref(), Some("5"));

        let five = arena.get("5").unwrap();
        assert_eq!(five.children.len(), 2);
    }

    #[test]
    fn test_depth_is_dot_count() {
        let arena = AccountArena::resolve(&[record("5.1.1.6")]);
        assert_eq!(arena.get("5.1.1.6").unwrap().depth, 3);
    }

    #[test]
    fn test_leaf_descendants() {
        let records = vec![
            record("5"),
            record("5.1"),
            record("5.1.1"),
            record("5.1.2"),
            record("5.2"),
        ];
        let arena = AccountArena::resolve(&records);

        let mut codes: Vec<&str> = arena
            .leaf_descendants("5")
            .iter()
            .map(|n| n.code.as_str())
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["5.1.1", "5.1.2", "5.2"]);
    }

    #[test]
    fn test_duplicate_codes_keep_first() {
        let mut dup = record("4");
        dup.name = "Segunda".to_string();
        let records = vec![record("4"), dup];
        let arena = AccountArena::resolve(&records);

        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get("4").unwrap().name, "Cuenta 4");
    }

    #[test]
    fn test_roots() {
        let records = vec![record("4"), record("5"), record("5.1")];
        let arena = AccountArena::resolve(&records);
        let roots: Vec<&str> = arena.roots().map(|n| n.code.as_str()).collect();
        assert_eq!(roots, vec!["4", "5"]);
    }
}
