//! Path resolution into a stable file/directory hierarchy.
//!
//! Maps forward-slash paths to integer node ids, synthesizing missing
//! parent directories on demand. The node table is arena-style: ids are
//! assigned in creation order and never change within a run.

use rustc_hash::FxHashMap;

use crate::model::FileNode;

/// Incrementally builds the hierarchy from touched paths.
///
/// Directory keys carry a trailing '/'. Resolution is idempotent: the
/// same path always yields the same id without creating duplicates.
#[derive(Default)]
pub struct HierarchyBuilder {
    index: FxHashMap<String, i64>,
    nodes: Vec<FileNode>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a changed file's full path, creating the file node and
    /// any missing ancestor directories.
    pub fn resolve_file(&mut self, path: &str) -> i64 {
        self.resolve(path.trim_matches('/'), false)
    }

    /// Resolve a directory path (without trailing slash).
    pub fn resolve_dir(&mut self, path: &str) -> i64 {
        self.resolve(path.trim_matches('/'), true)
    }

    fn resolve(&mut self, clean: &str, is_directory: bool) -> i64 {
        let key = if is_directory {
            format!("{}/", clean)
        } else {
            clean.to_string()
        };
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        // First-seen classification is authoritative: if history contains
        // contradictory evidence (a path appearing as both file and
        // directory), the node created first is reused unchanged.
        let other_key = if is_directory {
            clean.to_string()
        } else {
            format!("{}/", clean)
        };
        if let Some(&id) = self.index.get(&other_key) {
            return id;
        }

        let (parent_id, name) = match clean.rsplit_once('/') {
            Some((parent, name)) => (Some(self.resolve(parent, true)), name),
            None => (None, clean),
        };

        let id = self.nodes.len() as i64 + 1;
        self.nodes.push(FileNode {
            id,
            path: key.clone(),
            parent_id,
            name: name.to_string(),
            is_directory,
        });
        self.index.insert(key, id);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Consume the builder, yielding nodes in creation (id) order.
    pub fn into_nodes(self) -> Vec<FileNode> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_idempotent() {
        let mut h = HierarchyBuilder::new();
        let id1 = h.resolve_file("src/main.rs");
        let id2 = h.resolve_file("src/main.rs");
        assert_eq!(id1, id2);
        // src/ and src/main.rs
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_ancestors_synthesized_once() {
        let mut h = HierarchyBuilder::new();
        h.resolve_file("a/b/c.txt");
        // Exactly one node for a/ and one for a/b/
        assert_eq!(h.len(), 3);
        h.resolve_file("a/b/d.txt");
        assert_eq!(h.len(), 4);

        let nodes = h.into_nodes();
        let a = nodes.iter().find(|n| n.path == "a/").unwrap();
        let ab = nodes.iter().find(|n| n.path == "a/b/").unwrap();
        assert!(a.is_directory);
        assert_eq!(a.parent_id, None);
        assert_eq!(ab.parent_id, Some(a.id));
        assert_eq!(ab.name, "b");
    }

    #[test]
    fn test_file_parent_links() {
        let mut h = HierarchyBuilder::new();
        let file_id = h.resolve_file("src/lib.rs");
        let nodes = h.into_nodes();
        let file = nodes.iter().find(|n| n.id == file_id).unwrap();
        let dir = nodes.iter().find(|n| n.path == "src/").unwrap();
        assert!(!file.is_directory);
        assert_eq!(file.name, "lib.rs");
        assert_eq!(file.parent_id, Some(dir.id));
    }

    #[test]
    fn test_top_level_file_has_no_parent() {
        let mut h = HierarchyBuilder::new();
        let id = h.resolve_file("README.md");
        let nodes = h.into_nodes();
        let node = nodes.iter().find(|n| n.id == id).unwrap();
        assert_eq!(node.parent_id, None);
        assert_eq!(node.path, "README.md");
    }

    #[test]
    fn test_first_seen_classification_wins() {
        let mut h = HierarchyBuilder::new();
        // "a" first appears as an implied directory...
        let file_under = h.resolve_file("a/b.txt");
        let dir_id = h.resolve_dir("a");
        // ...then history claims "a" is itself a file: the directory node
        // is reused and its flag left unchanged.
        let as_file = h.resolve_file("a");
        assert_eq!(dir_id, as_file);
        assert_ne!(dir_id, file_under);

        let nodes = h.into_nodes();
        let a = nodes.iter().find(|n| n.id == dir_id).unwrap();
        assert!(a.is_directory);
    }
}
