//! Lazily loaded directory tree
//!
//! Nodes are listed one level at a time. A node starts out `Unknown`, becomes
//! `Loading` while its listing is produced, and `Loaded` once its children are
//! attached. Expanding a `Loaded` node again is a no-op.
//!
//! Nodes live in an arena and are addressed by `NodeId`; they are only ever
//! added, never removed, for the lifetime of the tree.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::logging;

/// Index of a node in its `DirectoryTree`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Whether a node's children have been listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never listed; may or may not have subdirectories
    Unknown,
    /// Listing in progress
    Loading,
    /// Children attached
    Loaded,
}

/// An immediate subdirectory produced by `list_children`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Display name (the path itself for roots)
    pub name: String,
    pub path: PathBuf,
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// Ordered by case-insensitive name
    pub children: Vec<NodeId>,
    pub load_state: LoadState,
    /// Shown expanded in the view
    pub is_open: bool,
}

/// A node flattened for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: NodeId,
    pub name: String,
    pub depth: usize,
    pub is_open: bool,
    pub load_state: LoadState,
}

/// List the immediate, non-hidden subdirectories of `path`
///
/// Sorted case-insensitively by name. Any listing failure (permission denied,
/// vanished folder) yields an empty list.
pub fn list_children(path: &Path) -> Vec<DirEntryInfo> {
    let read_dir = match fs::read_dir(path) {
        Ok(rd) => rd,
        Err(e) => {
            if e.kind() == ErrorKind::PermissionDenied {
                debug!(path = %path.display(), "Permission denied listing folder");
            } else {
                warn!(path = %path.display(), error = %e, "Failed to list folder");
            }
            return Vec::new();
        }
    };

    let mut entries: Vec<DirEntryInfo> = read_dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let path = entry.path();
            // is_dir() follows symlinks, so linked folders are browsable
            path.is_dir().then_some(DirEntryInfo { name, path })
        })
        .collect();

    entries.sort_by_cached_key(|e| e.name.to_lowercase());
    entries
}

/// Filesystem roots shown at the top level of the tree
///
/// Every existing drive letter on Windows, `/` elsewhere.
pub fn available_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        (b'A'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|drive| drive.exists())
            .collect()
    } else {
        vec![PathBuf::from("/")]
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl DirectoryTree {
    /// Tree with the given collapsed, unlisted roots
    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut tree = DirectoryTree::default();
        for path in roots {
            let id = tree.push_node(path.display().to_string(), path, 0, None);
            tree.roots.push(id);
        }
        tree
    }

    /// Tree for this platform
    ///
    /// A single root is opened and listed right away; multiple roots (drives)
    /// stay collapsed until the user expands them.
    pub fn for_platform() -> Self {
        let mut tree = Self::with_roots(available_roots());
        if tree.roots.len() == 1 {
            let root = tree.roots[0];
            tree.open(root);
        }
        tree
    }

    fn push_node(
        &mut self,
        name: String,
        path: PathBuf,
        depth: usize,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            name,
            path,
            depth,
            parent,
            children: Vec::new(),
            load_state: LoadState::Unknown,
            is_open: false,
        });
        id
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find an already created node by path
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.path == path)
            .map(NodeId)
    }

    /// Mark an `Unknown` node as `Loading` and return the path to list
    ///
    /// Returns `None` if the node is already loading or loaded.
    pub fn begin_expand(&mut self, id: NodeId) -> Option<PathBuf> {
        let node = self.nodes.get_mut(id.0)?;
        if node.load_state != LoadState::Unknown {
            return None;
        }
        node.load_state = LoadState::Loading;
        Some(node.path.clone())
    }

    /// Attach a listing produced for a node in `Loading` state
    ///
    /// Listings for nodes that are not loading are dropped.
    pub fn finish_expand(&mut self, id: NodeId, entries: Vec<DirEntryInfo>) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        if node.load_state != LoadState::Loading {
            debug!(node = id.0, state = ?node.load_state, "Ignoring listing for node not loading");
            return;
        }
        let depth = node.depth + 1;
        let children: Vec<NodeId> = entries
            .into_iter()
            .map(|entry| self.push_node(entry.name, entry.path, depth, Some(id)))
            .collect();

        let node = &mut self.nodes[id.0];
        node.children = children;
        node.load_state = LoadState::Loaded;
    }

    /// List the node's subdirectories if they haven't been listed yet
    ///
    /// Returns true if a listing happened.
    #[instrument(level = "debug", skip(self))]
    pub fn expand(&mut self, id: NodeId) -> bool {
        match self.begin_expand(id) {
            Some(path) => {
                let entries = list_children(&path);
                logging::log_debug(
                    "TREE",
                    &format!("Listed {} subfolders of {}", entries.len(), path.display()),
                );
                self.finish_expand(id, entries);
                true
            }
            None => false,
        }
    }

    /// Expand and mark the node open
    pub fn open(&mut self, id: NodeId) {
        self.expand(id);
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.is_open = true;
        }
    }

    /// Hide the node's children; the listing is kept
    pub fn collapse(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.is_open = false;
        }
    }

    /// Open every ancestor of `path`, listing levels as needed
    ///
    /// Walks down from the root containing `path` one segment at a time and
    /// stops at the first segment that has no matching child. Returns the node
    /// for `path` if it was reached.
    pub fn reveal(&mut self, path: &Path) -> Option<NodeId> {
        let (root, relative) = self.roots.iter().find_map(|&id| {
            let root_path = &self.nodes[id.0].path;
            path.strip_prefix(root_path)
                .ok()
                .map(|rel| (id, rel.to_path_buf()))
        })?;

        self.open(root);
        let mut current = root;
        for component in relative.components() {
            let Component::Normal(part) = component else {
                continue;
            };
            let wanted = self.nodes[current.0].path.join(part);
            let next = self
                .children(current)
                .iter()
                .copied()
                .find(|&child| self.nodes[child.0].path == wanted)?;
            self.open(next);
            current = next;
        }
        Some(current)
    }

    /// Depth-first rows of all visible nodes
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for &root in &self.roots {
            self.collect_rows(root, &mut rows);
        }
        rows
    }

    fn collect_rows(&self, id: NodeId, rows: &mut Vec<TreeRow>) {
        let node = &self.nodes[id.0];
        rows.push(TreeRow {
            id,
            name: node.name.clone(),
            depth: node.depth,
            is_open: node.is_open,
            load_state: node.load_state,
        });
        if node.is_open {
            for &child in &node.children {
                self.collect_rows(child, rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_dirs(root: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    fn child_names(tree: &DirectoryTree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .map(|&c| tree.node(c).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_list_children_sorted_case_insensitive() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["beta", "Alpha", "gamma"]);
        fs::write(dir.path().join("file.py"), "").unwrap();

        let names: Vec<String> = list_children(dir.path())
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_list_children_excludes_hidden() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &[".git", ".cache", "src"]);

        let names: Vec<String> = list_children(dir.path())
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["src"]);
    }

    #[test]
    fn test_list_children_missing_folder_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_children(&dir.path().join("nope")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_list_children_permission_denied_is_empty() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        make_dirs(&locked, &["inner"]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits, so only assert when the read really fails
        if fs::read_dir(&locked).is_err() {
            assert!(list_children(&locked).is_empty());
        }
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_new_nodes_start_unknown() {
        let dir = TempDir::new().unwrap();
        let tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);
        let root = tree.roots()[0];
        assert_eq!(tree.node(root).unwrap().load_state, LoadState::Unknown);
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn test_expand_matches_listing_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["b", "A", ".hidden"]);
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);
        let root = tree.roots()[0];

        assert!(tree.expand(root));
        assert_eq!(tree.node(root).unwrap().load_state, LoadState::Loaded);
        let expected: Vec<String> = list_children(dir.path()).into_iter().map(|e| e.name).collect();
        assert_eq!(child_names(&tree, root), expected);

        let nodes_before = tree.len();
        make_dirs(dir.path(), &["c"]);
        assert!(!tree.expand(root));
        assert_eq!(tree.len(), nodes_before);
        assert_eq!(child_names(&tree, root), ["A", "b"]);
    }

    #[test]
    fn test_split_expand_goes_through_loading() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["one"]);
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);
        let root = tree.roots()[0];

        let path = tree.begin_expand(root).unwrap();
        assert_eq!(tree.node(root).unwrap().load_state, LoadState::Loading);
        assert_eq!(tree.begin_expand(root), None);

        tree.finish_expand(root, list_children(&path));
        assert_eq!(tree.node(root).unwrap().load_state, LoadState::Loaded);
        assert_eq!(child_names(&tree, root), ["one"]);

        // A stale second listing is ignored
        tree.finish_expand(root, list_children(&path));
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn test_child_paths_and_depths() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["sub"]);
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);
        let root = tree.roots()[0];
        tree.expand(root);

        let child = tree.node(tree.children(root)[0]).unwrap();
        assert_eq!(child.path, dir.path().join("sub"));
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent, Some(root));
        assert_eq!(child.load_state, LoadState::Unknown);
    }

    #[test]
    fn test_reveal_opens_each_ancestor() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["a/b/c", "a/other", "z"]);
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);

        let target = dir.path().join("a").join("b").join("c");
        let id = tree.reveal(&target).unwrap();
        assert_eq!(tree.node(id).unwrap().path, target);

        for ancestor in ["a", "a/b"] {
            let node = tree.find(&dir.path().join(ancestor)).unwrap();
            assert!(tree.node(node).unwrap().is_open);
            assert_eq!(tree.node(node).unwrap().load_state, LoadState::Loaded);
        }
        // Siblings are listed but not expanded
        let other = tree.find(&dir.path().join("a/other")).unwrap();
        assert_eq!(tree.node(other).unwrap().load_state, LoadState::Unknown);
    }

    #[test]
    fn test_reveal_stops_at_missing_segment() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["a"]);
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);

        assert_eq!(tree.reveal(&dir.path().join("a/missing")), None);
        let a = tree.find(&dir.path().join("a")).unwrap();
        assert!(tree.node(a).unwrap().is_open);
    }

    #[test]
    fn test_reveal_outside_roots() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);
        assert_eq!(tree.reveal(other.path()), None);
    }

    #[test]
    fn test_visible_rows_follow_open_state() {
        let dir = TempDir::new().unwrap();
        make_dirs(dir.path(), &["a/inner", "b"]);
        let mut tree = DirectoryTree::with_roots([dir.path().to_path_buf()]);
        let root = tree.roots()[0];

        assert_eq!(tree.visible_rows().len(), 1);

        tree.open(root);
        let names: Vec<String> = tree.visible_rows().into_iter().map(|r| r.name).collect();
        assert_eq!(names[1..], ["a", "b"]);

        let a = tree.find(&dir.path().join("a")).unwrap();
        tree.open(a);
        let rows = tree.visible_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].name, "inner");
        assert_eq!(rows[2].depth, 2);

        tree.collapse(a);
        assert_eq!(tree.visible_rows().len(), 3);
        assert_eq!(tree.node(a).unwrap().load_state, LoadState::Loaded);
    }

    #[cfg(unix)]
    #[test]
    fn test_platform_root_is_open() {
        let tree = DirectoryTree::for_platform();
        let root = tree.roots()[0];
        assert_eq!(tree.node(root).unwrap().path, PathBuf::from("/"));
        assert!(tree.node(root).unwrap().is_open);
        assert_eq!(tree.node(root).unwrap().load_state, LoadState::Loaded);
    }
}
