//! Accept/reject policies applied while walking a remote tree.

use super::types::{FileNode, NameEntry};
use std::collections::{HashMap, HashSet};

/// Decides which entries of a walk are kept.
///
/// Accepted entries are collected by the visitor itself.
pub trait Visitor {
    /// Offers one discovered entry. Returns true if it was accepted.
    fn visit(&mut self, node: &FileNode) -> bool;

    /// Entries accepted so far, in visit order.
    fn files(&self) -> &[FileNode];
}

/// Accepts regular files that are new or whose size changed since a
/// previous snapshot.
#[derive(Debug, Default)]
pub struct UnseenFileVisitor {
    seen: HashMap<String, NameEntry>,
    exclude: HashSet<String>,
    files: Vec<FileNode>,
}

impl UnseenFileVisitor {
    /// Creates a visitor from a snapshot keyed by full path and a set of
    /// full paths to skip.
    pub fn new(seen: HashMap<String, NameEntry>, exclude: HashSet<String>) -> Self {
        Self {
            seen,
            exclude,
            files: Vec::new(),
        }
    }

    /// Snapshot of everything seen or accepted, keyed by full path. Feed it
    /// to the next run's [`UnseenFileVisitor::new`].
    pub fn into_seen(self) -> HashMap<String, NameEntry> {
        let mut seen = self.seen;
        for node in self.files {
            seen.insert(node.full_path(), node.entry);
        }
        seen
    }
}

impl Visitor for UnseenFileVisitor {
    fn visit(&mut self, node: &FileNode) -> bool {
        if node.is_dir() {
            return false;
        }

        let path = node.full_path();
        if self.exclude.contains(&path) {
            return false;
        }
        if let Some(previous) = self.seen.get(&path) {
            if previous.attrs.size == node.attrs().size {
                return false;
            }
        }

        self.files.push(FileNode::new(node.dir.clone(), node.entry.clone()));
        true
    }

    fn files(&self) -> &[FileNode] {
        &self.files
    }
}

/// Builds a snapshot of every non-directory entry in `tree`, keyed by full
/// path.
pub fn snapshot(tree: &[FileNode]) -> HashMap<String, NameEntry> {
    let mut seen = HashMap::new();
    let mut stack: Vec<&FileNode> = tree.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.is_dot() {
            continue;
        }
        if !node.is_dir() {
            seen.insert(node.full_path(), node.entry.clone());
        }
        stack.extend(node.children.iter().rev());
    }
    seen
}

/// Offers every entry of `tree` except `.` and `..` to `visitor`, depth
/// first, children right after their parent.
pub fn walk_tree<V>(tree: &[FileNode], visitor: &mut V)
where
    V: Visitor + ?Sized,
{
    for node in tree {
        if node.is_dot() {
            continue;
        }
        visitor.visit(node);
        walk_tree(&node.children, visitor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::filemode::FileMode;
    use crate::sftp::types::FileAttributes;

    fn entry(name: &str, mode: u32, size: u64) -> NameEntry {
        NameEntry::new(
            name,
            name,
            FileAttributes {
                size: Some(size),
                permissions: Some(FileMode(mode)),
                ..Default::default()
            },
        )
    }

    fn file(dir: &str, name: &str, size: u64) -> FileNode {
        FileNode::new(dir, entry(name, 0o100644, size))
    }

    fn dir(parent: &str, name: &str, children: Vec<FileNode>) -> FileNode {
        let mut node = FileNode::new(parent, entry(name, 0o040755, 4096));
        node.children = children;
        node
    }

    fn share_tree() -> Vec<FileNode> {
        vec![
            dir("/share", ".", vec![]),
            dir("/share", "..", vec![]),
            dir(
                "/share",
                "dir",
                vec![
                    dir("/share/dir", ".", vec![]),
                    dir("/share/dir", "..", vec![]),
                    dir(
                        "/share/dir",
                        "dir2",
                        vec![file("/share/dir/dir2", "file3.txt", 1)],
                    ),
                    file("/share/dir", "file2.txt", 1),
                ],
            ),
            file("/share", "file1.txt", 1),
        ]
    }

    struct Recorder(Vec<String>, Vec<FileNode>);

    impl Visitor for Recorder {
        fn visit(&mut self, node: &FileNode) -> bool {
            self.0.push(node.full_path());
            true
        }

        fn files(&self) -> &[FileNode] {
            &self.1
        }
    }

    #[test]
    fn test_walk_order_is_depth_first() {
        let mut recorder = Recorder(Vec::new(), Vec::new());
        walk_tree(&share_tree(), &mut recorder);
        assert_eq!(
            recorder.0,
            vec![
                "/share/dir",
                "/share/dir/dir2",
                "/share/dir/dir2/file3.txt",
                "/share/dir/file2.txt",
                "/share/file1.txt",
            ]
        );
    }

    #[test]
    fn test_unseen_accepts_new_and_resized_files() {
        let mut seen = HashMap::new();
        seen.insert("/share/file1.txt".to_string(), entry("file1.txt", 0o100644, 1));
        seen.insert("/share/dir/file2.txt".to_string(), entry("file2.txt", 0o100644, 7));

        let mut visitor = UnseenFileVisitor::new(seen, HashSet::new());
        walk_tree(&share_tree(), &mut visitor);

        let accepted: Vec<String> = visitor.files().iter().map(FileNode::full_path).collect();
        assert_eq!(
            accepted,
            vec!["/share/dir/dir2/file3.txt", "/share/dir/file2.txt"]
        );
    }

    #[test]
    fn test_unseen_honours_exclusions() {
        let exclude: HashSet<String> = ["/share/dir/dir2/file3.txt".to_string()].into();
        let mut visitor = UnseenFileVisitor::new(snapshot(&[]), exclude);

        assert!(!visitor.visit(&file("/share/dir/dir2", "file3.txt", 1)));
        assert!(visitor.visit(&file("/share", "file1.txt", 1)));
        assert_eq!(visitor.files().len(), 1);
    }

    #[test]
    fn test_unseen_rejects_directories() {
        let mut visitor = UnseenFileVisitor::default();
        assert!(!visitor.visit(&dir("/share", "dir", vec![])));
        assert!(visitor.files().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip_accepts_nothing() {
        let tree = share_tree();
        let mut visitor = UnseenFileVisitor::new(snapshot(&tree), HashSet::new());
        walk_tree(&tree, &mut visitor);
        assert!(visitor.files().is_empty());

        let seen = visitor.into_seen();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains_key("/share/dir/dir2/file3.txt"));
    }
}
