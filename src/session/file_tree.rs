//! Flattened file tree for display.

use std::collections::BTreeMap;

use regex::Regex;

use super::FileEntry;

/// Kind of a [`FileNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Folder.
    Folder,
}

/// One row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// Nesting level below the listing root (0 for top-level rows).
    pub depth: usize,
    /// Last path segment.
    pub name: String,
    /// Full workspace path.
    pub full_path: String,
    /// File or folder.
    pub kind: NodeKind,
}

#[derive(Default)]
struct Dir<'a> {
    folders: BTreeMap<&'a str, Dir<'a>>,
    files: Vec<&'a str>,
}

/// Build a depth-first listing of `files` below `root_folder`.
///
/// Folders come before files at each level and both are sorted by name.
/// Paths matched by any `hidden` pattern are left out, as is everything
/// below a hidden folder. With `hide_root` unset the root folder itself is
/// the first row and every other row is one level deeper.
#[must_use]
pub fn file_list(
    files: &BTreeMap<String, FileEntry>,
    root_folder: &str,
    hide_root: bool,
    hidden: &[Regex],
) -> Vec<FileNode> {
    let root = root_folder.trim_end_matches('/');
    let prefix = format!("{root}/");

    let mut tree = Dir::default();
    for (path, entry) in files {
        let Some(relative) = path.strip_prefix(&prefix) else {
            continue;
        };
        if relative.is_empty() || is_hidden(path, hidden) {
            continue;
        }

        let segments: Vec<&str> = relative.split('/').collect();
        let mut dir = &mut tree;
        let mut current = root.to_owned();
        let mut skip = false;
        for segment in &segments[..segments.len() - 1] {
            current.push('/');
            current.push_str(segment);
            if is_hidden(&current, hidden) {
                skip = true;
                break;
            }
            dir = dir.folders.entry(*segment).or_default();
        }
        if skip {
            continue;
        }

        let Some(name) = segments.last().copied() else {
            continue;
        };
        if entry.is_folder() {
            dir.folders.entry(name).or_default();
        } else {
            dir.files.push(name);
        }
    }

    let mut rows = Vec::new();
    let base_depth = if hide_root {
        0
    } else {
        let name = root.rsplit('/').next().unwrap_or_default();
        rows.push(FileNode {
            depth: 0,
            name: if name.is_empty() { "/".into() } else { name.into() },
            full_path: if root.is_empty() { "/".into() } else { root.into() },
            kind: NodeKind::Folder,
        });
        1
    };
    flatten(&tree, root, base_depth, &mut rows);
    rows
}

fn flatten(dir: &Dir<'_>, path: &str, depth: usize, rows: &mut Vec<FileNode>) {
    for (name, child) in &dir.folders {
        let full_path = format!("{path}/{name}");
        rows.push(FileNode {
            depth,
            name: (*name).to_owned(),
            full_path: full_path.clone(),
            kind: NodeKind::Folder,
        });
        flatten(child, &full_path, depth + 1, rows);
    }

    let mut files = dir.files.clone();
    files.sort_unstable();
    for name in files {
        rows.push(FileNode {
            depth,
            name: name.to_owned(),
            full_path: format!("{path}/{name}"),
            kind: NodeKind::File,
        });
    }
}

fn is_hidden(path: &str, hidden: &[Regex]) -> bool {
    // Patterns are written against folder paths with a trailing slash.
    let with_slash = format!("{path}/");
    hidden
        .iter()
        .any(|pattern| pattern.is_match(path) || pattern.is_match(&with_slash))
}
