//! Unit tests for the flattened file tree listing.

use regex::Regex;

use artifact_runner::session::file_tree::NodeKind;
use artifact_runner::session::SessionState;

fn hidden() -> Vec<Regex> {
    ["/node_modules/", r"/\.next", r"/\.astro"]
        .iter()
        .map(|p| Regex::new(p).expect("pattern"))
        .collect()
}

fn rows(session: &SessionState, hide_root: bool) -> Vec<(usize, String, NodeKind)> {
    session
        .file_list("/", hide_root, &hidden())
        .into_iter()
        .map(|node| (node.depth, node.full_path, node.kind))
        .collect()
}

#[test]
fn folders_first_then_files_by_name() {
    let session = SessionState::new();
    session.record_file("/src/main.js", "m");
    session.record_file("/package.json", "{}");
    session.record_file("/src/components/App.jsx", "a");
    session.record_file("/index.html", "<html>");
    session.record_file("/src/app.css", "c");

    assert_eq!(
        rows(&session, true),
        vec![
            (0, "/src".to_owned(), NodeKind::Folder),
            (1, "/src/components".to_owned(), NodeKind::Folder),
            (2, "/src/components/App.jsx".to_owned(), NodeKind::File),
            (1, "/src/app.css".to_owned(), NodeKind::File),
            (1, "/src/main.js".to_owned(), NodeKind::File),
            (0, "/index.html".to_owned(), NodeKind::File),
            (0, "/package.json".to_owned(), NodeKind::File),
        ]
    );
}

#[test]
fn hidden_paths_are_left_out() {
    let session = SessionState::new();
    session.record_file("/node_modules/react/index.js", "r");
    session.record_file("/.next/cache.json", "{}");
    session.record_file("/src/index.js", "i");

    let paths: Vec<_> = rows(&session, true).into_iter().map(|(_, p, _)| p).collect();
    assert_eq!(paths, ["/src", "/src/index.js"]);
}

#[test]
fn root_row_when_not_hidden() {
    let session = SessionState::new();
    session.record_file("/a.txt", "a");

    assert_eq!(
        rows(&session, false),
        vec![
            (0, "/".to_owned(), NodeKind::Folder),
            (1, "/a.txt".to_owned(), NodeKind::File),
        ]
    );
}

#[test]
fn listing_below_subfolder() {
    let session = SessionState::new();
    session.record_file("/src/lib/a.js", "a");
    session.record_file("/other.txt", "o");

    let nodes = session.file_list("/src", true, &[]);
    let names: Vec<_> = nodes.iter().map(|n| (n.depth, n.name.as_str())).collect();
    assert_eq!(names, [(0, "lib"), (1, "a.js")]);
}
