//! Domain model module declarations.

pub mod action;
pub mod artifact;
pub mod message;
pub mod preview;

/// Normalize a workspace-relative path as it appears in action tags.
///
/// Produces a `/`-rooted path with empty and `.` segments removed and no
/// trailing slash, so `src//a.js`, `/src/a.js` and `./src/a.js/` compare
/// equal. `..` segments pop the previous segment and never climb above
/// the root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
