//! Marker matching and tag header parsing.
//!
//! Every marker is ASCII and starts with `<`, so byte offsets produced
//! here always fall on UTF-8 character boundaries of the scanned text.

use std::collections::HashMap;

/// Artifact opening marker (header continues up to `>`).
pub const ARTIFACT_TAG_OPEN: &str = "<boltArtifact";
/// Artifact closing marker.
pub const ARTIFACT_TAG_CLOSE: &str = "</boltArtifact>";
/// Action opening marker (header continues up to `>`).
pub const ACTION_TAG_OPEN: &str = "<boltAction";
/// Action closing marker.
pub const ACTION_TAG_CLOSE: &str = "</boltAction>";

/// Outcome of comparing the text at a `<` against a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerMatch {
    /// The marker is present in full.
    Full,
    /// The text ends before the marker could be confirmed or ruled out.
    Partial,
    /// The text cannot be this marker.
    None,
}

/// Match a closing marker, which is complete on its own.
pub(crate) fn match_closer(rest: &str, marker: &str) -> MarkerMatch {
    if rest.starts_with(marker) {
        MarkerMatch::Full
    } else if marker.starts_with(rest) {
        MarkerMatch::Partial
    } else {
        MarkerMatch::None
    }
}

/// Match an opening marker, which must be followed by whitespace, `/` or `>`.
pub(crate) fn match_opener(rest: &str, marker: &str) -> MarkerMatch {
    if rest.len() <= marker.len() {
        return if marker.starts_with(rest) {
            MarkerMatch::Partial
        } else {
            MarkerMatch::None
        };
    }

    if !rest.starts_with(marker) {
        return MarkerMatch::None;
    }

    match rest.as_bytes()[marker.len()] {
        b'>' | b'/' => MarkerMatch::Full,
        b if b.is_ascii_whitespace() => MarkerMatch::Full,
        _ => MarkerMatch::None,
    }
}

/// Length of the tag header starting at `rest`, including the closing `>`.
///
/// The header ends at the first `>`, even inside a quoted value.
pub(crate) fn header_len(rest: &str) -> Option<usize> {
    rest.find('>').map(|idx| idx + 1)
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`.
///
/// Used to hold back a closing marker that is split across chunks.
pub(crate) fn partial_marker_suffix(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&len| text.as_bytes().ends_with(&marker.as_bytes()[..len]))
        .unwrap_or(0)
}

/// Extract `name="value"` / `name='value'` pairs from a complete tag header.
///
/// Scanning stops at the first token that is not a well-formed attribute;
/// pairs read before that point are kept.
pub(crate) fn parse_attributes(header: &str, marker: &str) -> HashMap<String, String> {
    let body = header
        .strip_prefix(marker)
        .unwrap_or(header)
        .trim_end_matches('>')
        .trim_end_matches('/');

    let mut attributes = HashMap::new();
    let mut rest = body.trim_start();

    while !rest.is_empty() {
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        if name_len == 0 {
            break;
        }
        let name = &rest[..name_len];

        let Some(after_eq) = rest[name_len..].trim_start().strip_prefix('=') else {
            break;
        };
        let after_eq = after_eq.trim_start();

        let Some(quote) = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let value_start = &after_eq[1..];
        let Some(value_len) = value_start.find(quote) else {
            break;
        };

        attributes.insert(name.to_owned(), value_start[..value_len].to_owned());
        rest = value_start[value_len + 1..].trim_start();
    }

    attributes
}
