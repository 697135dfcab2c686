//! core::naming
//!
//! Sanitization of caller-supplied names before they reach the object store.
//!
//! # Rules
//!
//! - Content paths are relative, `/`-separated, lowercase, and built from
//!   `[a-z0-9._-]` segments. Anything else in a segment becomes `-`.
//! - `..` segments, absolute paths and `.git` segments are rejected outright,
//!   never rewritten.
//! - Memory branch names always carry the configured prefix (`memory/`), so
//!   `"Session 1"` becomes `memory/session-1`.
//! - Namespace identifiers are a single segment without dots.

use thiserror::Error;

use crate::core::types::{BranchName, TypeError};

/// Prefix under which memory branches live unless configured otherwise.
pub const DEFAULT_BRANCH_PREFIX: &str = "memory/";

/// Longest segment accepted in a content path.
const MAX_SEGMENT_LEN: usize = 255;

/// Errors from name sanitization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("path is empty")]
    EmptyPath,

    #[error("path traversal rejected: '{0}'")]
    Traversal(String),

    #[error("absolute path rejected: '{0}'")]
    Absolute(String),

    #[error("reserved path segment '{segment}' in '{path}'")]
    Reserved { path: String, segment: String },

    #[error("path segment longer than {MAX_SEGMENT_LEN} bytes in '{0}'")]
    SegmentTooLong(String),

    #[error("segment '{segment}' of '{input}' has no usable characters")]
    UnusableSegment { input: String, segment: String },

    #[error("branch name '{0}' has nothing after the memory prefix")]
    EmptyBranch(String),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// A sanitized path inside a memory branch's tree.
///
/// A path cannot be both a file and a directory on the same branch: once
/// `a1/notes` holds content, `a1/notes/x.md` is refused, and the reverse.
///
/// ```
/// use membranch::core::naming::ContentPath;
///
/// let path = ContentPath::parse("Agents/A1/Design Notes.md").unwrap();
/// assert_eq!(path.as_str(), "agents/a1/design-notes.md");
/// assert!(ContentPath::parse("../secrets").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentPath(String);

impl ContentPath {
    /// Sanitize a caller-supplied path.
    pub fn parse(raw: &str) -> Result<Self, NamingError> {
        let normalized = raw.trim().replace('\\', "/");
        if normalized.starts_with('/') || has_drive_letter(&normalized) {
            return Err(NamingError::Absolute(raw.to_string()));
        }

        let mut segments = Vec::new();
        for component in normalized.split('/') {
            match component.trim() {
                "" | "." => continue,
                ".." => return Err(NamingError::Traversal(raw.to_string())),
                _ => {}
            }

            let segment = slugify_segment(component, true);
            if segment.is_empty() {
                return Err(NamingError::UnusableSegment {
                    input: raw.to_string(),
                    segment: component.to_string(),
                });
            }
            if segment.bytes().all(|b| b == b'.') {
                return Err(NamingError::Traversal(raw.to_string()));
            }
            // git also refuses ".git." and friends (core.protectNTFS).
            if segment.trim_end_matches('.') == ".git" {
                return Err(NamingError::Reserved {
                    path: raw.to_string(),
                    segment,
                });
            }
            if segment.len() > MAX_SEGMENT_LEN {
                return Err(NamingError::SegmentTooLong(raw.to_string()));
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(NamingError::EmptyPath);
        }
        Ok(Self(segments.join("/")))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First segment, which groups content by agent or session.
    pub fn namespace(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ContentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Lowercase `raw` and map every character outside the safe set to `-`.
///
/// Runs of `-` collapse to one and leading/trailing `-` are trimmed, so a
/// segment can never look like a command-line flag.
fn slugify_segment(raw: &str, allow_dots: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            '.' if allow_dots => '.',
            _ => '-',
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// Sanitize a namespace identifier (agent id, session id).
///
/// ```
/// use membranch::core::naming::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("Agent #7").unwrap(), "agent-7");
/// assert!(sanitize_identifier("../").is_err());
/// ```
pub fn sanitize_identifier(raw: &str) -> Result<String, NamingError> {
    if raw.contains("..") || raw.contains('/') || raw.contains('\\') {
        return Err(NamingError::InvalidIdentifier(raw.to_string()));
    }
    let id = slugify_segment(raw, false);
    if id.is_empty() {
        return Err(NamingError::InvalidIdentifier(raw.to_string()));
    }
    Ok(id)
}

/// Build `<namespace>/<name>` with a sanitized namespace segment.
///
/// ```
/// use membranch::core::naming::namespaced_path;
///
/// let path = namespaced_path("A1", "notes/today.md").unwrap();
/// assert_eq!(path.as_str(), "a1/notes/today.md");
/// ```
pub fn namespaced_path(namespace: &str, name: &str) -> Result<ContentPath, NamingError> {
    let namespace = sanitize_identifier(namespace)?;
    let name = ContentPath::parse(name)?;
    ContentPath::parse(&format!("{}/{}", namespace, name.as_str()))
}

/// Sanitize a memory branch name and place it under `prefix`.
///
/// A leading `refs/heads/` is dropped, and the prefix is added when missing.
///
/// ```
/// use membranch::core::naming::sanitize_branch;
///
/// assert_eq!(sanitize_branch("main", "memory/").unwrap().as_str(), "memory/main");
/// assert_eq!(
///     sanitize_branch("memory/Session 1", "memory/").unwrap().as_str(),
///     "memory/session-1"
/// );
/// assert!(sanitize_branch("memory/../main", "memory/").is_err());
/// ```
pub fn sanitize_branch(raw: &str, prefix: &str) -> Result<BranchName, NamingError> {
    let prefix = normalize_prefix(prefix);
    let trimmed = raw.trim().to_ascii_lowercase();
    let unqualified = trimmed.strip_prefix("refs/heads/").unwrap_or(&trimmed);
    let rest = unqualified.strip_prefix(&prefix).unwrap_or(unqualified);

    let mut segments = Vec::new();
    for component in rest.split('/') {
        if component.trim() == ".." {
            return Err(NamingError::Traversal(raw.to_string()));
        }
        let segment = slugify_segment(component, true);
        let segment = segment.trim_matches(|c| c == '.' || c == '-');
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
    }
    if segments.is_empty() {
        return Err(NamingError::EmptyBranch(raw.to_string()));
    }

    Ok(BranchName::new(format!("{}{}", prefix, segments.join("/")))?)
}

/// Ensure a branch prefix ends with exactly one `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BRANCH_PREFIX.to_string()
    } else {
        format!("{}/", trimmed)
    }
}
