//! core::types
//!
//! Strong types for the git object model used by memory branches.
//!
//! # Types
//!
//! - [`Oid`] - Content hash of a blob, tree or commit (SHA-1 or SHA-256)
//! - [`BranchName`] - Validated branch name (`memory/main`)
//! - [`RefName`] - Fully qualified ref (`refs/heads/memory/main`)
//!
//! Values are validated at construction, so a `BranchName` handed to the
//! plumbing layer can be interpolated into a command line as-is.
//!
//! # Examples
//!
//! ```
//! use membranch::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("memory/main").unwrap();
//! let oid = Oid::new("4b825dc642cb6eb9a060e54bf8d69288fbee4904").unwrap();
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/memory/main");
//! assert_eq!(oid.short(7), "4b825dc");
//!
//! assert!(BranchName::new("memory/../main").is_err());
//! assert!(Oid::new("not-a-hash").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Characters git refuses anywhere in a ref name.
const FORBIDDEN_REF_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Check `name` against `git check-ref-format` rules.
///
/// Returns a human-readable reason on failure; callers wrap it in the
/// `TypeError` variant matching what they were validating.
fn check_ref_format(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("cannot be empty".into());
    }
    if name == "@" {
        return Err("cannot be '@'".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err("cannot start or end with '/'".into());
    }
    if name.ends_with('.') {
        return Err("cannot end with '.'".into());
    }
    for seq in ["..", "@{", "//"] {
        if name.contains(seq) {
            return Err(format!("cannot contain '{seq}'"));
        }
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_REF_CHARS.contains(c)) {
        return Err(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err("cannot contain control characters".into());
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return Err(format!("component '{component}' cannot start with '.'"));
        }
        if component.ends_with(".lock") {
            return Err(format!("component '{component}' cannot end with '.lock'"));
        }
    }
    Ok(())
}

/// A validated git branch name (without the `refs/heads/` prefix).
///
/// Besides git's own refname rules, a leading `-` is rejected so the name can
/// never be mistaken for a command-line flag.
///
/// ```
/// use membranch::core::types::BranchName;
///
/// assert!(BranchName::new("memory/session-42").is_ok());
/// assert!(BranchName::new("-rf").is_err());
/// assert!(BranchName::new("memory/x.lock").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        check_ref_format(&name)
            .map_err(|reason| TypeError::InvalidBranchName(format!("'{name}' {reason}")))?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the branch lives under `prefix` (e.g. `memory/`).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix) && self.0.len() > prefix.len()
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A git object id, normalized to lowercase hex.
///
/// Both hash families are accepted: 40 characters for SHA-1 repositories and
/// 64 for SHA-256 ones. Nothing in this crate assumes one or the other.
///
/// ```
/// use membranch::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert!(Oid::new("abc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().trim().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(format!("'{oid}' is not hexadecimal")));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form, at most `len` characters.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully qualified, validated ref name.
///
/// ```
/// use membranch::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("memory/main").unwrap();
/// assert_eq!(
///     RefName::for_remote_branch("origin", &branch).as_str(),
///     "refs/remotes/origin/memory/main"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_ref_format(&name)
            .map_err(|reason| TypeError::InvalidRefName(format!("'{name}' {reason}")))?;
        Ok(Self(name))
    }

    /// `refs/heads/<branch>`.
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// `refs/remotes/<remote>/<branch>`.
    ///
    /// Remote names come from configuration and `git remote`, both of which
    /// are already valid ref components.
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_memory_branches() {
            for name in ["memory/main", "memory/session-1", "memory/agents_a1", "main"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_git_illegal_names() {
            for name in [
                "",
                "@",
                "-flag",
                "memory/",
                "/memory",
                "memory//main",
                "memory/../main",
                "memory/.hidden",
                "memory/x.lock",
                "memory/a b",
                "memory/a:b",
                "memory/a@{1}",
                "memory/end.",
                "memory/\u{7}",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be invalid");
            }
        }

        #[test]
        fn prefix_check_requires_a_suffix() {
            let branch = BranchName::new("memory/main").unwrap();
            assert!(branch.has_prefix("memory/"));
            assert!(!branch.has_prefix("notes/"));
        }

        #[test]
        fn serde_rejects_invalid() {
            let ok: Result<BranchName, _> = serde_json::from_str("\"memory/main\"");
            assert!(ok.is_ok());
            let bad: Result<BranchName, _> = serde_json::from_str("\"memory/../x\"");
            assert!(bad.is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn accepts_both_hash_families() {
            assert!(Oid::new("a".repeat(40)).is_ok());
            assert!(Oid::new("b".repeat(64)).is_ok());
        }

        #[test]
        fn trims_and_lowercases() {
            let oid = Oid::new(format!("{}\n", "A".repeat(40))).unwrap();
            assert_eq!(oid.as_str(), "a".repeat(40));
        }

        #[test]
        fn rejects_bad_lengths_and_digits() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
            assert!(Oid::new("a".repeat(41)).is_err());
        }

        #[test]
        fn short_is_clamped() {
            let oid = Oid::new("abcdef0123456789abcdef0123456789abcdef01").unwrap();
            assert_eq!(oid.short(7), "abcdef0");
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn branch_and_remote_refs() {
            let branch = BranchName::new("memory/main").unwrap();
            assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/memory/main");
            assert_eq!(
                RefName::for_remote_branch("upstream", &branch).as_str(),
                "refs/remotes/upstream/memory/main"
            );
        }

        #[test]
        fn strip_prefix() {
            let r = RefName::new("refs/heads/memory/main").unwrap();
            assert_eq!(r.strip_prefix("refs/heads/"), Some("memory/main"));
            assert_eq!(r.strip_prefix("refs/tags/"), None);
        }

        #[test]
        fn validation() {
            assert!(RefName::new("refs/heads/ok").is_ok());
            assert!(RefName::new("refs/heads/bad..name").is_err());
            assert!(RefName::new("").is_err());
        }
    }
}
