//! Branch name validation following git-style conventions.
//!
//! Valid branch names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not start or end with `/`, must not end with `.` or `.lock`
//! - Components between slashes must be non-empty and not start with `.`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Canonical ref name for a branch, e.g. `refs/heads/main`.
pub fn branch_ref_name(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// Branch names double as relative file paths under `refs/heads/`, so these
/// rules also keep them from escaping that directory.
///
/// # Examples
///
/// ```
/// use chron_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("schema/prod").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    let reject = |reason: String| {
        Err(RefError::InvalidBranchName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("branch name must not be empty".into());
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control()) {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    for bad in ["..", "@{"] {
        if name.contains(bad) {
            return reject(format!("must not contain {bad:?}"));
        }
    }
    if name.starts_with('/') || name.ends_with('/') {
        return reject("must not start or end with '/'".into());
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return reject("must not end with '.' or '.lock'".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return reject("path components must not be empty".into());
        }
        if component.starts_with('.') {
            return reject(format!("component must not start with '.': {component:?}"));
        }
    }
    Ok(())
}
