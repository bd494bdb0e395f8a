//! Version-control context resolution for front-ends.
//!
//! Front-ends attach the current branch to their requests so branch-scoped
//! rules (e.g. "require approval for force-push on main") can fire. The
//! daemon itself never reads the repository — it trusts the request context.

use std::path::Path;

/// Resolve the current git branch by walking up from `start` to the nearest
/// `.git/HEAD` and reading the symbolic ref. Returns None outside a
/// repository or on a detached HEAD.
pub fn resolve_branch(start: &Path) -> Option<String> {
    let mut dir = start.to_path_buf();
    loop {
        let head = dir.join(".git").join("HEAD");
        if head.is_file() {
            let content = std::fs::read_to_string(&head).ok()?;
            return content
                .trim()
                .strip_prefix("ref: refs/heads/")
                .map(|branch| branch.to_string());
        }
        if !dir.pop() {
            return None;
        }
    }
}
