//! Path matching and filesystem-location helpers for trigger evaluation.
//!
//! Glob patterns are compiled once at rule-set load time via `CompiledMatcher`.
//! Escape detection is purely lexical — the daemon never touches the
//! filesystem on the decision path.

use globset::{Glob, GlobMatcher};
use std::path::{Component, Path, PathBuf};

/// A pre-compiled set of glob patterns for fast matching.
/// Created once when a rule set is loaded, reused for every decision.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    patterns: Vec<GlobMatcher>,
}

impl CompiledMatcher {
    /// Compile a list of glob pattern strings into matchers.
    /// Returns an error if any pattern is malformed.
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Ok(Glob::new(p)?.compile_matcher()))
            .collect::<Result<Vec<_>, globset::Error>>()?;
        Ok(Self { patterns: compiled })
    }

    /// Returns true if the given path matches any of the compiled patterns.
    pub fn matches(&self, path: &str) -> bool {
        let path = Path::new(path);
        self.patterns.iter().any(|matcher| matcher.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Extract the argument tokens that could name a filesystem path.
/// Flags (`-f`, `--force`) are skipped; everything else is a candidate.
pub fn path_tokens(arguments: &str) -> Vec<&str> {
    arguments
        .split_whitespace()
        .filter(|tok| !tok.starts_with('-'))
        .collect()
}

/// Lexically resolve `token` against `cwd` and report whether the result
/// lands outside `cwd`. `..` components are collapsed without consulting
/// the filesystem, so symlinks are not followed.
pub fn escapes_root(token: &str, cwd: &str) -> bool {
    let root = normalize(Path::new(cwd));
    let candidate = if Path::new(token).is_absolute() {
        normalize(Path::new(token))
    } else {
        normalize(&Path::new(cwd).join(token))
    };
    !candidate.starts_with(&root)
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Runtime directory holding the daemon's sockets: `$CMDGATE_DIR` if set,
/// otherwise `~/.cmdgate`.
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CMDGATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cmdgate")
}

/// Path of the front-end (decision) socket under a runtime directory.
pub fn decision_socket(dir: &Path) -> PathBuf {
    dir.join("decision.sock")
}

/// Path of the monitor socket under a runtime directory.
pub fn monitor_socket(dir: &Path) -> PathBuf {
    dir.join("monitor.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_matcher_secrets() {
        let matcher = CompiledMatcher::new(&[
            "*.env".to_string(),
            ".ssh/*".to_string(),
            "*.pem".to_string(),
        ])
        .unwrap();

        assert!(matcher.matches(".env"));
        assert!(matcher.matches("production.env"));
        assert!(matcher.matches(".ssh/id_rsa"));
        assert!(matcher.matches("server.pem"));
        assert!(!matcher.matches("src/main.rs"));
    }

    #[test]
    fn test_path_tokens_skip_flags() {
        assert_eq!(
            path_tokens("-rf /etc/passwd --verbose notes.txt"),
            vec!["/etc/passwd", "notes.txt"]
        );
    }

    #[test]
    fn test_escapes_root_relative() {
        assert!(!escapes_root("src/main.rs", "/home/dev/project"));
        assert!(!escapes_root("./build", "/home/dev/project"));
        assert!(escapes_root("../other", "/home/dev/project"));
        assert!(escapes_root("../../etc/passwd", "/home/dev/project"));
    }

    #[test]
    fn test_escapes_root_absolute() {
        assert!(escapes_root("/etc/passwd", "/home/dev/project"));
        assert!(!escapes_root("/home/dev/project/src", "/home/dev/project"));
    }
}
