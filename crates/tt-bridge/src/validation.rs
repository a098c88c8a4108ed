//! Project-relative path checks and the scroll-to-line deep link.
//!
//! Every user-supplied path is joined onto the project root and normalised
//! lexically before touching the filesystem. Anything that escapes the root
//! is reported as nonexistent, whether or not it is really there.

use std::path::{Component, Path, PathBuf};

use tracing::{error, warn};

use tt_api_types::{Mention, MentionKind, MentionValidation, PathValidation, ScrollToLineResponse};

/// Resolve `.` and `..` without consulting the filesystem. A `..` at the
/// root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `relative` onto `base` and return the result only when it stays
/// inside `base`. A relative base is anchored at the working directory
/// first. Leading separators on `relative` are stripped, so `/src/x.rs`
/// names `<base>/src/x.rs`.
pub fn contained_path(base: &Path, relative: &str) -> Option<PathBuf> {
    if base.as_os_str().is_empty() {
        return None;
    }
    let base = normalize_lexically(&std::path::absolute(base).ok()?);
    let relative = relative.trim_start_matches(['/', '\\']);
    let full = normalize_lexically(&base.join(relative));
    full.starts_with(&base).then_some(full)
}

pub async fn validate_path(relative_path: &str, project_path: &str) -> PathValidation {
    let Some(full) = contained_path(Path::new(project_path), relative_path) else {
        warn!(relative_path, "validate path blocked traversal attempt");
        return PathValidation::default();
    };
    match tokio::fs::metadata(&full).await {
        Ok(meta) => PathValidation {
            exists: true,
            is_directory: Some(meta.is_dir()),
        },
        Err(_) => PathValidation::default(),
    }
}

/// Check each mention independently. Keys are `@<value>`.
pub async fn validate_mentions(mentions: &[Mention], project_path: &str) -> MentionValidation {
    let base = Path::new(project_path);
    let mut out = MentionValidation::new();
    for mention in mentions {
        let exists = match mention.kind {
            MentionKind::Path => match contained_path(base, &mention.value) {
                Some(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
                None => {
                    warn!(value = %mention.value, "mention blocked traversal attempt");
                    false
                }
            },
        };
        out.insert(mention.key(), exists);
    }
    out
}

/// Acknowledge a scroll-to-line request. An empty session id or a negative
/// line number is rejected.
pub fn scroll_to_line(session_id: &str, line_number: i64) -> ScrollToLineResponse {
    if session_id.is_empty() {
        error!("scroll-to-line called with empty session id");
        return ScrollToLineResponse::default();
    }
    if line_number < 0 {
        error!(session_id, line_number, "scroll-to-line called with invalid line number");
        return ScrollToLineResponse {
            success: false,
            session_id: session_id.to_string(),
            line_number: 0,
        };
    }
    ScrollToLineResponse {
        success: true,
        session_id: session_id.to_string(),
        line_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_dots() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_lexically(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn containment() {
        let base = Path::new("/srv/project");
        assert_eq!(
            contained_path(base, "src/main.rs"),
            Some(PathBuf::from("/srv/project/src/main.rs"))
        );
        assert_eq!(contained_path(base, "."), Some(PathBuf::from("/srv/project")));
        assert_eq!(contained_path(base, "../../etc/passwd"), None);
        assert_eq!(contained_path(base, "src/../../project2/x"), None);
        assert_eq!(
            contained_path(base, "/etc/passwd"),
            Some(PathBuf::from("/srv/project/etc/passwd"))
        );
        assert_eq!(contained_path(base, "/src/../../etc/passwd"), None);
        // Sibling directory sharing a name prefix.
        assert_eq!(contained_path(base, "../project-evil/a"), None);
        assert_eq!(contained_path(Path::new(""), "a"), None);
    }

    #[test]
    fn relative_base_is_anchored_at_cwd() {
        let cwd = std::env::current_dir().unwrap();
        for base in [".", "x/..", "./"] {
            assert_eq!(contained_path(Path::new(base), "../../etc/passwd"), None);
            assert_eq!(
                contained_path(Path::new(base), "src/lib.rs"),
                Some(cwd.join("src/lib.rs"))
            );
        }
    }

    #[test]
    fn scroll_to_line_rules() {
        assert_eq!(
            scroll_to_line("s1", 42),
            ScrollToLineResponse {
                success: true,
                session_id: "s1".into(),
                line_number: 42
            }
        );
        assert_eq!(scroll_to_line("", 42), ScrollToLineResponse::default());
        let neg = scroll_to_line("s1", -3);
        assert!(!neg.success);
        assert_eq!(neg.session_id, "s1");
        assert_eq!(neg.line_number, 0);
    }
}
