//! Path prefix matching.
//!
//! # Design Decisions
//! - Matching happens on whole path segments: `/api` matches `/api` and
//!   `/api/users` but not `/apiary`
//! - ASCII case-insensitive, so `/API/Users` reaches the `/api/users` mount
//! - A prefix of `/` matches every path
//! - No regex to guarantee O(n) matching

/// A mount point or scope expressed as a path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefix {
    /// Normalized: no trailing slash, empty for the root prefix.
    prefix: String,
}

impl PathPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The normalized prefix (`""` for the root).
    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// Return the remainder of `path` after the prefix, starting with `/` or
    /// empty when the path equals the prefix.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let n = self.prefix.len();
        let head = path.as_bytes().get(..n)?;
        if !head.eq_ignore_ascii_case(self.prefix.as_bytes()) {
            return None;
        }
        let rest = path.get(n..)?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix_segments() {
        let prefix = PathPrefix::new("/api");

        assert!(prefix.matches("/api"));
        assert!(prefix.matches("/api/"));
        assert!(prefix.matches("/api/users/42"));
        assert!(!prefix.matches("/apiary"));
        assert!(!prefix.matches("/ap"));
        assert!(!prefix.matches("/images/logo.png"));
    }

    #[test]
    fn test_path_prefix_case_insensitive() {
        let prefix = PathPrefix::new("/api/genAI");
        assert_eq!(prefix.strip("/api/genai/chat"), Some("/chat"));
        assert_eq!(prefix.strip("/API/GENAI"), Some(""));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let prefix = PathPrefix::new("/api/users/");
        assert_eq!(prefix.as_str(), "/api/users");
        assert_eq!(prefix.strip("/api/users/me"), Some("/me"));
    }

    #[test]
    fn test_root_matches_everything() {
        let prefix = PathPrefix::new("/");
        assert_eq!(prefix.strip("/index.html"), Some("/index.html"));
        assert_eq!(prefix.strip("/"), Some("/"));
    }

    #[test]
    fn test_non_ascii_path_does_not_panic() {
        let prefix = PathPrefix::new("/api");
        assert!(!prefix.matches("/a\u{e9}"));
        assert!(!prefix.matches("/\u{1F600}pi"));
    }
}
