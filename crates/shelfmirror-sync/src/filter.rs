//! Name filter for libraries and folders
//!
//! A library title or folder name is in scope when it contains the
//! configured token (default `_`). The check is applied to each name in
//! isolation: a folder that fails the filter prunes its entire subtree,
//! even if descendants would have matched. Files are never filtered by
//! name, and an explicitly configured start path bypasses the filter.

/// Substring-based scope filter over library titles and folder names
#[derive(Debug, Clone)]
pub struct NameFilter {
    token: String,
}

impl NameFilter {
    /// Creates a filter matching names that contain `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Whether `name` is in scope
    pub fn matches(&self, name: &str) -> bool {
        name.contains(&self.token)
    }

    /// The configured token
    pub fn token(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_names_containing_token() {
        let filter = NameFilter::new("_");
        assert!(filter.matches("Proj_A"));
        assert!(filter.matches("_leading"));
        assert!(filter.matches("trailing_"));
        assert!(filter.matches("a_b_c"));
    }

    #[test]
    fn test_rejects_names_without_token() {
        let filter = NameFilter::new("_");
        assert!(!filter.matches("Temp"));
        assert!(!filter.matches("Documents"));
        assert!(!filter.matches(""));
    }

    #[test]
    fn test_token_is_configurable() {
        let filter = NameFilter::new("-rpt");
        assert!(filter.matches("sales-rpt-2024"));
        assert!(!filter.matches("sales_2024"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let filter = NameFilter::new("Lib");
        assert!(filter.matches("Library"));
        assert!(!filter.matches("library"));
    }
}
