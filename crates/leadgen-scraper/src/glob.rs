//! Path globs as used in crawl include/exclude lists (`**/team*`).

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled set of path globs.
#[derive(Debug, Clone)]
pub(crate) struct PathGlobs {
    patterns: Vec<Pattern>,
}

impl PathGlobs {
    /// Compiles `globs`. `**` spans segments, `*` and `?` stay within one.
    /// A match also covers everything below the matched segment. Globs that
    /// do not parse are dropped.
    pub(crate) fn new(globs: &[String]) -> Self {
        let patterns = globs
            .iter()
            .map(|glob| glob.trim().trim_matches('/'))
            .filter(|glob| !glob.is_empty())
            .flat_map(|glob| {
                let subtree = (!glob.ends_with("**")).then(|| format!("{glob}/**"));
                std::iter::once(glob.to_string()).chain(subtree)
            })
            .filter_map(|glob| match Pattern::new(&glob) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(glob = %glob, error = %e, "ignoring invalid path glob");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub(crate) fn matches(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globs(patterns: &[&str]) -> PathGlobs {
        PathGlobs::new(&patterns.iter().map(|p| (*p).to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn double_star_matches_any_depth() {
        let g = globs(&["**/team*"]);
        assert!(g.matches("/team"));
        assert!(g.matches("/about/team-members"));
        assert!(g.matches("/team/leadership"));
        assert!(!g.matches("/steam"));
        assert!(!g.matches("/products"));
    }

    #[test]
    fn exclude_patterns_match_subpages() {
        let g = globs(&["**/blog*", "**/career*"]);
        assert!(g.matches("/blog/2024/launch"));
        assert!(g.matches("/careers"));
        assert!(!g.matches("/contact"));
    }

    #[test]
    fn literal_characters_are_escaped() {
        let g = globs(&["/about.html"]);
        assert!(g.matches("/about.html"));
        assert!(!g.matches("/aboutXhtml"));
    }

    #[test]
    fn trailing_double_star_is_not_doubled() {
        let g = globs(&["docs/**"]);
        assert!(g.matches("/docs/api/v1"));
        assert!(!g.matches("/blog/docs"));
    }

    #[test]
    fn invalid_glob_is_dropped() {
        let g = globs(&["[unclosed", "**/team*"]);
        assert!(g.matches("/team"));
        assert!(!g.matches("/[unclosed"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let g = globs(&[]);
        assert!(g.is_empty());
        assert!(!g.matches("/team"));
    }
}
