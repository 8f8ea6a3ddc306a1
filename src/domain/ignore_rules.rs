//! Ignore pipeline (§4.6, §6): `.aiignore` (always excludes) > `.git-ai/
//! include.txt` (exclude override) > `.gitignore` (standard exclude).
//!
//! `indexed(p) ⇔ ¬aiignore(p) ∧ (include(p) ∨ ¬gitignore(p))` (§8 universal
//! invariant). Each of the three files is gitignore-glob syntax, matched
//! with the same `ignore::gitignore::Gitignore` matcher the teacher's own
//! `ignore::WalkBuilder`-based enumeration (`index_repository.rs`'s
//! `enumerate_files`) delegates gitignore matching to — rather than a
//! hand-rolled glob-to-regex translator, since the three-file precedence
//! this spec adds on top is composed in `IgnorePipeline::is_indexed`, not in
//! the glob matching itself.

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// One parsed ignore/include file, matched via the `ignore` crate's own
/// gitignore glob engine (`#` comments and blank lines are skipped before
/// handing lines to it; `!` negation is supported for free).
#[derive(Debug, Clone)]
pub struct PatternSet {
    matcher: Gitignore,
    len: usize,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self { matcher: Gitignore::empty(), len: 0 }
    }
}

impl PatternSet {
    pub fn parse(contents: &str) -> Self {
        let mut builder = GitignoreBuilder::new("");
        let mut len = 0;
        for raw_line in contents.lines() {
            let line = raw_line.trim_end();
            if line.is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            if builder.add_line(None, line).is_ok() {
                len += 1;
            }
        }
        let matcher = builder.build().unwrap_or_else(|_| Gitignore::empty());
        Self { matcher, len }
    }

    pub fn matches(&self, posix_rel_path: &str) -> bool {
        self.matcher.matched_path_or_any_parents(posix_rel_path, false).is_ignore()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The three-file ignore pipeline (§6): `.aiignore`, `.gitignore`, and
/// `.git-ai/include.txt`.
#[derive(Debug, Clone, Default)]
pub struct IgnorePipeline {
    aiignore: PatternSet,
    gitignore: PatternSet,
    include: PatternSet,
}

impl IgnorePipeline {
    pub fn new(aiignore: &str, gitignore: &str, include: &str) -> Self {
        Self {
            aiignore: PatternSet::parse(aiignore),
            gitignore: PatternSet::parse(gitignore),
            include: PatternSet::parse(include),
        }
    }

    /// `indexed(p) ⇔ ¬matches(.aiignore, p) ∧ (matches(include, p) ∨ ¬matches(.gitignore, p))`.
    pub fn is_indexed(&self, posix_rel_path: &str) -> bool {
        if self.aiignore.matches(posix_rel_path) {
            return false;
        }
        if self.include.matches(posix_rel_path) {
            return true;
        }
        !self.gitignore.matches(posix_rel_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aiignore_always_wins() {
        let pipeline = IgnorePipeline::new("secret.txt\n", "", "secret.txt\n");
        assert!(!pipeline.is_indexed("secret.txt"));
    }

    #[test]
    fn include_overrides_gitignore() {
        let pipeline = IgnorePipeline::new("", "dist/\n", "dist/keep.js\n");
        assert!(pipeline.is_indexed("dist/keep.js"));
        assert!(!pipeline.is_indexed("dist/other.js"));
    }

    #[test]
    fn plain_gitignore_excludes() {
        let pipeline = IgnorePipeline::new("", "*.log\n", "");
        assert!(!pipeline.is_indexed("app.log"));
        assert!(pipeline.is_indexed("app.rs"));
    }

    #[test]
    fn anchored_pattern_only_matches_root() {
        let pipeline = IgnorePipeline::new("", "/build\n", "");
        assert!(!pipeline.is_indexed("build/out.js"));
        assert!(pipeline.is_indexed("src/build/out.js"));
    }

    #[test]
    fn unanchored_pattern_matches_any_depth() {
        let pipeline = IgnorePipeline::new("", "node_modules\n", "");
        assert!(!pipeline.is_indexed("node_modules/foo.js"));
        assert!(!pipeline.is_indexed("packages/a/node_modules/foo.js"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let set = PatternSet::parse("# comment\n\n*.tmp\n");
        assert!(set.matches("a.tmp"));
        assert!(!set.matches("a.rs"));
    }

    #[test]
    fn directory_trailing_slash_expands_to_everything_beneath() {
        let set = PatternSet::parse("target/\n");
        assert!(set.matches("target/debug/app"));
    }

    #[test]
    fn negated_pattern_re_includes_a_file() {
        let set = PatternSet::parse("*.log\n!keep.log\n");
        assert!(set.matches("app.log"));
        assert!(!set.matches("keep.log"));
    }
}
