//! Symbol lookup by name (§4.11): `substring | prefix | wildcard | regex |
//! fuzzy | auto` matching modes over a flat list of candidate symbols.
//!
//! Grounded in the corpus's fuzzy-finder / quick-open matchers (subsequence
//! scoring over a candidate list, auto-detecting glob vs. plain-text intent)
//! — reimplemented here against the exact ranking tiers the spec mandates.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Substring,
    Prefix,
    Wildcard,
    Regex,
    Fuzzy,
    Auto,
}

impl SearchMode {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "substring" => SearchMode::Substring,
            "prefix" => SearchMode::Prefix,
            "wildcard" => SearchMode::Wildcard,
            "regex" => SearchMode::Regex,
            "fuzzy" => SearchMode::Fuzzy,
            "auto" => SearchMode::Auto,
            _ => return None,
        })
    }

    /// §4.11 auto-detection: `*`/`?` ⇒ wildcard; leading `^` or trailing `$`
    /// ⇒ regex; else substring.
    pub fn detect(query: &str) -> Self {
        if query.contains('*') || query.contains('?') {
            SearchMode::Wildcard
        } else if query.starts_with('^') || query.ends_with('$') {
            SearchMode::Regex
        } else {
            SearchMode::Substring
        }
    }
}

/// A candidate row a symbol query is matched against.
pub trait SearchCandidate {
    fn symbol_name(&self) -> &str;
    fn file_path(&self) -> &str;
    fn start_line(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Exact = 0,
    Prefix = 1,
    Other = 2,
}

/// Translates a glob-style wildcard pattern (`*`, `?`) into an anchored regex.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if "\\.+^$(){}[]|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

/// Subsequence "fuzzy" match: every character of `query` must appear in
/// `candidate` in order (not necessarily contiguous).
fn is_subsequence(query: &str, candidate: &str) -> bool {
    let mut chars = candidate.chars();
    query.chars().all(|qc| {
        chars.any(|cc| cc.to_ascii_lowercase() == qc.to_ascii_lowercase())
    })
}

/// Runs a symbol-name query across `candidates`, returning matches ranked
/// `exact > prefix > substring/other`, stable on `(symbol, file, start_line)`.
pub fn search_symbols<'a, T: SearchCandidate>(
    candidates: &'a [T],
    query: &str,
    mode: SearchMode,
) -> Vec<&'a T> {
    let effective_mode = if mode == SearchMode::Auto { SearchMode::detect(query) } else { mode };
    let query_lower = query.to_lowercase();

    let regex: Option<Regex> = match effective_mode {
        SearchMode::Wildcard => Regex::new(&wildcard_to_regex(&query_lower)).ok(),
        SearchMode::Regex => Regex::new(query).ok(),
        _ => None,
    };

    let mut matched: Vec<(&'a T, MatchTier)> = candidates
        .iter()
        .filter_map(|c| {
            let name = c.symbol_name();
            let name_lower = name.to_lowercase();
            let is_match = match effective_mode {
                SearchMode::Substring => name_lower.contains(&query_lower),
                SearchMode::Prefix => name_lower.starts_with(&query_lower),
                SearchMode::Wildcard | SearchMode::Regex => {
                    regex.as_ref().map(|r| r.is_match(name)).unwrap_or(false)
                }
                SearchMode::Fuzzy => is_subsequence(&query_lower, name),
                SearchMode::Auto => unreachable!("resolved above"),
            };
            if !is_match {
                return None;
            }
            let tier = if name_lower == query_lower {
                MatchTier::Exact
            } else if name_lower.starts_with(&query_lower) {
                MatchTier::Prefix
            } else {
                MatchTier::Other
            };
            Some((c, tier))
        })
        .collect();

    matched.sort_by(|(a, a_tier), (b, b_tier)| {
        a_tier
            .cmp(b_tier)
            .then_with(|| a.symbol_name().cmp(b.symbol_name()))
            .then_with(|| a.file_path().cmp(b.file_path()))
            .then_with(|| a.start_line().cmp(&b.start_line()))
    });

    matched.into_iter().map(|(c, _)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        name: &'static str,
        file: &'static str,
        line: u32,
    }

    impl SearchCandidate for Row {
        fn symbol_name(&self) -> &str {
            self.name
        }
        fn file_path(&self) -> &str {
            self.file
        }
        fn start_line(&self) -> u32 {
            self.line
        }
    }

    fn fixture() -> Vec<Row> {
        vec![
            Row { name: "getUser", file: "a.ts", line: 1 },
            Row { name: "getUserById", file: "b.ts", line: 10 },
            Row { name: "setUser", file: "c.ts", line: 5 },
        ]
    }

    #[test]
    fn exact_match_ranks_first() {
        let rows = fixture();
        let results = search_symbols(&rows, "getUser", SearchMode::Substring);
        assert_eq!(results[0].name, "getUser");
    }

    #[test]
    fn prefix_mode_only_matches_prefix() {
        let rows = fixture();
        let results = search_symbols(&rows, "get", SearchMode::Prefix);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn wildcard_auto_detected() {
        assert_eq!(SearchMode::detect("get*"), SearchMode::Wildcard);
        assert_eq!(SearchMode::detect("^get"), SearchMode::Regex);
        assert_eq!(SearchMode::detect("getUser"), SearchMode::Substring);
    }

    #[test]
    fn wildcard_star_matches_suffix_variants() {
        let rows = fixture();
        let results = search_symbols(&rows, "getUser*", SearchMode::Wildcard);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn fuzzy_matches_subsequence() {
        let rows = fixture();
        let results = search_symbols(&rows, "gtUsr", SearchMode::Fuzzy);
        assert!(results.iter().any(|r| r.name == "getUser"));
    }

    #[test]
    fn regex_mode_anchors_as_given() {
        let rows = fixture();
        let results = search_symbols(&rows, "^set", SearchMode::Regex);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "setUser");
    }

    #[test]
    fn stable_ordering_on_ties() {
        let rows = vec![
            Row { name: "dup", file: "b.rs", line: 1 },
            Row { name: "dup", file: "a.rs", line: 1 },
        ];
        let results = search_symbols(&rows, "dup", SearchMode::Substring);
        assert_eq!(results[0].file, "a.rs");
    }
}
