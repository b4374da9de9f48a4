//! Per-dimension trigger matchers.
//!
//! Each dimension reports how many of its declared triggers matched out of
//! how many were declared. Matching is case-insensitive throughout.
//! Keywords only count on whole words; intent words count anywhere in the
//! text, so `adding` signals `add`.

use regex::{Regex, RegexBuilder};

use super::rules::{CompiledRule, Weights};
use super::ActivationInput;

/// Fixed intent vocabulary. A label not listed here matches itself.
const INTENT_VOCABULARY: &[(&str, &[&str])] = &[
    (
        "create",
        &["create", "new", "add", "make", "build", "generate", "scaffold", "init", "setup"],
    ),
    (
        "debug",
        &["debug", "fix", "bug", "error", "broken", "failing", "fails", "crash", "issue", "traceback"],
    ),
    (
        "test",
        &["test", "tests", "testing", "coverage", "assert", "unittest", "tdd"],
    ),
    (
        "refactor",
        &["refactor", "restructure", "cleanup", "simplify", "rename", "extract", "reorganize"],
    ),
    (
        "review",
        &["review", "audit", "inspect", "critique", "feedback"],
    ),
    (
        "deploy",
        &["deploy", "release", "ship", "publish", "rollout", "production"],
    ),
    (
        "document",
        &["document", "docs", "documentation", "readme", "docstring", "comment"],
    ),
    (
        "explain",
        &["explain", "understand", "describe", "walkthrough", "clarify"],
    ),
    (
        "optimize",
        &["optimize", "performance", "faster", "slow", "latency", "speed", "profile"],
    ),
    (
        "security",
        &["security", "secure", "vulnerability", "cve", "secret", "credential", "exploit"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Keyword,
    Pattern,
    Directory,
    Intent,
    FilePath,
    Content,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Keyword,
        Dimension::Pattern,
        Dimension::Directory,
        Dimension::Intent,
        Dimension::FilePath,
        Dimension::Content,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Keyword => "keyword",
            Dimension::Pattern => "pattern",
            Dimension::Directory => "directory",
            Dimension::Intent => "intent",
            Dimension::FilePath => "file_path",
            Dimension::Content => "content",
        }
    }

    pub fn weight(self, w: &Weights) -> f64 {
        match self {
            Dimension::Keyword => w.keyword,
            Dimension::Pattern => w.pattern,
            Dimension::Directory => w.directory,
            Dimension::Intent => w.intent,
            Dimension::FilePath => w.file_path,
            Dimension::Content => w.content,
        }
    }
}

/// Outcome of one dimension for one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionHit {
    pub dimension: Dimension,
    pub matched: usize,
    pub total: usize,
}

/// Whole-word, case-insensitive keyword.
#[derive(Debug)]
pub struct KeywordMatcher {
    pub word: String,
    regex: Regex,
}

impl KeywordMatcher {
    pub fn new(word: &str) -> Option<Self> {
        let src = format!(r"(?:^|[^\w]){}(?:$|[^\w])", regex::escape(word));
        match RegexBuilder::new(&src).case_insensitive(true).build() {
            Ok(regex) => Some(Self {
                word: word.to_string(),
                regex,
            }),
            Err(e) => {
                log::warn!("skipping keyword `{word}`: {e}");
                None
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// An intent label and the words that signal it.
#[derive(Debug)]
pub struct IntentMatcher {
    pub label: String,
    words: Vec<String>,
}

impl IntentMatcher {
    pub fn new(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        let words = INTENT_VOCABULARY
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, words)| words.iter().map(|w| w.to_string()).collect())
            .unwrap_or_else(|| vec![label.clone()]);
        Self { label, words }
    }

    /// True if any signalling word occurs in `lowered`, which must already
    /// be lowercase.
    pub fn is_match(&self, lowered: &str) -> bool {
        self.words.iter().any(|w| lowered.contains(w.as_str()))
    }
}

/// A file extension, matched against the operation's path and against
/// path-like words in the text.
#[derive(Debug)]
pub struct FileTypeMatcher {
    pub extension: String,
    regex: Regex,
}

impl FileTypeMatcher {
    /// Accepts `rs`, `.rs` or `*.rs`.
    pub fn new(raw: &str) -> Option<Self> {
        let extension = raw
            .trim()
            .trim_start_matches('*')
            .trim_start_matches('.')
            .to_lowercase();
        if extension.is_empty() {
            return None;
        }
        let src = format!(r"\w\.{}(?:$|[^\w])", regex::escape(&extension));
        let regex = RegexBuilder::new(&src).case_insensitive(true).build().ok()?;
        Some(Self { extension, regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Evaluate every dimension of `rule` against `input`. Dimensions without
/// declared triggers are omitted.
pub fn match_dimensions(rule: &CompiledRule, input: &ActivationInput<'_>) -> Vec<DimensionHit> {
    let text = input.text;
    let lowered = text.to_lowercase();
    let cwd = input.cwd.unwrap_or("");
    let file_path = input.file_path.unwrap_or("");

    Dimension::ALL
        .iter()
        .filter_map(|&dimension| {
            let (matched, total) = match dimension {
                Dimension::Keyword => (
                    rule.keywords.iter().filter(|k| k.is_match(text)).count(),
                    rule.keywords.len(),
                ),
                Dimension::Pattern => (
                    rule.patterns.iter().filter(|r| r.is_match(text)).count(),
                    rule.patterns.len(),
                ),
                Dimension::Directory => (
                    rule.directories
                        .iter()
                        .filter(|d| {
                            (!cwd.is_empty() && cwd.contains(d.as_str()))
                                || (!file_path.is_empty() && file_path.contains(d.as_str()))
                        })
                        .count(),
                    rule.directories.len(),
                ),
                Dimension::Intent => (
                    rule.intents.iter().filter(|i| i.is_match(&lowered)).count(),
                    rule.intents.len(),
                ),
                Dimension::FilePath => (
                    rule.file_types
                        .iter()
                        .filter(|f| f.is_match(file_path) || f.is_match(text))
                        .count(),
                    rule.file_types.len(),
                ),
                Dimension::Content => (
                    input
                        .content
                        .map(|c| rule.content_patterns.iter().filter(|r| r.is_match(c)).count())
                        .unwrap_or(0),
                    rule.content_patterns.len(),
                ),
            };
            (total > 0).then_some(DimensionHit {
                dimension,
                matched,
                total,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_whole_word_only() {
        let k = KeywordMatcher::new("skill").unwrap();
        assert!(k.is_match("create a new skill"));
        assert!(k.is_match("Skill: yes"));
        assert!(k.is_match("SKILL"));
        assert!(!k.is_match("skillful work"));
        assert!(!k.is_match("reskill"));
    }

    #[test]
    fn keyword_with_regex_metacharacters() {
        let k = KeywordMatcher::new("c++").unwrap();
        assert!(k.is_match("port this to c++ please"));
        assert!(!k.is_match("port this to c please"));
    }

    #[test]
    fn multi_word_keyword() {
        let k = KeywordMatcher::new("pull request").unwrap();
        assert!(k.is_match("open a Pull Request for this"));
        assert!(!k.is_match("pull the request"));
    }

    #[test]
    fn known_intent_uses_vocabulary() {
        let i = IntentMatcher::new("create");
        assert!(i.is_match("please scaffold the project"));
        assert!(i.is_match("add a new endpoint"));
        assert!(!i.is_match("delete the endpoint"));
    }

    #[test]
    fn intent_words_match_inside_longer_words() {
        let i = IntentMatcher::new("create");
        assert!(i.is_match("i am adding a skill"));
        assert!(i.is_match("initialize the repo"));
        let d = IntentMatcher::new("debug");
        assert!(d.is_match("the build keeps crashing"));
    }

    #[test]
    fn unknown_intent_matches_itself() {
        let i = IntentMatcher::new("Migrate");
        assert!(i.is_match("migrate the database"));
        assert!(i.is_match("we migrated last week"));
        assert!(!i.is_match("migration plan"));
    }

    #[test]
    fn intent_matched_case_insensitively_in_dimensions() {
        let rule = CompiledRule::compile(
            toml::from_str(
                r#"
                skill_id = "creator"
                [triggers]
                intents = ["create"]
                "#,
            )
            .unwrap(),
            Weights::default(),
        );
        let input = ActivationInput::prompt("ADDING a page", None);
        let hits = match_dimensions(&rule, &input);
        assert_eq!(
            hits,
            vec![DimensionHit {
                dimension: Dimension::Intent,
                matched: 1,
                total: 1
            }]
        );
    }

    #[test]
    fn file_type_accepts_glob_and_dot_forms() {
        for raw in ["rs", ".rs", "*.rs"] {
            let f = FileTypeMatcher::new(raw).unwrap();
            assert_eq!(f.extension, "rs");
            assert!(f.is_match("src/main.rs"));
            assert!(f.is_match("edit main.rs, then build"));
            assert!(!f.is_match("rust code"));
            assert!(!f.is_match("main.rst"));
        }
        assert!(FileTypeMatcher::new("*.").is_none());
    }
}
