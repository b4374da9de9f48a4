//! Activation rule document (`activation.toml`) and its compiled form.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::{ACTIVATION_FILE, read_optional};
use crate::error::LoadError;

use super::matchers::{Dimension, FileTypeMatcher, IntentMatcher, KeywordMatcher};

// ── Document types ──

#[derive(Debug, Deserialize, Default)]
pub struct ActivationDocument {
    #[serde(default)]
    pub defaults: ScoringDefaults,
    #[serde(default)]
    pub exclusions: Exclusions,
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
}

/// Per-dimension weights.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Weights {
    pub keyword: f64,
    pub pattern: f64,
    pub directory: f64,
    pub intent: f64,
    #[serde(alias = "filePath")]
    pub file_path: f64,
    pub content: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            keyword: 2.0,
            pattern: 3.0,
            directory: 5.0,
            intent: 4.0,
            file_path: 4.0,
            content: 3.0,
        }
    }
}

/// Per-rule weight overrides; unset dimensions keep the global weight.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct WeightOverrides {
    pub keyword: Option<f64>,
    pub pattern: Option<f64>,
    pub directory: Option<f64>,
    pub intent: Option<f64>,
    #[serde(alias = "filePath")]
    pub file_path: Option<f64>,
    pub content: Option<f64>,
}

impl Weights {
    pub fn with_overrides(self, o: &WeightOverrides) -> Self {
        Self {
            keyword: o.keyword.unwrap_or(self.keyword),
            pattern: o.pattern.unwrap_or(self.pattern),
            directory: o.directory.unwrap_or(self.directory),
            intent: o.intent.unwrap_or(self.intent),
            file_path: o.file_path.unwrap_or(self.file_path),
            content: o.content.unwrap_or(self.content),
        }
    }

    /// First dimension whose weight is negative or not a number.
    pub fn invalid_dimension(&self) -> Option<Dimension> {
        Dimension::ALL
            .into_iter()
            .find(|d| !valid_weight(d.weight(self)))
    }

    /// Negative and non-finite weights replaced by zero.
    fn sanitized(self) -> Self {
        let fix = |w: f64| if valid_weight(w) { w } else { 0.0 };
        Self {
            keyword: fix(self.keyword),
            pattern: fix(self.pattern),
            directory: fix(self.directory),
            intent: fix(self.intent),
            file_path: fix(self.file_path),
            content: fix(self.content),
        }
    }
}

fn valid_weight(w: f64) -> bool {
    w.is_finite() && w >= 0.0
}

fn valid_threshold(t: f64) -> bool {
    (0.0..=100.0).contains(&t)
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScoringDefaults {
    pub weights: Weights,
    /// Minimum normalized score (0–100) a rule must reach.
    pub threshold: f64,
    #[serde(alias = "maxSuggestions")]
    pub max_suggestions: usize,
    #[serde(alias = "showScores")]
    pub show_scores: bool,
    /// Where `inject` rules read `<skill_id>/SKILL.md` from.
    #[serde(alias = "skillsDir")]
    pub skills_dir: String,
}

impl ScoringDefaults {
    /// Out-of-range values pulled back into range, with a warning: the
    /// threshold is clamped to 0–100 and bad weights become zero.
    fn validated(mut self) -> Self {
        if !valid_threshold(self.threshold) {
            let clamped = if self.threshold.is_nan() {
                Self::default().threshold
            } else {
                self.threshold.clamp(0.0, 100.0)
            };
            log::warn!(
                "activation threshold {} out of range; using {clamped}",
                self.threshold
            );
            self.threshold = clamped;
        }
        if let Some(d) = self.weights.invalid_dimension() {
            log::warn!(
                "activation weight `{}` must be a non-negative number; bad weights set to 0",
                d.as_str()
            );
            self.weights = self.weights.sanitized();
        }
        self
    }
}

impl Default for ScoringDefaults {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            threshold: 30.0,
            max_suggestions: 3,
            show_scores: false,
            skills_dir: "~/.claude/skills".to_string(),
        }
    }
}

/// Text that must never trigger activation (slash commands, greetings).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Exclusions {
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    #[default]
    Proactive,
    Reactive,
    Guard,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    #[default]
    Suggest,
    Inject,
    Require,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Triggers {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default, alias = "fileTypes")]
    pub file_types: Vec<String>,
    #[serde(default, alias = "contentPatterns")]
    pub content_patterns: Vec<String>,
}

impl Triggers {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
            && self.patterns.is_empty()
            && self.directories.is_empty()
            && self.intents.is_empty()
            && self.file_types.is_empty()
            && self.content_patterns.is_empty()
    }
}

fn default_priority() -> u8 {
    5
}

/// One activation rule as declared.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDecl {
    #[serde(alias = "skillId")]
    pub skill_id: String,
    #[serde(default, alias = "ruleType", alias = "type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub enforcement: Enforcement,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub triggers: Triggers,
    #[serde(default)]
    pub weights: WeightOverrides,
    pub threshold: Option<f64>,
    #[serde(default, alias = "cooldownSeconds")]
    pub cooldown_seconds: u64,
    #[serde(alias = "suggestionText")]
    pub suggestion_text: Option<String>,
}

// ── Compiled forms ──

/// An activation rule with every matcher built.
#[derive(Debug)]
pub struct CompiledRule {
    pub skill_id: String,
    pub rule_type: RuleType,
    pub enforcement: Enforcement,
    pub priority: u8,
    /// Global weights with this rule's overrides applied.
    pub weights: Weights,
    pub threshold: Option<f64>,
    pub cooldown_seconds: u64,
    pub suggestion_text: Option<String>,
    pub keywords: Vec<KeywordMatcher>,
    pub patterns: Vec<Regex>,
    pub directories: Vec<String>,
    pub intents: Vec<IntentMatcher>,
    pub file_types: Vec<FileTypeMatcher>,
    pub content_patterns: Vec<Regex>,
}

impl CompiledRule {
    /// Build matchers for a declared rule. Invalid regexes are skipped with a
    /// warning and do not count towards the rule's declared triggers.
    pub fn compile(decl: RuleDecl, weights: Weights) -> Self {
        let id = decl.skill_id.clone();
        let t = decl.triggers;
        Self {
            keywords: dedup(t.keywords)
                .iter()
                .filter_map(|k| KeywordMatcher::new(k))
                .collect(),
            patterns: compile_regexes(&t.patterns, &id, "pattern"),
            directories: dedup(t.directories),
            intents: dedup(t.intents)
                .iter()
                .map(|i| IntentMatcher::new(i))
                .collect(),
            file_types: dedup(t.file_types)
                .iter()
                .filter_map(|f| FileTypeMatcher::new(f))
                .collect(),
            content_patterns: compile_regexes(&t.content_patterns, &id, "content pattern"),
            weights: weights.with_overrides(&decl.weights),
            skill_id: decl.skill_id,
            rule_type: decl.rule_type,
            enforcement: decl.enforcement,
            priority: decl.priority,
            threshold: decl.threshold,
            cooldown_seconds: decl.cooldown_seconds,
            suggestion_text: decl.suggestion_text,
        }
    }
}

/// Drop blanks and case-insensitive duplicates, keeping first spelling.
fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let trimmed = item.trim();
        let key = trimmed.to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_string());
    }
    out
}

fn compile_regexes(patterns: &[String], skill_id: &str, kind: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| {
            match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(r) => Some(r),
                Err(e) => {
                    log::warn!("{skill_id}: skipping invalid {kind} `{p}`: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Compiled exclusion set.
#[derive(Debug, Default)]
pub struct CompiledExclusions {
    prefixes: Vec<String>,
    patterns: Vec<Regex>,
}

impl CompiledExclusions {
    pub fn compile(exclusions: &Exclusions) -> Self {
        Self {
            prefixes: exclusions
                .prefixes
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            patterns: compile_regexes(&exclusions.patterns, "exclusions", "pattern"),
        }
    }

    /// True if `text` must not be scored at all.
    pub fn excludes(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        self.prefixes.iter().any(|p| lowered.starts_with(p.as_str()))
            || self.patterns.iter().any(|r| r.is_match(text))
    }
}

/// Everything the scorer needs: validated rules, defaults and exclusions.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub defaults: ScoringDefaults,
    pub exclusions: CompiledExclusions,
    pub rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Validate and compile a parsed document.
    ///
    /// Out-of-range defaults are clamped. Rules without a skill id, with a
    /// priority outside 1–10, a threshold outside 0–100, a negative weight,
    /// or no trigger at all are dropped with a warning.
    pub fn compile(doc: ActivationDocument) -> Self {
        let defaults = doc.defaults.validated();
        let weights = defaults.weights;
        let rules = doc
            .rules
            .into_iter()
            .filter(|r| {
                let problem = if r.skill_id.trim().is_empty() {
                    Some("missing skill_id")
                } else if !(1..=10).contains(&r.priority) {
                    Some("priority must be between 1 and 10")
                } else if r.threshold.is_some_and(|t| !valid_threshold(t)) {
                    Some("threshold must be between 0 and 100")
                } else if weights.with_overrides(&r.weights).invalid_dimension().is_some() {
                    Some("weights must be non-negative numbers")
                } else if r.triggers.is_empty() {
                    Some("no triggers declared")
                } else {
                    None
                };
                if let Some(problem) = problem {
                    log::warn!("dropping activation rule `{}`: {problem}", r.skill_id);
                }
                problem.is_none()
            })
            .map(|r| CompiledRule::compile(r, weights))
            .collect();

        Self {
            exclusions: CompiledExclusions::compile(&doc.exclusions),
            defaults,
            rules,
        }
    }

    /// Parse and compile a TOML document.
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, LoadError> {
        let doc: ActivationDocument = toml::from_str(content).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::compile(doc))
    }

    /// Load `<dir>/activation.toml`. A missing file is an empty rule set.
    pub fn load_from(dir: &Path) -> Result<Self, LoadError> {
        let path = dir.join(ACTIVATION_FILE);
        match read_optional(&path)? {
            Some(content) => Self::from_toml(&path, &content),
            None => Ok(Self::default()),
        }
    }
}
