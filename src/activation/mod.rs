//! Activation scoring: decides which skills to surface for a prompt or
//! tool event.
//!
//! Every eligible rule is scored per dimension as
//! `(distinct triggers matched, triggers declared)`. The raw score is the
//! weighted sum of matches, normalized against the weighted sum of what was
//! declared, giving 0–100. Rules under their threshold are dropped; the rest
//! are ranked by `normalized × priority / 10`, capped, and only the emitted
//! ones are put on cooldown.
//!
//! Loading never fails loudly here: a missing or malformed rule document
//! just means nothing is activated.

pub mod cooldown;
pub mod matchers;
pub mod render;
pub mod rules;

use std::path::Path;

pub use cooldown::{CooldownStore, MemoryCooldowns};
pub use render::{SkillDirectory, SkillSource};
pub use rules::{CompiledRule, Enforcement, RuleSet, RuleType, ScoringDefaults};

use matchers::match_dimensions;

/// What kind of host event is being scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The user submitted a prompt.
    Prompt,
    /// A tool is about to run or has run.
    Tool,
}

impl RuleType {
    pub fn eligible_for(self, event: EventKind) -> bool {
        matches!(
            (self, event),
            (RuleType::Reactive, _)
                | (RuleType::Proactive, EventKind::Prompt)
                | (RuleType::Guard, EventKind::Tool)
        )
    }
}

/// The text and surroundings scored against the rules.
#[derive(Debug, Clone, Copy)]
pub struct ActivationInput<'a> {
    pub text: &'a str,
    pub event: EventKind,
    pub cwd: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub content: Option<&'a str>,
}

impl<'a> ActivationInput<'a> {
    pub fn prompt(text: &'a str, cwd: Option<&'a str>) -> Self {
        Self {
            text,
            event: EventKind::Prompt,
            cwd,
            file_path: None,
            content: None,
        }
    }
}

/// A rule that made it through scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub skill_id: String,
    pub enforcement: Enforcement,
    pub priority: u8,
    /// 0–100, before priority scaling.
    pub normalized: f64,
    /// Ranking score: `normalized × priority / 10`.
    pub score: f64,
    /// `dimension:matched/total` for every dimension that matched.
    pub evidence: Vec<String>,
    pub suggestion_text: Option<String>,
}

/// Score one rule, ignoring eligibility and cooldown.
///
/// Returns `None` if no dimension matched or the normalized score is under
/// the rule's effective threshold.
pub fn score_rule(
    rule: &CompiledRule,
    input: &ActivationInput<'_>,
    defaults: &ScoringDefaults,
) -> Option<ScoredMatch> {
    let hits = match_dimensions(rule, input);
    if hits.iter().all(|h| h.matched == 0) {
        return None;
    }

    let (raw, max) = hits.iter().fold((0.0, 0.0), |(raw, max), h| {
        let w = h.dimension.weight(&rule.weights);
        (raw + h.matched as f64 * w, max + h.total as f64 * w)
    });
    if max <= 0.0 {
        return None;
    }

    let normalized = 100.0 * raw / max;
    let threshold = rule.threshold.unwrap_or(defaults.threshold);
    if normalized < threshold {
        log::debug!(
            "{}: normalized {normalized:.1} under threshold {threshold}",
            rule.skill_id
        );
        return None;
    }

    Some(ScoredMatch {
        skill_id: rule.skill_id.clone(),
        enforcement: rule.enforcement,
        priority: rule.priority,
        normalized,
        score: normalized * f64::from(rule.priority) / 10.0,
        evidence: hits
            .iter()
            .filter(|h| h.matched > 0)
            .map(|h| format!("{}:{}/{}", h.dimension.as_str(), h.matched, h.total))
            .collect(),
        suggestion_text: rule.suggestion_text.clone(),
    })
}

/// Rank the rules in `set` against `input`.
///
/// `now` is seconds since the Unix epoch. Emitted skills are marked as
/// fired in `cooldowns`; skills that scored but were cut by the cap are not.
pub fn score(
    input: &ActivationInput<'_>,
    set: &RuleSet,
    cooldowns: &mut dyn CooldownStore,
    now: u64,
) -> Vec<ScoredMatch> {
    if set.exclusions.excludes(input.text) {
        log::debug!("activation skipped: text matches an exclusion");
        return Vec::new();
    }

    let mut ranked: Vec<ScoredMatch> = set
        .rules
        .iter()
        .filter(|r| r.rule_type.eligible_for(input.event))
        .filter(|r| !cooldown::cooling_down(&*cooldowns, &r.skill_id, r.cooldown_seconds, now))
        .filter_map(|r| score_rule(r, input, &set.defaults))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    ranked.truncate(set.defaults.max_suggestions);

    for m in &ranked {
        cooldowns.mark_fired(&m.skill_id, now);
    }
    ranked
}

/// Loaded activation rules plus the skill source used for `inject`.
pub struct ActivationEngine {
    rules: RuleSet,
    skills: Box<dyn SkillSource>,
}

impl ActivationEngine {
    pub fn new(rules: RuleSet, skills: Box<dyn SkillSource>) -> Self {
        Self { rules, skills }
    }

    /// Load `activation.toml` from `dir`. Any failure yields an engine with
    /// no rules.
    pub fn load(dir: &Path) -> Self {
        let rules = match RuleSet::load_from(dir) {
            Ok(rules) => rules,
            Err(e) => {
                log::warn!("activation disabled: {e}");
                RuleSet::default()
            }
        };
        let skills = SkillDirectory::from_setting(&rules.defaults.skills_dir);
        Self::new(rules, Box::new(skills))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Score and render. Returns the matches and the context block, if any.
    pub fn activate(
        &self,
        input: &ActivationInput<'_>,
        cooldowns: &mut dyn CooldownStore,
        now: u64,
    ) -> (Vec<ScoredMatch>, Option<String>) {
        let matches = score(input, &self.rules, cooldowns, now);
        let block = render::render(&matches, self.rules.defaults.show_scores, self.skills.as_ref());
        (matches, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn set(src: &str) -> RuleSet {
        RuleSet::from_toml(Path::new("activation.toml"), src).unwrap()
    }

    const SKILL_RULES: &str = r#"
        [[rules]]
        skill_id = "skill-creator"
        [rules.triggers]
        keywords = ["skill"]
        intents = ["create"]
    "#;

    #[test]
    fn keyword_and_intent_full_match() {
        let rules = set(SKILL_RULES);
        let input = ActivationInput::prompt("create a new skill for my project", None);
        let out = score(&input, &rules, &mut MemoryCooldowns::new(), 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].skill_id, "skill-creator");
        assert_eq!(out[0].normalized, 100.0);
        assert_eq!(out[0].score, 50.0);
        assert_eq!(out[0].evidence, vec!["keyword:1/1", "intent:1/1"]);
    }

    #[test]
    fn inflected_intent_word_counts() {
        let rules = set(SKILL_RULES);
        let input = ActivationInput::prompt("I am adding a skill", None);
        let m = score_rule(&rules.rules[0], &input, &rules.defaults).unwrap();
        assert_eq!(m.normalized, 100.0);
        assert_eq!(m.evidence, vec!["keyword:1/1", "intent:1/1"]);
    }

    #[test]
    fn partial_match_weighted() {
        // keyword (2) matched, intent (4) not: 2 / 6.
        let rules = set(SKILL_RULES);
        let input = ActivationInput::prompt("what is a skill", None);
        let m = score_rule(&rules.rules[0], &input, &rules.defaults).unwrap();
        assert!((m.normalized - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_excluded() {
        let rules = set(
            r#"
            [defaults]
            threshold = 50
            [[rules]]
            skill_id = "skill-creator"
            [rules.triggers]
            keywords = ["skill"]
            intents = ["create"]
        "#,
        );
        let input = ActivationInput::prompt("what is a skill", None);
        assert!(score(&input, &rules, &mut MemoryCooldowns::new(), 0).is_empty());
    }

    #[test]
    fn rule_threshold_overrides_global() {
        let rules = set(
            r#"
            [defaults]
            threshold = 90
            [[rules]]
            skill_id = "lenient"
            threshold = 10
            [rules.triggers]
            keywords = ["skill"]
            intents = ["create"]
        "#,
        );
        let input = ActivationInput::prompt("what is a skill", None);
        assert_eq!(score(&input, &rules, &mut MemoryCooldowns::new(), 0).len(), 1);
    }

    #[test]
    fn rule_without_triggers_never_scores() {
        let rule = CompiledRule::compile(
            rules::RuleDecl {
                skill_id: "empty".into(),
                rule_type: RuleType::Proactive,
                enforcement: Enforcement::Suggest,
                priority: 10,
                triggers: rules::Triggers::default(),
                weights: rules::WeightOverrides::default(),
                threshold: Some(0.0),
                cooldown_seconds: 0,
                suggestion_text: None,
            },
            rules::Weights::default(),
        );
        let input = ActivationInput::prompt("anything at all", Some("/tmp"));
        assert!(score_rule(&rule, &input, &ScoringDefaults::default()).is_none());
    }

    #[test]
    fn zero_weights_never_score() {
        let rules = set(
            r#"
            [[rules]]
            skill_id = "weightless"
            threshold = 0
            [rules.triggers]
            keywords = ["skill"]
            [rules.weights]
            keyword = 0
        "#,
        );
        let input = ActivationInput::prompt("skill", None);
        assert!(score(&input, &rules, &mut MemoryCooldowns::new(), 0).is_empty());
    }

    #[test]
    fn priority_breaks_ties() {
        let rules = set(
            r#"
            [[rules]]
            skill_id = "low"
            priority = 3
            [rules.triggers]
            keywords = ["deploy"]

            [[rules]]
            skill_id = "high"
            priority = 9
            [rules.triggers]
            keywords = ["deploy"]
        "#,
        );
        let input = ActivationInput::prompt("deploy it", None);
        let out = score(&input, &rules, &mut MemoryCooldowns::new(), 0);
        let ids: Vec<&str> = out.iter().map(|m| m.skill_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn cap_applies_and_only_emitted_fire() {
        let rules = set(
            r#"
            [defaults]
            max_suggestions = 1
            [[rules]]
            skill_id = "a"
            priority = 9
            cooldown_seconds = 60
            [rules.triggers]
            keywords = ["deploy"]

            [[rules]]
            skill_id = "b"
            priority = 2
            cooldown_seconds = 60
            [rules.triggers]
            keywords = ["deploy"]
        "#,
        );
        let mut cooldowns = MemoryCooldowns::new();
        let input = ActivationInput::prompt("deploy", None);
        let out = score(&input, &rules, &mut cooldowns, 1000);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].skill_id, "a");
        assert_eq!(cooldowns.last_fired("a"), Some(1000));
        assert_eq!(cooldowns.last_fired("b"), None);

        // "a" is cooling down, so "b" gets the slot.
        let out = score(&input, &rules, &mut cooldowns, 1010);
        assert_eq!(out[0].skill_id, "b");

        // Both windows lapsed.
        let out = score(&input, &rules, &mut cooldowns, 1100);
        assert_eq!(out[0].skill_id, "a");
    }

    #[test]
    fn event_kind_eligibility() {
        let rules = set(
            r#"
            [[rules]]
            skill_id = "pro"
            rule_type = "proactive"
            [rules.triggers]
            keywords = ["cargo"]

            [[rules]]
            skill_id = "guard"
            rule_type = "guard"
            [rules.triggers]
            keywords = ["cargo"]

            [[rules]]
            skill_id = "re"
            rule_type = "reactive"
            [rules.triggers]
            keywords = ["cargo"]
        "#,
        );
        let ids = |event: EventKind| {
            let input = ActivationInput {
                text: "cargo build",
                event,
                cwd: None,
                file_path: None,
                content: None,
            };
            let mut out: Vec<String> = score(&input, &rules, &mut MemoryCooldowns::new(), 0)
                .into_iter()
                .map(|m| m.skill_id)
                .collect();
            out.sort();
            out
        };
        assert_eq!(ids(EventKind::Prompt), vec!["pro", "re"]);
        assert_eq!(ids(EventKind::Tool), vec!["guard", "re"]);
    }

    #[test]
    fn directory_file_type_and_content_dimensions() {
        let rules = set(
            r#"
            [[rules]]
            skill_id = "rust"
            rule_type = "guard"
            threshold = 99
            [rules.triggers]
            directories = ["/crates/"]
            file_types = ["*.rs"]
            content_patterns = ["unsafe\\s*\\{"]
        "#,
        );
        let input = ActivationInput {
            text: "",
            event: EventKind::Tool,
            cwd: Some("/work/crates/core"),
            file_path: Some("/work/crates/core/src/lib.rs"),
            content: Some("fn f() { unsafe { x() } }"),
        };
        let out = score(&input, &rules, &mut MemoryCooldowns::new(), 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].normalized, 100.0);
    }

    #[test]
    fn exclusion_short_circuits() {
        let rules = set(
            r#"
            [exclusions]
            prefixes = ["hello"]
            [[rules]]
            skill_id = "greeter"
            [rules.triggers]
            keywords = ["there"]
        "#,
        );
        let input = ActivationInput::prompt("hello there", None);
        assert!(score(&input, &rules, &mut MemoryCooldowns::new(), 0).is_empty());
    }

    #[test]
    fn scoring_is_idempotent_without_cooldowns() {
        let rules = set(SKILL_RULES);
        let input = ActivationInput::prompt("create a new skill for my project", None);
        let first = score(&input, &rules, &mut MemoryCooldowns::new(), 0);
        let second = score(&input, &rules, &mut MemoryCooldowns::new(), 0);
        assert_eq!(first, second);
    }

    #[test]
    fn engine_load_failure_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("activation.toml"), "rules = 7").unwrap();
        let engine = ActivationEngine::load(dir.path());
        assert!(engine.rules().rules.is_empty());
        let input = ActivationInput::prompt("create a new skill", None);
        let (matches, block) = engine.activate(&input, &mut MemoryCooldowns::new(), 0);
        assert!(matches.is_empty());
        assert!(block.is_none());
    }
}
