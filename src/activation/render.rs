//! Turns ranked matches into the context block handed back to the host.

use std::path::PathBuf;

use super::ScoredMatch;
use super::rules::Enforcement;

pub const BLOCK_OPEN: &str = "<skill-activation>";
pub const BLOCK_CLOSE: &str = "</skill-activation>";

/// Source of full skill bodies for `inject` enforcement.
pub trait SkillSource {
    fn load(&self, skill_id: &str) -> Option<String>;
}

/// Reads `<root>/<skill_id>/SKILL.md`.
#[derive(Debug, Clone)]
pub struct SkillDirectory {
    root: PathBuf,
}

impl SkillDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `~` in a configured directory.
    pub fn from_setting(dir: &str) -> Self {
        Self::new(shellexpand::tilde(dir).into_owned())
    }
}

impl SkillSource for SkillDirectory {
    fn load(&self, skill_id: &str) -> Option<String> {
        if skill_id.is_empty()
            || skill_id.contains('/')
            || skill_id.contains('\\')
            || skill_id == "."
            || skill_id == ".."
        {
            log::warn!("refusing to load skill with unsafe id `{skill_id}`");
            return None;
        }
        let path = self.root.join(skill_id).join("SKILL.md");
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => Some(content),
            Ok(_) => {
                log::warn!("skill file {} is empty", path.display());
                None
            }
            Err(e) => {
                log::warn!("cannot read skill file {}: {e}", path.display());
                None
            }
        }
    }
}

fn hint(m: &ScoredMatch) -> String {
    m.suggestion_text
        .clone()
        .unwrap_or_else(|| format!("Consider using the `{}` skill for this request.", m.skill_id))
}

fn heading(kind: &str, m: &ScoredMatch, show_scores: bool) -> String {
    if show_scores {
        format!("## {kind} skill: {} (score {:.1})", m.skill_id, m.score)
    } else {
        format!("## {kind} skill: {}", m.skill_id)
    }
}

fn section(m: &ScoredMatch, show_scores: bool, source: &dyn SkillSource) -> String {
    match m.enforcement {
        Enforcement::Suggest => format!("{}\n{}", heading("Suggested", m, show_scores), hint(m)),
        Enforcement::Inject => match source.load(&m.skill_id) {
            Some(body) => format!(
                "{}\n{}",
                heading("Injected", m, show_scores),
                body.trim_end()
            ),
            None => format!("{}\n{}", heading("Suggested", m, show_scores), hint(m)),
        },
        Enforcement::Require => format!(
            "{}\n{}\nBefore proceeding, acknowledge the `{}` skill and state how you will apply it.",
            heading("Required", m, show_scores),
            hint(m),
            m.skill_id
        ),
    }
}

/// One block containing every match in rank order, or `None` when there
/// is nothing to say.
pub fn render(matches: &[ScoredMatch], show_scores: bool, source: &dyn SkillSource) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    let sections: Vec<String> = matches
        .iter()
        .map(|m| section(m, show_scores, source))
        .collect();
    Some(format!(
        "{BLOCK_OPEN}\n{}\n{BLOCK_CLOSE}",
        sections.join("\n\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixed(HashMap<&'static str, &'static str>);

    impl SkillSource for Fixed {
        fn load(&self, skill_id: &str) -> Option<String> {
            self.0.get(skill_id).map(|s| s.to_string())
        }
    }

    fn scored(id: &str, enforcement: Enforcement, score: f64) -> ScoredMatch {
        ScoredMatch {
            skill_id: id.to_string(),
            enforcement,
            priority: 5,
            normalized: score * 2.0,
            score,
            evidence: Vec::new(),
            suggestion_text: None,
        }
    }

    #[test]
    fn empty_renders_nothing() {
        assert!(render(&[], false, &Fixed(HashMap::new())).is_none());
    }

    #[test]
    fn suggest_uses_default_hint() {
        let out = render(
            &[scored("skill-creator", Enforcement::Suggest, 40.0)],
            false,
            &Fixed(HashMap::new()),
        )
        .unwrap();
        assert!(out.starts_with(BLOCK_OPEN));
        assert!(out.ends_with(BLOCK_CLOSE));
        assert!(out.contains("Consider using the `skill-creator` skill"));
        assert!(!out.contains("score"));
    }

    #[test]
    fn custom_hint_and_scores() {
        let mut m = scored("a", Enforcement::Suggest, 42.5);
        m.suggestion_text = Some("Try skill A".into());
        let out = render(&[m], true, &Fixed(HashMap::new())).unwrap();
        assert!(out.contains("Try skill A"));
        assert!(out.contains("(score 42.5)"));
    }

    #[test]
    fn inject_includes_body() {
        let source = Fixed(HashMap::from([("a", "# Skill A\nDo the thing.\n")]));
        let out = render(&[scored("a", Enforcement::Inject, 10.0)], false, &source).unwrap();
        assert!(out.contains("## Injected skill: a"));
        assert!(out.contains("Do the thing."));
    }

    #[test]
    fn inject_falls_back_to_hint() {
        let out = render(
            &[scored("a", Enforcement::Inject, 10.0)],
            false,
            &Fixed(HashMap::new()),
        )
        .unwrap();
        assert!(out.contains("## Suggested skill: a"));
        assert!(out.contains("Consider using the `a` skill"));
    }

    #[test]
    fn require_asks_for_acknowledgment() {
        let out = render(
            &[scored("a", Enforcement::Require, 10.0)],
            false,
            &Fixed(HashMap::new()),
        )
        .unwrap();
        assert!(out.contains("## Required skill: a"));
        assert!(out.contains("acknowledge the `a` skill"));
    }

    #[test]
    fn sections_in_rank_order_single_block() {
        let out = render(
            &[
                scored("first", Enforcement::Suggest, 50.0),
                scored("second", Enforcement::Suggest, 20.0),
            ],
            false,
            &Fixed(HashMap::new()),
        )
        .unwrap();
        assert_eq!(out.matches(BLOCK_OPEN).count(), 1);
        assert!(out.find("first").unwrap() < out.find("second").unwrap());
    }

    #[test]
    fn skill_directory_reads_and_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/SKILL.md"), "body").unwrap();
        let source = SkillDirectory::new(dir.path());
        assert_eq!(source.load("a").as_deref(), Some("body"));
        assert!(source.load("missing").is_none());
        assert!(source.load("../a").is_none());
    }
}
