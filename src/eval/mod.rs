pub mod context;
pub mod decision;

pub use context::{COMMAND_TOOL, Operation, classify};
pub use decision::{Decision, RuleMatch};

use std::path::PathBuf;

use serde_json::Value;

use crate::config::Config;
use crate::error::LoadError;
use crate::normalize::{PathContext, normalize_command};
use crate::parse;
use crate::policy::{AccessClass, Policy};

/// The security decision engine.
///
/// Holds either a compiled policy or the reason no policy is available. In
/// the latter state every operation is blocked fail-closed: a missing or
/// corrupt policy is never read as permission.
pub struct SecurityEngine {
    state: PolicyState,
}

enum PolicyState {
    Loaded(Box<Policy>),
    Unavailable(String),
}

impl SecurityEngine {
    pub fn new(policy: Policy) -> Self {
        Self {
            state: PolicyState::Loaded(Box::new(policy)),
        }
    }

    /// An engine that blocks everything because its policy failed to load.
    pub fn unavailable(err: &LoadError) -> Self {
        log::error!("security policy unavailable: {err}");
        Self {
            state: PolicyState::Unavailable(err.to_string()),
        }
    }

    /// Build the engine from a policy load result.
    pub fn from_load(config: Result<Config, LoadError>, paths: PathContext) -> Self {
        match config {
            Ok(config) => Self::new(Policy::compile(&config, paths)),
            Err(e) => Self::unavailable(&e),
        }
    }

    pub fn policy(&self) -> Option<&Policy> {
        match &self.state {
            PolicyState::Loaded(p) => Some(&**p),
            PolicyState::Unavailable(_) => None,
        }
    }

    /// Decide whether a tool invocation may proceed.
    ///
    /// Single pass, no retries. Structural problems with the input produce a
    /// fail-closed block, distinct from a block issued by a matching rule.
    pub fn decide(&self, tool_name: &str, tool_input: Option<&Value>) -> RuleMatch {
        let policy = match &self.state {
            PolicyState::Loaded(p) => p,
            PolicyState::Unavailable(why) => {
                return RuleMatch::fail_closed(format!("security policy unavailable: {why}"));
            }
        };

        if tool_name.trim().is_empty() {
            return RuleMatch::fail_closed("malformed input: missing tool name");
        }
        let input = match tool_input {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return RuleMatch::fail_closed("malformed input: tool input must be an object");
            }
            None => return RuleMatch::fail_closed("malformed input: missing tool input"),
        };

        match classify(tool_name, input, policy) {
            Err(e) => RuleMatch::fail_closed(format!("malformed input for {tool_name}: {e}")),
            Ok(Operation::Command(cmd)) => evaluate_command(policy, cmd),
            Ok(Operation::Paths { paths, mutating }) => {
                let mut worst = RuleMatch::allow("no protected path");
                for raw in paths {
                    let result = evaluate_path(policy, raw, mutating);
                    if result.decision > worst.decision {
                        worst = result;
                    }
                }
                worst
            }
            Ok(Operation::Opaque) => RuleMatch::allow(format!("{tool_name}: nothing to check")),
        }
    }

    /// Evaluate a shell command against the policy.
    pub fn evaluate_command(&self, command: &str) -> RuleMatch {
        match &self.state {
            PolicyState::Loaded(p) => evaluate_command(p, command),
            PolicyState::Unavailable(why) => {
                RuleMatch::fail_closed(format!("security policy unavailable: {why}"))
            }
        }
    }

    /// Evaluate a file operation on `path` against the policy.
    pub fn evaluate_path(&self, path: &str, mutating: bool) -> RuleMatch {
        match &self.state {
            PolicyState::Loaded(p) => evaluate_path(p, path, mutating),
            PolicyState::Unavailable(why) => {
                RuleMatch::fail_closed(format!("security policy unavailable: {why}"))
            }
        }
    }
}

/// Texts a command is matched against: the whole normalized command, each
/// segment as written, and each segment in canonical form. Deduplicated,
/// order preserved.
fn match_variants(normalized: &str, segments: &[String], launchers: &[String]) -> Vec<String> {
    let mut variants = vec![normalized.to_string()];
    for segment in segments {
        for candidate in [segment.clone(), parse::canonical_segment(segment, launchers)] {
            if !candidate.is_empty() && !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

fn evaluate_command(policy: &Policy, command: &str) -> RuleMatch {
    let normalized = normalize_command(command);
    if normalized.trim().is_empty() {
        return RuleMatch::allow("empty command");
    }

    let segments = parse::command_segments(&normalized);
    let variants = match_variants(&normalized, &segments, &policy.launchers);

    // Pattern order is the outer loop: the first declared pattern wins.
    for pattern in &policy.block {
        if variants.iter().any(|v| pattern.regex.is_match(v)) {
            return RuleMatch::block(format!("blocked: {}", pattern.describe()));
        }
    }
    for pattern in &policy.confirm {
        if variants.iter().any(|v| pattern.regex.is_match(v)) {
            return RuleMatch::ask(format!("confirmation required: {}", pattern.describe()));
        }
    }

    for protected in policy.protected(AccessClass::ZeroAccess) {
        if variants.iter().any(|v| protected.referenced_in(v)) {
            return RuleMatch::block(format!(
                "blocked: command references protected path {}",
                protected.entry
            ));
        }
    }

    // Relative and traversal spellings only show up once resolved. Redirect
    // targets are always paths, even without a separator.
    let words = segments
        .iter()
        .flat_map(|segment| parse::path_words(segment))
        .chain(
            parse::redirect_targets(&normalized)
                .into_iter()
                .flat_map(|target| parse::tokenize(&target)),
        );
    for word in words {
        let candidates = path_forms(policy.paths.canonicalize(&word));
        if let Some(protected) = policy
            .protected(AccessClass::ZeroAccess)
            .find(|p| candidates.iter().any(|c| p.contains(c)))
        {
            return RuleMatch::block(format!(
                "blocked: {word} resolves into protected path {}",
                protected.entry
            ));
        }
    }

    RuleMatch::allow("no rule matched")
}

/// The lexical form of a path, plus its filesystem-canonical form when the
/// path exists and resolves somewhere else (through a symlink).
fn path_forms(lexical: PathBuf) -> Vec<PathBuf> {
    match std::fs::canonicalize(&lexical) {
        Ok(real) if real != lexical => vec![lexical, real],
        _ => vec![lexical],
    }
}

fn evaluate_path(policy: &Policy, raw: &str, mutating: bool) -> RuleMatch {
    let lexical = policy.paths.canonicalize(raw);
    let candidates = path_forms(lexical.clone());

    if let Some(protected) = policy
        .protected(AccessClass::ZeroAccess)
        .find(|p| candidates.iter().any(|c| p.contains(c)))
    {
        return RuleMatch::block(format!(
            "blocked: {} is inside protected path {}",
            lexical.display(),
            protected.entry
        ));
    }

    if mutating
        && let Some(protected) = policy
            .protected(AccessClass::ConfirmWrite)
            .find(|p| candidates.iter().any(|c| p.contains(c)))
    {
        return RuleMatch::ask(format!(
            "confirmation required: write to {} (protected by {})",
            lexical.display(),
            protected.entry
        ));
    }

    RuleMatch::allow(format!("allowed: {}", lexical.display()))
}
