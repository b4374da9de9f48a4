//! cc-policygate: a Claude Code hook that gates tool calls and surfaces skills.
//!
//! Two single-pass decision procedures share a normalizer and a rule store:
//!
//! - The **security engine** ([`eval::SecurityEngine`]) inspects a proposed
//!   tool call and returns [`eval::Decision::Allow`], [`eval::Decision::Ask`]
//!   or [`eval::Decision::Block`]. It fails closed: malformed input or an
//!   unusable policy is a block, never a pass.
//! - The **activation engine** ([`activation::ActivationEngine`]) scores a
//!   prompt or tool event against weighted skill rules and renders the
//!   winners into one context block. It fails open: any trouble means no
//!   activation.
//!
//! # Architecture
//!
//! - **[`normalize`]**: Home-directory canonicalization and lexical path resolution.
//! - **[`parse`]**: Shell parsing: tree-sitter-bash segmentation, shlex tokenizer.
//! - **[`config`]**: Security policy loading: embedded defaults + user overlay merge.
//! - **[`policy`]**: Compiled security rules and resolved protected paths.
//! - **[`eval`]**: Security decision engine.
//! - **[`activation`]**: Activation rules, scoring, cooldowns and rendering.
//! - **[`hook`]**: Host payloads, bounded stdin read, output and exit codes.
//! - **[`handlers`]**: Post-decision side effects (audit logs).
//! - **[`logging`]**: Diagnostic logger setup and audit log helpers.

/// Scoring of skill activation rules.
pub mod activation;
/// Security policy types, loading, and overlay merge logic.
pub mod config;
/// Error types.
pub mod error;
/// Security decision engine.
pub mod eval;
/// Post-decision side-effect handlers.
pub mod handlers;
/// Host transport.
pub mod hook;
/// Diagnostic and audit logging.
pub mod logging;
/// Text and path canonicalization.
pub mod normalize;
/// Shell command parsing: tree-sitter segments, shlex tokenizer.
pub mod parse;
/// Compiled security policy.
pub mod policy;

use eval::{RuleMatch, SecurityEngine};
use normalize::PathContext;

/// Evaluate a command against the embedded default policy in the given
/// path context.
pub fn evaluate_with(command: &str, paths: PathContext) -> RuleMatch {
    SecurityEngine::from_load(config::Config::default_config(), paths).evaluate_command(command)
}

/// Evaluate a command against the embedded default policy, resolving paths
/// against `$HOME` and the process working directory.
///
/// This is the main entry point for tests and simple usage.
pub fn evaluate(command: &str) -> RuleMatch {
    evaluate_with(command, PathContext::from_env(None))
}
