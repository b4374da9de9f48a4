//! cc-policygate: Claude Code hook binary.
//!
//! Reads one JSON event from stdin and writes the result to stdout.
//!
//!   cc-policygate security   PreToolUse: allow / ask / block a tool call
//!   cc-policygate activate   UserPromptSubmit: surface matching skills
//!
//! `--config-dir <path>` overrides the configuration root.

use std::path::Path;

use cc_policygate::activation::{ActivationEngine, MemoryCooldowns};
use cc_policygate::config::{self, Config};
use cc_policygate::eval::{RuleMatch, SecurityEngine};
use cc_policygate::handlers::{self, ActivationLog, DecisionLog, Outcome, PostHandler};
use cc_policygate::hook;
use cc_policygate::logging;
use cc_policygate::normalize::PathContext;

const USAGE: &str = "usage: cc-policygate <security|activate> [--config-dir <path>]";

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Security,
    Activate,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    mode: Mode,
    config_dir: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut mode = None;
    let mut config_dir = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "security" | "activate" if mode.is_some() => {
                return Err(format!("unexpected argument `{arg}`"));
            }
            "security" => mode = Some(Mode::Security),
            "activate" => mode = Some(Mode::Activate),
            "--config-dir" => match args.next() {
                Some(dir) => config_dir = Some(dir),
                None => return Err("--config-dir needs a value".to_string()),
            },
            other => match other.strip_prefix("--config-dir=") {
                Some(dir) => config_dir = Some(dir.to_string()),
                None => return Err(format!("unknown argument `{other}`")),
            },
        }
    }
    let mode = mode.ok_or_else(|| "missing mode".to_string())?;
    Ok(Args { mode, config_dir })
}

fn main() {
    logging::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("cc-policygate: {msg}\n{USAGE}");
            std::process::exit(hook::EXIT_USAGE);
        }
    };
    let root = config::config_root(args.config_dir.as_deref());
    log::debug!("config root: {}", root.display());

    let code = match args.mode {
        Mode::Security => run_security(&root),
        Mode::Activate => run_activate(&root),
    };
    std::process::exit(code);
}

fn run_security(root: &Path) -> i32 {
    let input = match hook::read_stdin().and_then(|raw| hook::parse_input(&raw)) {
        Ok(input) => input,
        Err(e) => {
            log::error!("security: {e}");
            return hook::emit_security(&RuleMatch::fail_closed(format!("malformed input: {e}")));
        }
    };

    let paths = PathContext::from_env(input.cwd.as_deref());
    let engine = SecurityEngine::from_load(Config::load_from(root), paths);
    let result = engine.decide(input.tool(), input.tool_input.as_ref());
    log::info!(
        "{} {}: {}",
        result.decision.label(),
        input.tool(),
        result.reason
    );
    let code = hook::emit_security(&result);

    let subject = input.subject();
    let post: Vec<Box<dyn PostHandler>> = vec![Box::new(DecisionLog::in_data_dir())];
    handlers::run_all(
        &post,
        &Outcome::Security {
            session: input.session(),
            tool: input.tool(),
            subject: &subject,
            result: &result,
        },
    );
    code
}

fn run_activate(root: &Path) -> i32 {
    let input = match hook::read_stdin().and_then(|raw| hook::parse_input(&raw)) {
        Ok(input) => input,
        Err(e) => {
            log::warn!("activate: {e}");
            return hook::emit_activation(None);
        }
    };
    let Some(event) = input.activation_input() else {
        log::debug!("activate: nothing to score");
        return hook::emit_activation(None);
    };

    let engine = ActivationEngine::load(root);
    let mut cooldowns = MemoryCooldowns::new();
    let (matches, block) = engine.activate(&event, &mut cooldowns, logging::unix_now());
    if !matches.is_empty() {
        let ids: Vec<&str> = matches.iter().map(|m| m.skill_id.as_str()).collect();
        log::info!("activated: {}", ids.join(", "));
    }
    let code = hook::emit_activation(block.as_deref());

    let post: Vec<Box<dyn PostHandler>> = vec![Box::new(ActivationLog::in_data_dir())];
    handlers::run_all(
        &post,
        &Outcome::Activation {
            session: input.session(),
            matches: &matches,
        },
    );
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn modes() {
        assert_eq!(
            args(&["security"]).unwrap(),
            Args {
                mode: Mode::Security,
                config_dir: None
            }
        );
        assert_eq!(args(&["activate"]).unwrap().mode, Mode::Activate);
    }

    #[test]
    fn config_dir_both_spellings() {
        assert_eq!(
            args(&["security", "--config-dir", "/etc/pg"]).unwrap().config_dir.as_deref(),
            Some("/etc/pg")
        );
        assert_eq!(
            args(&["--config-dir=/x", "activate"]).unwrap().config_dir.as_deref(),
            Some("/x")
        );
    }

    #[test]
    fn usage_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["scan"]).is_err());
        assert!(args(&["security", "activate"]).is_err());
        assert!(args(&["security", "--config-dir"]).is_err());
    }
}
