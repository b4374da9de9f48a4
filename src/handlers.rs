//! Post-decision side effects.
//!
//! Handlers run after the decision has been emitted, each on its own scoped
//! thread. A handler that fails or panics is logged and otherwise ignored;
//! it cannot affect the other handlers or the decision.

use std::path::PathBuf;

use crate::activation::ScoredMatch;
use crate::error::HandlerError;
use crate::eval::RuleMatch;
use crate::logging;

const DECISIONS_FILE: &str = "decisions.log";
const ACTIVATIONS_FILE: &str = "activations.log";

/// Longest subject recorded in the decision log.
const SUBJECT_MAX: usize = 200;

/// What just happened.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Security {
        session: &'a str,
        tool: &'a str,
        subject: &'a str,
        result: &'a RuleMatch,
    },
    Activation {
        session: &'a str,
        matches: &'a [ScoredMatch],
    },
}

pub trait PostHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn handle(&self, outcome: &Outcome<'_>) -> Result<(), HandlerError>;
}

/// Run every handler concurrently and wait for all of them.
///
/// Returns the failures; they are also logged.
pub fn run_all(handlers: &[Box<dyn PostHandler>], outcome: &Outcome<'_>) -> Vec<HandlerError> {
    let results: Vec<Result<(), HandlerError>> = std::thread::scope(|scope| {
        let running: Vec<_> = handlers
            .iter()
            .map(|h| (h.name(), scope.spawn(move || h.handle(outcome))))
            .collect();
        running
            .into_iter()
            .map(|(name, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(HandlerError::Panicked(name.to_string())))
            })
            .collect()
    });

    results
        .into_iter()
        .filter_map(Result::err)
        .inspect(|e| log::warn!("post-decision handler failed: {e}"))
        .collect()
}

/// Appends one line per security decision to `decisions.log`.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    dir: Option<PathBuf>,
}

impl DecisionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Log under [`logging::data_dir`].
    pub fn in_data_dir() -> Self {
        Self {
            dir: logging::data_dir(),
        }
    }
}

impl PostHandler for DecisionLog {
    fn name(&self) -> &'static str {
        "decision-log"
    }

    fn handle(&self, outcome: &Outcome<'_>) -> Result<(), HandlerError> {
        let Outcome::Security {
            session,
            tool,
            subject,
            result,
        } = outcome
        else {
            return Ok(());
        };
        let dir = self.dir.as_ref().ok_or(HandlerError::NoHome(self.name()))?;
        let line = format!(
            "{ts}\t{session}\t{tool}\t{decision}\t{subject}\t{reason}",
            ts = logging::timestamp_now(),
            session = logging::field(session, 64),
            tool = logging::field(tool, 64),
            decision = result.decision.as_str(),
            subject = logging::field(subject, SUBJECT_MAX),
            reason = result.reason.replace('\n', "; ").replace('\t', " "),
        );
        logging::append_line(dir, DECISIONS_FILE, &line).map_err(|source| HandlerError::Io {
            handler: self.name(),
            source,
        })
    }
}

/// Appends one line per emitted skill to `activations.log`.
#[derive(Debug, Clone)]
pub struct ActivationLog {
    dir: Option<PathBuf>,
}

impl ActivationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn in_data_dir() -> Self {
        Self {
            dir: logging::data_dir(),
        }
    }
}

impl PostHandler for ActivationLog {
    fn name(&self) -> &'static str {
        "activation-log"
    }

    fn handle(&self, outcome: &Outcome<'_>) -> Result<(), HandlerError> {
        let Outcome::Activation { session, matches } = outcome else {
            return Ok(());
        };
        if matches.is_empty() {
            return Ok(());
        }
        let dir = self.dir.as_ref().ok_or(HandlerError::NoHome(self.name()))?;
        let ts = logging::timestamp_now();
        let lines: Vec<String> = matches
            .iter()
            .map(|m| {
                format!(
                    "{ts}\t{session}\t{id}\t{enforcement:?}\t{score:.1}\t{evidence}",
                    session = logging::field(session, 64),
                    id = m.skill_id,
                    enforcement = m.enforcement,
                    score = m.score,
                    evidence = m.evidence.join(","),
                )
            })
            .collect();
        logging::append_line(dir, ACTIVATIONS_FILE, &lines.join("\n")).map_err(|source| {
            HandlerError::Io {
                handler: self.name(),
                source,
            }
        })
    }
}
