//! Host transport: payload parsing, bounded stdin read, and the JSON the
//! host expects back.
//!
//! Security output is `{"continue":true}` for an allow, otherwise
//! `{"decision":"block"|"ask","message":...}`. Activation output is the raw
//! context block, or nothing.

use std::io::Read;
use std::sync::mpsc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::activation::{ActivationInput, EventKind};
use crate::error::InputError;
use crate::eval::{Decision, RuleMatch};

/// How long to wait for the host to finish writing the payload.
pub const INPUT_WINDOW: Duration = Duration::from_secs(3);

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
/// Reserved for fail-closed blocks: bad input, timeout, policy unavailable.
pub const EXIT_HARD_BLOCK: i32 = 2;

/// Event payload as sent by the host. Both snake_case and camelCase keys
/// are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default, alias = "toolName")]
    pub tool_name: Option<String>,
    #[serde(default, alias = "toolInput")]
    pub tool_input: Option<Value>,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "hookEventName")]
    pub hook_event_name: Option<String>,
}

impl HookInput {
    pub fn session(&self) -> &str {
        self.session_id.as_deref().unwrap_or("-")
    }

    pub fn tool(&self) -> &str {
        self.tool_name.as_deref().unwrap_or("")
    }

    /// Short description of what the tool call touches, for the audit log.
    pub fn subject(&self) -> String {
        let Some(Value::Object(input)) = &self.tool_input else {
            return String::new();
        };
        ["command", "file_path", "notebook_path", "path"]
            .iter()
            .find_map(|k| input.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }

    /// What the activation engine should score: the prompt for prompt
    /// events, otherwise the tool's command, path and content.
    pub fn activation_input(&self) -> Option<ActivationInput<'_>> {
        let cwd = self.cwd.as_deref();
        if let Some(prompt) = self.prompt.as_deref() {
            return Some(ActivationInput::prompt(prompt, cwd));
        }
        let Some(Value::Object(input)) = &self.tool_input else {
            return None;
        };
        let field = |k: &str| input.get(k).and_then(Value::as_str);
        Some(ActivationInput {
            text: field("command").or_else(|| field("description")).unwrap_or(""),
            event: EventKind::Tool,
            cwd,
            file_path: field("file_path")
                .or_else(|| field("notebook_path"))
                .or_else(|| field("path")),
            content: field("content").or_else(|| field("new_string")),
        })
    }
}

/// Read all of `reader` on a helper thread, giving up after `window`.
///
/// On timeout the helper is left blocked on its read; the process exits
/// shortly after and takes it along.
pub fn read_bounded<R>(mut reader: R, window: Duration) -> Result<String, InputError>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        let result = reader.read_to_string(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });
    match rx.recv_timeout(window) {
        Ok(result) => Ok(result?),
        Err(_) => {
            log::warn!("no hook input within {} ms", window.as_millis());
            Err(InputError::Timeout(window.as_millis()))
        }
    }
}

/// Read the payload from stdin within [`INPUT_WINDOW`].
pub fn read_stdin() -> Result<String, InputError> {
    read_bounded(std::io::stdin(), INPUT_WINDOW)
}

pub fn parse_input(raw: &str) -> Result<HookInput, InputError> {
    if raw.trim().is_empty() {
        return Err(InputError::Empty);
    }
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(InputError::WrongType {
            field: "payload",
            expected: "a JSON object",
        });
    }
    Ok(serde_json::from_value(value)?)
}

/// The JSON the host expects for a security decision.
pub fn security_payload(result: &RuleMatch) -> Value {
    match result.decision {
        Decision::Allow => serde_json::json!({ "continue": true }),
        Decision::Ask | Decision::Block => serde_json::json!({
            "decision": result.decision.as_str(),
            "message": result.reason,
        }),
    }
}

/// Exit status for a security decision.
pub fn security_exit_code(result: &RuleMatch) -> i32 {
    if result.fail_closed {
        EXIT_HARD_BLOCK
    } else {
        EXIT_OK
    }
}

/// Write the decision to stdout (and to stderr for fail-closed blocks) and
/// return the exit status.
pub fn emit_security(result: &RuleMatch) -> i32 {
    println!("{}", security_payload(result));
    if result.fail_closed {
        eprintln!("cc-policygate: {}", result.reason);
    }
    security_exit_code(result)
}

/// Write the activation block, if any. Always succeeds.
pub fn emit_activation(block: Option<&str>) -> i32 {
    if let Some(block) = block {
        println!("{block}");
    }
    EXIT_OK
}
