use serde_json::{Map, Value};

use crate::error::InputError;
use crate::policy::Policy;

/// Tool that runs shell commands.
pub const COMMAND_TOOL: &str = "Bash";

/// Tool whose `pattern` field is a path glob.
pub const GLOB_TOOL: &str = "Glob";

/// Input fields that carry a file or directory path.
const PATH_FIELDS: &[&str] = &["file_path", "notebook_path", "path"];

/// What a tool invocation would touch, extracted from its input fields.
#[derive(Debug, PartialEq, Eq)]
pub enum Operation<'a> {
    /// A shell command.
    Command(&'a str),
    /// One or more filesystem paths.
    Paths { paths: Vec<&'a str>, mutating: bool },
    /// Nothing this engine knows how to check.
    Opaque,
}

/// Classify a tool invocation.
///
/// Known tools are held to their input schema: a `Bash` call needs a string
/// `command`, a mutating file tool needs a string path, and a path field
/// of the wrong type is malformed for any known tool. Unknown tools are
/// inspected on a best-effort basis (string `command` or path fields only)
/// and logged for drift detection.
pub fn classify<'a>(
    tool: &str,
    input: &'a Map<String, Value>,
    policy: &Policy,
) -> Result<Operation<'a>, InputError> {
    if tool == COMMAND_TOOL {
        return match input.get("command") {
            None | Some(Value::Null) => Err(InputError::MissingField("command")),
            Some(Value::String(cmd)) => Ok(Operation::Command(cmd)),
            Some(_) => Err(InputError::WrongType {
                field: "command",
                expected: "a string",
            }),
        };
    }

    let mutating = policy.is_mutating_tool(tool);
    if mutating || policy.is_path_tool(tool) {
        let mut paths = Vec::new();
        for &field in PATH_FIELDS {
            match input.get(field) {
                None | Some(Value::Null) => {}
                Some(Value::String(p)) if !p.trim().is_empty() => paths.push(p.as_str()),
                Some(Value::String(_)) => return Err(InputError::MissingField(field)),
                Some(_) => {
                    return Err(InputError::WrongType {
                        field,
                        expected: "a string",
                    });
                }
            }
        }
        if tool == GLOB_TOOL
            && let Some(Value::String(pattern)) = input.get("pattern")
            && let Some(base) = glob_base(pattern)
            && (paths.is_empty() || is_anchored(base))
        {
            paths.push(base);
        }
        if paths.is_empty() {
            if mutating {
                return Err(InputError::MissingField("file_path"));
            }
            // Search tools default to the working directory.
            return Ok(Operation::Opaque);
        }
        return Ok(Operation::Paths { paths, mutating });
    }

    log::warn!("unrecognized tool `{tool}`; checking recognizable fields only");
    if let Some(Value::String(cmd)) = input.get("command") {
        return Ok(Operation::Command(cmd));
    }
    let paths: Vec<&str> = PATH_FIELDS
        .iter()
        .filter_map(|f| input.get(*f).and_then(Value::as_str))
        .filter(|p| !p.trim().is_empty())
        .collect();
    if paths.is_empty() {
        Ok(Operation::Opaque)
    } else {
        Ok(Operation::Paths {
            paths,
            mutating: false,
        })
    }
}

/// The literal directory a glob pattern starts from: everything up to the
/// last `/` before the first wildcard (`/home/u/.ssh/*` gives
/// `/home/u/.ssh`). `None` for patterns without a directory part.
pub fn glob_base(pattern: &str) -> Option<&str> {
    let pattern = pattern.trim();
    if !pattern.contains('/') {
        return None;
    }
    let base = match pattern.find(['*', '?', '[', '{']) {
        None => pattern,
        Some(wild) => match pattern[..wild].rfind('/') {
            Some(0) => "/",
            Some(slash) => &pattern[..slash],
            None => return None,
        },
    };
    (!base.is_empty()).then_some(base)
}

/// True when a path does not depend on the directory it is resolved from.
fn is_anchored(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('~') || path.starts_with('$')
}
