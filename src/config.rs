use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Embedded default security policy.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// File name of the user's security policy overlay.
pub const SECURITY_FILE: &str = "security.toml";

/// File name of the activation rules document.
pub const ACTIVATION_FILE: &str = "activation.toml";

/// Environment variable overriding the configuration root.
pub const CONFIG_DIR_ENV: &str = "POLICYGATE_CONFIG_DIR";

/// Resolve the configuration root.
///
/// Resolution order: explicit override (the `--config-dir` flag), then
/// `$POLICYGATE_CONFIG_DIR`, then `~/.config/cc-policygate`.
pub fn config_root(explicit: Option<&str>) -> PathBuf {
    let raw = explicit
        .map(String::from)
        .or_else(|| std::env::var(CONFIG_DIR_ENV).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "~/.config/cc-policygate".to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Read a rule document that is allowed to be absent.
///
/// `Ok(None)` means the file does not exist; any other I/O failure is a
/// load error.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, LoadError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LoadError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Final (merged) config types ──

/// One regex rule of a command policy list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PatternRule {
    pub pattern: String,
    /// Human-readable explanation surfaced in the decision message.
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub commands: Commands,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub wrappers: WrapperConfig,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Settings {
    /// Tools that modify the file they name (confirm-write applies to these).
    #[serde(default)]
    pub mutating_tools: Vec<String>,
    /// Tools that take a file path but only read it.
    #[serde(default)]
    pub path_tools: Vec<String>,
}

/// Command policies, evaluated in declaration order.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Commands {
    #[serde(default)]
    pub block: Vec<PatternRule>,
    #[serde(default)]
    pub confirm: Vec<PatternRule>,
}

/// Path policies. Entries may use `~`, `$HOME`, `${HOME}` or other
/// environment variables; relative entries resolve against the session cwd.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Paths {
    #[serde(default)]
    pub zero_access: Vec<String>,
    #[serde(default)]
    pub confirm_write: Vec<String>,
}

/// Launcher commands peeled off a segment before matching
/// (`sudo`, `env`, `nohup`, ...).
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct WrapperConfig {
    #[serde(default)]
    pub strip: Vec<String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    commands: CommandsOverlay,
    #[serde(default)]
    paths: PathsOverlay,
    #[serde(default)]
    wrappers: WrappersOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    mutating_tools: Vec<String>,
    #[serde(default)]
    path_tools: Vec<String>,
    #[serde(default)]
    remove_mutating_tools: Vec<String>,
    #[serde(default)]
    remove_path_tools: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CommandsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    block: Vec<PatternRule>,
    #[serde(default)]
    confirm: Vec<PatternRule>,
    /// Patterns (by exact text) to drop from the defaults.
    #[serde(default)]
    remove_block: Vec<String>,
    #[serde(default)]
    remove_confirm: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    zero_access: Vec<String>,
    #[serde(default)]
    confirm_write: Vec<String>,
    #[serde(default)]
    remove_zero_access: Vec<String>,
    #[serde(default)]
    remove_confirm_write: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WrappersOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    strip: Vec<String>,
    #[serde(default)]
    remove_strip: Vec<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list, comparing items by `key`.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_by<T>(
    base: &mut Vec<T>,
    add: Vec<T>,
    remove: &[String],
    replace: bool,
    key: impl Fn(&T) -> &str,
) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.iter().any(|r| r == key(item)));
        for item in add {
            if !base.iter().any(|b| key(b) == key(&item)) {
                base.push(item);
            }
        }
    }
}

fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    merge_by(base, add, remove, replace, String::as_str);
}

fn pattern_key(rule: &PatternRule) -> &str {
    &rule.pattern
}

impl Config {
    /// Load the default embedded policy.
    pub fn default_config() -> Result<Self, LoadError> {
        toml::from_str(DEFAULT_CONFIG).map_err(LoadError::Embedded)
    }

    /// Load the policy with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the user overlay from `<dir>/security.toml` (if it exists)
    ///
    /// An overlay that exists but cannot be read or parsed is an error, never
    /// silently skipped: the caller must treat it as a policy load failure.
    pub fn load_from(dir: &Path) -> Result<Self, LoadError> {
        let mut config = Self::default_config()?;
        let path = dir.join(SECURITY_FILE);
        if let Some(content) = read_optional(&path)? {
            let overlay: ConfigOverlay =
                toml::from_str(&content).map_err(|source| LoadError::Parse { path, source })?;
            config.apply_overlay(overlay);
        }
        Ok(config)
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        merge_list(
            &mut self.settings.mutating_tools,
            s.mutating_tools,
            &s.remove_mutating_tools,
            s.replace,
        );
        merge_list(
            &mut self.settings.path_tools,
            s.path_tools,
            &s.remove_path_tools,
            s.replace,
        );

        let c = overlay.commands;
        merge_by(
            &mut self.commands.block,
            c.block,
            &c.remove_block,
            c.replace,
            pattern_key,
        );
        merge_by(
            &mut self.commands.confirm,
            c.confirm,
            &c.remove_confirm,
            c.replace,
            pattern_key,
        );

        let p = overlay.paths;
        merge_list(
            &mut self.paths.zero_access,
            p.zero_access,
            &p.remove_zero_access,
            p.replace,
        );
        merge_list(
            &mut self.paths.confirm_write,
            p.confirm_write,
            &p.remove_confirm_write,
            p.replace,
        );

        let w = overlay.wrappers;
        merge_list(&mut self.wrappers.strip, w.strip, &w.remove_strip, w.replace);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
