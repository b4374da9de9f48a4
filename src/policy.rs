//! Compiled security rule store.
//!
//! Built once per invocation from a merged [`Config`]. Regexes are compiled
//! here and nowhere else; a pattern that fails to compile is dropped with a
//! warning and can never match. Protected paths are resolved to canonical
//! absolute form up front so the engine only does component-wise prefix
//! checks.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::{Config, PatternRule};
use crate::normalize::{PathContext, normalize_command};

/// A command rule whose regex compiled successfully.
#[derive(Debug)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub reason: String,
}

impl CompiledPattern {
    /// Message fragment naming this rule.
    pub fn describe(&self) -> String {
        if self.reason.is_empty() {
            format!("matched pattern `{}`", self.regex.as_str())
        } else {
            format!("{} (pattern `{}`)", self.reason, self.regex.as_str())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// No tool may read, write or reference it.
    ZeroAccess,
    /// Mutating tools need confirmation.
    ConfirmWrite,
}

/// A protected path entry resolved against the session's home and cwd.
#[derive(Debug, Clone)]
pub struct ProtectedPath {
    /// The entry as declared in the policy.
    pub entry: String,
    pub access: AccessClass,
    /// Lexically canonical absolute form.
    pub absolute: PathBuf,
    /// Filesystem-canonical form, when the path exists (follows symlinks).
    pub resolved: Option<PathBuf>,
    /// `~/...` spelling, when the path lies under the home directory.
    pub home_form: Option<String>,
}

impl ProtectedPath {
    fn new(entry: &str, access: AccessClass, paths: &PathContext) -> Self {
        let normalized = normalize_command(entry);
        let expanded =
            shellexpand::env_with_context_no_errors(&normalized, |var| std::env::var(var).ok());
        let absolute = paths.canonicalize(&expanded);
        let resolved = std::fs::canonicalize(&absolute)
            .ok()
            .filter(|r| r != &absolute);
        let home_form = paths.home_relative(&absolute);
        Self {
            entry: entry.to_string(),
            access,
            absolute,
            resolved,
            home_form,
        }
    }

    /// True if `path` is this entry or lies beneath it.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.absolute)
            || self.resolved.as_ref().is_some_and(|r| path.starts_with(r))
    }

    /// True if `text` references this path directly by one of its spellings.
    pub fn referenced_in(&self, text: &str) -> bool {
        let absolute = self.absolute.to_string_lossy();
        contains_path_ref(text, &absolute)
            || self
                .resolved
                .as_ref()
                .is_some_and(|r| contains_path_ref(text, &r.to_string_lossy()))
            || self
                .home_form
                .as_deref()
                .is_some_and(|h| contains_path_ref(text, h))
    }
}

/// Substring search for a path that only accepts matches ending on a path
/// boundary, so `~/.ssh` does not match `~/.sshrc`.
fn contains_path_ref(text: &str, needle: &str) -> bool {
    if needle.is_empty() || needle == "/" || needle == "~" {
        return false;
    }
    text.match_indices(needle).any(|(start, m)| {
        let before_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = text[start + m.len()..].chars().next().is_none_or(|c| {
            c == '/' || c.is_whitespace() || "'\";|&)<>`".contains(c)
        });
        before_ok && after_ok
    })
}

/// The compiled security policy consulted by the engine.
#[derive(Debug)]
pub struct Policy {
    pub block: Vec<CompiledPattern>,
    pub confirm: Vec<CompiledPattern>,
    pub protected: Vec<ProtectedPath>,
    pub launchers: Vec<String>,
    pub mutating_tools: Vec<String>,
    pub path_tools: Vec<String>,
    pub paths: PathContext,
}

impl Policy {
    /// Compile a merged config for one session context.
    pub fn compile(config: &Config, paths: PathContext) -> Self {
        let protected = config
            .paths
            .zero_access
            .iter()
            .map(|e| ProtectedPath::new(e, AccessClass::ZeroAccess, &paths))
            .chain(
                config
                    .paths
                    .confirm_write
                    .iter()
                    .map(|e| ProtectedPath::new(e, AccessClass::ConfirmWrite, &paths)),
            )
            .collect();

        Self {
            block: compile_patterns(&config.commands.block, "block"),
            confirm: compile_patterns(&config.commands.confirm, "confirm"),
            protected,
            launchers: config.wrappers.strip.clone(),
            mutating_tools: config.settings.mutating_tools.clone(),
            path_tools: config.settings.path_tools.clone(),
            paths,
        }
    }

    /// Protected entries of one access class, in declaration order.
    pub fn protected(&self, access: AccessClass) -> impl Iterator<Item = &ProtectedPath> {
        self.protected.iter().filter(move |p| p.access == access)
    }

    pub fn is_mutating_tool(&self, tool: &str) -> bool {
        self.mutating_tools.iter().any(|t| t == tool)
    }

    pub fn is_path_tool(&self, tool: &str) -> bool {
        self.path_tools.iter().any(|t| t == tool)
    }
}

fn compile_patterns(rules: &[PatternRule], list: &str) -> Vec<CompiledPattern> {
    rules
        .iter()
        .filter_map(|rule| match Regex::new(&rule.pattern) {
            Ok(regex) => Some(CompiledPattern {
                regex,
                reason: rule.reason.clone(),
            }),
            Err(e) => {
                log::warn!("dropping invalid {list} pattern `{}`: {e}", rule.pattern);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PathContext {
        PathContext::new(
            Some(PathBuf::from("/home/tester")),
            PathBuf::from("/home/tester/project"),
        )
    }

    fn policy_from(toml_src: &str) -> Policy {
        let config: Config = toml::from_str(toml_src).unwrap();
        Policy::compile(&config, ctx())
    }

    #[test]
    fn invalid_pattern_dropped_others_kept() {
        let policy = policy_from(
            r#"
            [[commands.block]]
            pattern = 'rm\s+(-rf'
            [[commands.block]]
            pattern = 'mkfs'
        "#,
        );
        assert_eq!(policy.block.len(), 1);
        assert_eq!(policy.block[0].regex.as_str(), "mkfs");
    }

    #[test]
    fn declaration_order_preserved() {
        let policy = policy_from(
            r#"
            [[commands.confirm]]
            pattern = 'b'
            [[commands.confirm]]
            pattern = 'a'
        "#,
        );
        let order: Vec<&str> = policy.confirm.iter().map(|p| p.regex.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn protected_paths_resolve_home_forms() {
        let policy = policy_from(
            r#"
            [paths]
            zero_access = ["~/.ssh", "$HOME/.aws", "${HOME}/.gnupg"]
        "#,
        );
        let abs: Vec<PathBuf> = policy
            .protected(AccessClass::ZeroAccess)
            .map(|p| p.absolute.clone())
            .collect();
        assert_eq!(
            abs,
            vec![
                PathBuf::from("/home/tester/.ssh"),
                PathBuf::from("/home/tester/.aws"),
                PathBuf::from("/home/tester/.gnupg"),
            ]
        );
        assert_eq!(
            policy.protected[0].home_form.as_deref(),
            Some("~/.ssh")
        );
    }

    #[test]
    fn relative_entry_resolves_against_cwd() {
        let policy = policy_from(
            r#"
            [paths]
            confirm_write = [".env"]
        "#,
        );
        assert_eq!(
            policy.protected[0].absolute,
            PathBuf::from("/home/tester/project/.env")
        );
    }

    #[test]
    fn containment_is_component_wise() {
        let policy = policy_from("[paths]\nzero_access = [\"~/.ssh\"]\n");
        let p = &policy.protected[0];
        assert!(p.contains(Path::new("/home/tester/.ssh")));
        assert!(p.contains(Path::new("/home/tester/.ssh/id_rsa")));
        assert!(!p.contains(Path::new("/home/tester/.sshrc")));
    }

    #[test]
    fn reference_detection_respects_boundaries() {
        let policy = policy_from("[paths]\nzero_access = [\"~/.ssh\"]\n");
        let p = &policy.protected[0];
        assert!(p.referenced_in("cat ~/.ssh/id_rsa"));
        assert!(p.referenced_in("ls /home/tester/.ssh"));
        assert!(p.referenced_in("tar czf x.tgz '~/.ssh'"));
        assert!(!p.referenced_in("cat ~/.sshrc"));
        assert!(!p.referenced_in("echo hello"));
    }
}
