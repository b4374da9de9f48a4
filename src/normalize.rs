//! Canonicalization of commands and paths before policy matching.
//!
//! Home-directory indirections are collapsed to a single sentinel, `~`, so
//! that `$HOME/.ssh`, `${HOME}/.ssh` and `~/.ssh` all read the same to the
//! matchers. Paths are additionally resolved to absolute form with `.` and
//! `..` segments collapsed lexically, so a traversal cannot step around a
//! containment check.

use std::path::{Component, Path, PathBuf};

/// The canonical spelling of the home directory in normalized text.
pub const HOME_SENTINEL: &str = "~";

/// Rewrite `$HOME` and `${HOME}` to [`HOME_SENTINEL`], leaving everything else untouched.
///
/// `$HOMEBREW` and similar longer variable names are not touched, and a bare
/// `~` is already canonical.
pub fn normalize_command(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' {
            let rest = &input[i + 1..];
            if rest.starts_with("{HOME}") {
                out.push_str(HOME_SENTINEL);
                i += 1 + "{HOME}".len();
                continue;
            }
            if let Some(after) = rest.strip_prefix("HOME")
                && !after
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                out.push_str(HOME_SENTINEL);
                i += 1 + "HOME".len();
                continue;
            }
        }
        // Copy one full UTF-8 character.
        let ch = input[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }

    out
}

/// Filesystem context used to resolve relative and home-relative paths.
#[derive(Debug, Clone)]
pub struct PathContext {
    /// The user's home directory, if known.
    pub home: Option<PathBuf>,
    /// Directory relative paths are resolved against.
    pub cwd: PathBuf,
}

impl PathContext {
    pub fn new(home: Option<PathBuf>, cwd: PathBuf) -> Self {
        Self { home, cwd }
    }

    /// Context from `$HOME` and an explicit working directory (falling back to
    /// the process's own working directory).
    pub fn from_env(cwd: Option<&str>) -> Self {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from);
        let cwd = cwd
            .filter(|c| !c.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));
        Self { home, cwd }
    }

    /// Resolve a raw path to its canonical absolute form.
    ///
    /// Home indirections are normalized, `~` is expanded, relative paths are
    /// joined onto `cwd` and `.`/`..` are collapsed without touching the
    /// filesystem. `..` at the root stays at the root.
    pub fn canonicalize(&self, raw: &str) -> PathBuf {
        let normalized = normalize_command(raw.trim());
        let expanded = match (&self.home, normalized.as_str()) {
            (Some(home), "~") => home.clone(),
            (Some(home), s) if s.starts_with("~/") => home.join(&s[2..]),
            _ => PathBuf::from(&normalized),
        };
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        };
        lexical_normalize(&absolute)
    }

    /// The `~/...` spelling of an absolute path under the home directory.
    pub fn home_relative(&self, path: &Path) -> Option<String> {
        let home = self.home.as_ref()?;
        let rest = path.strip_prefix(home).ok()?;
        if rest.as_os_str().is_empty() {
            Some(HOME_SENTINEL.to_string())
        } else {
            Some(format!("{HOME_SENTINEL}/{}", rest.display()))
        }
    }
}

/// Collapse `.` and `..` components without consulting the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // pop() is a no-op at the root
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push("/");
    }
    out
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

    #[test]
    fn braced_home_becomes_sentinel() {
        assert_eq!(
            normalize_command("cat ${HOME}/.ssh/id_rsa"),
            "cat ~/.ssh/id_rsa"
        );
    }

    #[test]
    fn bare_home_becomes_sentinel() {
        assert_eq!(normalize_command("ls $HOME/.aws"), "ls ~/.aws");
        assert_eq!(normalize_command("cd $HOME"), "cd ~");
    }

    #[test]
    fn longer_variable_names_untouched() {
        assert_eq!(
            normalize_command("echo $HOMEBREW_PREFIX $HOME_DIR"),
            "echo $HOMEBREW_PREFIX $HOME_DIR"
        );
    }

    #[test]
    fn other_text_untouched() {
        let s = "grep -r 'é $PATH' ~/src | wc -l";
        assert_eq!(normalize_command(s), s);
    }

    #[test]
    fn trailing_dollar_untouched() {
        assert_eq!(normalize_command("echo cost$"), "echo cost$");
    }

    #[test]
    fn canonicalize_expands_all_home_spellings() {
        let c = ctx();
        let expected = PathBuf::from("/home/tester/.ssh/id_rsa");
        assert_eq!(c.canonicalize("~/.ssh/id_rsa"), expected);
        assert_eq!(c.canonicalize("$HOME/.ssh/id_rsa"), expected);
        assert_eq!(c.canonicalize("${HOME}/.ssh/id_rsa"), expected);
    }

    #[test]
    fn canonicalize_collapses_traversal() {
        let c = ctx();
        assert_eq!(
            c.canonicalize("../.ssh/./id_rsa"),
            PathBuf::from("/home/tester/.ssh/id_rsa")
        );
        assert_eq!(
            c.canonicalize("/tmp/../../../etc/shadow"),
            PathBuf::from("/etc/shadow")
        );
    }

    #[test]
    fn canonicalize_relative_joins_cwd() {
        assert_eq!(
            ctx().canonicalize("src/main.rs"),
            PathBuf::from("/home/tester/project/src/main.rs")
        );
    }

    #[test]
    fn home_relative_spelling() {
        let c = ctx();
        assert_eq!(
            c.home_relative(Path::new("/home/tester/.ssh")).as_deref(),
            Some("~/.ssh")
        );
        assert_eq!(c.home_relative(Path::new("/etc/shadow")), None);
    }
}
