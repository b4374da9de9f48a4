/// Tokenize a command segment into words using shlex (POSIX word splitting).
///
/// Quotes are removed, so `r''m -rf /` tokenizes to `rm`, `-rf`, `/`.
pub fn tokenize(command: &str) -> Vec<String> {
    shlex::split(command).unwrap_or_else(|| {
        // Fallback: simple whitespace splitting if shlex can't parse
        command.split_whitespace().map(String::from).collect()
    })
}

/// True for a leading `KEY=value` environment assignment word.
fn is_env_assignment(word: &str) -> bool {
    let Some((key, _)) = word.split_once('=') else {
        return false;
    };
    !key.is_empty()
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && key
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

/// Basename of a command word: `/usr/bin/sudo` → `sudo`.
fn command_name(word: &str) -> &str {
    match word.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => word,
    }
}

/// Short options of common launchers that take a separate value word.
const VALUE_OPTIONS: &[&str] = &["-u", "-g", "-U", "-C", "-D"];

/// Drop leading env assignments and launcher commands from a token list.
///
/// A launcher's own options (`sudo -u root`, `timeout 10`, `nice -n 5`,
/// `timeout -s KILL 5`) are skipped along with it.
pub fn strip_launchers<'a>(words: &'a [String], launchers: &[String]) -> &'a [String] {
    let mut i = 0;
    loop {
        while i < words.len() && is_env_assignment(&words[i]) {
            i += 1;
        }
        let Some(word) = words.get(i) else {
            return &words[i..];
        };
        if !launchers.iter().any(|l| l == command_name(word)) {
            return &words[i..];
        }
        i += 1;
        while let Some(w) = words.get(i) {
            if w.starts_with('-') {
                i += 1;
                if w.len() == 2
                    && words.get(i + 1).is_some()
                    && let Some(value) = words.get(i)
                    && takes_value(w, value)
                {
                    i += 1;
                }
            } else if looks_like_duration(w) {
                i += 1;
            } else {
                break;
            }
        }
    }
}

fn takes_value(option: &str, value: &str) -> bool {
    if value.starts_with('-') {
        return false;
    }
    VALUE_OPTIONS.contains(&option)
        || looks_like_duration(value)
        // signal names: `timeout -s KILL`
        || value.chars().all(|c| c.is_ascii_uppercase())
}

fn looks_like_duration(word: &str) -> bool {
    let digits = word.trim_end_matches(['s', 'm', 'h', 'd']);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Merge the leading run of short-flag words after the command into one.
///
/// `rm -r -f /` becomes `rm -rf /`. Long options (`--force`) and the first
/// non-flag word end the run; flag letters keep their order of appearance.
pub fn merge_short_flags(words: &[String]) -> Vec<String> {
    let Some((command, args)) = words.split_first() else {
        return Vec::new();
    };
    let mut out = vec![command.clone()];
    let mut letters = String::new();
    let mut rest = args;
    while let Some((w, tail)) = rest.split_first() {
        let is_short = w.len() > 1
            && w.starts_with('-')
            && !w.starts_with("--")
            && w[1..].chars().all(|c| c.is_ascii_alphabetic());
        if !is_short {
            break;
        }
        for c in w[1..].chars() {
            if !letters.contains(c) {
                letters.push(c);
            }
        }
        rest = tail;
    }
    if !letters.is_empty() {
        out.push(format!("-{letters}"));
    }
    out.extend(rest.iter().cloned());
    out
}

/// The form of a segment that launcher and quoting tricks cannot disguise.
///
/// Tokenizes with shlex (removing quotes), strips env assignments and
/// launcher commands, merges split short flags and joins with single spaces.
pub fn canonical_segment(segment: &str, launchers: &[String]) -> String {
    let words = tokenize(segment);
    let stripped = strip_launchers(&words, launchers);
    merge_short_flags(stripped).join(" ")
}

/// Words of a segment that name a filesystem location.
///
/// Covers bare paths (`../.ssh/id_rsa`, `/etc/shadow`, `~/.aws`) and the
/// value half of `--opt=/path` words.
pub fn path_words(segment: &str) -> Vec<String> {
    tokenize(segment)
        .into_iter()
        .skip(1)
        .filter_map(|w| {
            let candidate = match w.split_once('=') {
                Some((key, value)) if key.starts_with('-') || is_env_assignment(&w) => {
                    value.to_string()
                }
                _ => w,
            };
            let pathy = candidate.contains('/')
                || candidate == "~"
                || (candidate.starts_with('.') && candidate.len() > 1);
            pathy.then_some(candidate)
        })
        .collect()
}
