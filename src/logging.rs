//! Side-channel diagnostics and the append-only audit logs.
//!
//! Nothing here ever writes to stdout; stdout carries the decision payload.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

/// Environment variable holding the diagnostic log level.
pub const LEVEL_ENV: &str = "POLICYGATE_LOG";

const DIAGNOSTIC_FILE: &str = "policygate.log";

/// `~/.local/share/cc-policygate`, if the home directory is known.
pub fn data_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").filter(|h| !h.is_empty())?;
    Some(Path::new(&home).join(".local/share/cc-policygate"))
}

fn level_from_env() -> LevelFilter {
    std::env::var(LEVEL_ENV)
        .ok()
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the global logger: the diagnostic file under [`data_dir`], or
/// stderr if that cannot be opened. Calling it twice is harmless.
pub fn init() {
    let level = level_from_env();
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let file = data_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(DIAGNOSTIC_FILE))
            .ok()
    });

    let _ = match file {
        Some(file) => WriteLogger::init(level, config, file),
        None => WriteLogger::init(level, config, std::io::stderr()),
    };
}

/// Append one line to `dir/name`, creating both as needed.
pub fn append_line(dir: &Path, name: &str, line: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))?;
    writeln!(file, "{line}")
}

/// Make a value safe for one tab-separated field, capped at `max` chars.
pub fn field(value: &str, max: usize) -> String {
    value
        .chars()
        .take(max)
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn timestamp_now() -> String {
    format_timestamp(unix_now())
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn format_timestamp(secs: u64) -> String {
    let days = secs / 86400;
    let rem = secs % 86400;
    let (year, month, day) = epoch_days_to_date(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since the Unix epoch to (year, month, day), proleptic Gregorian.
fn epoch_days_to_date(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + u64::from(m <= 2);
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_start() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn leap_day() {
        // 2024-02-29T12:34:56Z
        assert_eq!(format_timestamp(1_709_210_096), "2024-02-29T12:34:56Z");
    }

    #[test]
    fn year_boundary() {
        assert_eq!(format_timestamp(1_735_689_599), "2024-12-31T23:59:59Z");
        assert_eq!(format_timestamp(1_735_689_600), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn field_flattens_and_truncates() {
        assert_eq!(field("a\tb\nc", 100), "a b c");
        assert_eq!(field("abcdef", 3), "abc");
    }

    #[test]
    fn append_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("x/y");
        append_line(&nested, "t.log", "one").unwrap();
        append_line(&nested, "t.log", "two").unwrap();
        let content = std::fs::read_to_string(nested.join("t.log")).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }
}
