//! Loading the submitting user's environment.
//!
//! The grading container dumps the user's login environment with `printenv`
//! into a file; commands run on behalf of the user get exactly that
//! environment instead of the grader's.

use crate::Result;
use std::io::ErrorKind;
use std::path::Path;

/// Environment used when no user dump exists
pub const FALLBACK_ENV: &[(&str, &str)] = &[("PATH", "/usr/local/bin:/usr/bin:/bin")];

/// Parse `printenv` output into ordered `(key, value)` pairs.
///
/// Lines without `=` continue the previous value, since `printenv` prints
/// multi-line values verbatim.
#[must_use]
pub fn parse_printenv(content: &str) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = Vec::new();

    for line in content.lines() {
        match line.split_once('=') {
            Some((key, value)) if !key.is_empty() && !key.contains(char::is_whitespace) => {
                vars.push((key.to_string(), value.to_string()));
            }
            _ => {
                if let Some((_, value)) = vars.last_mut() {
                    value.push('\n');
                    value.push_str(line);
                }
            }
        }
    }

    vars
}

/// Read a `printenv` dump from `path`
pub fn load_user_env(path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(path)?;
    let vars = parse_printenv(&content);
    tracing::debug!(path = %path.display(), count = vars.len(), "loaded user environment");
    Ok(vars)
}

/// Read the user dump at `path`, or [`FALLBACK_ENV`] if there is none
pub fn user_env_or_fallback(path: &Path) -> Result<Vec<(String, String)>> {
    match load_user_env(path) {
        Err(crate::RefUtilsError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "no user environment dump, using fallback");
            Ok(FALLBACK_ENV
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_simple_pairs() {
        let vars = parse_printenv("HOME=/home/user\nPATH=/usr/bin:/bin\nEMPTY=\n");
        assert_eq!(
            vars,
            vec![
                ("HOME".into(), "/home/user".into()),
                ("PATH".into(), "/usr/bin:/bin".into()),
                ("EMPTY".into(), String::new()),
            ]
        );
    }

    #[test]
    fn values_may_contain_equals_and_newlines() {
        let vars = parse_printenv("OPTS=a=b\nMULTI=line one\nline two\nLAST=x\n");
        assert_eq!(vars[0], ("OPTS".into(), "a=b".into()));
        assert_eq!(vars[1], ("MULTI".into(), "line one\nline two".into()));
        assert_eq!(vars[2], ("LAST".into(), "x".into()));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "USER=student").unwrap();
        let vars = load_user_env(file.path()).unwrap();
        assert_eq!(vars, vec![("USER".into(), "student".into())]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_user_env(Path::new("/nonexistent/.user_environ")).is_err());
    }

    #[test]
    fn missing_dump_uses_fallback() {
        let vars = user_env_or_fallback(Path::new("/nonexistent/.user_environ")).unwrap();
        assert_eq!(vars, vec![("PATH".into(), "/usr/local/bin:/usr/bin:/bin".into())]);
    }

    #[test]
    fn unreadable_dump_is_still_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(user_env_or_fallback(dir.path()).is_err());
    }
}
