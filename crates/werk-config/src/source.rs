//! Raw key/value input for configuration resolution.
//!
//! [`EnvSource`] is a snapshot of environment-style settings. Resolution
//! never reads the process environment directly, so tests can build any
//! configuration from literal pairs.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, Result};

/// Snapshot of environment-style `KEY=VALUE` settings.
///
/// Keys are case-insensitive and stored upper-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSource {
    vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from literal pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut source = Self::new();
        for (key, value) in pairs {
            source.set(key.as_ref(), value);
        }
        source
    }

    /// Snapshot the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Set a value, replacing any existing one.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.trim().to_uppercase(), value.into());
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(&key.to_uppercase()).map(String::as_str)
    }

    /// Whether the source has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over entries whose key starts with `prefix`, yielding the
    /// remainder of the key.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        let prefix = prefix.to_uppercase();
        self.vars.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix.as_str())
                .map(|rest| (rest, value.as_str()))
        })
    }

    /// Apply a `KEY=VALUE` override, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] when there is no `=` or the
    /// key is empty.
    pub fn apply_override(&mut self, raw: &str) -> Result<()> {
        let (key, value) = parse_assignment(raw).ok_or_else(|| ConfigError::InvalidOverride {
            raw: raw.to_string(),
        })?;
        self.set(key, value);
        Ok(())
    }

    /// Merge entries from a dotenv-style file.
    ///
    /// Existing entries win over the file. A missing file is not an error.
    /// Returns the number of entries taken from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn merge_env_file(&mut self, path: &Path) -> Result<usize> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "env file not present");
                return Ok(0);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut merged = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = parse_assignment(line) else {
                debug!(path = %path.display(), line, "skipping malformed env file line");
                continue;
            };
            if self.get(key).is_none() {
                self.set(key, unquote(value));
                merged += 1;
            }
        }
        debug!(path = %path.display(), merged, "merged env file");
        Ok(merged)
    }
}

fn parse_assignment(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let source = EnvSource::from_pairs([("mw_domain", "example.com")]);
        assert_eq!(source.get("MW_DOMAIN"), Some("example.com"));
        assert_eq!(source.get("mw_domain"), Some("example.com"));
    }

    #[test]
    fn with_prefix_strips_prefix() {
        let source = EnvSource::from_pairs([
            ("MW_FAKE__API_PORT", "4626"),
            ("MW_TAK__API_HOST", "takapi"),
            ("OTHER", "x"),
        ]);
        let mut found: Vec<_> = source.with_prefix("MW_").collect();
        found.sort_unstable();
        assert_eq!(found, vec![("FAKE__API_PORT", "4626"), ("TAK__API_HOST", "takapi")]);
    }

    #[test]
    fn override_replaces_value() {
        let mut source = EnvSource::from_pairs([("MW_DOMAIN", "old.example.com")]);
        source.apply_override("MW_DOMAIN=new.example.com").unwrap();
        assert_eq!(source.get("MW_DOMAIN"), Some("new.example.com"));
    }

    #[test]
    fn override_keeps_equals_in_value() {
        let mut source = EnvSource::new();
        source.apply_override("MW_FAKE__API_BASE=/a=b").unwrap();
        assert_eq!(source.get("MW_FAKE__API_BASE"), Some("/a=b"));
    }

    #[test]
    fn override_requires_assignment() {
        let mut source = EnvSource::new();
        assert!(matches!(
            source.apply_override("MW_DOMAIN"),
            Err(ConfigError::InvalidOverride { .. })
        ));
        assert!(source.apply_override("=value").is_err());
    }

    #[test]
    fn env_file_fills_missing_keys_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# comment\n\nMW_DOMAIN=file.example.com\nexport MW_LE_EMAIL=\"ops@example.com\"\nMW_SUBDOMAINS='mtls'\nnot a line\n",
        )
        .unwrap();

        let mut source = EnvSource::from_pairs([("MW_DOMAIN", "env.example.com")]);
        let merged = source.merge_env_file(&path).unwrap();

        assert_eq!(merged, 2);
        assert_eq!(source.get("MW_DOMAIN"), Some("env.example.com"));
        assert_eq!(source.get("MW_LE_EMAIL"), Some("ops@example.com"));
        assert_eq!(source.get("MW_SUBDOMAINS"), Some("mtls"));
    }

    #[test]
    fn missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = EnvSource::new();
        assert_eq!(source.merge_env_file(&dir.path().join("absent.env")).unwrap(), 0);
        assert!(source.is_empty());
    }
}
