//! Subcommand implementations.

pub mod configure;
pub mod copy;
pub mod debate;
pub mod history;
pub mod providers;
pub mod show;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use mars_runtime::output::reader::find_debates;

/// Resolve an `@file` token to file contents; anything else passes
/// through unchanged.
pub fn resolve_value(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            let content =
                fs::read_to_string(path).with_context(|| format!("File not found: {path}"))?;
            Ok(content.trim().to_string())
        }
        None => Ok(value.to_string()),
    }
}

/// Pick the debate directory to operate on: an explicit path, or the
/// most recent debate under `output_dir`.
pub fn resolve_debate(debate: Option<&str>, output_dir: &str) -> Result<PathBuf> {
    match debate {
        Some(path) => {
            let dir = PathBuf::from(path);
            if !dir.is_dir() {
                bail!("Debate directory not found: {path}");
            }
            Ok(dir)
        }
        None => find_debates(output_dir)
            .into_iter()
            .next()
            .with_context(|| format!("No debates found in {output_dir}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_value_passthrough() {
        assert_eq!(resolve_value("plain text").unwrap(), "plain text");
    }

    #[test]
    fn test_resolve_value_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  file contents  ").unwrap();
        let token = format!("@{}", file.path().display());
        assert_eq!(resolve_value(&token).unwrap(), "file contents");
    }

    #[test]
    fn test_resolve_value_missing_file() {
        let err = resolve_value("@/no/such/file").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_resolve_debate_explicit_path_must_exist() {
        let err = resolve_debate(Some("/no/such/debate"), ".").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
