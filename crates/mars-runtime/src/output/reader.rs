//! Read and query past debate output directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static TIMESTAMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}_").unwrap());
static ROUND_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}-round-\d+-").unwrap());

/// Debate directories under `output_dir`, most recent first.
pub fn find_debates(output_dir: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(output_dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| TIMESTAMP_PATTERN.is_match(n))
        })
        .collect();
    // Directory names sort chronologically.
    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    dirs
}

/// Read a file from a debate directory, `None` if missing.
pub fn read_file(debate_dir: &Path, filename: &str) -> Option<String> {
    fs::read_to_string(debate_dir.join(filename)).ok()
}

/// Human-readable timestamp from a debate directory name.
pub fn extract_timestamp(dirname: &str) -> String {
    let ts = dirname.split('_').next().unwrap_or(dirname);
    ts.replace('T', " ")
}

/// Prompt slug from a debate directory name, de-slugged for display.
pub fn extract_prompt_from_dirname(dirname: &str) -> String {
    match dirname.split_once('_') {
        Some((_, slug)) => slug.replace('-', " "),
        None => dirname.to_string(),
    }
}

/// Provider names parsed from the round-1 response headers.
pub fn parse_providers(debate_dir: &Path) -> Vec<String> {
    let Some(content) = read_file(debate_dir, "audit/01-round-1-responses.md") else {
        return Vec::new();
    };
    let mut providers = Vec::new();
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            if let Some((name, _)) = rest.split_once('(') {
                let name = name.trim().to_string();
                if !name.is_empty() && !providers.contains(&name) {
                    providers.push(name);
                }
            }
        }
    }
    providers
}

/// Number of round files in the audit directory.
pub fn count_rounds(debate_dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(debate_dir.join("audit")) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|e| {
            e.file_name().to_str().is_some_and(|n| ROUND_FILE.is_match(n))
        })
        .count()
}

/// The total cost string out of `costs.md` content, or `"n/a"`.
pub fn parse_costs_total(content: &str) -> String {
    for line in content.lines() {
        if line.starts_with("**Total**") {
            if let Some((_, amount)) = line.split_once('$') {
                return format!("${}", amount.trim());
            }
        }
    }
    "n/a".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_debate(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("audit")).unwrap();
        dir
    }

    #[test]
    fn test_find_debates_sorted_newest_first() {
        let root = TempDir::new().unwrap();
        make_debate(root.path(), "2026-02-16T08-06-45_older-topic");
        make_debate(root.path(), "2026-03-01T10-00-00_newer-topic");
        fs::create_dir_all(root.path().join("not-a-debate")).unwrap();

        let debates = find_debates(root.path().to_str().unwrap());
        assert_eq!(debates.len(), 2);
        assert!(debates[0].file_name().unwrap().to_str().unwrap().contains("newer-topic"));
    }

    #[test]
    fn test_find_debates_missing_dir() {
        assert!(find_debates("/nonexistent/path/for/mars").is_empty());
    }

    #[test]
    fn test_dirname_parsing() {
        let name = "2026-02-16T08-06-45_is-python-better";
        assert_eq!(extract_timestamp(name), "2026-02-16 08-06-45");
        assert_eq!(extract_prompt_from_dirname(name), "is python better");
        assert_eq!(extract_prompt_from_dirname("noslug"), "noslug");
    }

    #[test]
    fn test_parse_providers_from_round_file() {
        let root = TempDir::new().unwrap();
        let dir = make_debate(root.path(), "2026-02-16T08-06-45_topic");
        fs::write(
            dir.join("audit/01-round-1-responses.md"),
            "# Round 1 - Initial Responses\n\n## openai (gpt-4o)\n\nbody\n\n## anthropic (claude)\n\nbody\n",
        )
        .unwrap();

        assert_eq!(parse_providers(&dir), vec!["openai".to_string(), "anthropic".to_string()]);
    }

    #[test]
    fn test_count_rounds() {
        let root = TempDir::new().unwrap();
        let dir = make_debate(root.path(), "2026-02-16T08-06-45_topic");
        fs::write(dir.join("audit/01-round-1-responses.md"), "x").unwrap();
        fs::write(dir.join("audit/02-round-2-critiques.md"), "x").unwrap();
        fs::write(dir.join("audit/convergence.md"), "x").unwrap();
        assert_eq!(count_rounds(&dir), 2);
    }

    #[test]
    fn test_parse_costs_total() {
        let content = "# Cost Summary\n\n**Total**: 1234 tokens | $0.0567";
        assert_eq!(parse_costs_total(content), "$0.0567");
        assert_eq!(parse_costs_total("no totals here"), "n/a");
    }
}
