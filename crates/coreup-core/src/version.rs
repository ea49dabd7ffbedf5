use regex::Regex;

/// Pulls the version token out of `<binary> -v` output.
///
/// Uses the channel's pattern first and falls back to the first
/// whitespace-delimited token. Returns an empty string for empty output.
pub fn extract_version(pattern: &str, output: &str) -> String {
    let trimmed = output.trim();
    let matched = Regex::new(pattern)
        .ok()
        .and_then(|matcher| matcher.find(trimmed).map(|found| found.as_str().to_string()));
    if let Some(version) = matched {
        return version;
    }
    trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Result of probing the installed binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalVersion {
    pub version: String,
    /// Full trimmed output of the version probe.
    pub detail: String,
}

impl LocalVersion {
    pub fn from_output(pattern: &str, output: &str) -> Self {
        Self {
            version: extract_version(pattern, output),
            detail: output.trim().to_string(),
        }
    }
}
