//! Scrubbing of transcript text before it leaves the machine.

use std::sync::LazyLock;

use regex::Regex;

/// Credential shapes and their placeholders, applied in order.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // sk-..., sk-ant-..., sk-proj-...
        (
            Regex::new(r"\bsk-[a-zA-Z0-9_-]{20,}").unwrap(),
            "[REDACTED_API_KEY]",
        ),
        (
            Regex::new(r"\b(?:gh[pousr]_[a-zA-Z0-9]{36,}|github_pat_[a-zA-Z0-9_]{22,})").unwrap(),
            "[REDACTED_GITHUB_TOKEN]",
        ),
        (
            Regex::new(r"\bglpat-[a-zA-Z0-9\-]{20,}").unwrap(),
            "[REDACTED_GITLAB_TOKEN]",
        ),
        (
            Regex::new(r"\bxox[abposr]-[a-zA-Z0-9-]{10,}").unwrap(),
            "[REDACTED_SLACK_TOKEN]",
        ),
        (
            Regex::new(r"\bAKIA[A-Z0-9]{16}\b").unwrap(),
            "[REDACTED_AWS_KEY]",
        ),
        (
            Regex::new(r"(?i)(Bearer\s+)[a-zA-Z0-9._\-]{20,}").unwrap(),
            "${1}[REDACTED_BEARER]",
        ),
        // KEY=value assignments of sensitive-looking variables, with or without `export`.
        (
            Regex::new(r"(?mi)^(\s*(?:export\s+)?\w*(?:KEY|SECRET|TOKEN|PASSWORD|CREDENTIAL)\w*\s*=\s*)\S+")
                .unwrap(),
            "${1}[REDACTED]",
        ),
    ]
});

/// `uuid: 1f0e-...`, `request_id=abc123`, `trace_id: ...` pairs.
static ID_PAIRS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(uuid|request_id|trace_id)\b[:=]\s*[a-f0-9-]+").unwrap());

/// ANSI color escapes.
static ANSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Replace known credential shapes with `[REDACTED_*]` placeholders.
pub fn redact_secrets(input: &str) -> String {
    let mut output = input.to_string();
    for (pat, replacement) in SECRET_PATTERNS.iter() {
        output = pat.replace_all(&output, *replacement).into_owned();
    }
    output
}

/// Drop identifier pairs and terminal color codes; they carry no signal
/// and make otherwise identical context differ between passes.
pub fn strip_noise(input: &str) -> String {
    let without_ids = ID_PAIRS.replace_all(input, "");
    ANSI.replace_all(&without_ids, "").into_owned()
}

/// Noise stripping followed by secret redaction.
pub fn scrub(input: &str) -> String {
    redact_secrets(&strip_noise(input))
}
