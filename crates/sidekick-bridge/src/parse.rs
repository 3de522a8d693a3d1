use std::path::PathBuf;

use serde_json::Value;

/// The fields of a host callback the bridge acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInput {
    pub event: String,
    pub cwd: PathBuf,
    pub transcript_path: Option<PathBuf>,
    pub tool_name: String,
}

impl HookInput {
    /// Parse the stdin JSON of a hook callback. An empty `cwd` resolves to the
    /// process working directory.
    pub fn parse(stdin: &str) -> anyhow::Result<Self> {
        let raw: Value = serde_json::from_str(stdin)?;
        let cwd = match get_str(&raw, "cwd") {
            s if s.is_empty() => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            s => PathBuf::from(s),
        };
        let transcript = get_str(&raw, "transcript_path");
        Ok(Self {
            event: get_str(&raw, "hook_event_name"),
            cwd,
            transcript_path: (!transcript.is_empty()).then(|| PathBuf::from(transcript)),
            tool_name: get_str(&raw, "tool_name"),
        })
    }
}

/// Get a string field, trying snake_case first then camelCase.
pub(crate) fn get_str(v: &Value, snake_key: &str) -> String {
    if let Some(s) = v.get(snake_key).and_then(Value::as_str) {
        return s.to_string();
    }
    v.get(snake_to_camel(snake_key))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

pub(crate) fn snake_to_camel(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_input() {
        let input = HookInput::parse(
            r#"{"hook_event_name":"PostToolUse","cwd":"/work/app","transcript_path":"/t/s.jsonl","tool_name":"Edit"}"#,
        )
        .unwrap();
        assert_eq!(input.event, "PostToolUse");
        assert_eq!(input.cwd, PathBuf::from("/work/app"));
        assert_eq!(input.transcript_path, Some(PathBuf::from("/t/s.jsonl")));
        assert_eq!(input.tool_name, "Edit");
    }

    #[test]
    fn camel_case_input() {
        let input = HookInput::parse(r#"{"hookEventName":"PreToolUse","cwd":"/w","transcriptPath":""}"#).unwrap();
        assert_eq!(input.event, "PreToolUse");
        assert!(input.transcript_path.is_none());
    }

    #[test]
    fn missing_cwd_uses_process_dir() {
        let input = HookInput::parse(r#"{"hook_event_name":"Stop"}"#).unwrap();
        assert!(!input.cwd.as_os_str().is_empty());
    }

    #[test]
    fn invalid_json_is_error() {
        assert!(HookInput::parse("not json").is_err());
    }

    #[test]
    fn snake_to_camel_cases() {
        assert_eq!(snake_to_camel("hook_event_name"), "hookEventName");
        assert_eq!(snake_to_camel("cwd"), "cwd");
    }
}
