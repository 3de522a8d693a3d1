use serde::{Deserialize, Serialize};

use crate::text::clip;

/// Tools that write to a file given by `input.file_path`.
pub const FILE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Tools that modify an existing file in place (counted for struggle detection).
pub const EDIT_TOOLS: &[&str] = &["Edit", "MultiEdit"];

/// Input keys worth keeping when rendering a non-file tool invocation.
const KEY_PARAMS: &[&str] = &["command", "file_path", "path", "paths", "pattern", "query"];

/// Max bytes of a file-tool input kept in the rendered view.
const FILE_TOOL_SNIPPET: usize = 200;

/// Max lines of a tool result kept in the rendered view.
const TOOL_RESULT_LINES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of an event's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    ToolUse { name: String, input: serde_json::Value },
    ToolResult { output: String },
}

/// A file written by a tool invocation inside an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTouch<'a> {
    pub tool: &'a str,
    pub path: &'a str,
    /// Text segments preceding the invocation within the same event.
    pub preceding_text: String,
}

/// A single user/assistant turn read from the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub role: Role,
    #[serde(default)]
    pub timestamp: String,
    pub segments: Vec<Segment>,
}

impl Event {
    pub fn new(role: Role, timestamp: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            role,
            timestamp: timestamp.into(),
            segments,
        }
    }

    /// Only the prose written by the user/assistant (no tool traffic).
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Compact text view of the whole event, tool traffic included.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            match seg {
                Segment::Text { text } => parts.push(text.clone()),
                Segment::ToolUse { name, input } => {
                    parts.push(format!("[TOOL USE {name}] {}", render_tool_input(name, input)));
                }
                Segment::ToolResult { output } => {
                    let kept: Vec<&str> = output.lines().take(TOOL_RESULT_LINES).collect();
                    parts.push(format!("[TOOL RESULT] {}", kept.join("\n")));
                }
            }
        }
        parts.join("\n").trim().to_string()
    }

    /// Prose plus tool output, without tool inputs. Errors are detected on this.
    pub fn observed_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Text { text } => parts.push(text.clone()),
                Segment::ToolResult { output } => {
                    let kept: Vec<&str> = output.lines().take(TOOL_RESULT_LINES).collect();
                    parts.push(format!("[TOOL RESULT] {}", kept.join("\n")));
                }
                Segment::ToolUse { .. } => {}
            }
        }
        parts.join("\n").trim().to_string()
    }

    /// Names of the tools invoked in this event, in order.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolUse { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Every file-writing tool invocation, with the prose that led up to it.
    pub fn file_touches(&self) -> Vec<FileTouch<'_>> {
        let mut touches = Vec::new();
        let mut preceding: Vec<&str> = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Text { text } => preceding.push(text),
                Segment::ToolUse { name, input } if FILE_TOOLS.contains(&name.as_str()) => {
                    let path = input
                        .get("file_path")
                        .or_else(|| input.get("notebook_path"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    if !path.is_empty() {
                        touches.push(FileTouch {
                            tool: name,
                            path,
                            preceding_text: preceding.join("\n"),
                        });
                    }
                }
                _ => {}
            }
        }
        touches
    }

    /// Shell commands run through the Bash tool in this event.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolUse { name, input } if name == "Bash" => {
                input.get("command").and_then(|c| c.as_str())
            }
            _ => None,
        })
    }

    /// True when the event runs a non-amend `git commit`.
    pub fn commits(&self) -> bool {
        self.commands()
            .any(|c| c.contains("git commit") && !c.contains("--amend"))
    }
}

fn render_tool_input(name: &str, input: &serde_json::Value) -> String {
    if FILE_TOOLS.contains(&name) {
        let full = serde_json::to_string(input).unwrap_or_default();
        return clip(&full, FILE_TOOL_SNIPPET).to_string();
    }
    let Some(obj) = input.as_object() else {
        return String::new();
    };
    let kept: serde_json::Map<String, serde_json::Value> = obj
        .iter()
        .filter(|(k, _)| KEY_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::to_string(&kept).unwrap_or_default()
}
