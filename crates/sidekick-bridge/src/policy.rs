use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Policy files tried in order, relative to the project root.
const POLICY_FILES: &[&str] = &["CLAUDE.md", ".claude/CLAUDE.md"];

/// First `max_chars` bytes (on a char boundary) of the project policy file,
/// or an empty string when none is readable. Nothing past the excerpt is read.
pub fn policy_excerpt(cwd: &Path, max_chars: usize) -> String {
    for name in POLICY_FILES {
        match read_prefix(&cwd.join(name), max_chars) {
            Ok(excerpt) => return excerpt,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(file = *name, error = %e, "policy file not readable"),
        }
    }
    String::new()
}

fn read_prefix(path: &Path, max: usize) -> io::Result<String> {
    let mut buf = Vec::new();
    File::open(path)?.take(max as u64).read_to_end(&mut buf)?;
    match String::from_utf8(buf) {
        Ok(text) => Ok(text),
        Err(e) => {
            let utf8 = e.utf8_error();
            // Invalid bytes before the cut mean the file is not text.
            if utf8.error_len().is_some() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, utf8));
            }
            let mut bytes = e.into_bytes();
            bytes.truncate(utf8.valid_up_to());
            Ok(String::from_utf8(bytes).unwrap_or_default())
        }
    }
}
