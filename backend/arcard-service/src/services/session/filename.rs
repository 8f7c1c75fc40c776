use crate::models::{AssetKind, RESERVED_NAMES};
use std::collections::HashSet;

const MAX_FILE_NAME_LEN: usize = 100;

/// Reduce an untrusted client file name to a safe single path component.
///
/// The result contains only `[A-Za-z0-9._-]`, never `..`, never starts
/// with `.` or `-`, and is at most 100 characters. It may be empty.
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");

    let mut cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    let trimmed = cleaned.trim_start_matches(|c| c == '.' || c == '-');
    truncate_keeping_extension(trimmed, MAX_FILE_NAME_LEN)
}

// Input is ASCII, so byte offsets are char boundaries.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < max => {
            let ext = &name[dot..];
            let stem = &name[..max - ext.len()];
            format!("{}{}", stem.trim_end_matches('.'), ext)
        }
        _ => name[..max].to_string(),
    }
}

/// Assigns distinct safe names to the files of one session directory.
///
/// Derived artifact names are taken up front, so an uploaded file can never
/// overwrite one of them. Comparison ignores case.
#[derive(Debug)]
pub struct FileNamePlanner {
    taken: HashSet<String>,
}

impl Default for FileNamePlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileNamePlanner {
    pub fn new() -> Self {
        Self {
            taken: RESERVED_NAMES.iter().map(|n| n.to_ascii_lowercase()).collect(),
        }
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&name.to_ascii_lowercase())
    }

    /// Sanitize `raw` for `kind` and reserve the result
    pub fn claim(&mut self, kind: AssetKind, raw: Option<&str>) -> String {
        let mut name = raw.map(sanitize_file_name).unwrap_or_default();
        if name.is_empty() {
            name = kind.default_file_name().to_string();
        }

        if self.is_taken(&name) {
            let base = name;
            name = truncate_keeping_extension(
                &format!("{}-{}", kind.as_str(), base),
                MAX_FILE_NAME_LEN,
            );
            let mut n = 2;
            while self.is_taken(&name) {
                name = truncate_keeping_extension(
                    &format!("{}-{}-{}", kind.as_str(), n, base),
                    MAX_FILE_NAME_LEN,
                );
                n += 1;
            }
        }

        self.taken.insert(name.to_ascii_lowercase());
        name
    }
}
