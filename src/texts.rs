use std::path::Path;

use crate::error::{ComposeError, Result};

/// One text block and its 0-based position in the caller's sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub index: usize,
    pub text: String,
}

pub fn entries_from<I, S>(texts: I) -> Vec<TextEntry>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextEntry {
            index,
            text: text.into(),
        })
        .collect()
}

/// Loads an ordered text sequence.
///
/// `.json` files hold an array of strings. Any other file holds one entry per
/// line, where a literal `\n` marks a line break inside the entry.
pub fn load_texts(path: &Path) -> Result<Vec<TextEntry>> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        ComposeError::Resource(format!("failed to read texts {}: {}", path.display(), err))
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let raw: Vec<String> = if is_json {
        serde_json::from_str(&content).map_err(|err| {
            ComposeError::Validation(format!(
                "failed to parse texts {}: {}",
                path.display(),
                err
            ))
        })?
    } else {
        content
            .lines()
            .map(|line| line.replace("\\n", "\n"))
            .collect()
    };
    let texts: Vec<String> = raw
        .iter()
        .map(|text| normalize_entry(text))
        .filter(|text| !text.trim().is_empty())
        .collect();
    if texts.is_empty() {
        return Err(ComposeError::Validation(format!(
            "no texts found in {}",
            path.display()
        )));
    }
    Ok(entries_from(texts))
}

/// Trims surrounding spaces and tabs while keeping embedded line breaks.
pub fn normalize_entry(text: &str) -> String {
    text.trim_matches(|ch| ch == ' ' || ch == '\t').to_string()
}
