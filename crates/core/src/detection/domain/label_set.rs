use std::fs;
use std::path::Path;

use super::detection_error::DetectionError;

/// Fixed, ordered class-label table of one detection model.
///
/// Index `i` of the model's class output maps to `names()[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new(names: Vec<String>) -> Result<Self, DetectionError> {
        if let Some(pos) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(DetectionError::Labels(format!("label {pos} is empty")));
        }
        Ok(Self { names })
    }

    /// `class_0 .. class_{n-1}`, used when a model ships no names.
    pub fn numbered(count: usize) -> Self {
        Self {
            names: (0..count).map(fallback_name).collect(),
        }
    }

    /// Reads one label per line; blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self, DetectionError> {
        let text = fs::read_to_string(path)
            .map_err(|e| DetectionError::Labels(format!("{}: {e}", path.display())))?;
        let names: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(DetectionError::Labels(format!(
                "{} contains no labels",
                path.display()
            )));
        }
        Self::new(names)
    }

    /// Parses the Ultralytics `names` metadata entry, a Python dict literal
    /// such as `{0: 'person', 1: 'bicycle'}`.
    ///
    /// Indices may appear in any order but must form `0..n` without gaps.
    pub fn from_ultralytics_metadata(raw: &str) -> Result<Self, DetectionError> {
        let body = raw
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| DetectionError::Labels(format!("not a dict literal: {raw}")))?;

        let mut entries: Vec<(usize, String)> = Vec::new();
        let mut rest = body.trim();
        while !rest.is_empty() {
            let (key, after_key) = rest
                .split_once(':')
                .ok_or_else(|| DetectionError::Labels(format!("missing ':' in {rest}")))?;
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| DetectionError::Labels(format!("bad class index '{}'", key.trim())))?;

            let value = after_key.trim_start();
            let quote = value
                .chars()
                .next()
                .filter(|c| *c == '\'' || *c == '"')
                .ok_or_else(|| DetectionError::Labels(format!("unquoted label for {index}")))?;
            let inner = &value[1..];
            let end = inner
                .find(quote)
                .ok_or_else(|| DetectionError::Labels(format!("unterminated label for {index}")))?;
            entries.push((index, inner[..end].to_string()));

            rest = inner[end + 1..].trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        entries.sort_by_key(|(i, _)| *i);
        for (expected, (index, _)) in entries.iter().enumerate() {
            if *index != expected {
                return Err(DetectionError::Labels(format!(
                    "class indices are not contiguous: expected {expected}, found {index}"
                )));
            }
        }
        Self::new(entries.into_iter().map(|(_, name)| name).collect())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name for a class index; indices outside the table get `class_<i>`.
    pub fn name(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| fallback_name(index))
    }
}

fn fallback_name(index: usize) -> String {
    format!("class_{index}")
}
