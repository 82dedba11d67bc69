//! Source file parsing and text extraction.

use orgmem_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Code,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("rs") | Some("py") | Some("js") | Some("ts") | Some("go") | Some("c")
            | Some("cpp") | Some("java") | Some("sh") | Some("yaml") | Some("yml")
            | Some("json") | Some("toml") => Self::Code,
            Some("txt") | Some("text") | Some("rst") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Code => "code",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Read a source file and extract clean text.
///
/// Fails with `AppError::Knowledge` for unreadable, non-UTF-8 or binary files.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    parse_text(ContentType::from_path(path), raw)
        .ok_or_else(|| AppError::Knowledge(format!("Binary file not supported: {:?}", path)))
}

/// Clean already-loaded content. `None` when it looks binary.
pub fn parse_text(content_type: ContentType, raw: String) -> Option<String> {
    let cleaned = match content_type {
        ContentType::Markdown => clean_markdown(&raw),
        ContentType::Html => clean_html(&raw),
        ContentType::Code => clean_code(&raw),
        ContentType::PlainText => raw,
        ContentType::Unknown if is_likely_text(&raw) => raw,
        ContentType::Unknown => return None,
    };
    Some(cleaned)
}

/// Drop heading markers, rules and code fences.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Strip tags along with script and style bodies, then collapse whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skipping: Option<&str> = None;

    for (i, ch) in text.char_indices() {
        let rest = &text[i..];
        match ch {
            '<' => {
                in_tag = true;
                if let Some(tag) = skipping {
                    if starts_with_ignore_case(rest, &format!("</{}", tag)) {
                        skipping = None;
                    }
                } else if starts_with_ignore_case(rest, "<script") {
                    skipping = Some("script");
                } else if starts_with_ignore_case(rest, "<style") {
                    skipping = Some("style");
                }
            }
            '>' if in_tag => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag && skipping.is_none() => result.push(ch),
            _ => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Drop blank lines and whole-line comments.
fn clean_code(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}
