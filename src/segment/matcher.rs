use anyhow::{Context, Result, bail};
use regex::{Captures, Regex, RegexBuilder};
use serde::Serialize;

use crate::config::{BoundaryMarkers, DocumentFamily, SegmenterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentBoundary {
    pub start: usize,
    pub end: usize,
}

impl ContentBoundary {
    pub fn whole(text: &str) -> Self {
        Self {
            start: 0,
            end: text.len(),
        }
    }

    pub fn locate(text: &str, markers: &BoundaryMarkers) -> (Self, Option<String>) {
        let start = text.find(markers.start.as_str());
        let end = text.rfind(markers.end.as_str());

        match (start, end) {
            (Some(start), Some(end)) if start <= end => (Self { start, end }, None),
            (Some(_), Some(_)) => (
                Self::whole(text),
                Some(format!(
                    "boundary marker '{}' follows '{}'; scanning full text",
                    markers.start, markers.end
                )),
            ),
            _ => (
                Self::whole(text),
                Some(format!(
                    "boundary markers '{}'/'{}' not found; scanning full text",
                    markers.start, markers.end
                )),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub position: usize,
    // Section body starts here, past the label.
    pub label_end: usize,
    pub label: String,
    pub ordinal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMatch {
    pub position: usize,
    pub ordinal: String,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct StructureMatches {
    pub main_headings: Vec<HeadingMatch>,
    pub sub_headings: Vec<HeadingMatch>,
    pub entries: Vec<EntryMatch>,
}

#[derive(Debug)]
enum HeadingRule {
    Vocabulary { main: Regex, sub: Option<Regex> },
    // capture 1 is the ordinal, capture 2 the title
    Pattern { main: Regex },
}

#[derive(Debug)]
pub struct StructureMatcher {
    headings: HeadingRule,
    entries: Regex,
}

impl StructureMatcher {
    pub fn new(config: &SegmenterConfig) -> Result<Self> {
        let headings = match config.family {
            DocumentFamily::Platform => {
                let main = vocabulary_regex(&config.main_sections)
                    .context("failed to build main section vocabulary")?
                    .context("main section vocabulary is empty")?;
                let sub = vocabulary_regex(&config.sub_sections)
                    .context("failed to build sub-section vocabulary")?;
                HeadingRule::Vocabulary { main, sub }
            }
            DocumentFamily::Bill => {
                let Some(pattern) = config.heading_pattern.as_deref() else {
                    bail!("bill configuration requires a heading_pattern");
                };
                let main = multi_line_regex(pattern)
                    .with_context(|| format!("failed to compile heading pattern: {pattern}"))?;
                if main.captures_len() < 3 {
                    bail!("heading pattern must capture an ordinal and a title: {pattern}");
                }
                HeadingRule::Pattern { main }
            }
        };

        if config.entry_pattern.trim().is_empty() {
            bail!("entry pattern is empty");
        }
        let entries = multi_line_regex(&config.entry_pattern).with_context(|| {
            format!("failed to compile entry pattern: {}", config.entry_pattern)
        })?;
        if entries.captures_len() < 2 {
            bail!(
                "entry pattern must capture the entry ordinal: {}",
                config.entry_pattern
            );
        }

        Ok(Self { headings, entries })
    }

    pub fn scan(&self, text: &str, boundary: ContentBoundary) -> StructureMatches {
        let mut matches = StructureMatches::default();

        match &self.headings {
            HeadingRule::Vocabulary { main, sub } => {
                matches.main_headings = scan_vocabulary(main, text, boundary);
                if let Some(sub) = sub {
                    matches.sub_headings = scan_vocabulary(sub, text, boundary);
                }
            }
            HeadingRule::Pattern { main } => {
                matches.main_headings = scan_in_bounds(main, text, boundary)
                    .into_iter()
                    .filter_map(|captures| {
                        let whole = captures.get(0)?;
                        let title = captures.get(2).map(|m| m.as_str()).unwrap_or("");
                        Some(HeadingMatch {
                            position: whole.start(),
                            label_end: whole.end(),
                            label: collapse_whitespace(title),
                            ordinal: captures.get(1).map(|m| m.as_str().trim().to_string()),
                        })
                    })
                    .collect();
            }
        }

        matches.entries = scan_in_bounds(&self.entries, text, boundary)
            .into_iter()
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let ordinal = captures.get(1)?.as_str().trim().trim_end_matches('.');
                let title = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
                Some(EntryMatch {
                    position: whole.start(),
                    ordinal: ordinal.to_string(),
                    title: title.to_string(),
                })
            })
            .collect();

        matches.main_headings.sort_by_key(|heading| heading.position);
        matches.sub_headings.sort_by_key(|heading| heading.position);
        matches.entries.sort_by_key(|entry| entry.position);
        matches
    }
}

fn multi_line_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).multi_line(true).build()
}

fn vocabulary_regex(labels: &[String]) -> Result<Option<Regex>> {
    let alternatives = labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(regex::escape)
        .collect::<Vec<String>>();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"^[ \t]*({})[ \t\r]*$", alternatives.join("|"));
    let regex = multi_line_regex(&pattern).context("failed to compile vocabulary regex")?;
    Ok(Some(regex))
}

fn scan_vocabulary(regex: &Regex, text: &str, boundary: ContentBoundary) -> Vec<HeadingMatch> {
    scan_in_bounds(regex, text, boundary)
        .into_iter()
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let label = captures.get(1)?;
            Some(HeadingMatch {
                position: whole.start(),
                label_end: label.end(),
                label: label.as_str().trim().to_string(),
                ordinal: None,
            })
        })
        .collect()
}

/// Matches starting inside `[boundary.start, boundary.end)`. Line anchors keep
/// their meaning relative to the full text rather than the boundary slice.
fn scan_in_bounds<'t>(
    regex: &Regex,
    text: &'t str,
    boundary: ContentBoundary,
) -> Vec<Captures<'t>> {
    let end = boundary.end.min(text.len());
    let haystack = &text[..end];
    let mut found = Vec::new();
    let mut at = boundary.start;

    while at <= haystack.len() {
        let Some(captures) = regex.captures_at(haystack, at) else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };

        let next_at = if whole.end() > whole.start() {
            Some(whole.end())
        } else {
            haystack[whole.end()..]
                .chars()
                .next()
                .map(|next| whole.end() + next.len_utf8())
        };
        found.push(captures);

        match next_at {
            Some(next_at) => at = next_at,
            None => break,
        }
    }

    found
}

pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}
