use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::segment::Page;

const EDGE_LINE_MIN_REPEATS: usize = 3;
const EDGE_LINE_MAX_LEN: usize = 120;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    pub page_count: usize,
    pub empty_page_count: usize,
    pub header_lines_removed: usize,
    pub footer_lines_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedPages {
    pub pages: Vec<Page>,
    pub stats: ExtractionStats,
}

pub fn extract_pages_with_pdftotext(
    pdf_path: &Path,
    max_pages: Option<usize>,
    strip_repeated_edges: bool,
) -> Result<ExtractedPages> {
    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut extracted = ExtractedPages {
        pages: split_form_feed_pages(&raw),
        ..ExtractedPages::default()
    };
    if strip_repeated_edges {
        strip_repeated_edge_lines(&mut extracted);
    }
    refresh_page_counts(&mut extracted);

    Ok(extracted)
}

pub fn load_pages_json(path: &Path) -> Result<ExtractedPages> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pages: Vec<Page> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse page json {}", path.display()))?;

    if let Some(page) = pages.iter().find(|page| page.page_number == 0) {
        bail!(
            "page numbers must start at 1 in {} (found page {} with {} chars)",
            path.display(),
            page.page_number,
            page.text.len()
        );
    }

    let mut extracted = ExtractedPages {
        pages,
        ..ExtractedPages::default()
    };
    refresh_page_counts(&mut extracted);
    Ok(extracted)
}

// pdftotext ends with a form feed, leaving an empty last page.
pub(crate) fn split_form_feed_pages(raw: &str) -> Vec<Page> {
    let mut texts = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect::<Vec<String>>();

    while let Some(last_page) = texts.last() {
        if last_page.trim().is_empty() {
            texts.pop();
            continue;
        }
        break;
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page::new((index + 1) as u32, text))
        .collect()
}

pub(crate) fn strip_repeated_edge_lines(extracted: &mut ExtractedPages) {
    let header_candidates = detect_repeated_edge_lines(&extracted.pages, true);
    let footer_candidates = detect_repeated_edge_lines(&extracted.pages, false);

    for page in &mut extracted.pages {
        let mut lines = page.text.lines().collect::<Vec<&str>>();

        if let Some(index) = lines.iter().position(|line| !line.trim().is_empty()) {
            if header_candidates.contains(&normalize_edge_line(lines[index])) {
                lines.remove(index);
                extracted.stats.header_lines_removed += 1;
            }
        }

        if let Some(index) = lines.iter().rposition(|line| !line.trim().is_empty()) {
            if footer_candidates.contains(&normalize_edge_line(lines[index])) {
                lines.remove(index);
                extracted.stats.footer_lines_removed += 1;
            }
        }

        page.text = lines.join("\n");
    }
}

fn detect_repeated_edge_lines(pages: &[Page], header: bool) -> HashSet<String> {
    let mut counts = HashMap::<String, usize>::new();
    for page in pages {
        let mut lines = page.text.lines().map(str::trim);
        let candidate = if header {
            lines.find(|line| !line.is_empty())
        } else {
            lines.rev().find(|line| !line.is_empty())
        };

        let Some(candidate) = candidate else {
            continue;
        };

        let normalized = normalize_edge_line(candidate);
        if normalized.is_empty() || normalized.len() > EDGE_LINE_MAX_LEN {
            continue;
        }
        *counts.entry(normalized).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter_map(|(candidate, count)| {
            (count >= EDGE_LINE_MIN_REPEATS).then_some(candidate)
        })
        .collect()
}

fn normalize_edge_line(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn refresh_page_counts(extracted: &mut ExtractedPages) {
    extracted.stats.page_count = extracted.pages.len();
    extracted.stats.empty_page_count = extracted
        .pages
        .iter()
        .filter(|page| page.text.trim().is_empty())
        .count();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_form_feed_pages_numbers_from_one_and_drops_trailing_blanks() {
        let raw = "first\u{0000} page\u{000C}second page\u{000C}\n\u{000C}  ";

        let pages = split_form_feed_pages(raw);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], Page::new(1, "first page"));
        assert_eq!(pages[1], Page::new(2, "second page"));
    }

    #[test]
    fn repeated_footers_are_stripped_from_every_page() {
        let mut extracted = ExtractedPages {
            pages: vec![
                Page::new(1, "Alpha body\nH.B. No. 2"),
                Page::new(2, "Beta body\nH.B. No. 2\n"),
                Page::new(3, "Gamma body\n  H.B.  No. 2  "),
                Page::new(4, "Delta body\nunique footer"),
            ],
            ..ExtractedPages::default()
        };

        strip_repeated_edge_lines(&mut extracted);

        assert_eq!(extracted.pages[0].text, "Alpha body");
        assert_eq!(extracted.pages[1].text, "Beta body");
        assert_eq!(extracted.pages[2].text, "Gamma body");
        assert_eq!(extracted.pages[3].text, "Delta body\nunique footer");
        assert_eq!(extracted.stats.footer_lines_removed, 3);
        assert_eq!(extracted.stats.header_lines_removed, 0);
    }

    #[test]
    fn load_pages_json_rejects_page_zero() {
        let path = std::env::temp_dir().join(format!("legiseg-pages-{}.json", std::process::id()));
        fs::write(&path, r#"[{"page_number":0,"text":"cover"}]"#).expect("write pages");

        let err = load_pages_json(&path).expect_err("page zero must fail");
        assert!(err.to_string().contains("must start at 1"));

        fs::remove_file(&path).ok();
    }
}
