mod cleaner;
mod matcher;
mod pages;
mod resolver;
#[cfg(test)]
mod tests;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::SegmenterConfig;

pub use cleaner::TextCleaner;
pub(crate) use matcher::collapse_whitespace;
pub use matcher::{ContentBoundary, StructureMatcher};
pub use pages::{Page, aggregate_pages};
pub use resolver::{ResolveContext, resolve_chunks};

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Preamble,
    PrincipleIntroduction,
    Principle,
    Resolution,
    Plank,
    Caption,
    Section,
}

impl ChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Preamble => "preamble",
            ChunkType::PrincipleIntroduction => "principle_introduction",
            ChunkType::Principle => "principle",
            ChunkType::Resolution => "resolution",
            ChunkType::Plank => "plank",
            ChunkType::Caption => "caption",
            ChunkType::Section => "section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub main_section: String,
    pub sub_section: String,
    pub title: String,
    pub number: String,
    pub page_number: u32,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Raw byte range of one chunk candidate, recorded before the length filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
    pub emitted: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentReport {
    pub page_count: usize,
    pub text_len: usize,
    pub boundary: Option<ContentBoundary>,
    pub main_heading_count: usize,
    pub sub_heading_count: usize,
    pub entry_count: usize,
    pub chunk_count: usize,
    pub short_spans_dropped: usize,
    pub entries_without_sub_section: usize,
    pub special_chunks_skipped: usize,
    pub spans: Vec<ChunkSpan>,
    pub warnings: Vec<String>,
}

impl SegmentReport {
    pub(crate) fn warn(&mut self, message: String) {
        warn!(warning = %message, "segmentation warning");
        self.warnings.push(message);
    }

    pub(crate) fn record_span(&mut self, start: usize, end: usize, emitted: bool) {
        self.spans.push(ChunkSpan {
            start,
            end,
            emitted,
        });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Segmentation {
    pub chunks: Vec<DocumentChunk>,
    pub report: SegmentReport,
}

#[derive(Debug)]
pub struct Segmenter {
    config: SegmenterConfig,
    matcher: StructureMatcher,
    cleaner: TextCleaner,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        let matcher = StructureMatcher::new(&config)?;
        let cleaner = TextCleaner::new()?;
        Ok(Self {
            config,
            matcher,
            cleaner,
        })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn segment(&self, pages: &[Page], source: &str) -> Segmentation {
        let mut report = SegmentReport {
            page_count: pages.len(),
            ..SegmentReport::default()
        };

        let aggregated = aggregate_pages(pages);
        report.text_len = aggregated.text.len();
        if pages.is_empty() {
            report.warn(format!("no pages supplied for {source}"));
        }

        let boundary = match &self.config.boundary {
            Some(markers) => {
                let (boundary, warning) = ContentBoundary::locate(&aggregated.text, markers);
                if let Some(warning) = warning {
                    report.warn(warning);
                }
                boundary
            }
            None => ContentBoundary::whole(&aggregated.text),
        };
        report.boundary = Some(boundary);

        let matches = self.matcher.scan(&aggregated.text, boundary);
        report.main_heading_count = matches.main_headings.len();
        report.sub_heading_count = matches.sub_headings.len();
        report.entry_count = matches.entries.len();

        let context = ResolveContext {
            text: &aggregated.text,
            offsets: &aggregated.offsets,
            boundary,
            matches: &matches,
            family: self.config.family,
            min_chunk_chars: self.config.min_chunk_chars,
            source,
            cleaner: &self.cleaner,
        };
        let chunks = resolve_chunks(&context, &mut report);
        report.chunk_count = chunks.len();

        info!(
            source = %source,
            family = self.config.family.as_str(),
            pages = report.page_count,
            main_headings = report.main_heading_count,
            sub_headings = report.sub_heading_count,
            entries = report.entry_count,
            chunks = report.chunk_count,
            dropped = report.short_spans_dropped,
            "segmented document"
        );

        Segmentation { chunks, report }
    }
}
