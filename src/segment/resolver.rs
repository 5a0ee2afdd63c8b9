use crate::config::DocumentFamily;

use super::matcher::{ContentBoundary, HeadingMatch, StructureMatches};
use super::pages::OffsetTable;
use super::{ChunkMetadata, ChunkType, DocumentChunk, NOT_AVAILABLE, SegmentReport, TextCleaner};

const PREAMBLE_HEADING: &str = "Preamble";
const PRINCIPLES_HEADING: &str = "Principles";
const RESOLUTIONS_HEADING: &str = "Resolutions";

#[derive(Debug)]
pub struct ResolveContext<'a> {
    pub text: &'a str,
    pub offsets: &'a OffsetTable,
    pub boundary: ContentBoundary,
    pub matches: &'a StructureMatches,
    pub family: DocumentFamily,
    pub min_chunk_chars: usize,
    pub source: &'a str,
    pub cleaner: &'a TextCleaner,
}

#[derive(Debug, Clone, Copy)]
struct Attribution<'m> {
    main: Option<&'m HeadingMatch>,
    sub: Option<&'m HeadingMatch>,
}

pub fn resolve_chunks(context: &ResolveContext<'_>, report: &mut SegmentReport) -> Vec<DocumentChunk> {
    let mut chunks = match context.family {
        DocumentFamily::Platform => platform_lead_chunks(context, report),
        DocumentFamily::Bill => bill_caption_chunk(context, report).into_iter().collect(),
    };

    let entries = &context.matches.entries;
    for (index, entry) in entries.iter().enumerate() {
        let start = entry.position;
        let end = entries
            .get(index + 1)
            .map(|next| next.position)
            .unwrap_or(context.boundary.end)
            .max(start);

        let span = context.text[start..end].trim();
        if span.chars().count() < context.min_chunk_chars {
            report.short_spans_dropped += 1;
            report.record_span(start, end, false);
            continue;
        }

        let attribution = attribute(context.matches, start);
        let page_number = context.offsets.page_number(start);

        let chunk = match context.family {
            DocumentFamily::Platform => {
                let main_section = label_or_na(attribution.main);
                let chunk_type = match main_section.as_str() {
                    PRINCIPLES_HEADING => ChunkType::Principle,
                    RESOLUTIONS_HEADING => ChunkType::Resolution,
                    _ => ChunkType::Plank,
                };
                let title = match chunk_type {
                    ChunkType::Plank | ChunkType::Resolution => entry_title(&entry.title),
                    _ => NOT_AVAILABLE.to_string(),
                };
                if chunk_type == ChunkType::Plank && attribution.sub.is_none() {
                    report.entries_without_sub_section += 1;
                }

                DocumentChunk {
                    content: flatten_lines(span),
                    metadata: ChunkMetadata {
                        chunk_type,
                        main_section,
                        sub_section: label_or_na(attribution.sub),
                        title,
                        number: entry.ordinal.clone(),
                        page_number,
                        source: context.source.to_string(),
                    },
                }
            }
            DocumentFamily::Bill => {
                let content = context.cleaner.clean(span);
                if content.is_empty() {
                    report.short_spans_dropped += 1;
                    report.record_span(start, end, false);
                    continue;
                }

                DocumentChunk {
                    content,
                    metadata: ChunkMetadata {
                        chunk_type: ChunkType::Section,
                        main_section: ordinal_or_na(attribution.main),
                        sub_section: label_or_na(attribution.main),
                        title: NOT_AVAILABLE.to_string(),
                        number: entry.ordinal.clone(),
                        page_number,
                        source: context.source.to_string(),
                    },
                }
            }
        };

        report.record_span(start, end, true);
        chunks.push(chunk);
    }

    if context.family == DocumentFamily::Platform && report.entries_without_sub_section > 0 {
        report.warn(format!(
            "{} plank entries have no sub-section between them and their main section",
            report.entries_without_sub_section
        ));
    }

    chunks
}

// The sub-heading must sit strictly after the chosen main heading.
fn attribute(matches: &StructureMatches, position: usize) -> Attribution<'_> {
    let main = last_before(&matches.main_headings, position);
    let floor = main.map(|heading| heading.position);
    let sub = last_before(&matches.sub_headings, position)
        .filter(|heading| floor.is_none_or(|floor| heading.position > floor));

    Attribution { main, sub }
}

fn last_before(headings: &[HeadingMatch], position: usize) -> Option<&HeadingMatch> {
    let upper = headings.partition_point(|heading| heading.position < position);
    upper.checked_sub(1).map(|index| &headings[index])
}

fn find_main<'m>(matches: &'m StructureMatches, label: &str) -> Option<&'m HeadingMatch> {
    matches
        .main_headings
        .iter()
        .find(|heading| heading.label == label)
}

fn platform_lead_chunks(
    context: &ResolveContext<'_>,
    report: &mut SegmentReport,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let preamble = find_main(context.matches, PREAMBLE_HEADING);
    let principles = find_main(context.matches, PRINCIPLES_HEADING);
    let inverted = matches!(
        (preamble, principles),
        (Some(preamble), Some(principles)) if principles.position < preamble.position
    );

    match (preamble, principles) {
        (Some(preamble), Some(principles)) if preamble.label_end <= principles.position => {
            report.record_span(preamble.label_end, principles.position, true);
            chunks.push(lead_chunk(
                context,
                ChunkType::Preamble,
                PREAMBLE_HEADING,
                preamble.label_end,
                principles.position,
            ));
        }
        _ => {
            report.special_chunks_skipped += 1;
            report.warn("could not find the Preamble section or its end".to_string());
        }
    }

    match (principles, context.matches.entries.first()) {
        (Some(principles), Some(first)) if !inverted && principles.label_end <= first.position => {
            report.record_span(principles.label_end, first.position, true);
            chunks.push(lead_chunk(
                context,
                ChunkType::PrincipleIntroduction,
                PRINCIPLES_HEADING,
                principles.label_end,
                first.position,
            ));
        }
        _ => {
            report.special_chunks_skipped += 1;
            report.warn("could not find the Principles introduction".to_string());
        }
    }

    chunks
}

fn lead_chunk(
    context: &ResolveContext<'_>,
    chunk_type: ChunkType,
    main_section: &str,
    start: usize,
    end: usize,
) -> DocumentChunk {
    DocumentChunk {
        content: flatten_lines(context.text[start..end].trim()),
        metadata: ChunkMetadata {
            chunk_type,
            main_section: main_section.to_string(),
            sub_section: NOT_AVAILABLE.to_string(),
            title: NOT_AVAILABLE.to_string(),
            number: NOT_AVAILABLE.to_string(),
            page_number: context.offsets.page_number(start),
            source: context.source.to_string(),
        },
    }
}

fn bill_caption_chunk(
    context: &ResolveContext<'_>,
    report: &mut SegmentReport,
) -> Option<DocumentChunk> {
    let start = context.boundary.start;
    let end = context
        .matches
        .entries
        .first()
        .map(|entry| entry.position)
        .unwrap_or(context.boundary.end)
        .max(start);

    let raw = &context.text[start..end];
    let span = raw.trim();
    if span.is_empty() {
        report.record_span(start, end, false);
        return None;
    }
    if span.chars().count() < context.min_chunk_chars {
        report.short_spans_dropped += 1;
        report.record_span(start, end, false);
        return None;
    }

    let content = context.cleaner.clean(span);
    if content.is_empty() {
        report.short_spans_dropped += 1;
        report.record_span(start, end, false);
        return None;
    }
    report.record_span(start, end, true);

    let content_start = start + (raw.len() - raw.trim_start().len());
    let attribution = attribute(context.matches, content_start);

    Some(DocumentChunk {
        content,
        metadata: ChunkMetadata {
            chunk_type: ChunkType::Caption,
            main_section: ordinal_or_na(attribution.main),
            sub_section: label_or_na(attribution.main),
            title: NOT_AVAILABLE.to_string(),
            number: NOT_AVAILABLE.to_string(),
            page_number: context.offsets.page_number(content_start),
            source: context.source.to_string(),
        },
    })
}

fn entry_title(captured: &str) -> String {
    captured.split(':').next().unwrap_or("").trim().to_string()
}

fn flatten_lines(span: &str) -> String {
    span.replace('\n', " ")
}

fn label_or_na(heading: Option<&HeadingMatch>) -> String {
    heading
        .map(|heading| heading.label.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn ordinal_or_na(heading: Option<&HeadingMatch>) -> String {
    heading
        .and_then(|heading| heading.ordinal.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
