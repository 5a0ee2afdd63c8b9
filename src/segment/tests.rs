use super::matcher::{EntryMatch, HeadingMatch, StructureMatches};
use super::pages::{OffsetTable, PageOffset};
use super::*;
use crate::config::{BoundaryMarkers, DocumentFamily, SegmenterConfig};

fn platform_segmenter() -> Segmenter {
    Segmenter::new(SegmenterConfig::platform()).expect("platform config compiles")
}

fn bill_segmenter() -> Segmenter {
    Segmenter::new(SegmenterConfig::bill()).expect("bill config compiles")
}

fn sample_platform_pages() -> Vec<Page> {
    vec![
        Page::new(
            1,
            "Preamble\nWe believe...\nPrinciples\n1. Liberty: text here.\n2. Justice: more text.\n",
        ),
        Page::new(2, "Resolutions\n3. Declare something.\nIndex\n..."),
    ]
}

fn heading(position: usize, label: &str) -> HeadingMatch {
    HeadingMatch {
        position,
        label_end: position + label.len(),
        label: label.to_string(),
        ordinal: None,
    }
}

fn assert_contiguous(spans: &[ChunkSpan]) {
    assert!(
        spans.windows(2).all(|pair| pair[0].end == pair[1].start),
        "spans leave a gap or overlap: {spans:?}"
    );
}

#[test]
fn offset_table_starts_are_strictly_increasing() {
    let pages = vec![
        Page::new(1, "first page"),
        Page::new(2, ""),
        Page::new(3, "third"),
        Page::new(4, ""),
    ];

    let aggregated = aggregate_pages(&pages);
    let starts = aggregated
        .offsets
        .entries()
        .iter()
        .map(|entry| entry.start)
        .collect::<Vec<usize>>();

    assert_eq!(starts.len(), 4);
    assert!(starts.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(aggregated.text, "first page\n\nthird\n\n");
}

#[test]
fn aggregation_orders_pages_by_number() {
    let pages = vec![Page::new(2, "second"), Page::new(1, "first")];

    let aggregated = aggregate_pages(&pages);
    assert_eq!(aggregated.text, "first\nsecond\n");
    assert_eq!(aggregated.offsets.page_number(0), 1);
    assert_eq!(aggregated.offsets.page_number(6), 2);
}

#[test]
fn empty_page_sequence_yields_single_sentinel() {
    let aggregated = aggregate_pages(&[]);
    assert!(aggregated.text.is_empty());
    assert_eq!(
        aggregated.offsets.entries(),
        &[PageOffset {
            start: 0,
            page_number: 0
        }]
    );
    assert_eq!(aggregated.offsets.page_number(0), 0);
}

#[test]
fn page_lookup_is_right_biased() {
    let table = OffsetTable::from(vec![
        PageOffset {
            start: 0,
            page_number: 1,
        },
        PageOffset {
            start: 120,
            page_number: 2,
        },
        PageOffset {
            start: 300,
            page_number: 3,
        },
    ]);

    assert_eq!(table.page_number(0), 1);
    assert_eq!(table.page_number(119), 1);
    assert_eq!(table.page_number(120), 2);
    assert_eq!(table.page_number(150), 2);
    assert_eq!(table.page_number(299), 2);
    assert_eq!(table.page_number(300), 3);
    assert_eq!(table.page_number(10_000), 3);
}

#[test]
fn boundary_spans_first_start_marker_to_last_end_marker() {
    let text = "Contents\nPreamble 1\nIndex 9\nPreamble\nbody\nIndex\nterms";
    let markers = BoundaryMarkers {
        start: "Preamble".to_string(),
        end: "Index".to_string(),
    };

    let (boundary, warning) = ContentBoundary::locate(text, &markers);
    assert!(warning.is_none());
    assert_eq!(boundary.start, text.find("Preamble").unwrap_or_default());
    assert_eq!(boundary.end, text.rfind("Index").unwrap_or_default());
}

#[test]
fn boundary_falls_back_to_whole_text_when_markers_missing() {
    let text = "Preamble\nno closing marker here";
    let markers = BoundaryMarkers {
        start: "Preamble".to_string(),
        end: "Index".to_string(),
    };

    let (boundary, warning) = ContentBoundary::locate(text, &markers);
    assert_eq!(boundary, ContentBoundary::whole(text));
    assert!(warning.is_some());
}

#[test]
fn boundary_falls_back_when_markers_are_inverted() {
    let text = "Index\nthen Preamble";
    let markers = BoundaryMarkers {
        start: "Preamble".to_string(),
        end: "Index".to_string(),
    };

    let (boundary, warning) = ContentBoundary::locate(text, &markers);
    assert_eq!(boundary, ContentBoundary::whole(text));
    assert!(warning.is_some_and(|message| message.contains("follows")));
}

#[test]
fn vocabulary_headings_require_whole_line_match() {
    let matcher = StructureMatcher::new(&SegmenterConfig::platform()).expect("matcher");
    let text = "We support Education reform in every district.\n  Education  \nEducation funding\n";

    let matches = matcher.scan(text, ContentBoundary::whole(text));
    assert_eq!(matches.main_headings.len(), 1);
    assert_eq!(matches.main_headings[0].label, "Education");
    assert_eq!(
        matches.main_headings[0].position,
        text.find("  Education  ").unwrap_or_default()
    );
}

#[test]
fn sub_headings_are_matched_separately_from_main_headings() {
    let matcher = StructureMatcher::new(&SegmenterConfig::platform()).expect("matcher");
    let text = "Business, Commerce, and Transportation\nTransportation\n4. Roads: build them.\n";

    let matches = matcher.scan(text, ContentBoundary::whole(text));
    assert_eq!(matches.main_headings.len(), 1);
    assert_eq!(
        matches.main_headings[0].label,
        "Business, Commerce, and Transportation"
    );
    assert_eq!(matches.sub_headings.len(), 1);
    assert_eq!(matches.sub_headings[0].label, "Transportation");
    assert_eq!(matches.entries.len(), 1);
    assert_eq!(matches.entries[0].ordinal, "4");
    assert_eq!(matches.entries[0].title, "Roads: build them.");
}

#[test]
fn entries_require_capital_after_ordinal() {
    let matcher = StructureMatcher::new(&SegmenterConfig::platform()).expect("matcher");
    let text = "1. Valid entry\n2. lowercase entry\n3.Missing space\n  4. Indented Entry\n";

    let matches = matcher.scan(text, ContentBoundary::whole(text));
    let ordinals = matches
        .entries
        .iter()
        .map(|entry| entry.ordinal.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(ordinals, vec!["1", "4"]);
}

#[test]
fn scan_is_restricted_to_boundary() {
    let matcher = StructureMatcher::new(&SegmenterConfig::platform()).expect("matcher");
    let text = "1. Table Of Contents\nPreamble\n2. Body Entry\nIndex\n3. Appendix Entry\n";
    let boundary = ContentBoundary {
        start: text.find("Preamble").unwrap_or_default(),
        end: text.rfind("Index").unwrap_or_default(),
    };

    let matches = matcher.scan(text, boundary);
    assert_eq!(matches.entries.len(), 1);
    assert_eq!(matches.entries[0].ordinal, "2");
    assert_eq!(matches.main_headings.len(), 1);
    assert_eq!(matches.main_headings[0].label, "Preamble");
}

#[test]
fn bill_articles_capture_number_and_title() {
    let matcher = StructureMatcher::new(&SegmenterConfig::bill()).expect("matcher");
    let text = "ARTICLE 2. SCHOOL FINANCE, TAXATION\nSECTION 2.01. Section 48.051 is amended.\nSec. 48.052. BASIC ALLOTMENT.\n";

    let matches = matcher.scan(text, ContentBoundary::whole(text));
    assert_eq!(matches.main_headings.len(), 1);
    assert_eq!(matches.main_headings[0].ordinal.as_deref(), Some("2"));
    assert_eq!(matches.main_headings[0].label, "SCHOOL FINANCE, TAXATION");
    assert!(matches.sub_headings.is_empty());

    let ordinals = matches
        .entries
        .iter()
        .map(|entry| entry.ordinal.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(ordinals, vec!["2.01", "48.052"]);
}

#[test]
fn heading_attribution_uses_nearest_preceding_main_heading() {
    let matches = StructureMatches {
        main_headings: vec![
            heading(10, "Principles"),
            heading(500, "Resolutions"),
        ],
        sub_headings: Vec::new(),
        entries: vec![EntryMatch {
            position: 600,
            ordinal: "7".to_string(),
            title: "Declare: something".to_string(),
        }],
    };
    let text = "x".repeat(700);
    let offsets = aggregate_pages(&[Page::new(1, text.clone())]).offsets;
    let cleaner = TextCleaner::new().expect("cleaner");
    let context = ResolveContext {
        text: &text,
        offsets: &offsets,
        boundary: ContentBoundary::whole(&text),
        matches: &matches,
        family: DocumentFamily::Platform,
        min_chunk_chars: 0,
        source: "test.pdf",
        cleaner: &cleaner,
    };

    let mut report = SegmentReport::default();
    let chunks = resolve_chunks(&context, &mut report);
    let entry = chunks
        .iter()
        .find(|chunk| chunk.metadata.number == "7")
        .expect("entry chunk");
    assert_eq!(entry.metadata.main_section, "Resolutions");
    assert_eq!(entry.metadata.chunk_type, ChunkType::Resolution);
    assert_eq!(entry.metadata.title, "Declare");
}

#[test]
fn sub_heading_from_previous_main_section_does_not_leak() {
    let segmenter = platform_segmenter();
    let pages = vec![Page::new(
        1,
        "Preamble\nIntro.\nPrinciples\n1. First principle.\nFinance\nSpending Restraint\n2. Cap Spending: hold budgets flat.\nEducation\n3. Fund Schools: directly.\nCurriculum\n4. Teach Civics: every year.\nIndex\n",
    )];

    let segmentation = segmenter.segment(&pages, "platform.pdf");
    let by_number = |number: &str| {
        segmentation
            .chunks
            .iter()
            .find(|chunk| chunk.metadata.number == number)
            .map(|chunk| chunk.metadata.clone())
            .expect("chunk present")
    };

    let second = by_number("2");
    assert_eq!(second.main_section, "Finance");
    assert_eq!(second.sub_section, "Spending Restraint");
    assert_eq!(second.title, "Cap Spending");

    let third = by_number("3");
    assert_eq!(third.main_section, "Education");
    assert_eq!(third.sub_section, NOT_AVAILABLE);
    assert_eq!(third.chunk_type, ChunkType::Plank);

    let fourth = by_number("4");
    assert_eq!(fourth.main_section, "Education");
    assert_eq!(fourth.sub_section, "Curriculum");

    assert_eq!(segmentation.report.entries_without_sub_section, 1);
}

#[test]
fn platform_end_to_end_scenario() {
    let segmentation = platform_segmenter().segment(&sample_platform_pages(), "platform.pdf");
    let chunks = &segmentation.chunks;

    let types = chunks
        .iter()
        .map(|chunk| chunk.metadata.chunk_type)
        .collect::<Vec<ChunkType>>();
    assert_eq!(
        types,
        vec![
            ChunkType::Preamble,
            ChunkType::PrincipleIntroduction,
            ChunkType::Principle,
            ChunkType::Principle,
            ChunkType::Resolution,
        ]
    );

    assert_eq!(chunks[0].content, "We believe...");
    assert_eq!(chunks[0].metadata.main_section, "Preamble");
    assert_eq!(chunks[0].metadata.number, NOT_AVAILABLE);
    assert_eq!(chunks[0].metadata.page_number, 1);

    assert_eq!(chunks[1].metadata.main_section, "Principles");
    assert_eq!(chunks[1].metadata.sub_section, NOT_AVAILABLE);
    assert_eq!(chunks[1].metadata.page_number, 1);

    for chunk in &chunks[2..4] {
        assert_eq!(chunk.metadata.main_section, "Principles");
        assert_eq!(chunk.metadata.title, NOT_AVAILABLE);
        assert_eq!(chunk.metadata.page_number, 1);
    }
    assert_eq!(chunks[2].metadata.number, "1");
    assert_eq!(chunks[2].content, "1. Liberty: text here.");
    assert_eq!(chunks[3].metadata.number, "2");

    let resolution = &chunks[4];
    assert_eq!(resolution.metadata.number, "3");
    assert_eq!(resolution.metadata.main_section, "Resolutions");
    assert_eq!(resolution.metadata.title, "Declare something.");
    assert_eq!(resolution.metadata.page_number, 2);
    assert_eq!(resolution.metadata.source, "platform.pdf");
    assert!(!resolution.content.contains("Index"));

    assert!(segmentation.report.warnings.is_empty());
    assert_eq!(segmentation.report.chunk_count, 5);
}

#[test]
fn platform_chunk_spans_cover_body_without_gaps() {
    let segmentation = platform_segmenter().segment(&sample_platform_pages(), "platform.pdf");
    let text = aggregate_pages(&sample_platform_pages()).text;
    let boundary = segmentation.report.boundary.expect("boundary recorded");
    let spans = &segmentation.report.spans;

    assert_eq!(spans.len(), segmentation.chunks.len());
    assert!(spans.iter().all(|span| span.emitted));
    assert!(spans.iter().all(|span| span.start <= span.end));

    assert_eq!(&text[boundary.start..spans[0].start], "Preamble");
    assert_eq!(&text[spans[0].end..spans[1].start], "Principles");
    assert_contiguous(&spans[1..]);
    assert_eq!(spans.last().map(|span| span.end), Some(boundary.end));
}

#[test]
fn folded_heading_lines_stay_inside_entry_spans() {
    let text = "Preamble\nWe hold.\nPrinciples\n1. Alpha: a.\nFinance\nSpending Restraint\n2. Beta: b.\nIndex\n";
    let segmentation = platform_segmenter().segment(&[Page::new(1, text)], "folded.pdf");
    let spans = &segmentation.report.spans;

    assert_eq!(spans.len(), 4);
    assert_contiguous(&spans[1..]);
    assert!(text[spans[2].start..spans[2].end].contains("Finance\nSpending Restraint"));
    assert_eq!(spans[3].end, text.rfind("Index").unwrap_or_default());
    assert_eq!(segmentation.chunks[3].metadata.main_section, "Finance");
}

#[test]
fn bill_chunk_spans_start_at_caption_and_reach_text_end() {
    let mut config = SegmenterConfig::bill();
    config.min_chunk_chars = 0;
    let segmenter = Segmenter::new(config).expect("segmenter");
    let pages = vec![Page::new(
        1,
        "AN ACT\nrelating to schools.\nARTICLE 1. GENERAL PROVISIONS\nSECTION 1.01. Text one.\nSECTION 1.02. Text two.\n",
    )];

    let segmentation = segmenter.segment(&pages, "HB00001F.pdf");
    let text = aggregate_pages(&pages).text;
    let boundary = segmentation.report.boundary.expect("boundary recorded");
    let spans = &segmentation.report.spans;

    assert_eq!(boundary, ContentBoundary::whole(&text));
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[0].start, boundary.start);
    assert_eq!(spans[0].end, text.find("SECTION 1.01").unwrap_or_default());
    assert_contiguous(spans);
    assert_eq!(spans.last().map(|span| span.end), Some(text.len()));
    assert!(spans.iter().all(|span| span.emitted));
    assert_eq!(segmentation.chunks[0].metadata.chunk_type, ChunkType::Caption);
}

#[test]
fn inverted_anchor_headings_skip_both_lead_chunks() {
    let pages = vec![Page::new(
        1,
        "Preamble notes\nPrinciples\nIntro.\nPreamble\nWe believe.\nFinance\nSpending Restraint\n1. Tax Relief: cut rates.\nIndex\n",
    )];

    let segmentation = platform_segmenter().segment(&pages, "inverted.pdf");
    assert_eq!(segmentation.chunks.len(), 1);
    assert_eq!(segmentation.chunks[0].metadata.chunk_type, ChunkType::Plank);
    assert_eq!(segmentation.chunks[0].metadata.main_section, "Finance");
    assert_eq!(segmentation.report.special_chunks_skipped, 2);
    assert_eq!(segmentation.report.warnings.len(), 2);
    assert!(
        segmentation
            .report
            .spans
            .iter()
            .all(|span| span.start <= span.end)
    );
}

#[test]
fn missing_anchor_headings_skip_special_chunks() {
    let pages = vec![Page::new(
        1,
        "Preamble text without headings\nFinance\n1. Tax Relief: cut rates.\nIndex\n",
    )];

    let segmentation = platform_segmenter().segment(&pages, "partial.pdf");
    assert_eq!(segmentation.chunks.len(), 1);
    assert_eq!(segmentation.chunks[0].metadata.chunk_type, ChunkType::Plank);
    assert_eq!(segmentation.chunks[0].metadata.title, "Tax Relief");
    assert_eq!(segmentation.report.special_chunks_skipped, 2);
    assert!(segmentation.report.warnings.len() >= 2);
}

#[test]
fn empty_pages_degrade_to_no_chunks() {
    let segmentation = platform_segmenter().segment(&[], "empty.pdf");
    assert!(segmentation.chunks.is_empty());
    assert_eq!(segmentation.report.entry_count, 0);
    assert!(!segmentation.report.warnings.is_empty());
}

#[test]
fn bill_sections_are_attributed_to_articles() {
    let pages = vec![
        Page::new(
            1,
            "AN ACT\nrelating to public school finance and the maintenance and operation of schools.\nBE IT ENACTED BY THE LEGISLATURE OF THE STATE OF TEXAS:\nARTICLE 1. GENERAL PROVISIONS\nSECTION 1.01. Section 12.104(b), Education Code, is amended to read as follows.\n",
        ),
        Page::new(
            2,
            "1 (b) An open-enrollment charter school is subject to the requirements.\nH.B. No. 2\n2\nSECTION 1.02. Short.\nARTICLE 2. TEACHERS\nSECTION 2.01. Section 21.402, Education Code, is amended by adding Subsection (c-2).\n",
        ),
    ];

    let segmentation = bill_segmenter().segment(&pages, "HB00002F.pdf");
    let chunks = &segmentation.chunks;

    assert_eq!(chunks[0].metadata.chunk_type, ChunkType::Caption);
    assert!(chunks[0].content.starts_with("AN ACT"));
    assert_eq!(chunks[0].metadata.main_section, NOT_AVAILABLE);

    let sections = chunks
        .iter()
        .filter(|chunk| chunk.metadata.chunk_type == ChunkType::Section)
        .collect::<Vec<&DocumentChunk>>();
    assert_eq!(sections.len(), 2);

    assert_eq!(sections[0].metadata.number, "1.01");
    assert_eq!(sections[0].metadata.main_section, "1");
    assert_eq!(sections[0].metadata.sub_section, "GENERAL PROVISIONS");
    assert_eq!(sections[0].metadata.page_number, 1);
    assert!(!sections[0].content.contains("H.B. No. 2"));
    assert!(sections[0].content.contains("(b) An open-enrollment"));

    assert_eq!(sections[1].metadata.number, "2.01");
    assert_eq!(sections[1].metadata.main_section, "2");
    assert_eq!(sections[1].metadata.sub_section, "TEACHERS");
    assert_eq!(sections[1].metadata.page_number, 2);

    assert_eq!(segmentation.report.short_spans_dropped, 1);

    let spans = &segmentation.report.spans;
    assert_eq!(spans.len(), 4);
    assert_eq!(spans.iter().filter(|span| !span.emitted).count(), 1);
    assert_eq!(spans[0].start, 0);
    assert_contiguous(spans);
}

#[test]
fn minimum_chunk_length_is_configurable() {
    let mut config = SegmenterConfig::bill();
    config.min_chunk_chars = 0;
    let segmenter = Segmenter::new(config).expect("segmenter");
    let pages = vec![Page::new(1, "SECTION 1. Short.\nSECTION 2. Also short.\n")];

    let segmentation = segmenter.segment(&pages, "tiny.pdf");
    assert_eq!(segmentation.chunks.len(), 2);
    assert_eq!(segmentation.report.short_spans_dropped, 0);
}

#[test]
fn cleaner_strips_extraction_artifacts() {
    let cleaner = TextCleaner::new().expect("cleaner");
    let raw = "SECTION 1.01. The agency\n2 shall adopt rules.\n\n\n3 The rules AA take effect A now.\nH.B. No. 2\n14";

    let cleaned = cleaner.clean(raw);
    assert_eq!(
        cleaned,
        "SECTION 1.01. The agency\nshall adopt rules.\nThe rules take effect now."
    );
    assert_eq!(cleaner.clean("Body line.\n7"), "Body line.");
}

#[test]
fn cleaner_footer_match_is_case_insensitive() {
    let cleaner = TextCleaner::new().expect("cleaner");
    let cleaned = cleaner.clean("Body text here.\nh.b. no. 12\n3");
    assert_eq!(cleaned, "Body text here.");
}

#[test]
fn cleaning_is_idempotent() {
    let cleaner = TextCleaner::new().expect("cleaner");
    let samples = [
        "x A A y",
        "12 34 text at line start",
        "  5 indented line number\nbody",
        "Sec. 2. Heading\n\n\n\n1\n2\nH.B. No. 2\n9\nbody AA AA end",
        "",
    ];

    for sample in samples {
        let once = cleaner.clean(sample);
        let twice = cleaner.clean(&once);
        assert_eq!(once, twice, "cleaning drifted for {sample:?}");
    }
}

#[test]
fn empty_vocabulary_is_a_configuration_error() {
    let mut config = SegmenterConfig::platform();
    config.main_sections = vec!["  ".to_string()];

    let err = Segmenter::new(config).expect_err("empty vocabulary must fail");
    assert!(format!("{err:#}").contains("vocabulary is empty"));
}

#[test]
fn unparsable_patterns_are_configuration_errors() {
    let mut config = SegmenterConfig::platform();
    config.entry_pattern = r"^(\d+\.".to_string();
    assert!(Segmenter::new(config).is_err());

    let mut config = SegmenterConfig::bill();
    config.heading_pattern = Some(r"^ARTICLE\s+\d+".to_string());
    let err = Segmenter::new(config).expect_err("heading pattern without captures");
    assert!(err.to_string().contains("must capture"));

    let mut config = SegmenterConfig::bill();
    config.heading_pattern = None;
    assert!(Segmenter::new(config).is_err());
}

#[test]
fn chunk_metadata_serializes_with_type_key() {
    let segmentation = platform_segmenter().segment(&sample_platform_pages(), "platform.pdf");
    let value = serde_json::to_value(&segmentation.chunks[4]).expect("serialize chunk");

    assert_eq!(value["metadata"]["type"], "resolution");
    assert_eq!(value["metadata"]["main_section"], "Resolutions");
    assert_eq!(value["metadata"]["page_number"], 2);
}
