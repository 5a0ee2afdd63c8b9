use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::{SegmentArgs, SegmentOptions};
use crate::config::resolve_config;
use crate::extract::{ExtractedPages, extract_pages_with_pdftotext, load_pages_json};
use crate::segment::{DocumentChunk, SegmentReport, Segmenter};
use crate::util::ensure_directory;

#[derive(Debug, Serialize)]
struct SegmentOutput<'a> {
    source: &'a str,
    report: &'a SegmentReport,
    chunks: &'a [DocumentChunk],
}

pub fn run(args: SegmentArgs) -> Result<()> {
    let segmenter = build_segmenter(&args.options)?;

    let (source_path, extracted) = match (&args.pdf, &args.pages_json) {
        (Some(pdf), _) => (pdf, extract_document(pdf, &args.options)?),
        (None, Some(pages_json)) => (pages_json, load_pages_json(pages_json)?),
        (None, None) => bail!("either --pdf or --pages-json is required"),
    };
    let source = source_label(source_path);

    info!(
        source = %source,
        pages = extracted.stats.page_count,
        empty_pages = extracted.stats.empty_page_count,
        "loaded document pages"
    );

    let segmentation = segmenter.segment(&extracted.pages, &source);

    let serialized = if args.with_report {
        serde_json::to_vec_pretty(&SegmentOutput {
            source: &source,
            report: &segmentation.report,
            chunks: &segmentation.chunks,
        })
    } else {
        serde_json::to_vec_pretty(&segmentation.chunks)
    };
    let mut data = serialized.context("failed to serialize chunks")?;
    data.push(b'\n');

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                ensure_directory(parent)?;
            }
            fs::write(path, &data)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                chunks = segmentation.chunks.len(),
                "wrote chunks"
            );
        }
        None => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            output.write_all(&data)?;
            output.flush()?;
        }
    }

    Ok(())
}

pub(crate) fn build_segmenter(options: &SegmentOptions) -> Result<Segmenter> {
    let config = resolve_config(
        options.config.as_deref(),
        options.family,
        options.min_chunk_chars,
    )?;
    Segmenter::new(config).context("invalid segmenter configuration")
}

pub(crate) fn extract_document(pdf_path: &Path, options: &SegmentOptions) -> Result<ExtractedPages> {
    let extracted =
        extract_pages_with_pdftotext(pdf_path, options.max_pages, options.strip_repeated_edges)?;
    if options.strip_repeated_edges {
        info!(
            path = %pdf_path.display(),
            headers_removed = extracted.stats.header_lines_removed,
            footers_removed = extracted.stats.footer_lines_removed,
            "stripped repeated page edge lines"
        );
    }
    Ok(extracted)
}

pub(crate) fn source_label(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| path.display().to_string())
}
