use serde::{Deserialize, Serialize};

use crate::extract::ExtractionStats;
use crate::segment::SegmentReport;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub doc_id: String,
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub source_count: usize,
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub legiseg: String,
    pub pdftotext: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: String,
    pub db_path: String,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestCounts {
    pub source_count: usize,
    pub processed_source_count: usize,
    pub page_count: usize,
    pub empty_page_count: usize,
    pub chunks_inserted: usize,
    pub short_spans_dropped: usize,
    pub entries_without_sub_section: usize,
    pub embeddings_written: usize,
    pub embeddings_skipped: usize,
    pub docs_total: i64,
    pub chunks_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub doc_id: String,
    pub filename: String,
    pub collection: String,
    pub extraction: ExtractionStats,
    pub segmentation: SegmentReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub family: String,
    pub min_chunk_chars: usize,
    pub model_id: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub documents: Vec<IngestedDocument>,
    pub source_hashes: Vec<SourceEntry>,
    pub warnings: Vec<String>,
}
