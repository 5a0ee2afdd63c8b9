use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::commands::inventory::{self, INVENTORY_MANIFEST_NAME};
use crate::commands::segment::{build_segmenter, extract_document};
use crate::extract::ExtractedPages;
use crate::model::{
    IngestCounts, IngestPaths, IngestRunManifest, IngestedDocument, SourceEntry,
    SourceInventoryManifest, ToolVersions,
};
use crate::segment::{DocumentChunk, Segmenter};
use crate::semantic::{
    Embedder, LocalHashEmbedder, chunk_payload_for_embedding, embedding_text_hash,
    resolve_model_config,
};
use crate::store::{ChunkStore, DB_SCHEMA_VERSION, InsertedChunk, PendingEmbedding, StoredDoc};
use crate::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
};

pub const DB_FILE_NAME: &str = "legiseg_index.sqlite";

struct IngestContext<'a> {
    segmenter: &'a Segmenter,
    embedder: Option<&'a dyn Embedder>,
    batch_size: usize,
}

pub fn run(args: IngestArgs) -> Result<()> {
    if args.batch_size == 0 {
        bail!("--batch-size must be greater than zero");
    }

    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let source_dir = args.source_dir.clone().unwrap_or_else(|| cache_root.clone());
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join(INVENTORY_MANIFEST_NAME));
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join(DB_FILE_NAME));

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting ingest");

    let inventory =
        load_or_refresh_inventory(&source_dir, &inventory_manifest_path, args.refresh_inventory)?;
    let sources = select_sources(&inventory, &args.doc_ids)?;

    let segmenter = build_segmenter(&args.options)?;
    let embedder = LocalHashEmbedder::new(resolve_model_config(&args.model_id))?;

    let mut store = ChunkStore::open(&db_path)?;
    if !args.skip_embeddings {
        store.register_model(embedder.model())?;
    }

    let context = IngestContext {
        segmenter: &segmenter,
        embedder: (!args.skip_embeddings).then_some(&embedder as &dyn Embedder),
        batch_size: args.batch_size,
    };

    let mut counts = IngestCounts {
        source_count: inventory.source_count,
        ..IngestCounts::default()
    };
    let mut documents = Vec::with_capacity(sources.len());
    let mut warnings = Vec::new();

    for entry in &sources {
        let pdf_path = source_dir.join(&entry.filename);
        let extracted = extract_document(&pdf_path, &args.options)?;
        let collection = args
            .collection
            .clone()
            .unwrap_or_else(|| entry.doc_id.clone());

        let document = ingest_document(
            &mut store,
            &context,
            entry,
            &collection,
            extracted,
            &mut counts,
        )?;
        warnings.extend(
            document
                .segmentation
                .warnings
                .iter()
                .map(|warning| format!("{}: {warning}", document.doc_id)),
        );
        documents.push(document);
    }

    store.sync_fts_index()?;

    let totals = store.counts()?;
    counts.docs_total = totals.docs;
    counts.chunks_total = totals.chunks;

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        family: segmenter.config().family.as_str().to_string(),
        min_chunk_chars: segmenter.config().min_chunk_chars,
        model_id: embedder.model().model_id.clone(),
        command: render_ingest_command(&args),
        tool_versions: collect_tool_versions(),
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            db_path: db_path.display().to_string(),
            config_path: args
                .options
                .config
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        counts,
        documents,
        source_hashes: sources,
        warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        run_id = %run_id,
        processed = manifest.counts.processed_source_count,
        chunks = manifest.counts.chunks_inserted,
        embeddings = manifest.counts.embeddings_written,
        warnings = manifest.warnings.len(),
        "ingest completed"
    );

    Ok(())
}

fn ingest_document(
    store: &mut ChunkStore,
    context: &IngestContext<'_>,
    entry: &SourceEntry,
    collection: &str,
    extracted: ExtractedPages,
    counts: &mut IngestCounts,
) -> Result<IngestedDocument> {
    let segmentation = context.segmenter.segment(&extracted.pages, &entry.filename);

    let doc = StoredDoc {
        doc_id: entry.doc_id.clone(),
        filename: entry.filename.clone(),
        sha256: entry.sha256.clone(),
        family: context.segmenter.config().family.as_str().to_string(),
        collection: collection.to_string(),
    };
    store.upsert_doc(&doc)?;
    let inserted = store
        .replace_doc_chunks(&doc, &segmentation.chunks)
        .with_context(|| format!("failed to store chunks for {}", doc.doc_id))?;

    if let Some(embedder) = context.embedder {
        embed_chunks(
            store,
            embedder,
            &segmentation.chunks,
            &inserted,
            context.batch_size,
            counts,
        )
        .with_context(|| format!("failed to embed chunks for {}", doc.doc_id))?;
    }

    counts.processed_source_count += 1;
    counts.page_count += extracted.stats.page_count;
    counts.empty_page_count += extracted.stats.empty_page_count;
    counts.chunks_inserted += inserted.len();
    counts.short_spans_dropped += segmentation.report.short_spans_dropped;
    counts.entries_without_sub_section += segmentation.report.entries_without_sub_section;

    info!(
        doc_id = %doc.doc_id,
        collection = %doc.collection,
        chunks = inserted.len(),
        "stored document chunks"
    );

    Ok(IngestedDocument {
        doc_id: doc.doc_id,
        filename: doc.filename,
        collection: doc.collection,
        extraction: extracted.stats,
        segmentation: segmentation.report,
    })
}

fn embed_chunks(
    store: &mut ChunkStore,
    embedder: &dyn Embedder,
    chunks: &[DocumentChunk],
    inserted: &[InsertedChunk],
    batch_size: usize,
    counts: &mut IngestCounts,
) -> Result<()> {
    let model_id = embedder.model().model_id.clone();
    let mut pending = Vec::<PendingEmbedding>::with_capacity(batch_size);

    for (chunk, row) in chunks.iter().zip(inserted) {
        let Some(payload) = chunk_payload_for_embedding(&chunk.content, &chunk.metadata) else {
            counts.embeddings_skipped += 1;
            continue;
        };

        pending.push(PendingEmbedding {
            chunk_id: row.chunk_id.clone(),
            text_hash: embedding_text_hash(&payload),
            vector: embedder.embed(&payload)?,
        });

        if pending.len() >= batch_size {
            counts.embeddings_written += store.flush_embeddings(&model_id, &mut pending)?;
        }
    }

    counts.embeddings_written += store.flush_embeddings(&model_id, &mut pending)?;
    Ok(())
}

fn load_or_refresh_inventory(
    source_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<SourceInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(source_dir)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            source_count = manifest.source_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: SourceInventoryManifest = read_json(inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        source_count = manifest.source_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn select_sources(inventory: &SourceInventoryManifest, doc_ids: &[String]) -> Result<Vec<SourceEntry>> {
    if doc_ids.is_empty() {
        return Ok(inventory.sources.clone());
    }

    for doc_id in doc_ids {
        if !inventory.sources.iter().any(|entry| &entry.doc_id == doc_id) {
            warn!(doc_id = %doc_id, "requested document is not in the inventory");
        }
    }

    let selected = inventory
        .sources
        .iter()
        .filter(|entry| doc_ids.contains(&entry.doc_id))
        .cloned()
        .collect::<Vec<SourceEntry>>();
    if selected.is_empty() {
        bail!("none of the requested documents are in the inventory");
    }

    Ok(selected)
}

fn collect_tool_versions() -> ToolVersions {
    ToolVersions {
        legiseg: env!("CARGO_PKG_VERSION").to_string(),
        pdftotext: command_version_optional("pdftotext", &["-v"]),
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "legiseg".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--family".to_string(),
        args.options.family.as_str().to_string(),
    ];

    if let Some(path) = &args.source_dir {
        command.push("--source-dir".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.options.config {
        command.push("--config".to_string());
        command.push(path.display().to_string());
    }
    if let Some(min_chars) = args.options.min_chunk_chars {
        command.push("--min-chunk-chars".to_string());
        command.push(min_chars.to_string());
    }
    if let Some(max_pages) = args.options.max_pages {
        command.push("--max-pages".to_string());
        command.push(max_pages.to_string());
    }
    if args.options.strip_repeated_edges {
        command.push("--strip-repeated-edges".to_string());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if let Some(collection) = &args.collection {
        command.push("--collection".to_string());
        command.push(collection.clone());
    }
    for doc_id in &args.doc_ids {
        command.push("--doc-id".to_string());
        command.push(doc_id.clone());
    }
    if args.skip_embeddings {
        command.push("--skip-embeddings".to_string());
    } else {
        command.push("--model-id".to_string());
        command.push(args.model_id.clone());
        command.push("--batch-size".to_string());
        command.push(args.batch_size.to_string());
    }

    command.join(" ")
}
