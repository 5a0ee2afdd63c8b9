use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::{QueryArgs, RetrievalMode};
use crate::commands::ingest::DB_FILE_NAME;
use crate::segment::NOT_AVAILABLE;
use crate::semantic::{LocalHashEmbedder, resolve_model_config};
use crate::store::{ChunkStore, SearchFilters, SearchHit};

#[derive(Debug, Serialize)]
struct QueryResponse {
    query: String,
    retrieval_mode: &'static str,
    limit: usize,
    returned: usize,
    collection_filter: Option<String>,
    chunk_type_filter: Option<String>,
    main_section_filter: Option<String>,
    results: Vec<SearchHit>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let query_text = args.query.trim();
    if query_text.is_empty() {
        bail!("query must not be empty");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DB_FILE_NAME));
    let store = ChunkStore::open_read_only(&db_path)?;

    let filters = SearchFilters {
        collection: normalize_filter(args.collection.as_deref(), false),
        chunk_type: normalize_filter(args.chunk_type.as_deref(), true),
        main_section: normalize_filter(args.main_section.as_deref(), false),
    };

    let results = match args.retrieval_mode {
        RetrievalMode::Lexical => store.lexical_search(query_text, &filters, args.limit)?,
        RetrievalMode::Semantic => {
            let embedder = LocalHashEmbedder::new(resolve_model_config(&args.model_id))?;
            store.semantic_search(query_text, &embedder, &filters, args.limit)?
        }
    };

    info!(
        mode = retrieval_mode_name(args.retrieval_mode),
        returned = results.len(),
        "query completed"
    );

    if args.json {
        write_json_response(QueryResponse {
            query: query_text.to_string(),
            retrieval_mode: retrieval_mode_name(args.retrieval_mode),
            limit: args.limit,
            returned: results.len(),
            collection_filter: filters.collection,
            chunk_type_filter: filters.chunk_type,
            main_section_filter: filters.main_section,
            results,
        })
    } else {
        write_text_response(query_text, args.retrieval_mode, &results)
    }
}

fn normalize_filter(value: Option<&str>, lowercase: bool) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            if lowercase {
                value.to_lowercase()
            } else {
                value.to_string()
            }
        })
}

fn retrieval_mode_name(mode: RetrievalMode) -> &'static str {
    match mode {
        RetrievalMode::Lexical => "lexical",
        RetrievalMode::Semantic => "semantic",
    }
}

fn write_json_response(response: QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(query_text: &str, mode: RetrievalMode, results: &[SearchHit]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {query_text}")?;
    writeln!(output, "Retrieval: {}", retrieval_mode_name(mode))?;
    writeln!(output, "Results: {}", results.len())?;

    for (index, hit) in results.iter().enumerate() {
        writeln!(
            output,
            "{}.\t{}\tpage {}\t{}\t{}",
            index + 1,
            hit.source,
            hit.page_number,
            hit.chunk_type,
            format_attribution(hit)
        )?;
        writeln!(output, "\tscore={:.6} chunk_id={}", hit.score, hit.chunk_id)?;
        writeln!(output, "\t{}", hit.text)?;
    }

    output.flush()?;
    Ok(())
}

fn format_attribution(hit: &SearchHit) -> String {
    [
        hit.main_section.as_str(),
        hit.sub_section.as_str(),
        hit.number.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty() && *part != NOT_AVAILABLE)
    .collect::<Vec<&str>>()
    .join(" > ")
}
