use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;

use crate::segment::DocumentChunk;
use crate::semantic::{
    Embedder, SemanticModelConfig, cosine_similarity, decode_embedding_blob,
    encode_embedding_blob,
};
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";
const SNIPPET_CHARS: usize = 420;

#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub doc_id: String,
    pub filename: String,
    pub sha256: String,
    pub family: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct InsertedChunk {
    pub chunk_id: String,
}

#[derive(Debug, Clone)]
pub struct PendingEmbedding {
    pub chunk_id: String,
    pub text_hash: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub collection: Option<String>,
    pub chunk_type: Option<String>,
    pub main_section: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub doc_id: String,
    pub collection: String,
    pub chunk_type: String,
    pub main_section: String,
    pub sub_section: String,
    pub title: String,
    pub number: String,
    pub page_number: u32,
    pub source: String,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreCounts {
    pub docs: i64,
    pub chunks: i64,
    pub embeddings: i64,
    pub chunks_by_type: Vec<(String, i64)>,
}

#[derive(Debug)]
pub struct ChunkStore {
    connection: Connection,
}

impl ChunkStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to set journal_mode=WAL")?;
        connection
            .pragma_update(None, "synchronous", "NORMAL")
            .context("failed to set synchronous=NORMAL")?;

        Self::with_connection(connection)
    }

    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open database read-only: {}", db_path.display()))?;
        Ok(Self { connection })
    }

    pub fn with_connection(connection: Connection) -> Result<Self> {
        let store = Self { connection };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS metadata (
                  key TEXT PRIMARY KEY,
                  value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS docs (
                  doc_id TEXT PRIMARY KEY,
                  filename TEXT NOT NULL,
                  sha256 TEXT NOT NULL,
                  family TEXT NOT NULL,
                  collection TEXT NOT NULL,
                  ingested_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunks (
                  chunk_id TEXT PRIMARY KEY,
                  doc_id TEXT NOT NULL,
                  collection TEXT NOT NULL,
                  type TEXT NOT NULL,
                  main_section TEXT NOT NULL,
                  sub_section TEXT NOT NULL,
                  title TEXT NOT NULL,
                  number TEXT NOT NULL,
                  page_number INTEGER NOT NULL,
                  chunk_seq INTEGER NOT NULL,
                  text TEXT NOT NULL,
                  source TEXT NOT NULL,
                  source_hash TEXT,
                  FOREIGN KEY(doc_id) REFERENCES docs(doc_id)
                );

                CREATE INDEX IF NOT EXISTS chunks_doc_idx ON chunks(doc_id);

                CREATE TABLE IF NOT EXISTS embedding_models (
                  model_id TEXT PRIMARY KEY,
                  backend TEXT NOT NULL,
                  model_name TEXT NOT NULL,
                  dimensions INTEGER NOT NULL,
                  created_at TEXT NOT NULL,
                  config_json TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunk_embeddings (
                  chunk_id TEXT NOT NULL,
                  model_id TEXT NOT NULL,
                  embedding BLOB NOT NULL,
                  embedding_dim INTEGER NOT NULL,
                  text_hash TEXT NOT NULL,
                  generated_at TEXT NOT NULL,
                  PRIMARY KEY(chunk_id, model_id)
                );
                ",
            )
            .context("failed to create chunk store schema")?;

        self.connection
            .execute(
                "
                CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts
                USING fts5(chunk_id, doc_id, main_section, sub_section, title, text, content='chunks', content_rowid='rowid')
                ",
                [],
            )
            .context("failed to initialize FTS5 table chunks_fts")?;

        self.connection.execute(
            "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            [DB_SCHEMA_VERSION],
        )?;
        self.connection.execute(
            "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            [now_utc_string()],
        )?;

        Ok(())
    }

    pub fn upsert_doc(&self, doc: &StoredDoc) -> Result<()> {
        self.connection
            .execute(
                "
                INSERT INTO docs(doc_id, filename, sha256, family, collection, ingested_at)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(doc_id) DO UPDATE SET
                  filename=excluded.filename,
                  sha256=excluded.sha256,
                  family=excluded.family,
                  collection=excluded.collection,
                  ingested_at=excluded.ingested_at
                ",
                params![
                    &doc.doc_id,
                    &doc.filename,
                    &doc.sha256,
                    &doc.family,
                    &doc.collection,
                    now_utc_string()
                ],
            )
            .with_context(|| format!("failed to upsert doc {}", doc.doc_id))?;
        Ok(())
    }

    pub fn replace_doc_chunks(
        &mut self,
        doc: &StoredDoc,
        chunks: &[DocumentChunk],
    ) -> Result<Vec<InsertedChunk>> {
        let tx = self.connection.transaction()?;
        let mut inserted = Vec::with_capacity(chunks.len());

        tx.execute(
            "DELETE FROM chunk_embeddings WHERE chunk_id IN (SELECT chunk_id FROM chunks WHERE doc_id = ?1)",
            [&doc.doc_id],
        )?;
        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", [&doc.doc_id])?;

        {
            let mut statement = tx.prepare(
                "
                INSERT INTO chunks(
                  chunk_id, doc_id, collection, type, main_section, sub_section,
                  title, number, page_number, chunk_seq, text, source, source_hash
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ",
            )?;

            let mut seen_refs = HashMap::<String, i64>::new();
            for (seq, chunk) in chunks.iter().enumerate() {
                let chunk_type = chunk.metadata.chunk_type.as_str();
                let ref_key = sanitize_ref_for_id(&chunk.metadata.number);
                let count = seen_refs
                    .entry(format!("{chunk_type}:{ref_key}"))
                    .and_modify(|value| *value += 1)
                    .or_insert(1);
                let chunk_id = format!("{}:{}:{}:{:03}", doc.doc_id, chunk_type, ref_key, count);

                statement
                    .execute(params![
                        &chunk_id,
                        &doc.doc_id,
                        &doc.collection,
                        chunk_type,
                        &chunk.metadata.main_section,
                        &chunk.metadata.sub_section,
                        &chunk.metadata.title,
                        &chunk.metadata.number,
                        chunk.metadata.page_number,
                        (seq + 1) as i64,
                        &chunk.content,
                        &chunk.metadata.source,
                        &doc.sha256
                    ])
                    .with_context(|| format!("failed to insert chunk {chunk_id}"))?;

                inserted.push(InsertedChunk { chunk_id });
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    pub fn register_model(&self, model: &SemanticModelConfig) -> Result<()> {
        let config_json = serde_json::to_string(model).context("failed to serialize model")?;
        self.connection.execute(
            "
            INSERT INTO embedding_models(model_id, backend, model_name, dimensions, created_at, config_json)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(model_id) DO UPDATE SET
              backend=excluded.backend,
              model_name=excluded.model_name,
              dimensions=excluded.dimensions,
              config_json=excluded.config_json
            ",
            params![
                &model.model_id,
                &model.backend,
                &model.model_name,
                model.dimensions as i64,
                now_utc_string(),
                config_json,
            ],
        )?;
        Ok(())
    }

    pub fn flush_embeddings(
        &mut self,
        model_id: &str,
        pending: &mut Vec<PendingEmbedding>,
    ) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }

        let tx = self.connection.transaction()?;
        let mut written = 0usize;
        {
            let mut statement = tx.prepare(
                "
                INSERT INTO chunk_embeddings(chunk_id, model_id, embedding, embedding_dim, text_hash, generated_at)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(chunk_id, model_id) DO UPDATE SET
                  embedding=excluded.embedding,
                  embedding_dim=excluded.embedding_dim,
                  text_hash=excluded.text_hash,
                  generated_at=excluded.generated_at
                ",
            )?;

            let generated_at = now_utc_string();
            for row in pending.drain(..) {
                statement.execute(params![
                    &row.chunk_id,
                    model_id,
                    encode_embedding_blob(&row.vector),
                    row.vector.len() as i64,
                    &row.text_hash,
                    &generated_at,
                ])?;
                written += 1;
            }
        }
        tx.commit()?;

        Ok(written)
    }

    pub fn sync_fts_index(&self) -> Result<()> {
        self.connection
            .execute("INSERT INTO chunks_fts(chunks_fts) VALUES('rebuild')", [])
            .context("failed to rebuild FTS index")?;
        Ok(())
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let docs = count_rows(&self.connection, "SELECT COUNT(*) FROM docs")?;
        let chunks = count_rows(&self.connection, "SELECT COUNT(*) FROM chunks")?;
        let embeddings = count_rows(&self.connection, "SELECT COUNT(*) FROM chunk_embeddings")?;

        let mut statement = self
            .connection
            .prepare("SELECT type, COUNT(*) FROM chunks GROUP BY type ORDER BY type ASC")?;
        let chunks_by_type = statement
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;

        Ok(StoreCounts {
            docs,
            chunks,
            embeddings,
            chunks_by_type,
        })
    }

    pub fn metadata_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .connection
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn lexical_search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let fts_query = to_fts_query(query_text);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut statement = self.connection.prepare(
            "
            SELECT
              c.chunk_id, c.doc_id, c.collection, c.type, c.main_section, c.sub_section,
              c.title, c.number, c.page_number, c.source, c.text, bm25(chunks_fts)
            FROM chunks_fts
            JOIN chunks c ON c.rowid = chunks_fts.rowid
            WHERE
              chunks_fts MATCH ?1
              AND (?2 IS NULL OR c.collection = ?2)
              AND (?3 IS NULL OR c.type = ?3)
              AND (?4 IS NULL OR c.main_section = ?4)
            ORDER BY bm25(chunks_fts) ASC
            LIMIT ?5
            ",
        )?;

        let mut rows = statement.query(params![
            fts_query,
            filters.collection.as_deref(),
            filters.chunk_type.as_deref(),
            filters.main_section.as_deref(),
            limit as i64,
        ])?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let bm25: f64 = row.get(11)?;
            hits.push(hit_from_row(row, -bm25)?);
        }

        Ok(hits)
    }

    pub fn semantic_search(
        &self,
        query_text: &str,
        embedder: &dyn Embedder,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let model = embedder.model();
        let model_known = self
            .connection
            .query_row(
                "SELECT 1 FROM embedding_models WHERE model_id = ?1 LIMIT 1",
                [&model.model_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        if !model_known {
            anyhow::bail!(
                "embedding model '{}' is not registered; run ingest first",
                model.model_id
            );
        }

        let query_vector = embedder.embed(query_text)?;
        let mut statement = self.connection.prepare(
            "
            SELECT
              c.chunk_id, c.doc_id, c.collection, c.type, c.main_section, c.sub_section,
              c.title, c.number, c.page_number, c.source, c.text, ce.embedding, ce.embedding_dim
            FROM chunk_embeddings ce
            JOIN chunks c ON c.chunk_id = ce.chunk_id
            WHERE
              ce.model_id = ?1
              AND (?2 IS NULL OR c.collection = ?2)
              AND (?3 IS NULL OR c.type = ?3)
              AND (?4 IS NULL OR c.main_section = ?4)
            ",
        )?;

        let mut rows = statement.query(params![
            &model.model_id,
            filters.collection.as_deref(),
            filters.chunk_type.as_deref(),
            filters.main_section.as_deref(),
        ])?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(11)?;
            let dim = row.get::<_, i64>(12)? as usize;
            let Some(vector) = decode_embedding_blob(&blob, dim) else {
                continue;
            };
            let score = cosine_similarity(&query_vector, &vector);
            hits.push(hit_from_row(row, score)?);
        }

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.chunk_id.cmp(&right.chunk_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

fn hit_from_row(row: &rusqlite::Row<'_>, score: f64) -> rusqlite::Result<SearchHit> {
    let text: String = row.get(10)?;
    Ok(SearchHit {
        chunk_id: row.get(0)?,
        doc_id: row.get(1)?,
        collection: row.get(2)?,
        chunk_type: row.get(3)?,
        main_section: row.get(4)?,
        sub_section: row.get(5)?,
        title: row.get(6)?,
        number: row.get(7)?,
        page_number: row.get(8)?,
        source: row.get(9)?,
        text: text.chars().take(SNIPPET_CHARS).collect(),
        score,
    })
}

fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

fn to_fts_query(query_text: &str) -> String {
    query_text
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn sanitize_ref_for_id(reference: &str) -> String {
    let mut out = String::with_capacity(reference.len());
    for ch in reference.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }

    while out.contains("__") {
        out = out.replace("__", "_");
    }

    out.trim_matches('_').to_string()
}
