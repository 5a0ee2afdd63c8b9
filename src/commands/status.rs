use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::DB_FILE_NAME;
use crate::commands::inventory::INVENTORY_MANIFEST_NAME;
use crate::model::SourceInventoryManifest;
use crate::store::ChunkStore;
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let inventory_path = args
        .cache_root
        .join("manifests")
        .join(INVENTORY_MANIFEST_NAME);
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DB_FILE_NAME));

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: SourceInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source_count = inventory.source_count,
            source_directory = %inventory.source_directory,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if db_path.exists() {
        let store = ChunkStore::open_read_only(&db_path)?;
        let counts = store.counts()?;
        let schema_version = store
            .metadata_value("db_schema_version")
            .ok()
            .flatten()
            .unwrap_or_default();

        info!(
            path = %db_path.display(),
            schema_version = %schema_version,
            docs = counts.docs,
            chunks = counts.chunks,
            embeddings = counts.embeddings,
            "database status"
        );
        for (chunk_type, count) in &counts.chunks_by_type {
            info!(chunk_type = %chunk_type, chunks = count, "chunks by type");
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}
