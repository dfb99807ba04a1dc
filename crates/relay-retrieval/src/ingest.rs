//! Offline document ingestion.
//!
//! Walks a directory of `.txt`/`.md` files, splits each on blank lines,
//! and stores chunks with the file name as the source tag. Meant to run
//! before serving traffic, not concurrently with it.

use std::io;
use std::path::Path;

use crate::store::RetrievalBackend;

/// Chunks shorter than this are noise (headings, separators) and skipped.
const MIN_CHUNK_CHARS: usize = 50;

/// Ingest every supported file under `dir`. Returns the chunk count.
pub async fn ingest_dir(store: &dyn RetrievalBackend, dir: &Path) -> io::Result<usize> {
    let mut added = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let supported = path
            .extension()
            .map_or(false, |ext| ext == "txt" || ext == "md");
        if !supported {
            continue;
        }

        let text = tokio::fs::read_to_string(&path).await?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        for chunk in text.split("\n\n") {
            let chunk = chunk.trim();
            if chunk.chars().count() > MIN_CHUNK_CHARS {
                store.add(chunk, &source);
                added += 1;
            }
        }
    }

    log::info!("Ingested {} chunks from {:?}", added, dir);
    Ok(added)
}
