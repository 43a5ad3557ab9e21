//! Sync orchestration: fetch, index, publish

use crate::config::Settings;
use crate::error::Result;
use crate::fetcher::Source;
use crate::indexer::{self, IndexFailure};
use crate::store::GenerationStore;
use serde::Serialize;
use std::time::Instant;

/// Outcome of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub generation: String,
    pub files_synced: usize,
    pub tables_indexed: usize,
    pub tables_failed: usize,
    pub failures: Vec<IndexFailure>,
    pub duration_ms: u64,
}

/// Run one full sync: fetch the source, rebuild the dataset, publish
/// the new generation, then prune old ones.
///
/// At most one sync runs at a time; a concurrent trigger fails with
/// `SyncInProgress`. Any failure before publish leaves the previous
/// generation authoritative and the new directory unreferenced.
pub fn run_sync(store: &GenerationStore, source: &Source, settings: &Settings) -> Result<SyncReport> {
    let _lock = store.acquire_sync_lock()?;
    let started = Instant::now();

    let generation = store.begin_generation()?;
    let result = build_and_publish(store, source, settings, &generation);

    if result.is_err() {
        // Best-effort: don't leave the aborted generation around
        if let Err(e) = std::fs::remove_dir_all(&generation.dir) {
            log::warn!("Failed to remove aborted generation {}: {}", generation.id, e);
        }
    }
    let (files_synced, tables_indexed, failures) = result?;

    if let Err(e) = store.cleanup(settings.keep_generations) {
        log::warn!("Generation cleanup failed: {}", e);
    }

    let report = SyncReport {
        generation: generation.id,
        files_synced,
        tables_indexed,
        tables_failed: failures.len(),
        failures,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    log::info!(
        "Sync complete: {} files, {} tables indexed, {} failed in {}ms",
        report.files_synced,
        report.tables_indexed,
        report.tables_failed,
        report.duration_ms
    );
    Ok(report)
}

fn build_and_publish(
    store: &GenerationStore,
    source: &Source,
    settings: &Settings,
    generation: &crate::store::GenerationPaths,
) -> Result<(usize, usize, Vec<IndexFailure>)> {
    let snapshot = source.fetch(generation)?;
    let (catalog, failures) = indexer::reindex(&snapshot, generation, settings.sample_window)?;
    store.publish(generation)?;
    Ok((snapshot.files.len(), catalog.tables.len(), failures))
}
