//! Command implementations shared by the CLI.

use std::path::Path;

use crate::cli::Status;
use crate::config::{Config, expand_tilde};
use crate::ingest::{self, ImportOutcome};
use crate::store::{CombinedRecord, ComparisonStatus, Store};

/// Import a ZIP archive of paired artifacts, replacing all stored data.
///
/// `status` receives one line per pipeline stage, for progress display.
///
/// # Returns
///
/// The bases that were persisted and the bases that were skipped because
/// their entries could not be read back as text.
///
/// # Errors
///
/// Returns an error if:
/// - The config cannot be loaded or the store cannot be opened
/// - The archive file cannot be read from disk
/// - The ingest pipeline rejects the archive (see [`ingest::ImportError`])
pub fn import(archive_path: &Path, status: impl FnMut(&str)) -> anyhow::Result<ImportOutcome> {
    let config = Config::load()?;
    let bytes = std::fs::read(archive_path)
        .map_err(|e| anyhow::anyhow!("Failed to read archive {}: {e}", archive_path.display()))?;
    let name = archive_path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

    let store = open_store(&config)?;
    Ok(ingest::import_archive(
        &store,
        &config.import,
        &name,
        &bytes,
        status,
    )?)
}

/// List every joined review record, sorted by base.
///
/// # Errors
///
/// Returns an error if config loading or the store read fails.
pub fn list() -> anyhow::Result<Vec<CombinedRecord>> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    Ok(store.get_all_combined()?)
}

/// Get the stored code, or with `render` set the render content, for one
/// base.
///
/// # Errors
///
/// Returns an error if the base has no stored row, or if config loading or
/// the store read fails.
pub fn show(base: &str, render: bool) -> anyhow::Result<String> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let content = if render {
        store.get_render(base)?.map(|record| record.content)
    } else {
        store.get_code(base)?.map(|record| record.code)
    };

    content.ok_or_else(|| anyhow::anyhow!("No artifact set found for '{base}'"))
}

/// Set the review status for one base. Returns the stored status.
///
/// # Errors
///
/// Returns an error if config loading or the store write fails.
pub fn mark(base: &str, status: Status) -> anyhow::Result<ComparisonStatus> {
    let state = ComparisonStatus::from(status);
    let config = Config::load()?;
    let store = open_store(&config)?;
    store.update_state(base, state)?;
    Ok(state)
}

/// Set the reviewer comment for one base.
///
/// # Errors
///
/// Returns an error if config loading or the store write fails.
pub fn comment(base: &str, text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    store.update_comment(base, text)?;
    Ok(())
}

/// Delete all stored data and recreate the empty store.
///
/// # Errors
///
/// Returns an error if config loading fails, another session holds the
/// store's write lock, or the store write fails.
pub fn reset() -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    store.reset()?;
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    let dir = expand_tilde(&config.store.dir);
    Ok(Store::open(dir)?)
}
