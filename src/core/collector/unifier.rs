// src/core/collector/unifier.rs

use std::path::PathBuf;

use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::core::error::CollectError;
use crate::core::models::{DateRange, Environment, Module, SearchMetadata};
use crate::core::storage::{self, OutputLayout};

/// What the unifier wrote for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedReport {
    pub path: PathBuf,
    /// Number of assessment reports merged; zero means the file holds only
    /// the metadata placeholder.
    pub assessments: usize,
}

/// Merges every report file of an environment/module into one JSON array.
///
/// Files are read in file-name order. A file that cannot be read or parsed is
/// logged and left out. When nothing could be merged the array holds a single
/// placeholder with the environment and search-window metadata, so every
/// collected environment still yields a unified file.
///
/// # Returns
/// `None` for the platform's default environment, which is never unified.
pub async fn unify_environment(
    layout: &OutputLayout,
    environment: &Environment,
    module: Module,
    range: &DateRange,
) -> Result<Option<UnifiedReport>, CollectError> {
    if environment.is_default() {
        info!(
            module = %module,
            environment = %environment.name,
            "Skipping unification of default environment."
        );
        return Ok(None);
    }

    let report_dir = layout.report_dir(environment, module);
    let files = match storage::json_files(&report_dir).await {
        Ok(files) => files,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut records = Vec::with_capacity(files.len());
    for file in &files {
        match storage::read_json(file).await {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %file.display(),
                error = %e,
                "Leaving unreadable report out of the unified file."
            ),
        }
    }

    let assessments = records.len();
    if records.is_empty() {
        records.push(placeholder(environment, range)?);
    }

    let unified_dir = layout.unified_dir(module);
    fs::create_dir_all(&unified_dir)
        .await
        .map_err(|e| CollectError::io(&unified_dir, e))?;
    let path = layout.unified_file(environment, module);
    storage::write_json(&path, &records).await?;

    info!(
        module = %module,
        environment = %environment.name,
        assessments,
        path = %path.display(),
        "Unified report saved."
    );
    Ok(Some(UnifiedReport { path, assessments }))
}

fn placeholder(environment: &Environment, range: &DateRange) -> Result<Value, CollectError> {
    Ok(serde_json::to_value(SearchMetadata::for_environment(environment, range))?)
}
