// src/core/collector/environments.rs

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tracing::{error, info, warn};

use crate::core::api::{self, ApiSource};
use crate::core::error::CollectError;
use crate::core::models::{Environment, id_text};
use crate::core::storage::{self, OutputLayout};

#[derive(Debug, Deserialize)]
struct EnvironmentList {
    data: Vec<EnvironmentEntry>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentEntry {
    #[serde(default)]
    id: Value,
    name: String,
}

/// Lists every environment of the client account.
///
/// Nothing environment-scoped can run without this list, so unlike the other
/// fetches its failure is returned to the caller instead of being logged.
pub async fn list_environments(api: &dyn ApiSource) -> Result<Vec<Environment>, CollectError> {
    let payload = api.get_json(&api::environments_path(), &[]).await?;
    let list: EnvironmentList = serde_json::from_value(payload)?;

    let mut environments = Vec::with_capacity(list.data.len());
    for entry in list.data {
        match id_text(&entry.id) {
            Some(id) => environments.push(Environment::new(id, entry.name)),
            None => warn!(environment = %entry.name, "Environment has no usable id, skipping."),
        }
    }
    info!(count = environments.len(), "Environments listed.");
    Ok(environments)
}

/// Saves the raw environment and agent lists under `environments/`.
///
/// Each list is fetched and written independently; failures are logged.
///
/// # Returns
/// The files that were written.
pub async fn dump_inventory(api: &dyn ApiSource, layout: &OutputLayout) -> Vec<PathBuf> {
    let targets = [
        ("environments", api::environments_path(), layout.environments_list_file()),
        ("agents", api::agents_path(), layout.agents_list_file()),
    ];

    let mut written = Vec::new();
    for (kind, path, file) in targets {
        match save_raw(api, &path, &file).await {
            Ok(()) => {
                info!(kind, path = %file.display(), "Inventory saved.");
                written.push(file);
            }
            Err(e) => error!(kind, error = %e, "Failed to save inventory."),
        }
    }
    written
}

async fn save_raw(
    api: &dyn ApiSource,
    path: &str,
    file: &std::path::Path,
) -> Result<(), CollectError> {
    let payload = api.get_json(path, &[]).await?;
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CollectError::io(parent, e))?;
    }
    storage::write_json(file, &payload).await
}
