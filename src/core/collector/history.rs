// src/core/collector/history.rs

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::api::{self, ApiSource};
use crate::core::error::CollectError;
use crate::core::models::{DateRange, Environment, Module, SearchMetadata, id_text};
use crate::core::storage::{self, OutputLayout};

/// Query parameters of the history endpoint for one environment.
pub fn history_query(environment: &Environment, range: &DateRange) -> [(&'static str, String); 3] {
    [
        ("fromDate", range.start_param()),
        ("toDate", range.end_param()),
        ("env", environment.id.clone()),
    ]
}

/// Fetches the assessment history of one environment and overwrites its
/// history file with the stamped payload.
///
/// On any error the existing history file is left as it was.
///
/// # Returns
/// The path of the history file that was written.
pub async fn fetch_history(
    api: &dyn ApiSource,
    layout: &OutputLayout,
    environment: &Environment,
    module: Module,
    range: &DateRange,
) -> Result<PathBuf, CollectError> {
    debug!(module = %module, environment = %environment.name, "Fetching assessment history.");
    let payload = api
        .get_json(&api::history_path(module), &history_query(environment, range))
        .await?;
    let record = SearchMetadata::for_environment(environment, range).stamp(payload)?;

    let path = layout.history_file(environment, module);
    storage::write_json(&path, &record).await?;
    info!(
        module = %module,
        environment = %environment.name,
        path = %path.display(),
        "History saved."
    );
    Ok(path)
}

/// Reads a history file back and returns the assessment ids it lists.
///
/// # Errors
/// A missing file is reported as `CollectError::Io` (see `is_not_found`), an
/// empty one or one without `data.attack` as `UnexpectedPayload`, broken JSON
/// as `Decode`.
pub async fn load_assessment_ids(path: &Path) -> Result<Vec<String>, CollectError> {
    let history = storage::read_json(path).await?;
    extract_assessment_ids(&history)
}

/// Pulls the `ID` of every entry under `data.attack`.
///
/// A null list counts as empty. Entries without a usable `ID` are skipped.
pub fn extract_assessment_ids(history: &Value) -> Result<Vec<String>, CollectError> {
    let attacks: &[Value] = match history.pointer("/data/attack") {
        Some(Value::Array(attacks)) => attacks,
        Some(Value::Null) => &[],
        Some(_) => {
            return Err(CollectError::UnexpectedPayload(
                "'data.attack' is not a list".to_string(),
            ));
        }
        None => {
            return Err(CollectError::UnexpectedPayload(
                "expected 'data.attack' in history".to_string(),
            ));
        }
    };

    let mut ids = Vec::with_capacity(attacks.len());
    for (position, attack) in attacks.iter().enumerate() {
        match attack.get("ID").and_then(id_text) {
            Some(id) if is_path_safe(&id) => ids.push(id),
            Some(id) => warn!(
                position,
                assessment_id = %id,
                "History entry ID cannot be used as a URL segment or file name, skipping."
            ),
            None => warn!(position, "History entry has no usable ID, skipping."),
        }
    }
    Ok(ids)
}

/// Ids end up as a URL path segment and inside a file name, so separators,
/// query/fragment markers and dot segments are refused.
fn is_path_safe(id: &str) -> bool {
    id != "."
        && id != ".."
        && !id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control())
}
