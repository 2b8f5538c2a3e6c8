// src/core/storage.rs

//! On-disk layout of an export run, rooted at `{output_dir}/{client}/`.
//!
//! ```text
//! environments/{env}/{module}/report/{module}_report-{assessment}.json
//! environments/environments_list.json
//! environments/agents_list.json
//! history/{module}/{module}_history-{env}.json
//! unified_reports/{module}/unified_report-{env}.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tokio::fs;
use tracing::{debug, warn};

use crate::core::error::CollectError;
use crate::core::models::{Environment, Module};

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, client: &str) -> Self {
        Self { root: output_dir.join(client) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn environments_dir(&self) -> PathBuf {
        self.root.join("environments")
    }

    pub fn environments_list_file(&self) -> PathBuf {
        self.environments_dir().join("environments_list.json")
    }

    pub fn agents_list_file(&self) -> PathBuf {
        self.environments_dir().join("agents_list.json")
    }

    pub fn report_dir(&self, environment: &Environment, module: Module) -> PathBuf {
        self.environments_dir()
            .join(&environment.sanitized_name)
            .join(module.as_str())
            .join("report")
    }

    pub fn report_file(
        &self,
        environment: &Environment,
        module: Module,
        assessment_id: &str,
    ) -> PathBuf {
        self.report_dir(environment, module)
            .join(format!("{module}_report-{assessment_id}.json"))
    }

    pub fn history_dir(&self, module: Module) -> PathBuf {
        self.root.join("history").join(module.as_str())
    }

    pub fn history_file(&self, environment: &Environment, module: Module) -> PathBuf {
        self.history_dir(module)
            .join(format!("{module}_history-{}.json", environment.sanitized_name))
    }

    pub fn unified_dir(&self, module: Module) -> PathBuf {
        self.root.join("unified_reports").join(module.as_str())
    }

    pub fn unified_file(&self, environment: &Environment, module: Module) -> PathBuf {
        self.unified_dir(module)
            .join(format!("unified_report-{}.json", environment.sanitized_name))
    }

    /// Creates the report directory of `environment` and the history
    /// directory of `module`. Safe to call any number of times.
    pub async fn ensure_dirs(
        &self,
        environment: &Environment,
        module: Module,
    ) -> Result<(), CollectError> {
        for dir in [self.report_dir(environment, module), self.history_dir(module)] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| CollectError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Removes the stale reports of a previous run.
    ///
    /// Deletes every file and symlink directly inside the report directory and
    /// every empty subdirectory; nothing is removed recursively. A failed
    /// deletion is logged and skipped.
    ///
    /// # Returns
    /// The number of entries removed.
    pub async fn clear_report_dir(&self, environment: &Environment, module: Module) -> usize {
        let dir = self.report_dir(environment, module);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(
                    path = %dir.display(),
                    error = %e,
                    "Cannot list report directory for clearing."
                );
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Stopped clearing report directory.");
                    break;
                }
            };
            let path = entry.path();
            // file_type() does not follow symlinks, so links are unlinked, never descended.
            let result = match entry.file_type().await {
                Ok(kind) if kind.is_dir() => fs::remove_dir(&path).await,
                Ok(_) => fs::remove_file(&path).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to delete stale report entry."
                ),
            }
        }
        debug!(path = %dir.display(), removed, "Report directory cleared.");
        removed
    }
}

/// Serializes `value` with four-space indentation and writes it to `path`,
/// replacing any existing file.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CollectError> {
    let mut buffer = Vec::new();
    {
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        value.serialize(&mut serializer)?;
    }
    fs::write(path, buffer)
        .await
        .map_err(|e| CollectError::io(path, e))
}

pub async fn read_json(path: &Path) -> Result<Value, CollectError> {
    let bytes = fs::read(path).await.map_err(|e| CollectError::io(path, e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CollectError::UnexpectedPayload(format!("{} is empty", path.display())));
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Lists the `*.json` files directly inside `dir`, sorted by file name.
pub async fn json_files(dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| CollectError::io(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| CollectError::io(dir, e))? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !is_json {
            continue;
        }
        // Follows symlinks, so a link to a report file still counts.
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot inspect report entry, skipping.")
            }
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
