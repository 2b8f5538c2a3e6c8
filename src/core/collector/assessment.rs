// src/core/collector/assessment.rs

use std::path::PathBuf;

use tracing::debug;

use crate::core::api::{self, ApiSource};
use crate::core::error::CollectError;
use crate::core::models::{DateRange, Environment, Module, SearchMetadata};
use crate::core::storage::{self, OutputLayout};

/// Fetches one assessment report, stamps it with its environment, id and
/// search window, and writes it into the environment's report directory.
///
/// # Arguments
/// * `assessment_id` - Id taken from the environment's history file.
///
/// # Returns
/// The path of the written report file.
pub async fn fetch_assessment(
    api: &dyn ApiSource,
    layout: &OutputLayout,
    environment: &Environment,
    module: Module,
    range: &DateRange,
    assessment_id: &str,
) -> Result<PathBuf, CollectError> {
    debug!(
        module = %module,
        environment = %environment.name,
        assessment_id,
        variant = %module.report_variant(),
        "Fetching assessment report."
    );
    let payload = api.get_json(&api::report_path(module, assessment_id), &[]).await?;
    let record = SearchMetadata::for_assessment(environment, range, assessment_id).stamp(payload)?;

    let path = layout.report_file(environment, module, assessment_id);
    storage::write_json(&path, &record).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api::testing::FakeApi;
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        )
    }

    #[tokio::test]
    async fn technical_modules_hit_the_technical_endpoint() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let env = Environment::new("e9", "Lab #9");
        layout.ensure_dirs(&env, Module::Hopper).await.unwrap();
        let api = FakeApi::new().respond(
            "v1/hopper/history/technical/h-1",
            &[],
            json!({"findings": [1, 2, 3]}),
        );

        let path = fetch_assessment(&api, &layout, &env, Module::Hopper, &range(), "h-1")
            .await
            .unwrap();

        assert!(path.ends_with("Lab_9/hopper/report/hopper_report-h-1.json"));
        let written = storage::read_json(&path).await.unwrap();
        assert_eq!(written["findings"], json!([1, 2, 3]));
        assert_eq!(written["assessment_id"], "h-1");
        assert_eq!(written["environment_name"], "Lab #9");
        assert_eq!(written["data-range-start-search"], "2024-05-01");
    }

    #[tokio::test]
    async fn server_error_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let env = Environment::new("e1", "Main");
        layout.ensure_dirs(&env, Module::Mail).await.unwrap();
        let api = FakeApi::new().fail(
            "v1/mail/history/executive/m-1",
            &[],
            StatusCode::INTERNAL_SERVER_ERROR,
        );

        let result = fetch_assessment(&api, &layout, &env, Module::Mail, &range(), "m-1").await;

        assert!(result.is_err());
        assert!(!layout.report_file(&env, Module::Mail, "m-1").exists());
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let env = Environment::new("e1", "Main");
        layout.ensure_dirs(&env, Module::Edr).await.unwrap();
        let api = FakeApi::new().respond("v1/edr/history/executive/x", &[], json!("oops"));

        let err = fetch_assessment(&api, &layout, &env, Module::Edr, &range(), "x")
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::UnexpectedPayload(_)));
        assert!(!layout.report_file(&env, Module::Edr, "x").exists());
    }
}
