// src/core/collector/mod.rs

// This file is the entry point of the collection pipeline. Each stage lives in
// its own sub-module; `Collector` wires them together for one module pass.
pub mod assessment;
pub mod environments;
pub mod history;
pub mod pool;
pub mod unifier;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::core::api::ApiSource;
use crate::core::error::CollectError;
use crate::core::models::{DateRange, Environment, Module};
use crate::core::storage::OutputLayout;

/// Counters reported at the end of a module pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub module: Module,
    pub environments: usize,
    pub histories_written: usize,
    pub assessments_fetched: usize,
    pub assessments_failed: usize,
    pub unified_reports: usize,
}

impl ModuleSummary {
    fn new(module: Module) -> Self {
        Self {
            module,
            environments: 0,
            histories_written: 0,
            assessments_fetched: 0,
            assessments_failed: 0,
            unified_reports: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FetchTally {
    fetched: usize,
    failed: usize,
}

/// Runs the collection of one module: environments, histories, assessment
/// reports and unified reports.
///
/// Shared behind an `Arc` by every task of the pass; nothing in it is mutated
/// once the pass starts.
pub struct Collector {
    api: Arc<dyn ApiSource>,
    layout: OutputLayout,
    module: Module,
    range: DateRange,
    workers: usize,
}

impl Collector {
    pub fn new(
        api: Arc<dyn ApiSource>,
        layout: OutputLayout,
        module: Module,
        range: DateRange,
        workers: usize,
    ) -> Self {
        Self { api, layout, module, range, workers }
    }

    /// Executes the whole pass.
    ///
    /// 1. Lists the environments (a failure here aborts the pass).
    /// 2. For each environment in turn: prepares its directories, clears
    ///    stale reports and saves a fresh history.
    /// 3. Fetches the assessment reports of every environment whose history
    ///    was saved, environments and assessments each on their own pool.
    /// 4. Once every fetch has finished, unifies each environment.
    ///
    /// # Errors
    /// Environment listing failures and filesystem errors while preparing
    /// directories or writing unified reports. Per-environment and
    /// per-assessment fetch failures are only logged and counted.
    pub async fn run(self: Arc<Self>) -> Result<ModuleSummary, CollectError> {
        let module = self.module;
        info!(module = %module, "Starting module collection.");

        let environments = environments::list_environments(self.api.as_ref()).await?;
        let mut summary = ModuleSummary::new(module);
        summary.environments = environments.len();

        let mut with_history = Vec::with_capacity(environments.len());
        for environment in &environments {
            self.layout.ensure_dirs(environment, module).await?;
            self.layout.clear_report_dir(environment, module).await;

            let fetched = history::fetch_history(
                self.api.as_ref(),
                &self.layout,
                environment,
                module,
                &self.range,
            )
            .await;
            match fetched {
                Ok(_) => {
                    summary.histories_written += 1;
                    with_history.push(environment.clone());
                }
                Err(e) => error!(
                    module = %module,
                    environment = %environment.name,
                    error = %e,
                    "Failed to fetch assessment history."
                ),
            }
        }

        let tallies = pool::fan_out(with_history, self.workers, |environment| {
            let collector = Arc::clone(&self);
            async move { collector.collect_environment(environment).await }
        })
        .await;
        for tally in tallies {
            summary.assessments_fetched += tally.fetched;
            summary.assessments_failed += tally.failed;
        }

        for environment in &environments {
            if let Some(report) =
                unifier::unify_environment(&self.layout, environment, module, &self.range).await?
            {
                debug!(
                    environment = %environment.name,
                    assessments = report.assessments,
                    "Environment unified."
                );
                summary.unified_reports += 1;
            }
        }

        info!(
            module = %module,
            environments = summary.environments,
            fetched = summary.assessments_fetched,
            failed = summary.assessments_failed,
            unified = summary.unified_reports,
            "Module collection finished."
        );
        Ok(summary)
    }

    /// Fetches every assessment listed in one environment's history file.
    async fn collect_environment(self: Arc<Self>, environment: Environment) -> FetchTally {
        let module = self.module;
        let history_file = self.layout.history_file(&environment, module);

        let ids = match history::load_assessment_ids(&history_file).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    module = %module,
                    environment = %environment.name,
                    path = %history_file.display(),
                    error = %e,
                    "Unusable history file, skipping environment."
                );
                return FetchTally::default();
            }
        };
        if ids.is_empty() {
            info!(module = %module, environment = %environment.name, "No assessments in range.");
            return FetchTally::default();
        }
        info!(
            module = %module,
            environment = %environment.name,
            count = ids.len(),
            "Fetching assessment reports."
        );

        let environment = Arc::new(environment);
        let outcomes = pool::fan_out(ids, self.workers, |assessment_id| {
            let collector = Arc::clone(&self);
            let environment = Arc::clone(&environment);
            async move {
                let result = assessment::fetch_assessment(
                    collector.api.as_ref(),
                    &collector.layout,
                    &environment,
                    collector.module,
                    &collector.range,
                    &assessment_id,
                )
                .await;
                if let Err(e) = &result {
                    error!(
                        module = %collector.module,
                        environment = %environment.name,
                        assessment_id = %assessment_id,
                        error = %e,
                        "Failed to fetch assessment report."
                    );
                }
                result.is_ok()
            }
        })
        .await;

        let fetched = outcomes.iter().filter(|ok| **ok).count();
        FetchTally { fetched, failed: outcomes.len() - fetched }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api::testing::FakeApi;
    use crate::core::api::{history_path, report_path};
    use crate::core::storage;
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
    }

    fn attacks(ids: &[&str]) -> Value {
        let entries: Vec<Value> = ids.iter().map(|id| json!({"ID": id, "Name": "run"})).collect();
        json!({"data": {"attack": entries}})
    }

    fn with_history(api: FakeApi, module: Module, env: &Environment, ids: &[&str]) -> FakeApi {
        api.respond(
            &history_path(module),
            &history::history_query(env, &range()),
            attacks(ids),
        )
    }

    fn single_environment() -> Value {
        json!({"data": [{"id": "e1", "name": "Main"}]})
    }

    fn collector(api: FakeApi, layout: &OutputLayout, module: Module) -> Arc<Collector> {
        Arc::new(Collector::new(Arc::new(api), layout.clone(), module, range(), 4))
    }

    fn report_count(layout: &OutputLayout, env: &Environment, module: Module) -> usize {
        std::fs::read_dir(layout.report_dir(env, module)).unwrap().count()
    }

    #[tokio::test]
    async fn end_to_end_with_default_environment() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let normal = Environment::new("e1", "Head Office");
        let default = Environment::new("d0", "Default Environment");

        let mut api = FakeApi::new().respond(
            "v1/environments",
            &[],
            json!({"data": [
                {"id": "e1", "name": "Head Office"},
                {"id": "d0", "name": "Default Environment"}
            ]}),
        );
        api = with_history(api, Module::Mail, &normal, &["a1", "a2", "a3"]);
        api = with_history(api, Module::Mail, &default, &[]);
        for id in ["a1", "a2", "a3"] {
            api = api.respond(&report_path(Module::Mail, id), &[], json!({"assessment": id}));
        }

        let summary = collector(api, &layout, Module::Mail).run().await.unwrap();

        assert_eq!(report_count(&layout, &normal, Module::Mail), 3);
        assert_eq!(report_count(&layout, &default, Module::Mail), 0);
        let unified = storage::read_json(&layout.unified_file(&normal, Module::Mail))
            .await
            .unwrap();
        let ids: Vec<&str> = unified
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["assessment_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["a1", "a2", "a3"]);
        assert!(!layout.unified_file(&default, Module::Mail).exists());
        assert_eq!(
            summary,
            ModuleSummary {
                module: Module::Mail,
                environments: 2,
                histories_written: 2,
                assessments_fetched: 3,
                assessments_failed: 0,
                unified_reports: 1,
            }
        );
    }

    #[tokio::test]
    async fn failed_assessment_does_not_affect_siblings() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let first = Environment::new("e1", "First");
        let second = Environment::new("e2", "Second");

        let mut api = FakeApi::new().respond(
            "v1/environments",
            &[],
            json!({"data": [{"id": "e1", "name": "First"}, {"id": "e2", "name": "Second"}]}),
        );
        api = with_history(api, Module::Edr, &first, &["ok-1", "broken", "ok-2"]);
        api = with_history(api, Module::Edr, &second, &["ok-3"]);
        for id in ["ok-1", "ok-2", "ok-3"] {
            api = api.respond(&report_path(Module::Edr, id), &[], json!({"id": id}));
        }
        api = api.fail(&report_path(Module::Edr, "broken"), &[], StatusCode::INTERNAL_SERVER_ERROR);

        let summary = collector(api, &layout, Module::Edr).run().await.unwrap();

        assert_eq!(summary.assessments_fetched, 3);
        assert_eq!(summary.assessments_failed, 1);
        assert_eq!(report_count(&layout, &first, Module::Edr), 2);
        assert_eq!(report_count(&layout, &second, Module::Edr), 1);

        let unified = storage::read_json(&layout.unified_file(&first, Module::Edr)).await.unwrap();
        let unified = unified.as_array().unwrap();
        assert_eq!(unified.len(), 2);
        assert!(unified.iter().all(|r| r["assessment_id"] != "broken"));
        assert!(layout.unified_file(&second, Module::Edr).exists());
    }

    #[tokio::test]
    async fn history_failure_skips_environment_but_still_unifies() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let env = Environment::new("e1", "Only");
        let api = FakeApi::new()
            .respond("v1/environments", &[], json!({"data": [{"id": "e1", "name": "Only"}]}))
            .fail(
                &history_path(Module::Waf),
                &history::history_query(&env, &range()),
                StatusCode::BAD_GATEWAY,
            );

        let summary = collector(api, &layout, Module::Waf).run().await.unwrap();

        assert_eq!(summary.histories_written, 0);
        assert_eq!(summary.assessments_fetched, 0);
        assert_eq!(summary.unified_reports, 1);
        let unified = storage::read_json(&layout.unified_file(&env, Module::Waf)).await.unwrap();
        assert_eq!(unified.as_array().unwrap().len(), 1);
        assert_eq!(unified[0]["environment_id"], "e1");
        assert!(unified[0].get("assessment_id").is_none());
    }

    #[tokio::test]
    async fn stale_reports_are_cleared_before_fetching() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let env = Environment::new("e1", "Main");
        layout.ensure_dirs(&env, Module::Browsing).await.unwrap();
        let stale = layout.report_file(&env, Module::Browsing, "old");
        std::fs::write(&stale, r#"{"stale": true}"#).unwrap();

        let mut api = FakeApi::new().respond("v1/environments", &[], single_environment());
        api = with_history(api, Module::Browsing, &env, &["new"]);
        api = api.respond(&report_path(Module::Browsing, "new"), &[], json!({"fresh": true}));

        collector(api, &layout, Module::Browsing).run().await.unwrap();

        assert!(!stale.exists());
        let unified = storage::read_json(&layout.unified_file(&env, Module::Browsing))
            .await
            .unwrap();
        assert_eq!(unified.as_array().unwrap().len(), 1);
        assert_eq!(unified[0]["fresh"], true);
    }

    #[tokio::test]
    async fn environment_listing_failure_aborts_the_pass() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let api = FakeApi::new().fail("v1/environments", &[], StatusCode::FORBIDDEN);

        let result = collector(api, &layout, Module::Dlp).run().await;

        assert!(matches!(result, Err(CollectError::Status { .. })));
        assert!(!layout.root().exists());
    }

    #[tokio::test]
    async fn technical_module_uses_technical_reports() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), "ACME");
        let env = Environment::new("e1", "Main");
        let mut api = FakeApi::new().respond("v1/environments", &[], single_environment());
        api = with_history(api, Module::ImmediateThreats, &env, &["t1"]);
        api = api.respond("v1/immediate-threats/history/technical/t1", &[], json!({"ok": 1}));

        let summary = collector(api, &layout, Module::ImmediateThreats).run().await.unwrap();

        assert_eq!(summary.assessments_fetched, 1);
        assert!(layout.report_file(&env, Module::ImmediateThreats, "t1").exists());
    }
}
