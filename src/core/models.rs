// src/core/models.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::core::error::CollectError;

// --- Moduli di Report ---
// Report Modules

/// The reporting modules exposed by the Cymulate API.
///
/// The declaration order is the order in which a full run walks them.
/// The kebab-case form (`immediate-threats`) is both the URL segment and the
/// directory name used for every output of the module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Module {
    ImmediateThreats,
    Mail,
    Browsing,
    Waf,
    Edr,
    Dlp,
    Hopper,
}

/// The two shapes of the assessment detail endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReportVariant {
    Technical,
    Executive,
}

impl Module {
    /// Immediate-threats and hopper only publish technical reports; every other
    /// module is fetched through its executive summary.
    pub fn report_variant(self) -> ReportVariant {
        match self {
            Module::ImmediateThreats | Module::Hopper => ReportVariant::Technical,
            _ => ReportVariant::Executive,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

// --- Intervallo di Date ---
// Date Range

/// The inclusive search window sent to the history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The start date as the API expects it (`YYYY-MM-DD`).
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// The end date as the API expects it (`YYYY-MM-DD`).
    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

// --- Environment ---

/// Characters that never make it into an on-disk environment name.
static RE_UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

const DEFAULT_ENVIRONMENT_ID: &str = "default";
const DEFAULT_ENVIRONMENT_NAME: &str = "Default Environment";

/// A customer environment as listed by `/v1/environments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: String,
    /// Display name, kept verbatim in every metadata block.
    pub name: String,
    /// Filesystem-safe form of `name`, used in every output path.
    pub sanitized_name: String,
}

impl Environment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let sanitized_name = sanitize_name(&name);
        Self { id: id.into(), name, sanitized_name }
    }

    /// The platform's built-in environment. It is collected like any other
    /// but never gets a unified report.
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_ENVIRONMENT_ID || self.name == DEFAULT_ENVIRONMENT_NAME
    }
}

/// Strips everything except word characters, whitespace and hyphens, then
/// turns spaces into underscores.
pub fn sanitize_name(name: &str) -> String {
    RE_UNSAFE_NAME_CHARS.replace_all(name, "").replace(' ', "_")
}

/// Renders an identifier coming from the API as text. The platform mixes
/// string and numeric ids, so both are accepted.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// --- Metadati di Ricerca ---
// Search Metadata

/// The fields stamped onto every payload this tool writes to disk.
///
/// The field names are part of the file format consumed downstream, so they
/// are flattened into the API payload rather than nested under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMetadata {
    pub environment_name: String,
    pub environment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    #[serde(rename = "data-range-start-search")]
    pub range_start: NaiveDate,
    #[serde(rename = "data-range-end-search")]
    pub range_end: NaiveDate,
}

impl SearchMetadata {
    pub fn for_environment(environment: &Environment, range: &DateRange) -> Self {
        Self {
            environment_name: environment.name.clone(),
            environment_id: environment.id.clone(),
            assessment_id: None,
            range_start: range.start,
            range_end: range.end,
        }
    }

    pub fn for_assessment(
        environment: &Environment,
        range: &DateRange,
        assessment_id: &str,
    ) -> Self {
        Self {
            assessment_id: Some(assessment_id.to_string()),
            ..Self::for_environment(environment, range)
        }
    }

    /// Merges the metadata keys into a JSON object payload, overwriting any
    /// key of the same name.
    ///
    /// # Returns
    /// The stamped payload, or `CollectError::UnexpectedPayload` when the API
    /// answered with something other than a JSON object.
    pub fn stamp(&self, payload: Value) -> Result<Value, CollectError> {
        let Value::Object(mut object) = payload else {
            return Err(CollectError::UnexpectedPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&payload)
            )));
        };
        if let Value::Object(fields) = serde_json::to_value(self)? {
            object.extend(fields);
        }
        Ok(Value::Object(object))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
