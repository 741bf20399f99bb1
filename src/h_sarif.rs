//! SARIF 2.1.0 output, the format GitHub Code Scanning ingests.

use crate::h_aggregate::AggregateResult;
use crate::h_category::Category;
use crate::h_cli::BuildInfo;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;

pub const SARIF_VERSION: &str = "2.1.0";
pub const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

#[derive(Debug, Serialize)]
pub struct SarifLog {
    pub version: &'static str,
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize)]
pub struct SarifDriver {
    pub name: &'static str,
    pub version: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: &'static str,
    pub short_description: SarifMessage,
    pub help: SarifMessage,
}

#[derive(Debug, Serialize)]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: &'static str,
    pub level: &'static str,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifact,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize)]
pub struct SarifArtifact {
    pub uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRegion {
    pub start_line: usize,
    pub start_column: usize,
}

/// One rule per category, in the order categories first appear in the escape list.
pub fn build_sarif(result: &AggregateResult, build: &BuildInfo) -> SarifLog {
    let mut seen: HashSet<Category> = HashSet::new();
    let rules = result
        .escapes
        .iter()
        .filter(|e| seen.insert(e.category))
        .map(|e| SarifRule {
            id: e.category.as_str(),
            short_description: SarifMessage {
                text: e.suggestion.short.to_string(),
            },
            help: SarifMessage {
                text: e.suggestion.details.to_string(),
            },
        })
        .collect();

    let results = result
        .escapes
        .iter()
        .map(|e| SarifResult {
            rule_id: e.category.as_str(),
            level: "warning",
            message: SarifMessage {
                text: format!("{} escapes to heap: {}", e.record.subject, e.suggestion.short),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: e.record.location.file.clone(),
                    },
                    region: SarifRegion {
                        start_line: e.record.location.line,
                        start_column: e.record.location.column,
                    },
                },
            }],
        })
        .collect();

    SarifLog {
        version: SARIF_VERSION,
        schema: SARIF_SCHEMA,
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "heapcheck",
                    version: build.version.clone(),
                    rules,
                },
            },
            results,
        }],
    }
}

pub fn generate_sarif_report(result: &AggregateResult, build: &BuildInfo) -> Result<String> {
    let mut json = serde_json::to_string_pretty(&build_sarif(result, build))
        .context("failed to serialize SARIF report")?;
    json.push('\n');
    Ok(json)
}
