use std::path::Path;

use flatwise_core::config::{AppConfig, LoadOptions};
use flatwise_core::ModelVariable;
use serde::Serialize;

use crate::artifacts;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const ARTIFACT_CHECKS: [&str; 4] =
    ["listings_artifact", "network_artifact", "category_table_artifact", "criteria_artifact"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_listings(&config.data.listings));
            checks.push(check_network(&config.data.network));
            checks.push(check_categories(&config.data.categories));
            checks.push(check_criteria(&config.data.criteria));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(ARTIFACT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_listings(path: &Path) -> DoctorCheck {
    let name = "listings_artifact";
    match artifacts::load_listings(path) {
        Ok(listings) if listings.is_empty() => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{}` contains no listings", path.display()),
        },
        Ok(listings) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("{} listings loaded from `{}`", listings.len(), path.display()),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn check_network(path: &Path) -> DoctorCheck {
    let name = "network_artifact";
    let network = match artifacts::load_network(path) {
        Ok(network) => network,
        Err(error) => {
            return DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() };
        }
    };

    let missing = network.missing_variables();
    if missing.is_empty() {
        return DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!(
                "network `{}` declares {} variables",
                network.name().unwrap_or("unnamed"),
                network.variable_names().count()
            ),
        };
    }

    let missing = missing.iter().map(|variable| variable.as_str()).collect::<Vec<_>>().join(", ");
    DoctorCheck {
        name,
        status: CheckStatus::Fail,
        details: format!("network is missing required variables: {missing}"),
    }
}

fn check_categories(path: &Path) -> DoctorCheck {
    let name = "category_table_artifact";
    match artifacts::load_categories(path) {
        Ok(table) => {
            let counts = ModelVariable::BINNED
                .iter()
                .map(|variable| {
                    let bins = table.bins(*variable).map(|bins| bins.len()).unwrap_or(0);
                    format!("{variable}={bins}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            DoctorCheck { name, status: CheckStatus::Pass, details: format!("bins per variable: {counts}") }
        }
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn check_criteria(path: &Path) -> DoctorCheck {
    let name = "criteria_artifact";
    match artifacts::load_criteria(path) {
        Ok(criteria) if criteria.is_empty() => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{}` configures no ranking criteria", path.display()),
        },
        Ok(criteria) => {
            let labels =
                criteria.iter().map(|criterion| criterion.label.as_str()).collect::<Vec<_>>().join(", ");
            DoctorCheck { name, status: CheckStatus::Pass, details: format!("ranking on {labels}") }
        }
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
