use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use flatwise_core::config::{AppConfig, LoadOptions};
use flatwise_core::{ConstraintSet, Priority, RecommendRequest, RecommendationPage, Recommender};
use serde::Serialize;

use crate::artifacts::Artifacts;
use crate::commands::CommandResult;
use crate::logging::init_logging;

const COMMAND: &str = "recommend";

#[derive(Debug, Clone, Default, Args)]
pub struct RecommendArgs {
    #[arg(long, help = "Upper bound on resale price")]
    pub max_price: Option<f64>,
    #[arg(long, help = "Lower bound on remaining lease in years")]
    pub min_lease: Option<f64>,
    #[arg(long, help = "Upper bound on distance to the nearest MRT station in km")]
    pub max_mrt_km: Option<f64>,
    #[arg(long = "town", help = "Accepted town (repeatable)")]
    pub towns: Vec<String>,
    #[arg(long = "flat-type", help = "Accepted flat type (repeatable)")]
    pub flat_types: Vec<String>,
    #[arg(long = "storey-range", help = "Accepted storey range (repeatable)")]
    pub storey_ranges: Vec<String>,
    #[arg(long = "flat-model", help = "Accepted flat model (repeatable)")]
    pub flat_models: Vec<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Read the full request (constraints, priority, page) from a JSON file",
        conflicts_with_all = ["max_price", "min_lease", "max_mrt_km", "towns", "flat_types", "storey_ranges", "flat_models", "priority", "page"]
    )]
    pub request: Option<PathBuf>,
    #[arg(long, help = "Weighting preset: price|floor_area|lease|mrt|balanced")]
    pub priority: Option<String>,
    #[arg(long, help = "1-based results page")]
    pub page: Option<usize>,
    #[arg(long, help = "Emit machine-readable JSON output")]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RecommendOutput<'a> {
    command: &'static str,
    status: &'static str,
    #[serde(flatten)]
    page: &'a RecommendationPage,
}

pub fn run(args: RecommendArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config.logging);

    let request = match build_request(&args) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_request", format!("{error:#}"), 4);
        }
    };

    let artifacts = match Artifacts::load(&config.data) {
        Ok(artifacts) => artifacts,
        Err(error) => {
            return CommandResult::failure(COMMAND, error.class(), error.to_string(), 3);
        }
    };

    let recommender = Recommender::new(
        artifacts.listings,
        artifacts.categories,
        artifacts.network,
        artifacts.criteria,
        config.recommend_settings(),
    );

    match recommender.recommend(&request) {
        Ok(page) if args.json => CommandResult { exit_code: 0, output: render_json(&page) },
        Ok(page) => CommandResult { exit_code: 0, output: render_human(&page) },
        Err(error) => {
            let exit_code = if error.class() == "configuration" { 2 } else { 4 };
            CommandResult::failure(COMMAND, error.class(), error.to_string(), exit_code)
        }
    }
}

fn build_request(args: &RecommendArgs) -> anyhow::Result<RecommendRequest> {
    if let Some(path) = &args.request {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read request `{}`", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("invalid request `{}`", path.display()));
    }

    let priority = match &args.priority {
        Some(value) => value.parse::<Priority>().context("invalid --priority")?,
        None => Priority::default(),
    };

    Ok(RecommendRequest {
        constraints: ConstraintSet {
            max_price: args.max_price,
            min_remaining_lease: args.min_lease,
            max_mrt_distance: args.max_mrt_km,
            towns: non_empty(&args.towns),
            flat_types: non_empty(&args.flat_types),
            storey_ranges: non_empty(&args.storey_ranges),
            flat_models: non_empty(&args.flat_models),
        },
        priority,
        page: args.page.unwrap_or(1),
    })
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn render_json(page: &RecommendationPage) -> String {
    let output = RecommendOutput { command: COMMAND, status: "ok", page };
    serde_json::to_string_pretty(&output).unwrap_or_else(|error| {
        CommandResult::failure(COMMAND, "serialization", error.to_string(), 1).output
    })
}

fn render_human(page: &RecommendationPage) -> String {
    if page.recommendations.is_empty() {
        return format!(
            "recommend: page {} is empty ({} listings match the constraints)",
            page.page, page.total_found
        );
    }

    let mut lines = vec![format!(
        "recommend: page {} of results ({} listings match the constraints)",
        page.page, page.total_found
    )];

    for recommendation in &page.recommendations {
        let listing = &recommendation.listing;
        lines.push(format!(
            "{:>3}. [{:.2}] {} | {} {} {} | ${:.0} | {} ({})",
            recommendation.rank,
            recommendation.score,
            listing.address(),
            listing.town,
            listing.flat_type,
            listing.storey_range,
            listing.resale_price,
            recommendation.ranking_reason,
            listing.index,
        ));
        lines.push(format!("     insight: {}", recommendation.insight));
        lines.push(format!("     {}", recommendation.score_breakdown));
    }

    lines.join("\n")
}
