//! LLM tool definitions over the analytics service.
//!
//! Tools publish a JSON-schema parameter object and return their result as a
//! JSON string, which is what function-calling models expect back.

use dr_core::{AppError, HubCategory, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analytics::{AnalyticsFilter, AnalyticsService, Metric};

pub const REVIEW_ANALYTICS: &str = "review_analytics";
pub const COMMUNITY_ANALYTICS: &str = "community_analytics";

const REVIEW_METRICS: [Metric; 5] = [
    Metric::RatingDistribution,
    Metric::HubComparison,
    Metric::TopRatedHubs,
    Metric::ReviewVolume,
    Metric::CategoryBreakdown,
];

const COMMUNITY_METRICS: [Metric; 2] = [Metric::MemberStats, Metric::EventStats];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReviewArgs {
    metric: Metric,
    hub_id: Option<Uuid>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommunityArgs {
    metric: Metric,
    category: Option<String>,
}

fn parse_args<T: serde::de::DeserializeOwned>(name: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| AppError::ValidationError(format!("invalid arguments for {name}: {e}")))
}

fn metric_names(metrics: &[Metric]) -> Vec<&'static str> {
    metrics.iter().map(Metric::as_str).collect()
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: REVIEW_ANALYTICS,
            description: "Aggregate hub reviews: rating distribution, hub comparison (hubs with \
                          at least 3 reviews), top rated hubs (at least 5 reviews), monthly \
                          review volume and per-category breakdown.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "metric": { "type": "string", "enum": metric_names(&REVIEW_METRICS) },
                    "hub_id": {
                        "type": "string",
                        "format": "uuid",
                        "description": "Restrict rating distribution or review volume to one hub"
                    },
                    "category": { "type": "string", "enum": HubCategory::VALUES }
                },
                "required": ["metric"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: COMMUNITY_ANALYTICS,
            description: "Community activity per hub: member counts against ratings, and total \
                          and upcoming events.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "metric": { "type": "string", "enum": metric_names(&COMMUNITY_METRICS) },
                    "category": { "type": "string", "enum": HubCategory::VALUES }
                },
                "required": ["metric"],
                "additionalProperties": false
            }),
        },
    ]
}

#[derive(Clone)]
pub struct AnalyticsTools {
    analytics: AnalyticsService,
}

impl AnalyticsTools {
    pub fn new(analytics: AnalyticsService) -> Self {
        Self { analytics }
    }

    /// Executes a tool call and returns the chart payload as a JSON string.
    #[instrument(skip(self, args))]
    pub async fn call(&self, name: &str, args: Value) -> Result<String> {
        let (allowed, metric, filter): (&[Metric], Metric, AnalyticsFilter) = match name {
            REVIEW_ANALYTICS => {
                let args: ReviewArgs = parse_args(name, args)?;
                let filter = AnalyticsFilter { hub_id: args.hub_id, category: args.category };
                (&REVIEW_METRICS[..], args.metric, filter)
            }
            COMMUNITY_ANALYTICS => {
                let args: CommunityArgs = parse_args(name, args)?;
                let filter = AnalyticsFilter { hub_id: None, category: args.category };
                (&COMMUNITY_METRICS[..], args.metric, filter)
            }
            _ => return Err(AppError::not_found("Tool", name)),
        };
        if !allowed.contains(&metric) {
            return Err(AppError::ValidationError(format!("{name} does not support metric '{metric}'")));
        }

        let data = self.analytics.run(metric, &filter).await?;
        info!(%metric, rows = data.len(), "tool call answered");

        serde_json::to_string(&data).map_err(|e| AppError::Internal(e.to_string()))
    }
}
