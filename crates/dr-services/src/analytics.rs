//! # Analytics Aggregation
//!
//! Shapes review and event aggregates into `{type, data}` payloads for the
//! chart components and the LLM tools. Low-volume hubs are excluded from
//! ranking metrics so a single five-star review cannot top a chart.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dr_core::{
    AnalyticsRepo, AppError, HubCategory, HubEventStats, HubRatingStats, PeriodCount, RatingCount,
    Result,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Hubs need at least this many reviews to appear in a comparison.
pub const HUB_COMPARISON_MIN_REVIEWS: i64 = 3;
/// Hubs need at least this many reviews to be ranked as top rated.
pub const TOP_RATED_MIN_REVIEWS: i64 = 5;
pub const HUB_COMPARISON_LIMIT: usize = 8;
pub const TOP_RATED_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RatingDistribution,
    HubComparison,
    TopRatedHubs,
    ReviewVolume,
    CategoryBreakdown,
    MemberStats,
    EventStats,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::RatingDistribution,
        Metric::HubComparison,
        Metric::TopRatedHubs,
        Metric::ReviewVolume,
        Metric::CategoryBreakdown,
        Metric::MemberStats,
        Metric::EventStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::RatingDistribution => "rating_distribution",
            Metric::HubComparison => "hub_comparison",
            Metric::TopRatedHubs => "top_rated_hubs",
            Metric::ReviewVolume => "review_volume",
            Metric::CategoryBreakdown => "category_breakdown",
            Metric::MemberStats => "member_stats",
            Metric::EventStats => "event_stats",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AppError::not_found("Metric", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AnalyticsFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub hub_id: Option<Uuid>,
    pub category: Option<String>,
}

/// An empty select submits `hub_id=`, which means no hub.
fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error> {
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubScore {
    pub hub_id: Uuid,
    pub hub: String,
    pub avg_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub hub_count: i64,
    pub review_count: i64,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPoint {
    pub hub_id: Uuid,
    pub hub: String,
    pub member_count: i32,
    pub avg_rating: f64,
    pub review_count: i64,
}

/// A chart-ready dataset, serialized as `{"type": <metric>, "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChartData {
    RatingDistribution(Vec<RatingCount>),
    HubComparison(Vec<HubScore>),
    TopRatedHubs(Vec<HubScore>),
    ReviewVolume(Vec<PeriodCount>),
    CategoryBreakdown(Vec<CategoryStat>),
    MemberStats(Vec<MemberPoint>),
    EventStats(Vec<HubEventStats>),
}

impl ChartData {
    pub fn metric(&self) -> Metric {
        match self {
            ChartData::RatingDistribution(_) => Metric::RatingDistribution,
            ChartData::HubComparison(_) => Metric::HubComparison,
            ChartData::TopRatedHubs(_) => Metric::TopRatedHubs,
            ChartData::ReviewVolume(_) => Metric::ReviewVolume,
            ChartData::CategoryBreakdown(_) => Metric::CategoryBreakdown,
            ChartData::MemberStats(_) => Metric::MemberStats,
            ChartData::EventStats(_) => Metric::EventStats,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChartData::RatingDistribution(d) => d.len(),
            ChartData::HubComparison(d) | ChartData::TopRatedHubs(d) => d.len(),
            ChartData::ReviewVolume(d) => d.len(),
            ChartData::CategoryBreakdown(d) => d.len(),
            ChartData::MemberStats(d) => d.len(),
            ChartData::EventStats(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepo>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn AnalyticsRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self), fields(metric = %metric))]
    pub async fn run(&self, metric: Metric, filter: &AnalyticsFilter) -> Result<ChartData> {
        let category = validate_category(filter.category.as_deref())?;

        let data = match metric {
            Metric::RatingDistribution => {
                ChartData::RatingDistribution(rating_distribution(
                    self.repo.rating_counts(filter.hub_id).await?,
                ))
            }
            Metric::HubComparison => {
                ChartData::HubComparison(hub_comparison(self.repo.hub_rating_stats(category).await?))
            }
            Metric::TopRatedHubs => {
                ChartData::TopRatedHubs(top_rated_hubs(self.repo.hub_rating_stats(category).await?))
            }
            Metric::ReviewVolume => {
                ChartData::ReviewVolume(self.repo.monthly_review_counts(filter.hub_id).await?)
            }
            Metric::CategoryBreakdown => ChartData::CategoryBreakdown(category_breakdown(
                self.repo.hub_rating_stats(category).await?,
            )),
            Metric::MemberStats => {
                ChartData::MemberStats(member_stats(self.repo.hub_rating_stats(category).await?))
            }
            Metric::EventStats => ChartData::EventStats(event_stats(self.repo.hub_event_stats().await?)),
        };

        debug!(rows = data.len(), "aggregate computed");
        Ok(data)
    }
}

fn validate_category(category: Option<&str>) -> Result<Option<String>> {
    match category {
        None | Some("") => Ok(None),
        Some(c) if HubCategory::VALUES.contains(&c) => Ok(Some(c.to_string())),
        Some(c) => Err(AppError::ValidationError(format!(
            "unknown category '{c}', expected one of {}",
            HubCategory::VALUES.join(", ")
        ))),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Star buckets 1 to 5 with gaps zero-filled; empty when nothing was rated.
pub fn rating_distribution(counts: Vec<RatingCount>) -> Vec<RatingCount> {
    if counts.iter().all(|c| c.count == 0) {
        return Vec::new();
    }
    (1..=5)
        .map(|rating| RatingCount {
            rating,
            count: counts.iter().filter(|c| c.rating == rating).map(|c| c.count).sum(),
        })
        .collect()
}

fn ranked(stats: Vec<HubRatingStats>, min_reviews: i64, limit: usize) -> Vec<HubScore> {
    let mut eligible: Vec<HubRatingStats> =
        stats.into_iter().filter(|s| s.review_count >= min_reviews).collect();
    eligible.sort_by(|a, b| {
        b.avg_rating
            .total_cmp(&a.avg_rating)
            .then(b.review_count.cmp(&a.review_count))
            .then_with(|| a.hub_name.cmp(&b.hub_name))
    });
    eligible
        .into_iter()
        .take(limit)
        .map(|s| HubScore {
            hub_id: s.hub_id,
            hub: s.hub_name,
            avg_rating: round2(s.avg_rating),
            review_count: s.review_count,
        })
        .collect()
}

pub fn hub_comparison(stats: Vec<HubRatingStats>) -> Vec<HubScore> {
    ranked(stats, HUB_COMPARISON_MIN_REVIEWS, HUB_COMPARISON_LIMIT)
}

pub fn top_rated_hubs(stats: Vec<HubRatingStats>) -> Vec<HubScore> {
    ranked(stats, TOP_RATED_MIN_REVIEWS, TOP_RATED_LIMIT)
}

/// Hub count, review count and review-weighted mean rating per category.
pub fn category_breakdown(stats: Vec<HubRatingStats>) -> Vec<CategoryStat> {
    let mut groups: BTreeMap<String, (i64, i64, f64)> = BTreeMap::new();
    for s in stats {
        let entry = groups.entry(s.category).or_default();
        entry.0 += 1;
        entry.1 += s.review_count;
        entry.2 += s.avg_rating * s.review_count as f64;
    }
    groups
        .into_iter()
        .map(|(category, (hub_count, review_count, weighted))| CategoryStat {
            category,
            hub_count,
            review_count,
            avg_rating: if review_count > 0 { round2(weighted / review_count as f64) } else { 0.0 },
        })
        .collect()
}

/// Membership size against satisfaction, for hubs that have both.
pub fn member_stats(stats: Vec<HubRatingStats>) -> Vec<MemberPoint> {
    let mut points: Vec<MemberPoint> = stats
        .into_iter()
        .filter(|s| s.review_count > 0)
        .filter_map(|s| {
            Some(MemberPoint {
                member_count: s.member_count?,
                hub_id: s.hub_id,
                hub: s.hub_name,
                avg_rating: round2(s.avg_rating),
                review_count: s.review_count,
            })
        })
        .collect();
    points.sort_by_key(|p| p.member_count);
    points
}

pub fn event_stats(stats: Vec<HubEventStats>) -> Vec<HubEventStats> {
    let mut hosting: Vec<HubEventStats> = stats.into_iter().filter(|s| s.total > 0).collect();
    hosting.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.hub_name.cmp(&b.hub_name)));
    hosting
}
