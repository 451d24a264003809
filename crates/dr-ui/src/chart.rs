//! Presentational mapping from `{type, data}` payloads to charts.

use askama::Template;
use dr_services::{ChartData, Metric};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Radar,
    Scatter,
}

impl ChartKind {
    pub fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::HubComparison => ChartKind::Radar,
            Metric::MemberStats => ChartKind::Scatter,
            Metric::RatingDistribution
            | Metric::TopRatedHubs
            | Metric::ReviewVolume
            | Metric::CategoryBreakdown
            | Metric::EventStats => ChartKind::Bar,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Radar => "radar",
            ChartKind::Scatter => "scatter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    /// Horizontal position; scatter charts only.
    pub x: Option<f64>,
    pub y: f64,
    /// Bar length relative to the largest value, 0 to 100.
    pub percent: f64,
    pub caption: String,
}

fn point(label: impl Into<String>, y: f64, caption: String) -> ChartPoint {
    ChartPoint { label: label.into(), x: None, y, percent: 0.0, caption }
}

fn points(data: &ChartData) -> Vec<ChartPoint> {
    match data {
        ChartData::RatingDistribution(rows) => rows
            .iter()
            .map(|r| point(format!("{} star", r.rating), r.count as f64, r.count.to_string()))
            .collect(),
        ChartData::HubComparison(rows) | ChartData::TopRatedHubs(rows) => rows
            .iter()
            .map(|r| {
                point(r.hub.as_str(), r.avg_rating, format!("{:.2} ({} reviews)", r.avg_rating, r.review_count))
            })
            .collect(),
        ChartData::ReviewVolume(rows) => rows
            .iter()
            .map(|r| point(r.period.as_str(), r.count as f64, r.count.to_string()))
            .collect(),
        ChartData::CategoryBreakdown(rows) => rows
            .iter()
            .map(|r| {
                point(r.category.as_str(), r.avg_rating, format!("{:.2} across {} hubs", r.avg_rating, r.hub_count))
            })
            .collect(),
        ChartData::MemberStats(rows) => rows
            .iter()
            .map(|r| ChartPoint {
                x: Some(f64::from(r.member_count)),
                ..point(r.hub.as_str(), r.avg_rating, format!("{} members, {:.2}", r.member_count, r.avg_rating))
            })
            .collect(),
        ChartData::EventStats(rows) => rows
            .iter()
            .map(|r| point(r.hub_name.as_str(), r.total as f64, format!("{} ({} upcoming)", r.total, r.upcoming)))
            .collect(),
    }
}

#[derive(Template)]
#[template(path = "chart.html")]
pub struct ChartPage {
    pub title: String,
    pub metric: Metric,
    pub kind: ChartKind,
    pub points: Vec<ChartPoint>,
    /// Points as JSON for the client-side renderer.
    pub payload: String,
}

impl ChartPage {
    pub fn new(data: &ChartData) -> Self {
        let mut points = points(data);
        let max = points.iter().map(|p| p.y).fold(0.0_f64, f64::max);
        if max > 0.0 {
            for p in &mut points {
                p.percent = (p.y / max * 1000.0).round() / 10.0;
            }
        }

        let metric = data.metric();
        Self {
            title: metric.as_str().replace('_', " "),
            metric,
            kind: ChartKind::for_metric(metric),
            payload: serde_json::to_string(&points).unwrap_or_else(|_| "[]".to_string()),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
