mod common;

use std::sync::Arc;

use askama::Template;
use common::World;
use dr_core::{AnalyticsRepo, Hub, Region, Review, State};
use dr_services::{AnalyticsFilter, AnalyticsService, AnalyticsTools, ChartData, Metric};
use dr_ui::ChartPage;
use serde_json::{json, Value};
use uuid::Uuid;

struct Seeded {
    world: World,
    alpha: Uuid,
    bravo: Uuid,
    charlie: Uuid,
}

async fn hub(world: &World, state: Uuid, name: &str, category: &str, members: i32, ratings: &[i32]) -> Uuid {
    let id = world
        .seed::<Hub>(json!({
            "name": name,
            "category": category,
            "member_count": members,
            "state_id": state,
        }))
        .await;
    for rating in ratings {
        world.seed::<Review>(json!({ "hub_id": id, "rating": rating })).await;
    }
    id
}

/// Alpha has five reviews, Bravo three, Charlie two (all five stars).
async fn seeded() -> Seeded {
    let world = World::new();
    let region = world.seed::<Region>(json!({ "name": "Peninsular" })).await;
    let state = world.seed::<State>(json!({ "name": "Penang", "region_id": region })).await;

    let alpha = hub(&world, state, "Alpha", "coworking", 120, &[5, 5, 4, 4, 5]).await;
    let bravo = hub(&world, state, "Bravo", "community", 40, &[4, 4, 5]).await;
    let charlie = hub(&world, state, "Charlie", "coworking", 15, &[5, 5]).await;
    Seeded { world, alpha, bravo, charlie }
}

fn service(world: &World) -> AnalyticsService {
    let repo: Arc<dyn AnalyticsRepo> = world.store.clone();
    AnalyticsService::new(repo)
}

#[tokio::test]
async fn comparison_needs_three_reviews() {
    let s = seeded().await;
    let data = service(&s.world)
        .run(Metric::HubComparison, &AnalyticsFilter::default())
        .await
        .unwrap();

    let ChartData::HubComparison(rows) = data else {
        panic!("wrong variant");
    };
    let ids: Vec<Uuid> = rows.iter().map(|r| r.hub_id).collect();
    assert_eq!(ids, vec![s.alpha, s.bravo]);
    assert_eq!(rows[0].avg_rating, 4.6);
    assert_eq!(rows[1].avg_rating, 4.33);
    assert!(!ids.contains(&s.charlie));
}

#[tokio::test]
async fn top_rated_needs_five_reviews() {
    let s = seeded().await;
    let data = service(&s.world)
        .run(Metric::TopRatedHubs, &AnalyticsFilter::default())
        .await
        .unwrap();

    let ChartData::TopRatedHubs(rows) = data else {
        panic!("wrong variant");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hub_id, s.alpha);
    assert_eq!(rows[0].review_count, 5);
}

#[tokio::test]
async fn category_filter_narrows_comparison() {
    let s = seeded().await;
    let filter = AnalyticsFilter { hub_id: None, category: Some("community".into()) };
    let data = service(&s.world).run(Metric::HubComparison, &filter).await.unwrap();

    let ChartData::HubComparison(rows) = data else {
        panic!("wrong variant");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hub, "Bravo");
}

#[tokio::test]
async fn distribution_for_one_hub_is_zero_filled() {
    let s = seeded().await;
    let filter = AnalyticsFilter { hub_id: Some(s.bravo), category: None };
    let data = service(&s.world).run(Metric::RatingDistribution, &filter).await.unwrap();

    let payload = serde_json::to_value(&data).unwrap();
    assert_eq!(payload["type"], "rating_distribution");
    let counts: Vec<i64> = payload["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["count"].as_i64().unwrap())
        .collect();
    assert_eq!(counts, vec![0, 0, 0, 2, 1]);
}

#[tokio::test]
async fn no_reviews_renders_the_empty_state() {
    let world = World::new();
    let data = service(&world)
        .run(Metric::RatingDistribution, &AnalyticsFilter::default())
        .await
        .unwrap();
    assert!(data.is_empty());

    let page = ChartPage::new(&data);
    assert!(page.is_empty());
    assert!(page.render().unwrap().contains("No data available"));
}

#[tokio::test]
async fn review_tool_answers_with_a_json_string() {
    let s = seeded().await;
    let tools = AnalyticsTools::new(service(&s.world));

    let out = tools
        .call("review_analytics", json!({ "metric": "top_rated_hubs" }))
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["type"], "top_rated_hubs");
    assert_eq!(parsed["data"][0]["hub"], "Alpha");
}

#[tokio::test]
async fn member_stats_skip_unreviewed_hubs() {
    let s = seeded().await;
    let region = s.world.seed::<Region>(json!({ "name": "Borneo" })).await;
    let state = s.world.seed::<State>(json!({ "name": "Sabah", "region_id": region })).await;
    hub(&s.world, state, "Quiet", "other", 300, &[]).await;

    let data = service(&s.world)
        .run(Metric::MemberStats, &AnalyticsFilter::default())
        .await
        .unwrap();
    let ChartData::MemberStats(points) = data else {
        panic!("wrong variant");
    };
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| p.hub != "Quiet"));
}
