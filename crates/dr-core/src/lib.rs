//! dr-core
//!
//! The central domain logic and interface definitions for DE Rantau.

pub mod entity;
pub mod error;
pub mod models;
pub mod optimistic;
pub mod schema;
pub mod traits;

// Re-exporting for easier access in other crates
pub use entity::*;
pub use error::*;
pub use models::*;
pub use optimistic::*;
pub use schema::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn benchmark_runs_are_discriminated_by_type() {
        let run: BenchmarkRun = serde_json::from_value(json!({
            "type": "rag",
            "query": "Which hubs in Penang allow pets?",
            "response": "Two hubs do.",
            "model": "gpt-4o-mini",
            "latency_ms": 812,
            "chunks": [{ "content": "Pets welcome", "similarity": 0.82, "source": "hubs/penang" }],
        }))
        .unwrap();

        match run {
            BenchmarkRun::Rag(rag) => assert_eq!(rag.chunks.len(), 1),
            other => panic!("expected rag run, got {other:?}"),
        }

        let err = serde_json::from_value::<BenchmarkRun>(json!({ "type": "vector" })).unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn relations_are_looked_up_by_column() {
        assert_eq!(Hub::TABLE.relation("state_id").map(|r| r.table), Some("states"));
        assert!(Region::TABLE.relation("state_id").is_none());
    }

    #[test]
    fn every_relation_column_is_a_schema_field() {
        fn check<E: Entity>() {
            for relation in E::TABLE.relations {
                let field = E::SCHEMA.field(relation.column);
                assert!(
                    matches!(field.map(|f| f.kind), Some(FieldKind::Uuid)),
                    "{}.{} must be a uuid field",
                    E::TABLE.name,
                    relation.column
                );
            }
        }

        check::<Region>();
        check::<State>();
        check::<Hub>();
        check::<Review>();
        check::<Event>();
        check::<Chat>();
        check::<Message>();
        check::<CommunityPost>();
        check::<CommunityReply>();
        check::<Invite>();
        check::<HealthClearanceInfo>();
        check::<NomadProfile>();
    }

    #[test]
    fn models_deserialize_store_rows() {
        let hub: Hub = serde_json::from_value(json!({
            "id": Uuid::now_v7(),
            "user_id": Uuid::now_v7(),
            "name": "Common Ground Bukit Bintang",
            "description": null,
            "category": "coworking",
            "address": null,
            "latitude": 3.146,
            "longitude": 101.71,
            "website": null,
            "member_count": 120,
            "public": true,
            "state_id": Uuid::now_v7(),
            "state_name": "Kuala Lumpur",
            "created_at": "2026-03-01T08:00:00.123456+00:00",
            "updated_at": "2026-03-01T08:00:00+00:00",
        }))
        .unwrap();

        assert_eq!(hub.category, HubCategory::Coworking);
        assert_eq!(hub.subtitle().as_deref(), Some("Kuala Lumpur"));
    }

    #[test]
    fn registry_lists_parents_before_children() {
        for (position, table) in TABLES.iter().enumerate() {
            for relation in table.relations {
                let parent = TABLES.iter().position(|t| t.name == relation.table);
                assert!(
                    parent.is_some_and(|p| p < position),
                    "{} references {} which is not registered earlier",
                    table.name,
                    relation.table
                );
            }
        }
        assert_eq!(TABLES.len(), 12);
        assert_eq!(CommunityReply::TABLE.plural, "Replies");
    }

    #[test]
    fn optional_parents_are_set_null_on_delete() {
        assert_eq!(CommunityPost::TABLE.relation("hub_id").map(|r| r.on_delete), Some(OnDelete::SetNull));
        assert_eq!(NomadProfile::TABLE.relation("region_id").map(|r| r.on_delete), Some(OnDelete::SetNull));
        assert_eq!(Review::TABLE.relation("hub_id").map(|r| r.on_delete), Some(OnDelete::Cascade));
    }
}
