//! # Domain Models
//!
//! These structs represent the core entities of DE Rantau.
//! We use UUID v7 for time-ordered, globally unique identification.
//!
//! Fields named `<relation>_name` are read-side projections of a foreign key
//! and are never written by forms.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, OnDelete, Relation, TableDef};
use crate::schema::{Field, FieldKind, Schema};

const REGION: Relation = Relation {
    column: "region_id",
    table: "regions",
    display: "name",
    alias: "region_name",
    on_delete: OnDelete::Cascade,
};
const STATE: Relation = Relation {
    column: "state_id",
    table: "states",
    display: "name",
    alias: "state_name",
    on_delete: OnDelete::Cascade,
};
const HUB: Relation = Relation {
    column: "hub_id",
    table: "hubs",
    display: "name",
    alias: "hub_name",
    on_delete: OnDelete::Cascade,
};
const CHAT: Relation = Relation {
    column: "chat_id",
    table: "chats",
    display: "title",
    alias: "chat_title",
    on_delete: OnDelete::Cascade,
};
const POST: Relation = Relation {
    column: "post_id",
    table: "community_posts",
    display: "title",
    alias: "post_title",
    on_delete: OnDelete::Cascade,
};
const NOMAD_PROFILE: Relation = Relation {
    column: "nomad_profile_id",
    table: "nomad_profiles",
    display: "full_name",
    alias: "nomad_name",
    on_delete: OnDelete::Cascade,
};

/// Posts and profiles outlive the hub or region they mention.
const HUB_OPTIONAL: Relation = Relation { on_delete: OnDelete::SetNull, ..HUB };
const REGION_OPTIONAL: Relation = Relation { on_delete: OnDelete::SetNull, ..REGION };

/// A Malaysian region grouping several states (e.g. Peninsular, Borneo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Region {
    const TABLE: TableDef = TableDef { name: "regions", singular: "Region", plural: "Regions", relations: &[] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("name", FieldKind::TEXT),
            Field::optional("public", FieldKind::Bool),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub region_id: Uuid,
    #[serde(default)]
    pub region_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for State {
    const TABLE: TableDef = TableDef { name: "states", singular: "State", plural: "States", relations: &[REGION] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("name", FieldKind::TEXT),
            Field::optional("description", FieldKind::TEXT),
            Field::required("region_id", FieldKind::Uuid),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn subtitle(&self) -> Option<String> {
        self.region_name.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubCategory {
    Coworking,
    Accommodation,
    Business,
    Community,
    Other,
}

impl HubCategory {
    pub const VALUES: &'static [&'static str] =
        &["coworking", "accommodation", "business", "community", "other"];
}

/// A coworking, accommodation or business venue participating in the program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: HubCategory,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub website: Option<String>,
    pub member_count: Option<i32>,
    pub public: bool,
    pub state_id: Uuid,
    #[serde(default)]
    pub state_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Hub {
    const TABLE: TableDef = TableDef { name: "hubs", singular: "Hub", plural: "Hubs", relations: &[STATE] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("name", FieldKind::TEXT),
            Field::optional("description", FieldKind::TEXT),
            Field::required("category", FieldKind::Choice(HubCategory::VALUES)),
            Field::optional("address", FieldKind::TEXT),
            Field::optional("latitude", FieldKind::Float { min: Some(-90.0), max: Some(90.0) }),
            Field::optional("longitude", FieldKind::Float { min: Some(-180.0), max: Some(180.0) }),
            Field::optional("website", FieldKind::Url),
            Field::optional("member_count", FieldKind::Int { min: Some(0), max: None }),
            Field::optional("public", FieldKind::Bool),
            Field::required("state_id", FieldKind::Uuid),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn subtitle(&self) -> Option<String> {
        self.state_name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hub_id: Uuid,
    #[serde(default)]
    pub hub_name: Option<String>,
    /// 1 to 5 stars
    pub rating: i32,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Review {
    const TABLE: TableDef = TableDef { name: "reviews", singular: "Review", plural: "Reviews", relations: &[HUB] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("hub_id", FieldKind::Uuid),
            Field::required("rating", FieldKind::Int { min: Some(1), max: Some(5) }),
            Field::optional("title", FieldKind::TEXT),
            Field::optional("comment", FieldKind::Text { min: 1, max: Some(2000) }),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        match &self.title {
            Some(title) => format!("{title} ({}/5)", self.rating),
            None => format!("{}/5", self.rating),
        }
    }

    fn subtitle(&self) -> Option<String> {
        self.hub_name.clone()
    }
}

/// A community event hosted at a hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hub_id: Uuid,
    #[serde(default)]
    pub hub_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Event {
    const TABLE: TableDef = TableDef { name: "events", singular: "Event", plural: "Events", relations: &[HUB] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("hub_id", FieldKind::Uuid),
            Field::required("title", FieldKind::TEXT),
            Field::optional("description", FieldKind::TEXT),
            Field::required("starts_at", FieldKind::Timestamp),
            Field::optional("ends_at", FieldKind::Timestamp),
            Field::optional("capacity", FieldKind::Int { min: Some(1), max: None }),
            Field::optional("public", FieldKind::Bool),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.title.clone()
    }

    fn subtitle(&self) -> Option<String> {
        Some(match &self.hub_name {
            Some(hub) => format!("{hub} · {}", self.starts_at.format("%Y-%m-%d %H:%M")),
            None => self.starts_at.format("%Y-%m-%d %H:%M").to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Chat {
    const TABLE: TableDef = TableDef { name: "chats", singular: "Chat", plural: "Chats", relations: &[] };
    const SCHEMA: Schema = Schema { fields: &[Field::required("title", FieldKind::TEXT)] };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub const VALUES: &'static [&'static str] = &["user", "assistant", "system"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chat_id: Uuid,
    #[serde(default)]
    pub chat_title: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Message {
    const TABLE: TableDef = TableDef { name: "messages", singular: "Message", plural: "Messages", relations: &[CHAT] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("chat_id", FieldKind::Uuid),
            Field::required("role", FieldKind::Choice(MessageRole::VALUES)),
            Field::required("content", FieldKind::TEXT),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        let preview: String = self.content.chars().take(80).collect();
        if preview.len() < self.content.len() {
            format!("{preview}…")
        } else {
            preview
        }
    }

    fn subtitle(&self) -> Option<String> {
        Some(serde_json::to_value(self.role).ok()?.as_str()?.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub hub_id: Option<Uuid>,
    #[serde(default)]
    pub hub_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for CommunityPost {
    const TABLE: TableDef = TableDef {
        name: "community_posts",
        singular: "Post",
        plural: "Posts",
        relations: &[HUB_OPTIONAL],
    };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("title", FieldKind::Text { min: 1, max: Some(200) }),
            Field::required("content", FieldKind::TEXT),
            Field::optional("hub_id", FieldKind::Uuid),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.title.clone()
    }

    fn subtitle(&self) -> Option<String> {
        self.hub_name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReply {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    #[serde(default)]
    pub post_title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for CommunityReply {
    const TABLE: TableDef = TableDef { name: "community_replies", singular: "Reply", plural: "Replies", relations: &[POST] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("post_id", FieldKind::Uuid),
            Field::required("content", FieldKind::TEXT),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.content.clone()
    }

    fn subtitle(&self) -> Option<String> {
        self.post_title.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteRole {
    Admin,
    Owner,
    Nomad,
}

impl InviteRole {
    pub const VALUES: &'static [&'static str] = &["admin", "owner", "nomad"];
}

/// An invitation for someone to join the program, optionally as a hub owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: InviteRole,
    pub hub_id: Option<Uuid>,
    #[serde(default)]
    pub hub_name: Option<String>,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Invite {
    const TABLE: TableDef = TableDef { name: "invites", singular: "Invite", plural: "Invites", relations: &[HUB] };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("email", FieldKind::Email),
            Field::required("role", FieldKind::Choice(InviteRole::VALUES)),
            Field::optional("hub_id", FieldKind::Uuid),
            Field::optional("accepted", FieldKind::Bool),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.email.clone()
    }

    fn subtitle(&self) -> Option<String> {
        self.hub_name.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceStatus {
    Pending,
    Cleared,
    Rejected,
}

impl ClearanceStatus {
    pub const VALUES: &'static [&'static str] = &["pending", "cleared", "rejected"];
}

/// Health insurance and clearance details attached to a visa application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthClearanceInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nomad_profile_id: Uuid,
    #[serde(default)]
    pub nomad_name: Option<String>,
    pub insurance_provider: String,
    pub policy_number: Option<String>,
    pub clearance_status: ClearanceStatus,
    pub expires_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for HealthClearanceInfo {
    const TABLE: TableDef = TableDef {
        name: "health_clearance_infos",
        singular: "Health clearance",
        plural: "Health clearances",
        relations: &[NOMAD_PROFILE],
    };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("nomad_profile_id", FieldKind::Uuid),
            Field::required("insurance_provider", FieldKind::TEXT),
            Field::optional("policy_number", FieldKind::TEXT),
            Field::required("clearance_status", FieldKind::Choice(ClearanceStatus::VALUES)),
            Field::optional("expires_on", FieldKind::Date),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.insurance_provider.clone()
    }

    fn subtitle(&self) -> Option<String> {
        self.nomad_name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NomadProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub nationality: String,
    pub passport_number: Option<String>,
    pub occupation: Option<String>,
    pub monthly_income: Option<f64>,
    pub region_id: Option<Uuid>,
    #[serde(default)]
    pub region_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for NomadProfile {
    const TABLE: TableDef = TableDef {
        name: "nomad_profiles",
        singular: "Nomad profile",
        plural: "Nomad profiles",
        relations: &[REGION_OPTIONAL],
    };
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("full_name", FieldKind::TEXT),
            Field::required("nationality", FieldKind::TEXT),
            Field::optional("passport_number", FieldKind::Text { min: 5, max: Some(20) }),
            Field::optional("occupation", FieldKind::TEXT),
            Field::optional("monthly_income", FieldKind::Float { min: Some(0.0), max: None }),
            Field::optional("region_id", FieldKind::Uuid),
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn label(&self) -> String {
        self.full_name.clone()
    }

    fn subtitle(&self) -> Option<String> {
        Some(self.nationality.clone())
    }
}

/// A document chunk retrieved during a RAG benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkChunk {
    pub content: String,
    pub similarity: f64,
    pub source: Option<String>,
}

/// One retrieval-augmented answer, with the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagBenchmark {
    pub query: String,
    pub response: String,
    pub model: String,
    pub latency_ms: i64,
    #[serde(default)]
    pub chunks: Vec<BenchmarkChunk>,
}

/// One analytics question answered through tool calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBenchmark {
    pub query: String,
    pub response: String,
    pub model: String,
    pub latency_ms: i64,
    pub metric: Option<String>,
    #[serde(default)]
    pub tool_calls: serde_json::Value,
}

/// Body of a benchmark submission, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenchmarkRun {
    Rag(RagBenchmark),
    Analytics(AnalyticsBenchmark),
}

/// Per-hub review aggregate as computed by the storage layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubRatingStats {
    pub hub_id: Uuid,
    pub hub_name: String,
    pub category: String,
    pub member_count: Option<i32>,
    pub review_count: i64,
    /// Mean rating, 0 when there are no reviews
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCount {
    pub rating: i32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    /// `YYYY-MM`
    pub period: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubEventStats {
    pub hub_id: Uuid,
    pub hub_name: String,
    pub total: i64,
    pub upcoming: i64,
}

/// Every entity table, parents before children.
pub const TABLES: &[&TableDef] = &[
    &Region::TABLE,
    &State::TABLE,
    &Hub::TABLE,
    &Review::TABLE,
    &Event::TABLE,
    &Chat::TABLE,
    &Message::TABLE,
    &CommunityPost::TABLE,
    &CommunityReply::TABLE,
    &Invite::TABLE,
    &NomadProfile::TABLE,
    &HealthClearanceInfo::TABLE,
];

/// The authenticated caller, as established by a verified access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
}
