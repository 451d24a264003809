use askama::Template;
use dr_core::{Entity, OptimisticItem, RecordState};
use serde_json::Value;

/// One card in a list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItemView {
    pub title: String,
    pub subtitle: Option<String>,
    /// Detail link; pending records have none.
    pub href: Option<String>,
    pub status: &'static str,
    pub class: &'static str,
}

impl ListItemView {
    pub fn from_item<E: Entity>(item: &OptimisticItem<E>) -> Self {
        let (status, class) = match item.state {
            RecordState::Persisted { .. } => ("persisted", "card"),
            RecordState::PendingCreate => ("pending-create", "card animate-pulse"),
            RecordState::PendingDelete { .. } => ("pending-delete", "card animate-pulse opacity-50 line-through"),
        };
        Self {
            title: item.data.label(),
            subtitle: item.data.subtitle(),
            href: item
                .state
                .navigable_id()
                .map(|id| format!("/app/{}/{id}", E::TABLE.name)),
            status,
            class,
        }
    }
}

#[derive(Template)]
#[template(path = "list.html")]
pub struct ListPage {
    pub title: String,
    pub singular: &'static str,
    pub items: Vec<ListItemView>,
}

impl ListPage {
    pub fn new<E: Entity>(items: &[OptimisticItem<E>]) -> Self {
        Self {
            title: E::TABLE.plural.to_string(),
            singular: E::TABLE.singular,
            items: items.iter().map(ListItemView::from_item).collect(),
        }
    }
}

/// Read-only view of one persisted record.
#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailPage {
    pub title: String,
    pub back: String,
    pub fields: Vec<(String, String)>,
}

impl DetailPage {
    pub fn new<E: Entity>(entity: &E) -> Self {
        let fields = match serde_json::to_value(entity) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(key, _)| key != "user_id")
                .map(|(key, value)| (key, display(&value)))
                .collect(),
            _ => Vec::new(),
        };
        Self { title: entity.label(), back: format!("/app/{}", E::TABLE.name), fields }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
