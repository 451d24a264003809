//! # Optimistic Reconciliation
//!
//! A list view is a pure function of the last server snapshot and at most
//! one pending mutation. Pending records carry an explicit [`RecordState`]
//! instead of a placeholder id, so renderers switch on the tag.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::Entity;
use crate::schema::Values;

/// Identity of a record as seen by a list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RecordState {
    Persisted { id: Uuid },
    PendingCreate,
    PendingDelete { id: Uuid },
}

impl RecordState {
    /// Only persisted records get detail links and edit controls.
    pub fn navigable_id(&self) -> Option<Uuid> {
        match self {
            RecordState::Persisted { id } => Some(*id),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, RecordState::Persisted { .. })
    }
}

/// A record paired with its optimistic identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticItem<E> {
    #[serde(flatten)]
    pub state: RecordState,
    pub data: E,
}

/// A client-side mutation applied before the server confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum Mutation<E> {
    Create(E),
    Update(E),
    Delete(E),
}

impl<E> Mutation<E> {
    pub fn data(&self) -> &E {
        match self {
            Mutation::Create(data) | Mutation::Update(data) | Mutation::Delete(data) => data,
        }
    }
}

/// Merges one pending mutation into a server snapshot.
pub fn reconcile<E: Entity>(snapshot: &[E], mutation: Option<&Mutation<E>>) -> Vec<OptimisticItem<E>> {
    let mut items: Vec<OptimisticItem<E>> = snapshot
        .iter()
        .map(|data| OptimisticItem {
            state: RecordState::Persisted { id: data.id() },
            data: data.clone(),
        })
        .collect();

    match mutation {
        None => {}
        Some(Mutation::Create(data)) => items.push(OptimisticItem {
            state: RecordState::PendingCreate,
            data: data.clone(),
        }),
        Some(Mutation::Update(data)) => {
            match items.iter_mut().find(|item| item.data.id() == data.id()) {
                Some(item) => item.data = data.clone(),
                None => items.push(OptimisticItem {
                    state: RecordState::PendingCreate,
                    data: data.clone(),
                }),
            }
        }
        Some(Mutation::Delete(data)) => {
            if let Some(item) = items.iter_mut().find(|item| item.data.id() == data.id()) {
                item.state = RecordState::PendingDelete { id: data.id() };
            }
        }
    }

    items
}

/// Holds the authoritative snapshot and the single in-flight mutation.
#[derive(Debug, Clone)]
pub struct OptimisticList<E> {
    snapshot: Vec<E>,
    pending: Option<Mutation<E>>,
}

impl<E> Default for OptimisticList<E> {
    fn default() -> Self {
        Self { snapshot: Vec::new(), pending: None }
    }
}

impl<E: Entity> OptimisticList<E> {
    pub fn new(snapshot: Vec<E>) -> Self {
        Self { snapshot, pending: None }
    }

    /// Replaces any previous pending mutation.
    pub fn apply(&mut self, mutation: Mutation<E>) {
        self.pending = Some(mutation);
    }

    /// Installs a fresh server snapshot, discarding the pending mutation.
    pub fn refresh(&mut self, snapshot: Vec<E>) {
        self.snapshot = snapshot;
        self.pending = None;
    }

    pub fn snapshot(&self) -> &[E] {
        &self.snapshot
    }

    pub fn pending(&self) -> Option<&Mutation<E>> {
        self.pending.as_ref()
    }

    pub fn view(&self) -> Vec<OptimisticItem<E>> {
        reconcile(&self.snapshot, self.pending.as_ref())
    }
}

/// Builds the record a form would produce, before the server has seen it.
///
/// Starts from `existing` (edit mode) or a blank record with a nil id, then
/// overlays the validated values. Resolved relation labels are left as they
/// were since the client cannot resolve them.
pub fn draft<E: Entity>(values: &Values, existing: Option<&E>) -> serde_json::Result<E> {
    let mut record = match existing {
        Some(existing) => match serde_json::to_value(existing)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => {
            let now = Value::String(Utc::now().to_rfc3339());
            let mut map = Map::new();
            map.insert("id".into(), Value::String(Uuid::nil().to_string()));
            map.insert("user_id".into(), Value::String(Uuid::nil().to_string()));
            map.insert("created_at".into(), now.clone());
            map.insert("updated_at".into(), now);
            map
        }
    };
    record.extend(values.to_json());
    serde_json::from_value(Value::Object(record))
}
