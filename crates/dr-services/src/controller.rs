//! # Mutation Controller
//!
//! Drives one entity form: validate, apply the optimistic mutation, call the
//! server action, then reload the list from the source of truth whatever the
//! outcome. A controller runs at most one save or delete at a time.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dr_core::{draft, Entity, Field, FieldErrors, FormInput, Mutation, OptimisticList};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// `Ok` on success, the error message otherwise. Expected failures are
/// values, never panics.
pub type ActionResult<T = ()> = std::result::Result<T, String>;

/// The create/update/delete triple plus the reload used after every mutation.
#[async_trait]
pub trait ServerActions<E: Entity>: Send + Sync {
    async fn create(&self, input: &FormInput) -> ActionResult<Uuid>;
    async fn update(&self, id: Uuid, input: &FormInput) -> ActionResult;
    async fn delete(&self, id: Uuid) -> ActionResult;
    async fn fetch(&self) -> ActionResult<Vec<E>>;
}

pub type SharedList<E> = Arc<RwLock<OptimisticList<E>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Success(String),
    Error(String),
}

/// What the form modal currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub open: bool,
    pub values: FormInput,
    pub errors: FieldErrors,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Another save or delete is still in flight
    Blocked,
    /// Client-side validation failed; nothing was sent
    Invalid(FieldErrors),
    Saved { id: Uuid, toast: Toast },
    /// The server action reported an error; the form was reopened
    Failed { toast: Toast },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Blocked,
    Deleted { toast: Toast, navigate_to: String },
    Failed { toast: Toast },
}

const IDLE: u8 = 0;
const SAVING: u8 = 1;
const DELETING: u8 = 2;

/// Resets the in-flight flag on every exit path.
struct Busy<'a>(&'a AtomicU8);

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

pub struct MutationController<E: Entity, A> {
    actions: A,
    list: SharedList<E>,
    existing: Option<E>,
    /// Foreign keys fixed by the parent route; their fields are hidden.
    context: FormInput,
    form: Mutex<FormState>,
    busy: AtomicU8,
}

impl<E: Entity, A: ServerActions<E>> MutationController<E, A> {
    pub fn new(actions: A, list: SharedList<E>) -> Self {
        Self {
            actions,
            list,
            existing: None,
            context: FormInput::new(),
            form: Mutex::new(FormState::default()),
            busy: AtomicU8::new(IDLE),
        }
    }

    /// Edit mode: saves become updates and delete is available.
    pub fn editing(mut self, existing: E) -> Self {
        self.existing = Some(existing);
        self
    }

    /// Nests the form under a parent row, e.g. `("state_id", id)` for a hub
    /// form on a state page.
    pub fn within(mut self, column: &str, parent_id: Uuid) -> Self {
        self.context.insert(column.to_string(), Value::String(parent_id.to_string()));
        self
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &'static Field> + '_ {
        E::SCHEMA.fields.iter().filter(|f| !self.context.contains_key(f.name))
    }

    pub fn is_saving(&self) -> bool {
        self.busy.load(Ordering::Acquire) == SAVING
    }

    pub fn is_deleting(&self) -> bool {
        self.busy.load(Ordering::Acquire) == DELETING
    }

    /// Save and delete controls are disabled while anything is in flight.
    pub fn controls_disabled(&self) -> bool {
        self.busy.load(Ordering::Acquire) != IDLE
    }

    pub async fn form(&self) -> FormState {
        self.form.lock().await.clone()
    }

    /// Opens the modal pre-filled with the record being edited, if any.
    pub async fn open(&self) {
        let values = self
            .existing
            .as_ref()
            .and_then(|e| serde_json::to_value(e).ok())
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        *self.form.lock().await = FormState { open: true, values, errors: FieldErrors::default() };
    }

    fn acquire(&self, mode: u8) -> Option<Busy<'_>> {
        self.busy
            .compare_exchange(IDLE, mode, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Busy(&self.busy))
    }

    pub async fn submit(&self, input: FormInput) -> SubmitOutcome {
        let Some(_busy) = self.acquire(SAVING) else {
            debug!(table = E::TABLE.name, "submit ignored while another mutation is pending");
            return SubmitOutcome::Blocked;
        };

        let mut payload = input.clone();
        payload.extend(self.context.clone());

        let values = match E::SCHEMA.parse(&payload) {
            Ok(values) => values,
            Err(errors) => {
                let mut form = self.form.lock().await;
                form.values = input;
                form.errors = errors.clone();
                return SubmitOutcome::Invalid(errors);
            }
        };

        let optimistic = match draft::<E>(&values, self.existing.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                warn!(table = E::TABLE.name, error = %e, "could not build optimistic record");
                return self.fail(input, format!("Could not prepare {}", E::TABLE.singular)).await;
            }
        };

        *self.form.lock().await = FormState::default();

        let (mutation, verb) = match &self.existing {
            Some(_) => (Mutation::Update(optimistic), "updated"),
            None => (Mutation::Create(optimistic), "created"),
        };
        self.list.write().await.apply(mutation);

        let result = match &self.existing {
            Some(existing) => self.actions.update(existing.id(), &payload).await.map(|_| existing.id()),
            None => self.actions.create(&payload).await,
        };

        self.reload().await;

        match result {
            Ok(id) => SubmitOutcome::Saved {
                id,
                toast: Toast::Success(format!("{} {verb}!", E::TABLE.singular)),
            },
            Err(message) => self.fail(input, message).await,
        }
    }

    pub async fn delete(&self) -> DeleteOutcome {
        let Some(existing) = self.existing.clone() else {
            return DeleteOutcome::Failed {
                toast: Toast::Error(format!("No {} selected", E::TABLE.singular)),
            };
        };
        let Some(_busy) = self.acquire(DELETING) else {
            return DeleteOutcome::Blocked;
        };

        self.list.write().await.apply(Mutation::Delete(existing.clone()));
        let result = self.actions.delete(existing.id()).await;
        self.reload().await;

        match result {
            Ok(()) => DeleteOutcome::Deleted {
                toast: Toast::Success(format!("{} deleted!", E::TABLE.singular)),
                navigate_to: self.parent_route(),
            },
            Err(message) => DeleteOutcome::Failed { toast: Toast::Error(message) },
        }
    }

    /// The collection page to return to after a delete.
    pub fn parent_route(&self) -> String {
        E::TABLE
            .relations
            .iter()
            .find_map(|rel| {
                let id = self.context.get(rel.column)?.as_str()?;
                Some(format!("/{}/{id}", rel.table))
            })
            .unwrap_or_else(|| format!("/{}", E::TABLE.name))
    }

    /// Replaces the snapshot, dropping the optimistic entry either way.
    async fn reload(&self) {
        match self.actions.fetch().await {
            Ok(rows) => self.list.write().await.refresh(rows),
            Err(message) => {
                warn!(table = E::TABLE.name, %message, "reload failed, keeping last snapshot");
                let mut list = self.list.write().await;
                let snapshot = list.snapshot().to_vec();
                list.refresh(snapshot);
            }
        }
    }

    async fn fail(&self, attempted: FormInput, message: String) -> SubmitOutcome {
        *self.form.lock().await =
            FormState { open: true, values: attempted, errors: FieldErrors::default() };
        SubmitOutcome::Failed { toast: Toast::Error(message) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dr_core::{Hub, HubCategory, OptimisticItem, RecordState, Region};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn input(value: Value) -> FormInput {
        value.as_object().cloned().unwrap_or_default()
    }

    fn region(name: &str) -> Region {
        Region {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            public: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// In-process stand-in for the server: a row vector plus knobs.
    #[derive(Default)]
    struct FakeRegions {
        rows: Mutex<Vec<Region>>,
        fail_with: Option<String>,
        calls: AtomicUsize,
        /// Lets a test observe the list while an action is in flight.
        observe: Option<SharedList<Region>>,
        seen: Mutex<Vec<OptimisticItem<Region>>>,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeRegions {
        async fn enter(&self) -> ActionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(list) = &self.observe {
                *self.seen.lock().await = list.read().await.view();
            }
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            match &self.fail_with {
                Some(message) => Err(message.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ServerActions<Region> for FakeRegions {
        async fn create(&self, input: &FormInput) -> ActionResult<Uuid> {
            self.enter().await?;
            let mut row = region(input["name"].as_str().unwrap_or_default());
            row.public = input.get("public") == Some(&json!(true));
            let id = row.id;
            self.rows.lock().await.push(row);
            Ok(id)
        }

        async fn update(&self, id: Uuid, input: &FormInput) -> ActionResult {
            self.enter().await?;
            let mut rows = self.rows.lock().await;
            let row = rows.iter_mut().find(|r| r.id == id).ok_or("Region not found")?;
            row.name = input["name"].as_str().unwrap_or_default().to_string();
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> ActionResult {
            self.enter().await?;
            self.rows.lock().await.retain(|r| r.id != id);
            Ok(())
        }

        async fn fetch(&self) -> ActionResult<Vec<Region>> {
            Ok(self.rows.lock().await.clone())
        }
    }

    fn shared(rows: Vec<Region>) -> SharedList<Region> {
        Arc::new(RwLock::new(OptimisticList::new(rows)))
    }

    #[tokio::test]
    async fn successful_create_leaves_only_the_persisted_row() {
        let list = shared(vec![]);
        let fake = FakeRegions { observe: Some(list.clone()), ..Default::default() };
        let controller = MutationController::new(fake, list.clone());

        let outcome = controller.submit(input(json!({ "name": "Penang", "public": true }))).await;

        let SubmitOutcome::Saved { id, toast } = outcome else {
            panic!("expected a saved outcome, got {outcome:?}");
        };
        assert_eq!(toast, Toast::Success("Region created!".into()));

        let seen = controller.actions.seen.lock().await.clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].state, RecordState::PendingCreate);
        assert_eq!(seen[0].data.name, "Penang");

        let view = list.read().await.view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].state, RecordState::Persisted { id });
        assert!(view[0].data.public);
        assert!(!controller.form().await.open);
    }

    #[tokio::test]
    async fn failed_create_restores_snapshot_and_reopens_form() {
        let existing = region("Selangor");
        let list = shared(vec![existing.clone()]);
        let fake = FakeRegions {
            rows: Mutex::new(vec![existing.clone()]),
            fail_with: Some("duplicate region".into()),
            ..Default::default()
        };
        let controller = MutationController::new(fake, list.clone());

        let outcome = controller.submit(input(json!({ "name": "Selangor" }))).await;
        assert_eq!(outcome, SubmitOutcome::Failed { toast: Toast::Error("duplicate region".into()) });

        let view = list.read().await.view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].state, RecordState::Persisted { id: existing.id });

        let form = controller.form().await;
        assert!(form.open);
        assert_eq!(form.values.get("name"), Some(&json!("Selangor")));
        assert!(!controller.controls_disabled());
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_server() {
        let controller = MutationController::new(FakeRegions::default(), shared(vec![]));

        let outcome = controller.submit(input(json!({ "public": "on" }))).await;
        let SubmitOutcome::Invalid(errors) = outcome else {
            panic!("expected validation errors, got {outcome:?}");
        };
        assert_eq!(errors.get("name"), Some("Required"));
        assert_eq!(controller.actions.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.form().await.errors.get("name"), Some("Required"));
    }

    #[tokio::test]
    async fn second_submission_is_blocked_while_pending() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let fake = FakeRegions {
            gate: Some((entered.clone(), release.clone())),
            ..Default::default()
        };
        let controller = Arc::new(MutationController::new(fake, shared(vec![])));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(input(json!({ "name": "Penang" }))).await })
        };
        entered.notified().await;

        assert!(controller.is_saving());
        assert!(controller.controls_disabled());
        assert_eq!(
            controller.submit(input(json!({ "name": "Penang" }))).await,
            SubmitOutcome::Blocked
        );

        release.notify_one();
        assert!(matches!(first.await.unwrap(), SubmitOutcome::Saved { .. }));
        assert_eq!(controller.actions.calls.load(Ordering::SeqCst), 1);
        assert!(!controller.controls_disabled());
    }

    #[tokio::test]
    async fn update_edits_in_place() {
        let existing = region("Sabah");
        let list = shared(vec![existing.clone()]);
        let fake = FakeRegions {
            rows: Mutex::new(vec![existing.clone()]),
            observe: Some(list.clone()),
            ..Default::default()
        };
        let controller = MutationController::new(fake, list.clone()).editing(existing.clone());

        let outcome = controller.submit(input(json!({ "name": "Sabah (Borneo)" }))).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Saved { id: existing.id, toast: Toast::Success("Region updated!".into()) }
        );

        let seen = controller.actions.seen.lock().await.clone();
        assert_eq!(seen[0].state, RecordState::Persisted { id: existing.id });
        assert_eq!(seen[0].data.name, "Sabah (Borneo)");
        assert_eq!(list.read().await.view()[0].data.name, "Sabah (Borneo)");
    }

    #[tokio::test]
    async fn failed_update_reverts_to_the_snapshot() {
        let existing = region("Sabah");
        let list = shared(vec![existing.clone()]);
        let fake = FakeRegions {
            rows: Mutex::new(vec![existing.clone()]),
            fail_with: Some("permission denied".into()),
            observe: Some(list.clone()),
            ..Default::default()
        };
        let controller = MutationController::new(fake, list.clone()).editing(existing.clone());

        let outcome = controller.submit(input(json!({ "name": "North Borneo" }))).await;
        assert_eq!(outcome, SubmitOutcome::Failed { toast: Toast::Error("permission denied".into()) });

        let seen = controller.actions.seen.lock().await.clone();
        assert_eq!(seen[0].data.name, "North Borneo");

        let view = list.read().await.view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].state, RecordState::Persisted { id: existing.id });
        assert_eq!(view[0].data.name, "Sabah");
        assert!(list.read().await.pending().is_none());
        assert_eq!(controller.form().await.values.get("name"), Some(&json!("North Borneo")));
    }

    fn gated(existing: &Region) -> (Arc<MutationController<Region, FakeRegions>>, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let fake = FakeRegions {
            rows: Mutex::new(vec![existing.clone()]),
            gate: Some((entered.clone(), release.clone())),
            ..Default::default()
        };
        let controller = MutationController::new(fake, shared(vec![existing.clone()])).editing(existing.clone());
        (Arc::new(controller), entered, release)
    }

    #[tokio::test]
    async fn delete_is_blocked_while_saving() {
        let existing = region("Perlis");
        let (controller, entered, release) = gated(&existing);

        let save = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(input(json!({ "name": "Perlis Indera Kayangan" }))).await })
        };
        entered.notified().await;

        assert!(controller.is_saving());
        assert_eq!(controller.delete().await, DeleteOutcome::Blocked);

        release.notify_one();
        assert!(matches!(save.await.unwrap(), SubmitOutcome::Saved { .. }));
        assert_eq!(controller.actions.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.actions.rows.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn save_is_blocked_while_deleting() {
        let existing = region("Perlis");
        let (controller, entered, release) = gated(&existing);

        let delete = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.delete().await })
        };
        entered.notified().await;

        assert!(controller.is_deleting());
        assert!(controller.controls_disabled());
        assert_eq!(
            controller.submit(input(json!({ "name": "Perlis Indera Kayangan" }))).await,
            SubmitOutcome::Blocked
        );

        release.notify_one();
        assert!(matches!(delete.await.unwrap(), DeleteOutcome::Deleted { .. }));
        assert_eq!(controller.actions.calls.load(Ordering::SeqCst), 1);
        assert!(!controller.controls_disabled());
    }

    #[tokio::test]
    async fn delete_marks_pending_then_navigates_back() {
        let doomed = region("Labuan");
        let list = shared(vec![doomed.clone()]);
        let fake = FakeRegions {
            rows: Mutex::new(vec![doomed.clone()]),
            observe: Some(list.clone()),
            ..Default::default()
        };
        let controller = MutationController::new(fake, list.clone()).editing(doomed.clone());

        let outcome = controller.delete().await;
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                toast: Toast::Success("Region deleted!".into()),
                navigate_to: "/regions".into(),
            }
        );

        let seen = controller.actions.seen.lock().await.clone();
        assert_eq!(seen[0].state, RecordState::PendingDelete { id: doomed.id });
        assert!(list.read().await.view().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_restores_the_record() {
        let kept = region("Labuan");
        let list = shared(vec![kept.clone()]);
        let fake = FakeRegions {
            rows: Mutex::new(vec![kept.clone()]),
            fail_with: Some("permission denied".into()),
            ..Default::default()
        };
        let controller = MutationController::new(fake, list.clone()).editing(kept.clone());

        assert_eq!(
            controller.delete().await,
            DeleteOutcome::Failed { toast: Toast::Error("permission denied".into()) }
        );
        let view = list.read().await.view();
        assert_eq!(view[0].state, RecordState::Persisted { id: kept.id });
    }

    struct NoHubs;

    #[async_trait]
    impl ServerActions<Hub> for NoHubs {
        async fn create(&self, _: &FormInput) -> ActionResult<Uuid> {
            Err("unavailable".into())
        }
        async fn update(&self, _: Uuid, _: &FormInput) -> ActionResult {
            Err("unavailable".into())
        }
        async fn delete(&self, _: Uuid) -> ActionResult {
            Ok(())
        }
        async fn fetch(&self) -> ActionResult<Vec<Hub>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn nested_forms_hide_parent_field_and_return_to_parent() {
        let state_id = Uuid::now_v7();
        let hub = Hub {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            name: "Komune Living".into(),
            description: None,
            category: HubCategory::Accommodation,
            address: None,
            latitude: None,
            longitude: None,
            website: None,
            member_count: None,
            public: true,
            state_id,
            state_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let list = Arc::new(RwLock::new(OptimisticList::new(vec![hub.clone()])));
        let controller = MutationController::new(NoHubs, list).editing(hub).within("state_id", state_id);

        assert!(controller.visible_fields().all(|f| f.name != "state_id"));

        let outcome = controller.submit(input(json!({ "name": "Komune", "category": "coworking" }))).await;
        assert_eq!(outcome, SubmitOutcome::Failed { toast: Toast::Error("unavailable".into()) });
        assert!(controller.form().await.values.get("state_id").is_none());

        let DeleteOutcome::Deleted { navigate_to, .. } = controller.delete().await else {
            panic!("expected delete to succeed");
        };
        assert_eq!(navigate_to, format!("/states/{state_id}"));
    }
}
