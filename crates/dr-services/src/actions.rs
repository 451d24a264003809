//! # Server Actions
//!
//! One generic action set per entity. Each call re-validates the input with
//! the entity schema and performs a single statement scoped to the caller.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dr_core::{AppError, Entity, FormInput, ParentFilter, RecordStore, Result, Session};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::controller::{ActionResult, ServerActions};

pub struct EntityActions<E> {
    store: Arc<dyn RecordStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityActions<E> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), _entity: PhantomData }
    }
}

impl<E: Entity> EntityActions<E> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, _entity: PhantomData }
    }

    #[instrument(skip_all, fields(table = E::TABLE.name, user_id = %session.user_id))]
    pub async fn create(&self, session: &Session, input: &FormInput) -> Result<Uuid> {
        let values = E::SCHEMA.parse(input)?;
        let id = self.store.insert(&E::TABLE, session.user_id, &values).await?;
        info!(%id, "record created");
        Ok(id)
    }

    #[instrument(skip_all, fields(table = E::TABLE.name, user_id = %session.user_id, %id))]
    pub async fn update(&self, session: &Session, id: Uuid, input: &FormInput) -> Result<()> {
        let values = E::SCHEMA.parse(input)?;
        if !self.store.update(&E::TABLE, session.user_id, id, &values).await? {
            warn!("update matched no row owned by caller");
            return Err(AppError::not_found(E::TABLE.singular, id));
        }
        info!("record updated");
        Ok(())
    }

    #[instrument(skip_all, fields(table = E::TABLE.name, user_id = %session.user_id, %id))]
    pub async fn delete(&self, session: &Session, id: Uuid) -> Result<()> {
        if !self.store.delete(&E::TABLE, session.user_id, id).await? {
            warn!("delete matched no row owned by caller");
            return Err(AppError::not_found(E::TABLE.singular, id));
        }
        info!("record deleted");
        Ok(())
    }

    /// Absence is `None`; callers decide whether that is a not-found page.
    pub async fn get(&self, session: &Session, id: Uuid) -> Result<Option<E>> {
        match self.store.find(&E::TABLE, session.user_id, id).await? {
            Some(row) => decode::<E>(row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn list(&self, session: &Session, filter: Option<ParentFilter>) -> Result<Vec<E>> {
        self.store
            .list(&E::TABLE, session.user_id, filter)
            .await?
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    /// Binds the action set to one caller (and optionally one parent row),
    /// producing the client-facing contract used by the form controller.
    pub fn bind(&self, session: Session, filter: Option<ParentFilter>) -> BoundActions<E> {
        BoundActions { actions: self.clone(), session, filter }
    }
}

fn decode<E: Entity>(row: Value) -> Result<E> {
    serde_json::from_value(row)
        .map_err(|e| AppError::Internal(format!("malformed {} row: {e}", E::TABLE.name)))
}

/// Toast text shown when the store itself failed.
pub const INTERNAL_MESSAGE: &str = "Something went wrong. Please try again.";

/// Turns an error into toast text. Store details stay in the log.
fn toast_message(table: &str, err: AppError) -> String {
    match err {
        AppError::Internal(detail) => {
            warn!(table, %detail, "server action failed");
            INTERNAL_MESSAGE.to_string()
        }
        other => other.to_string(),
    }
}

/// Server actions as seen from a form: errors are plain messages.
pub struct BoundActions<E> {
    actions: EntityActions<E>,
    session: Session,
    filter: Option<ParentFilter>,
}

#[async_trait]
impl<E: Entity> ServerActions<E> for BoundActions<E> {
    async fn create(&self, input: &FormInput) -> ActionResult<Uuid> {
        self.actions.create(&self.session, input).await.map_err(|e| toast_message(E::TABLE.name, e))
    }

    async fn update(&self, id: Uuid, input: &FormInput) -> ActionResult {
        self.actions.update(&self.session, id, input).await.map_err(|e| toast_message(E::TABLE.name, e))
    }

    async fn delete(&self, id: Uuid) -> ActionResult {
        self.actions.delete(&self.session, id).await.map_err(|e| toast_message(E::TABLE.name, e))
    }

    async fn fetch(&self) -> ActionResult<Vec<E>> {
        self.actions.list(&self.session, self.filter).await.map_err(|e| toast_message(E::TABLE.name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::{MockRecordStore, Region, State};
    use serde_json::json;

    fn session() -> Session {
        Session { user_id: Uuid::now_v7(), email: None, role: None }
    }

    fn input(value: Value) -> FormInput {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_validates_before_touching_the_store() {
        let mut store = MockRecordStore::new();
        store.expect_insert().never();

        let actions = EntityActions::<State>::new(Arc::new(store));
        let err = actions
            .create(&session(), &input(json!({ "region_id": Uuid::now_v7().to_string() })))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(ref msg) if msg == "name: Required"));
    }

    #[tokio::test]
    async fn create_inserts_into_entity_table_for_caller() {
        let caller = session();
        let owner = caller.user_id;
        let new_id = Uuid::now_v7();

        let mut store = MockRecordStore::new();
        store
            .expect_insert()
            .withf(move |table, user, values| {
                table.name == "regions" && *user == owner && values.len() == 2
            })
            .times(1)
            .returning(move |_, _, _| Ok(new_id));

        let actions = EntityActions::<Region>::new(Arc::new(store));
        let id = actions
            .create(&caller, &input(json!({ "name": "Penang", "public": true })))
            .await
            .unwrap();
        assert_eq!(id, new_id);
    }

    #[tokio::test]
    async fn update_of_foreign_row_is_not_found() {
        let mut store = MockRecordStore::new();
        store.expect_update().returning(|_, _, _, _| Ok(false));

        let actions = EntityActions::<Region>::new(Arc::new(store));
        let err = actions
            .update(&session(), Uuid::now_v7(), &input(json!({ "name": "Sabah" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref kind, _) if kind == "Region"));
    }

    #[tokio::test]
    async fn store_failures_become_a_generic_toast() {
        let mut store = MockRecordStore::new();
        store
            .expect_delete()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));

        let bound = EntityActions::<Region>::new(Arc::new(store)).bind(session(), None);
        let message = bound.delete(Uuid::now_v7()).await.unwrap_err();
        assert_eq!(message, INTERNAL_MESSAGE);
        assert!(!message.contains("connection reset"));
    }

    #[tokio::test]
    async fn expected_failures_keep_their_message() {
        let mut store = MockRecordStore::new();
        store.expect_delete().returning(|_, _, _| Ok(false));

        let bound = EntityActions::<Region>::new(Arc::new(store)).bind(session(), None);
        let message = bound.delete(Uuid::now_v7()).await.unwrap_err();
        assert!(message.starts_with("Region not found"));
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_rows() {
        let mut store = MockRecordStore::new();
        store.expect_find().returning(|_, _, _| Ok(None));

        let actions = EntityActions::<Region>::new(Arc::new(store));
        assert!(actions.get(&session(), Uuid::now_v7()).await.unwrap().is_none());
    }
}
