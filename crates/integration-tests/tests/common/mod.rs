#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dr_core::{Entity, FormInput, OptimisticItem, OptimisticList, RecordStore, Session};
use dr_db_memory::MemoryStore;
use dr_services::{ActionResult, BoundActions, EntityActions, ServerActions, SharedList};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub fn input(value: Value) -> FormInput {
    value.as_object().cloned().unwrap_or_default()
}

/// One signed-in user against a fresh in-memory database.
pub struct World {
    pub store: Arc<MemoryStore>,
    pub session: Session,
}

impl World {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            session: Session { user_id: Uuid::now_v7(), email: None, role: None },
        }
    }

    pub fn actions<E: Entity>(&self) -> EntityActions<E> {
        let store: Arc<dyn RecordStore> = self.store.clone();
        EntityActions::new(store)
    }

    pub async fn seed<E: Entity>(&self, value: Value) -> Uuid {
        self.actions::<E>().create(&self.session, &input(value)).await.unwrap()
    }

    /// The list as the page would load it.
    pub async fn list<E: Entity>(&self) -> SharedList<E> {
        let rows = self.actions::<E>().list(&self.session, None).await.unwrap();
        Arc::new(RwLock::new(OptimisticList::new(rows)))
    }
}

/// What the list looked like each time a server action ran.
pub struct Probe<E> {
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<OptimisticItem<E>>>>,
}

impl<E: Clone> Probe<E> {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn seen(&self) -> Vec<Vec<OptimisticItem<E>>> {
        self.seen.lock().await.clone()
    }
}

/// Real server actions that report to a [`Probe`] before each call.
pub struct Observed<E: Entity> {
    inner: BoundActions<E>,
    list: SharedList<E>,
    probe: Arc<Probe<E>>,
}

impl<E: Entity> Observed<E> {
    pub fn new(inner: BoundActions<E>, list: SharedList<E>) -> (Self, Arc<Probe<E>>) {
        let probe = Arc::new(Probe { calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) });
        (Self { inner, list, probe: probe.clone() }, probe)
    }

    async fn record(&self) {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        let view = self.list.read().await.view();
        self.probe.seen.lock().await.push(view);
    }
}

#[async_trait]
impl<E: Entity> ServerActions<E> for Observed<E> {
    async fn create(&self, input: &FormInput) -> ActionResult<Uuid> {
        self.record().await;
        self.inner.create(input).await
    }

    async fn update(&self, id: Uuid, input: &FormInput) -> ActionResult {
        self.record().await;
        self.inner.update(id, input).await
    }

    async fn delete(&self, id: Uuid) -> ActionResult {
        self.record().await;
        self.inner.delete(id).await
    }

    async fn fetch(&self) -> ActionResult<Vec<E>> {
        self.inner.fetch().await
    }
}
