//! # Entity Contract
//!
//! Every CRUD-able record implements [`Entity`]: one schema, one table
//! definition, and a couple of display hooks. Services, storage adapters and
//! the API are written once against this trait and instantiated per entity.

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::schema::Schema;

/// What happens to child rows when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

/// A foreign key that read-side projections resolve to a display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Column on the child table (e.g. `region_id`)
    pub column: &'static str,
    /// Parent table, which is also the parent's collection route
    pub table: &'static str,
    /// Parent column shown as the label (e.g. `name`)
    pub display: &'static str,
    /// Name of the projected label on the child (e.g. `region_name`)
    pub alias: &'static str,
    pub on_delete: OnDelete,
}

/// Storage metadata for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    /// Table name and collection route segment (e.g. `regions`)
    pub name: &'static str,
    /// Human label used in toasts and page titles (e.g. `Region`)
    pub singular: &'static str,
    pub plural: &'static str,
    pub relations: &'static [Relation],
}

impl TableDef {
    pub fn relation(&self, column: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.column == column)
    }

    /// Builds a listing filter, only for columns declared as relations.
    pub fn filter(&self, column: &str, id: Uuid) -> Option<ParentFilter> {
        self.relation(column).map(|r| ParentFilter { column: r.column, id })
    }

    /// Relations on this table that point at `parent`.
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'static Relation> + 'a {
        self.relations.iter().filter(move |r| r.table == parent)
    }
}

/// Restricts a listing to the children of one parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentFilter {
    pub column: &'static str,
    pub id: Uuid,
}

pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const TABLE: TableDef;
    const SCHEMA: Schema;

    fn id(&self) -> Uuid;

    fn user_id(&self) -> Uuid;

    /// Card title in list views.
    fn label(&self) -> String;

    /// Secondary line in list views, usually a resolved parent label.
    fn subtitle(&self) -> Option<String> {
        None
    }
}
