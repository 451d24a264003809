//! # dr-db-postgres Implementation
//!
//! Maps entity tables onto Postgres. Rows are read back through `to_jsonb`
//! so one projection query serves every entity, with parent labels joined
//! in under their relation aliases.

mod reports;
mod sql;

use async_trait::async_trait;
use dr_core::{FieldValue, ParentFilter, RecordStore, TableDef, Values};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    // NULLs keep their column type so Postgres never has to guess.
    match value {
        FieldValue::Text(v) => qb.push_bind(v.clone()),
        FieldValue::Bool(v) => qb.push_bind(*v),
        FieldValue::Int(v) => qb.push_bind(*v),
        FieldValue::Float(v) => qb.push_bind(*v),
        FieldValue::Uuid(v) => qb.push_bind(*v),
        FieldValue::Date(v) => qb.push_bind(*v),
        FieldValue::Timestamp(v) => qb.push_bind(*v),
    };
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert(&self, table: &TableDef, owner: Uuid, values: &Values) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        let mut qb = QueryBuilder::<Postgres>::new(sql::insert_prefix(table, values));
        qb.push_bind(id);
        qb.push(", ");
        qb.push_bind(owner);
        for (_, value) in values.iter() {
            qb.push(", ");
            push_value(&mut qb, value);
        }
        qb.push(")");

        qb.build().execute(&self.pool).await?;
        debug!(table = table.name, %id, "row inserted");
        Ok(id)
    }

    async fn update(
        &self,
        table: &TableDef,
        owner: Uuid,
        id: Uuid,
        values: &Values,
    ) -> anyhow::Result<bool> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", table.name));
        for (name, value) in values.iter() {
            qb.push(name).push(" = ");
            push_value(&mut qb, value);
            qb.push(", ");
        }
        qb.push("updated_at = now() WHERE id = ");
        qb.push_bind(id);
        qb.push(" AND user_id = ");
        qb.push_bind(owner);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, table: &TableDef, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", table.name))
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, table: &TableDef, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Value>> {
        let row = sqlx::query_scalar::<_, Value>(&sql::find(table))
            .bind(owner)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list(
        &self,
        table: &TableDef,
        owner: Uuid,
        filter: Option<ParentFilter>,
    ) -> anyhow::Result<Vec<Value>> {
        let query = sql::list(table, filter.map(|f| f.column));
        let mut q = sqlx::query_scalar::<_, Value>(&query).bind(owner);
        if let Some(filter) = filter {
            q = q.bind(filter.id);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }
}
