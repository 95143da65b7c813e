use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    DocumentQuery, OrderDocument, OrderId, Result, StoreConfig, StoreError, UserId, Version,
    store::{DocumentStore, validate_query, validate_replacement},
};

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, status, version, created_at, updated_at, body FROM orders";

/// PostgreSQL-backed document store implementation.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool using the given configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<OrderDocument> {
        Ok(OrderDocument {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner_id: UserId::new(row.try_get::<String, _>("owner_id")?),
            status: row.try_get("status")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            body: row.try_get("body")?,
        })
    }

    fn where_clause(query: &DocumentQuery) -> String {
        let mut sql = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.owner_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND owner_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        sql
    }

    fn filter_param_count(query: &DocumentQuery) -> usize {
        usize::from(query.owner_id.is_some()) + usize::from(query.status.is_some())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, document: OrderDocument) -> Result<()> {
        let id = document.id;

        sqlx::query(
            r#"
            INSERT INTO orders (id, owner_id, status, version, created_at, updated_at, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.as_uuid())
        .bind(document.owner_id.as_str())
        .bind(&document.status)
        .bind(document.version.as_i64())
        .bind(document.created_at)
        .bind(document.updated_at)
        .bind(&document.body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::AlreadyExists(id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<OrderDocument>> {
        let row: Option<PgRow> = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn compare_and_swap(&self, document: OrderDocument, expected: Version) -> Result<()> {
        validate_replacement(&document, expected)?;
        let id = document.id;

        // Check and replace in one statement
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET owner_id = $3, status = $4, version = $5, updated_at = $6, body = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_i64())
        .bind(document.owner_id.as_str())
        .bind(&document.status)
        .bind(document.version.as_i64())
        .bind(document.updated_at)
        .bind(&document.body)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing matched: tell a missing row apart from a lost race
        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => Err(StoreError::VersionConflict {
                order_id: id,
                expected,
                actual: Version::new(actual),
            }),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<OrderDocument>> {
        validate_query(&query)?;

        let mut sql = format!("{SELECT_COLUMNS}{}", Self::where_clause(&query));
        let mut param_count = Self::filter_param_count(&query);

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(ref owner_id) = query.owner_id {
            sqlx_query = sqlx_query.bind(owner_id.as_str());
        }
        if let Some(ref status) = query.status {
            sqlx_query = sqlx_query.bind(status);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM orders{}",
            Self::where_clause(&query)
        );

        let mut sqlx_query = sqlx::query_scalar::<_, i64>(&sql);

        if let Some(ref owner_id) = query.owner_id {
            sqlx_query = sqlx_query.bind(owner_id.as_str());
        }
        if let Some(ref status) = query.status {
            sqlx_query = sqlx_query.bind(status);
        }

        let count = sqlx_query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}
