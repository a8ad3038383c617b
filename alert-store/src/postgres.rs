use crate::{Clause, Document, DocumentStore, Filter, STORAGE_ID_FIELD};
use alert_core::{config::DatabaseConfig, outcome::UpdateOutcome, AlertError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    PgPool, Postgres, QueryBuilder, Row,
};
use tracing::{debug, info};

/// Document store over a single PostgreSQL table of JSONB documents, one row
/// per document, partitioned by a `collection` column.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AlertError::Store(format!("Migration failed: {}", e)))?;

        info!("Database migrations applied");
        Ok(())
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.to_string());

    for clause in filter.clauses() {
        match clause {
            Clause::Eq(field, value) => {
                let mut probe = Map::new();
                probe.insert(field.clone(), value.clone());
                builder.push(" AND doc @> ");
                builder.push_bind(Json(Value::Object(probe)));
            }
            Clause::In(field, values) => {
                builder.push(" AND doc -> ");
                builder.push_bind(field.clone());
                builder.push(" IN (SELECT jsonb_array_elements(");
                builder.push_bind(Json(Value::Array(values.clone())));
                builder.push("))");
            }
            Clause::Exists(field) => {
                builder.push(" AND doc ? ");
                builder.push_bind(field.clone());
            }
        }
    }
}

fn strip_storage_id(mut document: Document) -> Document {
    document.remove(STORAGE_ID_FIELD);
    document
}

fn row_to_document(row: PgRow) -> Result<Document> {
    let seq: i64 = row.try_get("seq")?;
    let Json(value): Json<Value> = row.try_get("doc")?;
    let Value::Object(mut document) = value else {
        return Err(AlertError::Store(format!(
            "Row {} does not hold a JSON object",
            seq
        )));
    };
    document.insert(STORAGE_ID_FIELD.to_string(), Value::String(seq.to_string()));
    Ok(document)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        sqlx::query("INSERT INTO documents (collection, doc) VALUES ($1, $2)")
            .bind(collection)
            .bind(Json(Value::Object(strip_storage_id(document))))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO documents (collection, doc) ");
        builder.push_values(documents, |mut row, document| {
            row.push_bind(collection.to_string())
                .push_bind(Json(Value::Object(strip_storage_id(document))));
        });

        let inserted = builder.build().execute(&self.pool).await?.rows_affected();
        debug!(collection, inserted, "Inserted documents");
        Ok(inserted)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT seq, doc FROM documents");
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY seq");

        builder
            .build()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(row_to_document)
            .collect()
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("DELETE FROM documents");
        push_filter(&mut builder, collection, filter);

        Ok(builder.build().execute(&self.pool).await?.rows_affected())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
    ) -> Result<UpdateOutcome> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("WITH target AS (SELECT seq, doc FROM documents");
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY seq LIMIT 1 FOR UPDATE) UPDATE documents AS d SET doc = target.doc || ");
        builder.push_bind(Json(Value::Object(strip_storage_id(patch))));
        builder.push(" FROM target WHERE d.seq = target.seq RETURNING (target.doc IS DISTINCT FROM d.doc) AS modified");

        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(match row {
            Some(row) => UpdateOutcome {
                matched_count: 1,
                modified_count: u64::from(row.try_get::<bool, _>("modified")?),
            },
            None => UpdateOutcome::default(),
        })
    }
}
