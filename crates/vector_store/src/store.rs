use anyhow::{Context, Result};
use db_schema::{close_quietly, connect, initialize_schema, SchemaVariant};
use demo_core::{DatabaseConfig, SEARCH_LIMIT};
use pgvector::Vector;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::cmp::Ordering;

use crate::models::{Document, Embedding, NewEmbedding, Overview, SearchResult, Stats, User};
use crate::vector::{cosine_similarity, EmbeddingVector};

/// Stay well under the 65535 bind-parameter limit of a single statement.
const MAX_ROWS_PER_INSERT: usize = 10_000;

/// Read side of the demo database plus a few maintenance writes.
///
/// Holds no connection: every call opens its own and releases it before
/// returning, on success and on failure.
pub struct VectorStore {
    database: DatabaseConfig,
    variant: SchemaVariant,
}

impl VectorStore {
    pub fn new(database: DatabaseConfig, variant: SchemaVariant) -> Self {
        Self { database, variant }
    }

    /// Ensures the schema exists and builds a store for the detected variant.
    pub async fn initialize(database: DatabaseConfig) -> Result<Self> {
        let variant = initialize_schema(&database)
            .await
            .context("Failed to initialize schema")?;

        tracing::info!(
            "Vector store ready with {} embeddings",
            variant.column_type()
        );

        Ok(Self::new(database, variant))
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    pub async fn list_overview(&self) -> Result<Overview> {
        let mut conn = connect(&self.database).await?;
        let result = fetch_overview(&mut conn, self.variant).await;
        close_quietly(conn).await;
        result
    }

    pub async fn stats(&self) -> Result<Stats> {
        let mut conn = connect(&self.database).await?;
        let result = fetch_stats(&mut conn).await;
        close_quietly(conn).await;
        result
    }

    /// Top [`SEARCH_LIMIT`] embeddings by cosine similarity, best first.
    pub async fn similarity_search(&self, query: &EmbeddingVector) -> Result<Vec<SearchResult>> {
        tracing::info!(
            "VectorStore::similarity_search: query={}, variant={:?}",
            query,
            self.variant
        );

        let mut conn = connect(&self.database).await?;
        let result = match self.variant {
            SchemaVariant::Native => search_native(&mut conn, query).await,
            SchemaVariant::Array => search_in_application(&mut conn, query).await,
        };
        close_quietly(conn).await;

        if let Ok(results) = &result {
            tracing::info!("Found {} results", results.len());
        }
        result
    }

    pub async fn insert_embeddings(&self, rows: &[NewEmbedding]) -> Result<u64> {
        let mut conn = connect(&self.database).await?;
        let result = insert_embedding_rows(&mut conn, self.variant, rows).await;
        close_quietly(conn).await;
        result
    }

    /// Deletes a user; their documents and embeddings follow via ON DELETE CASCADE.
    pub async fn delete_user(&self, user_id: i32) -> Result<bool> {
        let mut conn = connect(&self.database).await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut conn)
            .await
            .context("Failed to delete user");
        close_quietly(conn).await;

        Ok(result?.rows_affected() > 0)
    }
}

async fn fetch_overview(conn: &mut PgConnection, variant: SchemaVariant) -> Result<Overview> {
    let users = sqlx::query("SELECT id, email, tier, created_at FROM users ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch users")?
        .iter()
        .map(user_from_row)
        .collect::<Result<Vec<_>>>()?;

    let documents =
        sqlx::query("SELECT id, user_id, title, upload_date FROM documents ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .context("Failed to fetch documents")?
            .iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>>>()?;

    let embeddings =
        sqlx::query("SELECT id, doc_id, content, embedding FROM embeddings ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .context("Failed to fetch embeddings")?
            .iter()
            .map(|row| embedding_from_row(row, variant))
            .collect::<Result<Vec<_>>>()?;

    Ok(Overview {
        users,
        documents,
        embeddings,
    })
}

async fn fetch_stats(conn: &mut PgConnection) -> Result<Stats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM documents) AS documents,
            (SELECT COUNT(*) FROM embeddings) AS embeddings
        "#,
    )
    .fetch_one(&mut *conn)
    .await
    .context("Failed to count rows")?;

    Ok(Stats {
        users: row.try_get("users")?,
        documents: row.try_get("documents")?,
        embeddings: row.try_get("embeddings")?,
    })
}

async fn search_native(
    conn: &mut PgConnection,
    query: &EmbeddingVector,
) -> Result<Vec<SearchResult>> {
    let query_vector = Vector::from(query.to_vec());

    let rows = sqlx::query(
        r#"
        SELECT
            id,
            doc_id,
            content,
            embedding,
            1 - (embedding <=> $1) AS similarity
        FROM embeddings
        WHERE embedding IS NOT NULL
        ORDER BY similarity DESC
        LIMIT $2
        "#,
    )
    .bind(query_vector)
    .bind(SEARCH_LIMIT as i64)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to execute similarity search")?;

    rows.iter()
        .map(|row| {
            let embedding = embedding_from_row(row, SchemaVariant::Native)?;
            let similarity: f64 = row.try_get("similarity")?;
            Ok(SearchResult::new(embedding, similarity))
        })
        .collect()
}

async fn search_in_application(
    conn: &mut PgConnection,
    query: &EmbeddingVector,
) -> Result<Vec<SearchResult>> {
    let candidates = sqlx::query(
        "SELECT id, doc_id, content, embedding FROM embeddings WHERE embedding IS NOT NULL ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await
    .context("Failed to fetch embeddings for similarity search")?
    .iter()
    .map(|row| embedding_from_row(row, SchemaVariant::Array))
    .collect::<Result<Vec<_>>>()?;

    Ok(rank_by_cosine(query, candidates, SEARCH_LIMIT))
}

/// Scores candidates against `query` and keeps the best `limit`.
///
/// Ordering follows PostgreSQL's `ORDER BY ... DESC`: NaN scores come first,
/// then descending similarity. Ties break on ascending id.
pub fn rank_by_cosine(
    query: &EmbeddingVector,
    candidates: Vec<Embedding>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter_map(|embedding| {
            let stored = embedding.embedding.as_deref()?;
            let components = stored.len();
            match cosine_similarity(query.as_slice(), stored) {
                Some(similarity) => Some(SearchResult::new(embedding, similarity)),
                None => {
                    tracing::warn!(
                        "Skipping embedding {} with {} components",
                        embedding.id,
                        components
                    );
                    None
                }
            }
        })
        .collect();

    results.sort_by(|a, b| {
        descending_similarity(a.similarity, b.similarity)
            .then_with(|| a.embedding.id.cmp(&b.embedding.id))
    });
    results.truncate(limit);
    results
}

fn descending_similarity(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

pub(crate) async fn insert_embedding_rows(
    conn: &mut PgConnection,
    variant: SchemaVariant,
    rows: &[NewEmbedding],
) -> Result<u64> {
    let mut inserted = 0;

    for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO embeddings (doc_id, content, embedding) ");

        builder.push_values(chunk, |mut values, row| {
            values.push_bind(row.doc_id).push_bind(row.content.clone());
            match variant {
                SchemaVariant::Native => values.push_bind(Vector::from(row.vector.to_vec())),
                SchemaVariant::Array => values.push_bind(row.vector.to_vec()),
            };
        });

        let result = builder
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to insert embeddings")?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let tier: String = row.try_get("tier")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        tier: tier.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

fn document_from_row(row: &PgRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        upload_date: row.try_get("upload_date")?,
    })
}

fn embedding_from_row(row: &PgRow, variant: SchemaVariant) -> Result<Embedding> {
    let embedding = match variant {
        SchemaVariant::Native => row
            .try_get::<Option<Vector>, _>("embedding")?
            .map(Vec::<f32>::from),
        SchemaVariant::Array => row.try_get::<Option<Vec<f32>>, _>("embedding")?,
    };

    Ok(Embedding {
        id: row.try_get("id")?,
        doc_id: row.try_get("doc_id")?,
        content: row.try_get("content")?,
        embedding,
    })
}
