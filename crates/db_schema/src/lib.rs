use anyhow::{anyhow, Context, Result};
use demo_core::{DatabaseConfig, EMBEDDING_DIMENSIONS};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage representation of the `embeddings.embedding` column.
///
/// Decided once by [`initialize_schema`] and passed to everything that reads
/// or writes embeddings, so queries never have to re-probe the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// pgvector `vector(3)` column, searched with the `<=>` operator.
    Native,
    /// Plain `real[]` column used when pgvector is unavailable.
    Array,
}

impl SchemaVariant {
    pub fn column_type(self) -> String {
        match self {
            SchemaVariant::Native => format!("vector({EMBEDDING_DIMENSIONS})"),
            SchemaVariant::Array => "real[]".to_string(),
        }
    }

    fn from_udt_name(udt_name: &str) -> Result<Self> {
        match udt_name {
            "vector" => Ok(SchemaVariant::Native),
            "_float4" => Ok(SchemaVariant::Array),
            other => Err(anyhow!(
                "Unsupported type '{}' for embeddings.embedding column",
                other
            )),
        }
    }
}

pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let ssl_mode = PgSslMode::from_str(&config.sslmode)
        .with_context(|| format!("Invalid ssl mode '{}'", config.sslmode))?;

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
        .ssl_mode(ssl_mode))
}

/// Opens a dedicated connection. Callers own it and must release it with
/// [`close_quietly`] once their statements are done.
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection> {
    let options = connect_options(config)?;

    let connect_result =
        tokio::time::timeout(CONNECT_TIMEOUT, PgConnection::connect_with(&options))
            .await
            .context("Database connection timed out")?;

    connect_result.context("Failed to connect to PostgreSQL")
}

pub async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close database connection cleanly: {}", e);
    }
}

/// Ensures the users/documents/embeddings tables exist and reports which
/// embedding representation the database ended up with.
pub async fn initialize_schema(config: &DatabaseConfig) -> Result<SchemaVariant> {
    info!("Initializing schema on {}", config.describe());

    let mut conn = connect(config).await?;
    let result = create_schema(&mut conn).await;
    close_quietly(conn).await;

    result
}

async fn create_schema(conn: &mut PgConnection) -> Result<SchemaVariant> {
    let preferred = if enable_vector_extension(conn).await? {
        SchemaVariant::Native
    } else {
        SchemaVariant::Array
    };

    info!("Creating tables if they don't exist...");
    for statement in create_table_statements(preferred) {
        sqlx::query(&statement)
            .execute(&mut *conn)
            .await
            .context("Failed to create tables")?;
    }

    let actual = embedding_column_variant(conn).await?;
    if actual != preferred {
        warn!(
            "embeddings table already exists with {} column, keeping it instead of {}",
            actual.column_type(),
            preferred.column_type()
        );
    }

    info!("Schema ready, embeddings stored as {}", actual.column_type());
    Ok(actual)
}

async fn enable_vector_extension(conn: &mut PgConnection) -> Result<bool> {
    match sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&mut *conn)
        .await
    {
        Ok(_) => {
            info!("pgvector extension enabled");
            Ok(true)
        }
        // The server answered but refused: extension missing or not permitted.
        Err(sqlx::Error::Database(e)) => {
            warn!(
                "pgvector extension not available ({}); using real[] for embeddings",
                e.message()
            );
            Ok(false)
        }
        Err(e) => Err(e).context("Failed to probe pgvector extension"),
    }
}

async fn embedding_column_variant(conn: &mut PgConnection) -> Result<SchemaVariant> {
    let row = sqlx::query(
        r#"
        SELECT udt_name::text AS udt_name
        FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = 'embeddings'
          AND column_name = 'embedding'
        "#,
    )
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to inspect embeddings column")?
    .ok_or_else(|| anyhow!("embeddings.embedding column is missing"))?;

    let udt_name: String = row.try_get("udt_name")?;
    SchemaVariant::from_udt_name(&udt_name)
}

pub fn create_table_statements(variant: SchemaVariant) -> Vec<String> {
    vec![
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            tier TEXT NOT NULL DEFAULT 'free' CHECK (tier IN ('free', 'pro')),
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id SERIAL PRIMARY KEY,
            user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            upload_date TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#
        .to_string(),
        format!(
            r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            id SERIAL PRIMARY KEY,
            doc_id INTEGER REFERENCES documents(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            embedding {}
        )
        "#,
            variant.column_type()
        ),
    ]
}
