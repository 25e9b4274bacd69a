use anyhow::{Context, Result};
use db_schema::{close_quietly, connect, initialize_schema, SchemaVariant};
use demo_core::{DatabaseConfig, SeedConfig};
use serde::Serialize;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, QueryBuilder};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::models::{NewEmbedding, Tier};
use crate::store::insert_embedding_rows;
use crate::vector::{parse_component, EmbeddingVector, VectorError};

const SAMPLE_USERS: [(i32, &str, Tier); 2] = [
    (5, "alice@example.com", Tier::Pro),
    (42, "bob@hk-tech.edu", Tier::Free),
];

const SAMPLE_DOCUMENTS: [(i32, i32, &str); 3] = [
    (1, 42, "Climate_Report.pdf"),
    (2, 5, "AI_Ethics_v2.pdf"),
    (3, 5, "DeepSeek_Architecture.pdf"),
];

const SAMPLE_EMBEDDINGS: [(i32, &str, [f32; 3]); 2] = [
    (
        1,
        "Global temperatures rose by 1.5 degrees...",
        [0.1, 0.9, 0.2],
    ),
    (
        2,
        "The alignment problem in LLMs refers to...",
        [0.7, 0.1, 0.8],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvImport {
    pub path: PathBuf,
    pub doc_id: i32,
    pub imported: u64,
    pub skipped: usize,
    pub missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: u64,
    pub documents: u64,
    pub inline_embeddings: u64,
    pub csv_imports: Vec<CsvImport>,
}

impl SeedReport {
    pub fn total_embeddings(&self) -> u64 {
        self.inline_embeddings + self.csv_imports.iter().map(|c| c.imported).sum::<u64>()
    }
}

/// Rows accepted from one CSV file, plus how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRows {
    pub rows: Vec<NewEmbedding>,
    pub skipped: usize,
}

pub fn sample_embeddings() -> Vec<NewEmbedding> {
    SAMPLE_EMBEDDINGS
        .iter()
        .map(|&(doc_id, content, vector)| {
            NewEmbedding::new(doc_id, content, EmbeddingVector::new(vector))
        })
        .collect()
}

/// Reads `content, v1, v2, v3` rows for `doc_id`.
///
/// A missing file is not an error: it yields `Ok(None)`.
pub fn read_csv_embeddings(path: &Path, doc_id: i32) -> Result<Option<CsvRows>> {
    if !path.exists() {
        warn!(
            "CSV file not found at {}. Skipping CSV seed.",
            path.display()
        );
        return Ok(None);
    }

    info!("Reading data from {}...", path.display());
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    parse_csv_embeddings(file, doc_id)
        .with_context(|| format!("Failed to read CSV file {}", path.display()))
        .map(Some)
}

/// Parses headerless CSV. Short or non-numeric rows are logged and skipped;
/// only I/O failures abort.
pub fn parse_csv_embeddings<R: io::Read>(reader: R, doc_id: i32) -> Result<CsvRows> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut skipped = 0;

    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable CSV row {}: {}", line, e);
                skipped += 1;
                continue;
            }
        };

        match embedding_from_record(&record, doc_id) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                warn!("Skipping CSV row {}: {}", line, reason);
                skipped += 1;
            }
        }
    }

    Ok(CsvRows { rows, skipped })
}

fn embedding_from_record(record: &csv::StringRecord, doc_id: i32) -> Result<NewEmbedding, String> {
    if record.len() < 4 {
        return Err(format!("expected 4 fields, found {}", record.len()));
    }

    let components = record
        .iter()
        .skip(1)
        .take(3)
        .map(parse_component)
        .collect::<Result<Vec<f32>, VectorError>>()
        .map_err(|e| e.to_string())?;
    let vector = EmbeddingVector::try_from(components).map_err(|e| e.to_string())?;

    Ok(NewEmbedding::new(doc_id, &record[0], vector))
}

/// Destructively resets the demo tables and loads the sample data.
///
/// Everything after schema setup runs in one transaction: a failure leaves
/// the previous contents untouched.
pub struct Seeder {
    database: DatabaseConfig,
    seed: SeedConfig,
}

impl Seeder {
    pub fn new(database: DatabaseConfig, seed: SeedConfig) -> Self {
        Self { database, seed }
    }

    pub async fn run(&self) -> Result<SeedReport> {
        let variant = initialize_schema(&self.database)
            .await
            .context("Failed to initialize schema")?;

        info!("Connecting to the PostgreSQL database...");
        let mut conn = connect(&self.database).await?;
        let result = self.seed_in_transaction(&mut conn, variant).await;
        close_quietly(conn).await;
        info!("Database connection closed.");

        result
    }

    async fn seed_in_transaction(
        &self,
        conn: &mut PgConnection,
        variant: SchemaVariant,
    ) -> Result<SeedReport> {
        let mut tx = conn
            .begin()
            .await
            .context("Failed to start seed transaction")?;

        match self.populate(&mut tx, variant).await {
            Ok(report) => {
                tx.commit()
                    .await
                    .context("Failed to commit seed transaction")?;
                info!("Successfully seeded the database!");
                Ok(report)
            }
            Err(e) => {
                error!("Seeding failed, rolling back: {:#}", e);
                if let Err(rollback_error) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_error);
                }
                Err(e)
            }
        }
    }

    async fn populate(&self, conn: &mut PgConnection, variant: SchemaVariant) -> Result<SeedReport> {
        info!("Cleaning up existing data...");
        sqlx::query("TRUNCATE users, documents, embeddings RESTART IDENTITY CASCADE")
            .execute(&mut *conn)
            .await
            .context("Failed to truncate tables")?;

        info!("Inserting sample users...");
        let mut users: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO users (id, email, tier) ");
        users.push_values(SAMPLE_USERS.iter(), |mut values, &(id, email, tier)| {
            values.push_bind(id).push_bind(email).push_bind(tier.as_str());
        });
        let users = users
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to insert sample users")?
            .rows_affected();

        info!("Inserting sample documents...");
        let mut documents: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO documents (id, user_id, title) ");
        documents.push_values(
            SAMPLE_DOCUMENTS.iter(),
            |mut values, &(id, user_id, title)| {
                values.push_bind(id).push_bind(user_id).push_bind(title);
            },
        );
        let documents = documents
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to insert sample documents")?
            .rows_affected();

        sync_serial_sequences(conn).await?;

        info!("Inserting manual mock embeddings...");
        let inline_embeddings = insert_embedding_rows(conn, variant, &sample_embeddings()).await?;

        let mut csv_imports = Vec::new();
        for source in self.seed.resolved_sources() {
            let import = match read_csv_embeddings(&source.path, source.doc_id)? {
                None => CsvImport {
                    path: source.path,
                    doc_id: source.doc_id,
                    imported: 0,
                    skipped: 0,
                    missing: true,
                },
                Some(parsed) => {
                    let imported = insert_embedding_rows(conn, variant, &parsed.rows)
                        .await
                        .with_context(|| {
                            format!("Failed to import CSV file {}", source.path.display())
                        })?;
                    if imported > 0 {
                        info!("Successfully imported {} rows from CSV.", imported);
                    }
                    CsvImport {
                        path: source.path,
                        doc_id: source.doc_id,
                        imported,
                        skipped: parsed.skipped,
                        missing: false,
                    }
                }
            };
            csv_imports.push(import);
        }

        Ok(SeedReport {
            users,
            documents,
            inline_embeddings,
            csv_imports,
        })
    }
}

/// Explicit ids bypass the SERIAL sequences; move them past the seeded rows
/// so later inserts without an id do not collide.
async fn sync_serial_sequences(conn: &mut PgConnection) -> Result<()> {
    for table in ["users", "documents"] {
        let statement = format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), (SELECT MAX(id) FROM {table}))"
        );
        sqlx::query(&statement)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to advance {table} id sequence"))?;
    }
    Ok(())
}
