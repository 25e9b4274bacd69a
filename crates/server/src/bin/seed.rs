//! Resets the demo tables and loads the sample rows plus any configured CSV files.
use demo_core::Config;
use server::errors::AppError;
use tracing::{error, info, warn};
use vector_store::Seeder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing();

    let config = Config::load_from_env().map_err(|e| AppError::Config(format!("{:#}", e)))?;
    info!("Seeding database {}", config.database.describe());

    let report = match Seeder::new(config.database, config.seed).run().await {
        Ok(report) => report,
        Err(e) => {
            error!("Seeding failed, no changes were committed: {:#}", e);
            return Err(e);
        }
    };

    for import in &report.csv_imports {
        if import.missing {
            warn!("Skipped {} (file not found)", import.path.display());
        } else {
            info!(
                "Imported {} rows from {} into document {} ({} rows skipped)",
                import.imported,
                import.path.display(),
                import.doc_id,
                import.skipped
            );
        }
    }

    info!(
        "Seeded {} users, {} documents and {} embeddings",
        report.users,
        report.documents,
        report.total_embeddings()
    );

    Ok(())
}
