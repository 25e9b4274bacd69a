pub mod config;

pub use config::{Config, CsvSource, DatabaseConfig, SeedConfig, ServerConfig};

/// Every stored and queried embedding has exactly this many components.
pub const EMBEDDING_DIMENSIONS: usize = 3;

/// Maximum number of rows a similarity search returns.
pub const SEARCH_LIMIT: usize = 10;
