pub mod models;
pub mod search;
pub mod seed;
pub mod store;
pub mod vector;

pub use db_schema::SchemaVariant;
pub use models::{Document, Embedding, NewEmbedding, Overview, SearchResult, Stats, Tier, User};
pub use search::{run_search, SearchOutcome};
pub use seed::{CsvImport, SeedReport, Seeder};
pub use store::VectorStore;
pub use vector::{parse_query_vector, EmbeddingVector, VectorError};
